pub mod hub;
pub mod member;

pub use hub::{Hub, MAX_MEMBERS_PER_TOPIC};
pub use member::Member;
