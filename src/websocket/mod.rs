pub mod client;
pub mod handler;
pub mod message;

pub use client::RelayClient;
pub use message::{
    ClientEnvelope, ClientFrame, PresenceState, ServerEnvelope, ServerFrame, SubscriptionId,
};
