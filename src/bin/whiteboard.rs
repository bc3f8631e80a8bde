//! Terminal front end for the whiteboard.
//!
//! Pointer input is given as slash commands and anything else is sent to
//! the room chat. The canvas can be written out as PNG at any time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whiteboard_rs::config::{default_storage_path, SurfaceConfig, CANVAS_HEIGHT, CANVAS_WIDTH};
use whiteboard_rs::drawing::{Color, Point, ScriptedPrompt, Tool};
use whiteboard_rs::storage::LocalStorage;
use whiteboard_rs::toolbar::{self, LineWidth, CLEAR_CONFIRMATION, PALETTE};
use whiteboard_rs::websocket::RelayClient;
use whiteboard_rs::{App, Screen, Session};

// Inbound frames are dispatched at roughly 30 fps
const PUMP_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(name = "whiteboard", version, about = "Collaborative whiteboard client")]
struct Args {
    /// Relay WebSocket URL
    #[arg(long, env = "WHITEBOARD_RELAY", default_value = "ws://127.0.0.1:8080/ws")]
    relay: String,

    /// Display name, remembered for next time
    #[arg(long)]
    name: Option<String>,

    /// Room code to join; a new room is created when omitted
    #[arg(long)]
    room: Option<String>,

    /// Identity store location
    #[arg(long, env = "WHITEBOARD_STORAGE")]
    storage: Option<PathBuf>,

    /// TrueType font for the text tool
    #[arg(long, env = "WHITEBOARD_FONT")]
    font: Option<PathBuf>,

    #[arg(long, default_value_t = CANVAS_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = CANVAS_HEIGHT)]
    height: u32,

    /// Maximum undo depth
    #[arg(long)]
    history_limit: Option<usize>,

    /// Where `/png` writes the canvas
    #[arg(long, default_value = "whiteboard.png")]
    export: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whiteboard_rs=info,whiteboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let storage_path = args.storage.clone().unwrap_or_else(default_storage_path);
    let storage = LocalStorage::open(&storage_path)
        .with_context(|| format!("Failed to open {}", storage_path.display()))?;
    let config = SurfaceConfig {
        width: args.width,
        height: args.height,
        font_path: args.font.clone(),
        history_limit: args.history_limit,
    };
    let mut app = App::new(storage, config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(name) = &args.name {
        app.set_name(name)?;
    }
    if let Some(room) = &args.room {
        app.join_room(room)?;
    }

    // Lobby
    while app.screen() != Screen::Board {
        match app.screen() {
            Screen::NameEntry => println!("Enter your name:"),
            Screen::RoomSelect => println!("Room code to join (empty creates a new room):"),
            Screen::Board => break,
        }
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };

        match app.screen() {
            Screen::NameEntry => {
                if let Err(e) = app.set_name(&line) {
                    println!("❌ {}", e);
                }
            }
            Screen::RoomSelect if line.trim().is_empty() => {
                let room_id = app.create_room();
                println!("✅ Created room {}", room_id);
            }
            Screen::RoomSelect => app.join_room(&line)?,
            Screen::Board => {}
        }
    }

    let client = RelayClient::connect(&args.relay)
        .await
        .with_context(|| format!("Failed to connect to {}", args.relay))?;
    let mut session = app.enter(&client)?;

    println!("🎨 {} in room {}", app.user().name, session.room_id());
    print_help();

    let mut interval = tokio::time::interval(PUMP_INTERVAL);
    let mut pending_clear = false;
    let mut seen_messages = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if session.pump() > 0 {
                    seen_messages = print_new_messages(&session, seen_messages);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                if pending_clear {
                    pending_clear = false;
                    let yes = matches!(line.trim(), "y" | "yes");
                    let mut prompt = ScriptedPrompt::new().answer_confirm(yes);
                    if session.clear_canvas(&mut prompt) {
                        println!("🧹 Canvas cleared");
                    }
                    continue;
                }

                match run_command(&mut session, &line, &args.export) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::ConfirmClear) => {
                        println!("{} [y/N]", CLEAR_CONFIRMATION);
                        pending_clear = true;
                    }
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("❌ {}", e),
                }
                seen_messages = print_new_messages(&session, seen_messages);
            }
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

enum Flow {
    Continue,
    ConfirmClear,
    Quit,
}

fn run_command(session: &mut Session, line: &str, export: &Path) -> anyhow::Result<Flow> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        session.chat_mut().send(line);
        return Ok(Flow::Continue);
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "tool" => {
            let tool: Tool = arg(&args, 0)?.parse()?;
            toolbar::select_tool(session.settings_mut(), tool);
        }
        "color" => {
            let value = arg(&args, 0)?;
            match value.parse::<usize>() {
                Ok(index) => {
                    if !toolbar::select_color(session.settings_mut(), index) {
                        anyhow::bail!("Palette has {} colors", PALETTE.len());
                    }
                }
                Err(_) => session.settings_mut().set_color(value.parse::<Color>()?),
            }
        }
        "width" => {
            let value = arg(&args, 0)?;
            let width = LineWidth::ALL
                .into_iter()
                .find(|w| w.label().eq_ignore_ascii_case(value))
                .with_context(|| format!("Unknown width {}", value))?;
            toolbar::select_line_width(session.settings_mut(), width);
        }
        "down" => {
            let at = point(&args)?;
            let answer = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            let mut prompt = ScriptedPrompt::new().answer_text(answer.clone());
            if !answer.is_empty() {
                prompt = prompt.answer_image(answer);
            }
            session.pointer_down(at, &mut prompt);
        }
        "move" => session.pointer_move(point(&args)?),
        "up" => session.pointer_up(),
        "undo" => {
            if !session.surface_mut().undo() {
                println!("Nothing to undo");
            }
        }
        "redo" => {
            if !session.surface_mut().redo() {
                println!("Nothing to redo");
            }
        }
        "clear" => return Ok(Flow::ConfirmClear),
        "png" => {
            let png = session.surface().export_png()?;
            std::fs::write(export, png)
                .with_context(|| format!("Failed to write {}", export.display()))?;
            println!("💾 Saved {}", export.display());
        }
        "notes" => {
            for note in session.surface().sticky_notes() {
                println!("📝 ({}, {}) {}", note.x, note.y, note.text);
            }
        }
        "users" => {
            println!("👥 {} online", session.presence().count());
            for user in session.presence().users() {
                println!("   {}", user.name);
            }
        }
        "help" => print_help(),
        "quit" => return Ok(Flow::Quit),
        other => anyhow::bail!("Unknown command /{}", other),
    }

    Ok(Flow::Continue)
}

fn arg<'a>(args: &[&'a str], index: usize) -> anyhow::Result<&'a str> {
    args.get(index)
        .copied()
        .with_context(|| format!("Missing argument {}", index + 1))
}

fn point(args: &[&str]) -> anyhow::Result<Point> {
    let x: f32 = arg(args, 0)?.parse().context("x must be a number")?;
    let y: f32 = arg(args, 1)?.parse().context("y must be a number")?;
    Ok(Point::new(x, y))
}

fn print_new_messages(session: &Session, seen: usize) -> usize {
    let messages = session.chat().messages();
    for message in messages.iter().skip(seen) {
        if !session.chat().is_own(message) {
            println!("💬 {}: {}", message.user, message.text);
        }
    }
    messages.len()
}

fn print_help() {
    println!("📝 Commands:");
    println!("   /tool <pen|eraser|rectangle|circle|text|image|sticky>");
    println!("   /color <0-{}|#rrggbb>", PALETTE.len() - 1);
    println!("   /width <thin|medium|thick>");
    println!("   /down <x> <y> [text or image path]");
    println!("   /move <x> <y>");
    println!("   /up");
    println!("   /undo, /redo, /clear");
    println!("   /png             - save the canvas");
    println!("   /notes, /users");
    println!("   /quit");
    println!("   Just type        - send a chat message\n");
}
