use std::io::Write as _;
use std::sync::Arc;

use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley::client::AgentClient;
use parley::config::Config;
use parley::controller::{ChatController, StreamUpdate};
use parley::models::Role;
use parley::storage;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("parley {}", VERSION);
        return Ok(());
    }

    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::info!(base_url = %config.base_url, app = %config.app_name, "starting");

    let client = Arc::new(AgentClient::new(&config));
    let (mut controller, mut updates) = ChatController::new(client, &config);

    // Seed the picker from disk, then prefer the server's view
    match storage::load_sessions() {
        Ok(sessions) if !sessions.is_empty() => {
            controller.store_mut().set_sessions(sessions);
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "could not load cached sessions"),
    }
    if let Err(e) = controller.refresh_sessions().await {
        tracing::warn!(error = %e, "could not list sessions from server");
    }

    println!("parley {} - type /help for commands", VERSION);
    if controller.store().sessions().is_empty() {
        println!("No sessions yet. /new starts one.");
    } else {
        print_sessions(&controller);
    }
    prompt();

    let mut renderer = Renderer::default();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            maybe_update = updates.recv() => {
                let Some(update) = maybe_update else { break };
                renderer.render(&update, &controller);
                controller.apply_update(update);
            }
            _ = tokio::signal::ctrl_c() => {
                if controller.cancel_active_stream() {
                    continue;
                }
                println!();
                break;
            }
            maybe_line = lines.next_line() => {
                let Some(line) = maybe_line? else { break };
                if !handle_line(&mut controller, line.trim()).await {
                    break;
                }
                if !controller.is_streaming() {
                    prompt();
                }
            }
        }
    }

    if let Err(e) = storage::save_sessions(controller.store().sessions()) {
        tracing::warn!(error = %e, "could not persist sessions");
    }
    Ok(())
}

/// Handle one input line. Returns false to exit.
async fn handle_line(controller: &mut ChatController, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut words = rest.split_whitespace();
        let command = words.next().unwrap_or("");
        let arg = words.next();

        match command {
            "quit" | "exit" | "q" => return false,
            "new" => match controller.new_session().await {
                Ok(id) => println!("Started session {}", short_id(&id)),
                Err(e) => println!("Could not create session: {}", e),
            },
            "open" => match arg {
                Some(id) => {
                    let id = resolve_id(controller, id);
                    match controller.open_session(&id).await {
                        Ok(true) => print_history(controller),
                        Ok(false) => println!("Session {} no longer exists.", short_id(&id)),
                        Err(e) => println!("Could not open session: {}", e),
                    }
                }
                None => println!("Usage: /open <session-id>"),
            },
            "sessions" | "ls" => print_sessions(controller),
            "refresh" => match controller.refresh_sessions().await {
                Ok(count) => println!("{} session(s)", count),
                Err(e) => println!("Could not refresh sessions: {}", e),
            },
            "delete" => match arg {
                Some(id) => {
                    let id = resolve_id(controller, id);
                    match controller.delete_session(&id).await {
                        Ok(()) => println!("Deleted {}", short_id(&id)),
                        Err(e) => println!("Could not delete session: {}", e),
                    }
                }
                None => println!("Usage: /delete <session-id>"),
            },
            _ => print_help(),
        }
        return true;
    }

    match controller.send_message(line) {
        Ok(_) => {}
        Err(e) => println!("{}", e),
    }
    true
}

/// Incremental printing of stream updates.
///
/// `Content` updates carry the full reconciled text; print only the new
/// suffix when the text grew in place, otherwise restart the line.
#[derive(Default)]
struct Renderer {
    current: String,
}

impl Renderer {
    fn render(&mut self, update: &StreamUpdate, controller: &ChatController) {
        match update {
            StreamUpdate::Streaming { .. } => {
                self.current.clear();
            }
            StreamUpdate::Content { text, .. } => {
                match text.strip_prefix(self.current.as_str()) {
                    Some(delta) => print!("{}", delta),
                    None => print!("\r{}", text),
                }
                let _ = std::io::stdout().flush();
                self.current = text.clone();
            }
            StreamUpdate::Agent { agent, .. } => {
                if controller.current_agent() != Some(agent.as_str()) {
                    println!("[{}]", agent);
                }
            }
            StreamUpdate::FunctionCall { call, .. } => {
                println!("[calling {}]", call.name);
            }
            StreamUpdate::FunctionResponse { response, .. } => {
                println!("[{} returned]", response.name);
            }
            StreamUpdate::Completed { .. } => {
                println!();
                prompt();
            }
            StreamUpdate::Cancelled { .. } => {
                println!("\n[cancelled]");
                prompt();
            }
            StreamUpdate::Failed { error, .. } => {
                println!("\n[error] {}", error);
                prompt();
            }
        }
    }
}

fn print_sessions(controller: &ChatController) {
    for session in controller.store().sessions() {
        let title = if session.title.is_empty() {
            "(untitled)"
        } else {
            &session.title
        };
        let marker = if controller.active_session() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, short_id(&session.id), title);
    }
}

fn print_history(controller: &ChatController) {
    let Some(session_id) = controller.active_session() else {
        return;
    };
    for message in controller.store().messages(session_id) {
        let speaker = match message.role {
            Role::User => "you",
            Role::Model => "agent",
        };
        if message.has_content() {
            println!("{}: {}", speaker, message.content);
        }
        for call in &message.function_calls {
            println!("  [called {}]", call.name);
        }
    }
}

fn print_help() {
    println!("/sessions        list sessions (* marks the active one)");
    println!("/new             create a session and switch to it");
    println!("/open <id>       open a session (id prefix works)");
    println!("/delete <id>     delete a session");
    println!("/refresh         re-fetch the session list");
    println!("/quit            exit");
    println!("Anything else is sent to the agent; Ctrl+C cancels a running reply.");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Expand a unique session-id prefix to the full id.
fn resolve_id(controller: &ChatController, prefix: &str) -> String {
    let matches: Vec<&str> = controller
        .store()
        .sessions()
        .iter()
        .filter(|s| s.id.starts_with(prefix))
        .map(|s| s.id.as_str())
        .collect();
    match matches.as_slice() {
        [only] => only.to_string(),
        _ => prefix.to_string(),
    }
}
