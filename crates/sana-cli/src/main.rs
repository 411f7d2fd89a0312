//! sana - symptom-checking chat CLI

mod commands;
mod config;
mod snapshot;

use clap::Parser;
use std::sync::Arc;

use sana_chat::{ChatController, ChatEvent, HttpClassify, Message, UiState};
use sana_client::SymptomClient;

/// sana - symptom-checking chat
#[derive(Parser, Debug)]
#[command(name = "sana")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the classification backend
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Run in non-interactive mode with a single message
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Start a fresh conversation, ignoring any saved snapshot
    #[arg(long)]
    fresh: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sana=debug")
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file, CLI args take precedence
    let cfg = config::Config::load();
    let endpoint = args
        .endpoint
        .or(cfg.endpoint.clone())
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    let client = Arc::new(SymptomClient::new(endpoint));
    let classifier = Arc::new(HttpClassify::new(client));
    let mut controller = ChatController::new(cfg.chat_config(), classifier);

    // Rehydrate from the last saved snapshot unless told otherwise
    if args.fresh {
        if let Err(e) = snapshot::clear() {
            tracing::warn!("Failed to clear snapshot: {}", e);
        }
    } else if let Some(messages) = snapshot::load() {
        if !messages.is_empty() {
            println!("[Restored {} messages from the last session]", messages.len());
            controller.set_messages(messages);
        }
    }

    if let Some(ref message) = args.command {
        return run_command(&mut controller, message).await;
    }

    run_interactive(&mut controller).await
}

/// Submit one message, print the outcome, and exit.
async fn run_command(controller: &mut ChatController, message: &str) -> anyhow::Result<()> {
    let receiver = controller.subscribe();
    let printer = spawn_printer(receiver);

    controller.submit(message).await?;
    save_snapshot(controller.messages());

    // Let the printer drain before exiting
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();
    Ok(())
}

async fn run_interactive(controller: &mut ChatController) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let receiver = controller.subscribe();
    let printer = spawn_printer(receiver);

    // The controller seeds the log with a welcome message; show it.
    if let Some(first) = controller.messages().first() {
        println!("sana: {}", first.text);
    }
    println!("Type /help for commands.\n");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input) {
            match result {
                commands::CommandResult::Reset => {
                    controller.reset().await?;
                    if let Err(e) = snapshot::clear() {
                        tracing::warn!("Failed to clear snapshot: {}", e);
                    }
                }
                commands::CommandResult::Retry => {
                    controller.retry().await?;
                    save_snapshot(controller.messages());
                }
                commands::CommandResult::Dismiss => {
                    let before = controller.state().ui_state;
                    controller.dismiss();
                    if controller.state().ui_state == before {
                        println!("Nothing to dismiss right now.");
                    }
                }
                commands::CommandResult::Status => {
                    print_status(controller);
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        controller.submit(input).await?;
        save_snapshot(controller.messages());
        println!();
    }

    printer.abort();
    Ok(())
}

/// Persist the log, best-effort: storage failures never interrupt the
/// conversation.
fn save_snapshot(messages: &[sana_chat::Message]) {
    if let Err(e) = snapshot::save(messages) {
        tracing::warn!("Failed to save snapshot: {}", e);
    }
}

/// Print controller events as they arrive. The user's own input is not
/// echoed back; everything else is.
fn spawn_printer(
    mut receiver: tokio::sync::broadcast::Receiver<ChatEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event {
                ChatEvent::MessageAppended { message } => {
                    if !message.is_user() {
                        println!("sana: {}", message.text);
                    }
                }
                ChatEvent::RetryAttempt { attempt, max_attempts } => {
                    println!("[Retrying {}/{}]", attempt, max_attempts);
                }
                ChatEvent::AssessmentReady { snapshot } => {
                    let label = match &snapshot.common_name {
                        Some(alias) => format!("{} ({})", snapshot.condition, alias),
                        None => snapshot.condition.clone(),
                    };
                    println!(
                        "[Assessment: {} | {}% confidence | triage: {}]",
                        label,
                        snapshot.confidence,
                        snapshot.triage_level.as_str()
                    );
                }
                ChatEvent::StateChanged { ui_state } => match ui_state {
                    UiState::UpgradePrompt => {
                        println!(
                            "[Upgrade to Premium for the full report. /dismiss to \
                             continue without it (mild cases only)]"
                        );
                    }
                    UiState::SecondaryPrompt | UiState::Default => {}
                },
                ChatEvent::ConversationReset => {
                    println!("[Started a new conversation]");
                }
                ChatEvent::Error { message } => {
                    tracing::debug!("Turn failed: {}", message);
                }
                _ => {}
            }
        }
    })
}

fn print_status(controller: &ChatController) {
    let state = controller.state();
    println!(
        "Messages: {}/{} free",
        state.message_count,
        controller.config().free_message_limit
    );
    println!("State: {:?}", state.ui_state);
    match &state.latest_assessment {
        Some(snapshot) => {
            println!(
                "Latest assessment: {} ({}%, triage: {})",
                snapshot.condition,
                snapshot.confidence,
                snapshot.triage_level.as_str()
            );
        }
        None => println!("Latest assessment: none yet"),
    }
    let user_turns = controller
        .messages()
        .iter()
        .filter(|m: &&Message| m.is_user())
        .count();
    println!("Log: {} entries ({} from you)", controller.messages().len(), user_turns);
}
