//! Slash commands for interactive mode

/// Result of executing a slash command
pub enum CommandResult {
    /// Reset the conversation, locally and on the backend
    Reset,
    /// Re-run classification for the last message
    Retry,
    /// Dismiss the upgrade prompt (mild cases only)
    Dismiss,
    /// Print the current conversation status
    Status,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command. Returns `None` for ordinary chat input.
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let command = input[1..]
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "reset" | "new" => CommandResult::Reset,
        "retry" => CommandResult::Retry,
        "dismiss" | "d" => CommandResult::Dismiss,
        "status" | "s" => CommandResult::Status,
        "quit" | "exit" | "q" => CommandResult::Exit,
        other => CommandResult::Unknown(other.to_string()),
    })
}

fn help_message() -> String {
    "Available commands:\n\
     /help     - Show this help\n\
     /status   - Show message count and latest assessment\n\
     /retry    - Re-run the last message\n\
     /dismiss  - Dismiss the upgrade prompt (mild cases only)\n\
     /reset    - Start a new conversation\n\
     /quit     - Exit"
        .to_string()
}
