//! Slash commands for interactive mode

mod conversation;
mod session;
mod vector;

pub use conversation::{DeleteCommand, OpenCommand};
pub use session::SessionCommand;
pub use vector::VectorCommand;

use knovera_chat::ChatSession;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Leave the open conversation
    NewConversation,
    /// Load a conversation by id
    Open(String),
    /// List the user's conversations
    List,
    /// Flip web search for later prompts
    ToggleWebSearch,
    /// Fetch and show stats of the open conversation
    Stats,
    /// Delete a conversation by id
    Delete(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, chat: &ChatSession) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => CommandResult::NewConversation,

        "open" | "o" => OpenCommand::execute(args),

        "list" | "l" => CommandResult::List,

        "web" | "w" => CommandResult::ToggleWebSearch,

        "vector" | "v" => VectorCommand::execute(args, chat.state()),

        "stats" | "s" => SessionCommand::execute(chat.state(), chat.config()),

        "delete" | "d" => DeleteCommand::execute(args, chat.state()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n             Start a new conversation
  /open, /o <id>       Open an existing conversation
  /list, /l            List your conversations
  /web, /w             Toggle web search for the next prompts
  /vector, /v [index]  Show a message embedding next to the previous one
  /stats, /s           Show session info and conversation stats
  /delete, /d [id]     Delete a conversation (the open one if no id)
  /quit, /exit, /q     Exit knovera

Examples:
  /vector              Show the latest embedding
  /vector 3            Show the embedding of message 3
  /open 65f1c0...      Continue that conversation"#
        .to_string()
}
