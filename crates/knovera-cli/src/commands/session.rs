//! /stats command - show session info

use super::CommandResult;
use knovera_ai::Role;
use knovera_chat::{ChatConfig, ChatState};

pub struct SessionCommand;

impl SessionCommand {
    /// Local session info; asks for server stats when a conversation is open
    pub fn execute(state: &ChatState, config: &ChatConfig) -> CommandResult {
        if state.conversation_id.is_some() {
            return CommandResult::Stats;
        }
        CommandResult::Message(Self::summary(state, config))
    }

    pub fn summary(state: &ChatState, config: &ChatConfig) -> String {
        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!(
            "User:         {} ({:?})\n",
            config.user.id, config.user.role
        ));
        output.push_str(&format!(
            "Conversation: {}\n",
            state.conversation_id.as_deref().unwrap_or("(new)")
        ));

        let assistant = state
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        output.push_str(&format!(
            "Messages:     {} total, {} from the assistant\n",
            state.messages.len(),
            assistant
        ));
        output.push_str(&format!(
            "Web search:   {}\n",
            if config.options.web_search { "on" } else { "off" }
        ));
        output.push_str(&format!(
            "Temperature:  {}  Max tokens: {}",
            config.options.temperature, config.options.max_tokens
        ));
        output
    }
}
