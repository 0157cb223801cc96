//! /open and /delete commands

use super::CommandResult;
use knovera_chat::ChatState;

pub struct OpenCommand;

impl OpenCommand {
    pub fn execute(args: &str) -> CommandResult {
        match args.split_whitespace().next() {
            Some(id) => CommandResult::Open(id.to_string()),
            None => CommandResult::Message(
                "Usage: /open <id>. Use /list to see your conversations.".to_string(),
            ),
        }
    }
}

pub struct DeleteCommand;

impl DeleteCommand {
    /// Delete the given id, or the open conversation when no id is given
    pub fn execute(args: &str, state: &ChatState) -> CommandResult {
        match args.split_whitespace().next() {
            Some(id) => CommandResult::Delete(id.to_string()),
            None => match &state.conversation_id {
                Some(id) => CommandResult::Delete(id.clone()),
                None => CommandResult::Message(
                    "No conversation is open. Usage: /delete <id>".to_string(),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_id() {
        assert!(matches!(OpenCommand::execute(""), CommandResult::Message(_)));
        assert_eq!(
            OpenCommand::execute("c1 extra"),
            CommandResult::Open("c1".into())
        );
    }

    #[test]
    fn test_delete_defaults_to_open_conversation() {
        let mut state = ChatState::default();
        assert!(matches!(
            DeleteCommand::execute("", &state),
            CommandResult::Message(_)
        ));

        state.conversation_id = Some("c7".into());
        assert_eq!(
            DeleteCommand::execute("", &state),
            CommandResult::Delete("c7".into())
        );
        assert_eq!(
            DeleteCommand::execute("c2", &state),
            CommandResult::Delete("c2".into())
        );
    }
}
