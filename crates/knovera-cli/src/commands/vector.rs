//! /vector command - draw a message embedding next to the previous one

use super::CommandResult;
use knovera_chat::ChatState;

use crate::render::render_view;

pub struct VectorCommand;

impl VectorCommand {
    /// - No args: the latest message with an embedding
    /// - With index: that message
    pub fn execute(args: &str, state: &ChatState) -> CommandResult {
        let embedded = state.embedded_indices();

        let index = if args.is_empty() {
            match embedded.last() {
                Some(&index) => index,
                None => {
                    return CommandResult::Message(
                        "No message has an embedding yet.".to_string(),
                    );
                }
            }
        } else {
            match args.parse::<usize>() {
                Ok(index) => index,
                Err(_) => {
                    return CommandResult::Message(format!(
                        "Invalid index '{}'. Messages with embeddings: {:?}",
                        args, embedded
                    ));
                }
            }
        };

        match state.embedding_view(index) {
            Some(view) => CommandResult::Message(render_view(&view)),
            None => CommandResult::Message(format!(
                "Message {} has no embedding. Messages with embeddings: {:?}",
                index, embedded
            )),
        }
    }
}
