//! knovera - streaming chat client for the Knovera AI backend

mod auth;
mod commands;
mod config;
mod render;
mod utils;

use anyhow::{Context, anyhow};
use clap::Parser;
use knovera_ai::{ApiClient, GenerateResult, UserIdentity, UserRole, vector::VectorComparison};
use knovera_chat::{ChatConfig, ChatEvent, ChatHandle, ChatSession};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// knovera - chat with the Knovera AI backend
#[derive(Parser, Debug)]
#[command(name = "knovera")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Send a single prompt and print the streamed reply
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Continue an existing conversation
    #[arg(long)]
    conversation: Option<String>,

    /// Enable web search for this run
    #[arg(long)]
    web_search: bool,

    /// User id to chat as (overrides session and config)
    #[arg(short, long)]
    user: Option<String>,

    /// Role of the user id (teacher, student)
    #[arg(long)]
    role: Option<String>,

    /// Backend root URL
    #[arg(long)]
    base_url: Option<String>,

    /// List your conversations
    #[arg(long)]
    list: bool,

    /// Print the messages of a conversation
    #[arg(long, value_name = "ID")]
    show: Option<String>,

    /// Print usage stats of a conversation
    #[arg(long, value_name = "ID")]
    stats: Option<String>,

    /// Delete a conversation
    #[arg(long, value_name = "ID")]
    delete: Option<String>,

    /// Check backend health
    #[arg(long)]
    health: bool,

    /// Compare two embedding files (JSON array, or object with "embedding")
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    compare: Option<Vec<PathBuf>>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Store a bearer token (and --user/--role) for later runs
    #[arg(long, value_name = "TOKEN")]
    login: Option<String>,

    /// Forget the stored token
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter("knovera=debug")
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
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

    // Compare two embeddings and exit; needs no backend
    if let Some(paths) = &args.compare {
        return compare_files(paths);
    }

    let cfg = config::Config::load();
    let stored = auth::load_session();
    let context = auth::boot_context(stored.as_ref());

    let role = args
        .role
        .as_deref()
        .map(str::parse::<UserRole>)
        .transpose()?;
    let identity = match &args.user {
        Some(id) => Some(UserIdentity::new(
            id.as_str(),
            role.or(cfg.role).unwrap_or(UserRole::Teacher),
        )),
        None => context.user().or_else(|| cfg.identity()),
    };

    if let Some(token) = args.login {
        let session = auth::StoredSession {
            token,
            user_id: identity.as_ref().map(|u| u.id.clone()),
            role: identity.as_ref().map(|u| u.role),
        };
        let path = auth::save_session(&session)?;
        println!("Session saved to {}", path.display());
        return Ok(());
    }

    if args.logout {
        if auth::logout(&context)? {
            println!("Logged out.");
        } else {
            println!("No stored session.");
        }
        return Ok(());
    }

    if let Some(user) = &identity {
        context.set_user(user.clone());
    }

    let base_url = args.base_url.as_deref().unwrap_or(cfg.base_url());
    let client = ApiClient::with_connect_timeout(base_url, context.clone(), cfg.connect_timeout())?
        .with_conversation_limit(
            cfg.conversation_limit
                .unwrap_or(knovera_ai::client::DEFAULT_CONVERSATION_LIMIT),
        );
    let client = Arc::new(client);

    if args.health {
        let health = client.health().await.map_err(|e| explain(e, base_url))?;
        println!("{}", render::render_health(&health));
        return Ok(());
    }

    if let Some(id) = &args.show {
        match client.conversation(id).await {
            Ok(conversation) => {
                println!("{}\n", render::render_conversation_header(&conversation))
            }
            Err(e) => tracing::debug!("No header for conversation {}: {}", id, e),
        }
        let messages = client.messages(id).await.map_err(|e| explain(e, base_url))?;
        print!("{}", render::render_transcript(&messages));
        return Ok(());
    }

    if let Some(id) = &args.stats {
        let stats = client.stats(id).await.map_err(|e| explain(e, base_url))?;
        println!("{}", render::render_stats(&stats));
        return Ok(());
    }

    let user = identity.ok_or_else(|| {
        anyhow!(
            "No user id. Pass --user <id>, log in with --login <token> --user <id>, or set user_id in {}",
            config::Config::config_path().display()
        )
    })?;

    if args.list {
        let mut conversations = client
            .conversations(&user.id)
            .await
            .map_err(|e| explain(e, base_url))?;
        conversations.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        println!("{}", render::render_conversations(&conversations));
        return Ok(());
    }

    if let Some(id) = &args.delete {
        client
            .delete_conversation(id, &user)
            .await
            .map_err(|e| explain(e, base_url))?;
        println!("Deleted conversation {}", id);
        return Ok(());
    }

    let mut options = cfg.generate_options();
    if args.web_search {
        options.web_search = true;
    }
    let mut chat = ChatSession::new(ChatConfig { user, options }, client);

    if let Some(id) = &args.conversation {
        chat.open(id)
            .await
            .with_context(|| format!("Failed to open conversation {}", id))?;
    }

    watch_interrupts(chat.handle());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut chat, &command).await;
    }

    run_interactive(&mut chat).await
}

/// Name the backend in network failures
fn explain(err: knovera_ai::Error, base_url: &str) -> anyhow::Error {
    if err.is_transport() {
        anyhow::Error::new(err).context(format!("Request to the backend at {} failed", base_url))
    } else {
        err.into()
    }
}

fn compare_files(paths: &[PathBuf]) -> anyhow::Result<()> {
    let [a, b] = paths else {
        return Err(anyhow!("--compare takes exactly two files"));
    };
    let read = |path: &PathBuf| -> anyhow::Result<Vec<f64>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        utils::parse_embedding(&content)
            .ok_or_else(|| anyhow!("{} does not contain an embedding", path.display()))
    };
    let (a, b) = (read(a)?, read(b)?);
    let comparison = VectorComparison::compute(&a, &b);
    print!("{}", render::render_pair(&a, &b, &comparison));
    Ok(())
}

/// Ctrl-C stops a streaming reply; at the prompt it exits.
fn watch_interrupts(handle: ChatHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                handle.abort();
                handle.wait_for_idle().await;
                eprintln!("[stopped]");
            } else {
                std::process::exit(130);
            }
        }
    });
}

/// Print streamed text as it grows. Stops at the end of the exchange, or
/// once `sent` is cancelled and every buffered event has been printed.
fn spawn_printer(
    mut receiver: broadcast::Receiver<ChatEvent>,
    sent: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printed = 0;
        loop {
            let event = tokio::select! {
                biased;
                next = receiver.recv() => match next {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Printer skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = sent.cancelled() => break,
            };
            match event {
                ChatEvent::MessageUpdate { content, .. } => {
                    printed = print_suffix(&content, printed);
                }
                ChatEvent::MessageEnd { message } => {
                    print_suffix(&message.content, printed);
                    println!();
                    printed = 0;
                }
                ChatEvent::ConversationCreated { conversation_id } => {
                    eprintln!("[conversation {}]", conversation_id);
                }
                ChatEvent::Error { message } => {
                    eprintln!("\nError: {}", message);
                }
                ChatEvent::ExchangeEnd { .. } => break,
                ChatEvent::ExchangeStart { .. } => {}
            }
        }
    })
}

/// Send a prompt while printing its reply. Returns once both are done,
/// including when the session rejects the prompt without streaming.
async fn send_and_print(
    chat: &mut ChatSession,
    prompt: &str,
) -> knovera_chat::Result<GenerateResult> {
    let sent = CancellationToken::new();
    let printer = spawn_printer(chat.subscribe(), sent.clone());
    let result = chat.send(prompt).await;
    sent.cancel();
    printer.await.ok();
    result
}

/// Print the part of `text` past the first `printed` chars; returns the new count
fn print_suffix(text: &str, printed: usize) -> usize {
    let total = text.chars().count();
    if total > printed {
        let new_text: String = text.chars().skip(printed).collect();
        print!("{}", new_text);
        io::stdout().flush().ok();
    }
    total.max(printed)
}

async fn run_command(chat: &mut ChatSession, command: &str) -> anyhow::Result<()> {
    send_and_print(chat, command).await?;
    Ok(())
}

async fn run_interactive(chat: &mut ChatSession) -> anyhow::Result<()> {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let user = &chat.config().user;
        match &chat.state().conversation_id {
            Some(id) => eprintln!("knovera ({}) conversation: {}", user.id, id),
            None => eprintln!("knovera ({})", user.id),
        }
        eprintln!("Type /help for commands.");
        eprintln!();
    }

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

        if let Some(result) = commands::execute_command(input, chat) {
            if !handle_command(chat, result).await {
                break;
            }
            println!();
            continue;
        }

        // Exchange errors were already printed from the event stream
        if let Err(e @ (knovera_chat::Error::EmptyPrompt | knovera_chat::Error::Busy)) =
            send_and_print(chat, input).await
        {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    Ok(())
}

/// Apply a slash command. Returns false when the user asked to exit.
async fn handle_command(chat: &mut ChatSession, result: commands::CommandResult) -> bool {
    use commands::CommandResult;

    match result {
        CommandResult::Message(msg) => println!("{}", msg),
        CommandResult::NewConversation => {
            chat.new_conversation();
            println!("Started a new conversation.");
        }
        CommandResult::Open(id) => match chat.open(&id).await {
            Ok(()) => print!("{}", render::render_transcript(&chat.state().messages)),
            Err(e) => println!("Failed to open {}: {}", id, e),
        },
        CommandResult::List => match chat.conversations().await {
            Ok(conversations) => println!("{}", render::render_conversations(&conversations)),
            Err(e) => println!("Failed to list conversations: {}", e),
        },
        CommandResult::ToggleWebSearch => {
            let on = chat.toggle_web_search();
            println!("Web search {}", if on { "on" } else { "off" });
        }
        CommandResult::Stats => {
            chat.refresh_stats().await;
            println!(
                "{}",
                commands::SessionCommand::summary(chat.state(), chat.config())
            );
            if let Some(stats) = &chat.state().stats {
                println!("\n{}", render::render_stats(stats));
            }
        }
        CommandResult::Delete(id) => match chat.delete(&id).await {
            Ok(()) => println!("Deleted conversation {}", id),
            Err(e) => println!("Failed to delete {}: {}", id, e),
        },
        CommandResult::Exit => return false,
        CommandResult::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use knovera_ai::{
        Conversation, ConversationStats, GenerateOptions, Message, Result, UserIdentity,
    };
    use knovera_chat::ChatBackend;
    use std::time::Duration;

    /// Streams a fixed reply in two chunks
    struct EchoBackend;

    #[async_trait::async_trait]
    impl ChatBackend for EchoBackend {
        async fn send(
            &self,
            _prompt: &str,
            _conversation_id: Option<&str>,
            _user: &UserIdentity,
            _options: &GenerateOptions,
            _cancel: CancellationToken,
            on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
        ) -> Result<GenerateResult> {
            on_chunk("he");
            on_chunk("hello");
            Ok(GenerateResult {
                response: "hello".into(),
                conversation_id: "c1".into(),
                ..Default::default()
            })
        }
        async fn messages(&self, _id: &str) -> Result<Vec<Message>> {
            Ok(vec![])
        }
        async fn stats(&self, _id: &str) -> Result<ConversationStats> {
            Ok(ConversationStats::default())
        }
        async fn conversations(&self, _user_id: &str) -> Result<Vec<Conversation>> {
            Ok(vec![])
        }
        async fn delete(&self, _id: &str, _owner: &UserIdentity) -> Result<()> {
            Ok(())
        }
    }

    fn chat() -> ChatSession {
        ChatSession::new(
            ChatConfig::new(UserIdentity::teacher("t1")),
            Arc::new(EchoBackend),
        )
    }

    #[tokio::test]
    async fn test_blank_command_returns_without_streaming() {
        let mut chat = chat();
        let outcome = tokio::time::timeout(Duration::from_secs(2), run_command(&mut chat, "   "))
            .await
            .expect("run_command did not return");
        assert!(outcome.is_err());
        assert!(chat.state().messages.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_prompt_releases_printer() {
        let mut chat = chat();
        let outcome = tokio::time::timeout(Duration::from_secs(2), send_and_print(&mut chat, ""))
            .await
            .expect("send_and_print did not return");
        assert!(matches!(outcome, Err(knovera_chat::Error::EmptyPrompt)));
    }

    #[tokio::test]
    async fn test_command_streams_to_completion() {
        let mut chat = chat();
        tokio::time::timeout(Duration::from_secs(2), run_command(&mut chat, "hi"))
            .await
            .expect("run_command did not return")
            .unwrap();
        assert_eq!(chat.state().messages.len(), 2);
        assert_eq!(chat.state().messages[1].content, "hello");
        assert!(!chat.handle().is_running());
    }

    #[test]
    fn test_explain_names_backend_on_transport_failure() {
        let err = explain(
            knovera_ai::Error::Status {
                status: 502,
                body: "bad gateway".into(),
            },
            "http://localhost:3001/api/ai",
        );
        let text = format!("{:#}", err);
        assert!(text.starts_with("Request to the backend at http://localhost:3001/api/ai failed"));
        assert!(text.contains("502"));

        let err = explain(knovera_ai::Error::MissingUserId, "http://x");
        assert!(!format!("{:#}", err).contains("http://x"));
    }
}
