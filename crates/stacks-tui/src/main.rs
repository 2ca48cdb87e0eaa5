use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use stacks_core::{
    get_or_create_user_id, AskBackend, AskClient, ChatLog, ChatRole, Config, ConversationController,
    FileStore, SendOutcome, SharedStore,
};
use tracing::info;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "stacks")]
#[command(about = "Terminal chat client for the Stacks ask endpoint", version)]
struct Cli {
    /// Base URL of the backend serving POST /ask
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Directory for local storage and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the reply
    Ask {
        /// Your question
        question: String,
        /// Continue an existing conversation instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List saved conversations, or show one of them
    History {
        /// Session to show in full
        #[arg(short, long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {}", "Ignoring unreadable config".yellow(), e);
        Config::new()
    });
    let data_dir = config.resolve_data_dir(cli.data_dir.as_deref())?;
    let _log_guard = logging::init(&data_dir)?;

    let backend_url = config.resolve_backend_url(cli.backend_url.as_deref());
    let store: SharedStore = Arc::new(FileStore::new(Config::storage_path(&data_dir)));
    let backend: Arc<dyn AskBackend> = Arc::new(AskClient::new(&backend_url));
    info!(%backend_url, data_dir = %data_dir.display(), "starting");

    match cli.command {
        None => run_tui(store, backend).await,
        Some(Commands::Ask { question, session }) => {
            ask_once(store, backend, &question, session.as_deref()).await
        }
        Some(Commands::History { session }) => show_history(store, session.as_deref()),
    }
}

async fn run_tui(store: SharedStore, backend: Arc<dyn AskBackend>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(store, backend);
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask_once(
    store: SharedStore,
    backend: Arc<dyn AskBackend>,
    question: &str,
    session: Option<&str>,
) -> Result<()> {
    let user_id = get_or_create_user_id(store.as_ref());
    if !user_id.is_available() {
        return Err(anyhow!("Local storage is not accessible; cannot keep a user id"));
    }

    let mut controller =
        ConversationController::new(user_id, ChatLog::new(store), Arc::clone(&backend));
    if let Some(session_id) = session {
        controller.load_session(session_id);
    }

    match controller.send(question).await? {
        SendOutcome::Delivered { response, persisted } => {
            println!("{}", "Response:".bold().green());
            println!("{}", response);
            if !persisted {
                println!("{}", "Warning: reply could not be saved locally".yellow());
            }
        }
        SendOutcome::Failed { reason, .. } => {
            println!("{}: {}", "Failed to send message".red(), reason);
            if let Some(url) = backend.base_url() {
                println!("Make sure the backend server is running at {}", url.bold());
            }
        }
        SendOutcome::Ignored => {}
    }

    if let Some(session_id) = controller.active_session() {
        println!("\n{} {}", "Session:".dimmed(), session_id.dimmed());
    }

    Ok(())
}

fn show_history(store: SharedStore, session: Option<&str>) -> Result<()> {
    let user_id = get_or_create_user_id(store.as_ref());
    let log = ChatLog::new(store);

    if let Some(session_id) = session {
        let chats = log.session(&user_id, session_id);
        if chats.is_empty() {
            println!("{}", "No chats found for that session".red());
            return Ok(());
        }

        for msg in stacks_core::messages_from_entries(&chats) {
            match msg.role {
                ChatRole::User => println!("{}", "You:".bold().cyan()),
                ChatRole::Assistant => println!("{}", "AI:".bold().yellow()),
            }
            println!("{}\n", msg.content);
        }
        return Ok(());
    }

    let sessions = log.all_sessions(&user_id);
    if sessions.is_empty() {
        println!("{}", "No chat history yet".dimmed());
        return Ok(());
    }

    println!("\n{}", "Chat History".bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    for (i, session) in sessions.iter().enumerate() {
        let date = session
            .started_at()
            .map(|ts| ts.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "{}. {} {} ({} messages)",
            (i + 1).to_string().bold().blue(),
            session.title(app::SESSION_TITLE_CHARS).bold(),
            date.dimmed(),
            session.chats.len() * 2
        );
        println!("   {}", session.session_id.dimmed());
    }

    Ok(())
}
