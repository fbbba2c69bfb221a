use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use arcadechat_core::config::data_dir;
use arcadechat_core::scores::DEFAULT_TOP_LIMIT;
use arcadechat_core::{
    ChatMessage, ChatRole, Config, Game, HistoryStore, Leaderboard, Session, ToolhouseClient,
};

mod app;
mod handler;
mod tui;
mod ui;
mod worker;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "arcadechat")]
#[command(version, about = "Arcade-themed terminal chat with a remote Toolhouse agent")]
struct Cli {
    /// Agent endpoint (overrides ARCADECHAT_AGENT_URL and the config file)
    #[arg(long, global = true)]
    agent_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one message and stream the reply to stdout
    Send {
        /// Message text
        message: String,
        /// Continue an existing agent run
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Manage saved chats
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show or record arcade high scores
    Scores {
        /// Only show one game (snake or pong)
        #[arg(short, long)]
        game: Option<String>,
        /// Entries per game
        #[arg(short, long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: usize,
        #[command(subcommand)]
        action: Option<ScoresAction>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved chats, newest first
    List,
    /// Print a saved chat
    Show { id: String },
    /// Delete a saved chat
    Delete { id: String },
}

#[derive(Subcommand)]
enum ScoresAction {
    /// Record a finished game
    Record { game: String, score: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{} {e}, using defaults", "Could not read config:".yellow());
        Config::new()
    });
    let agent_url = cli.agent_url.clone().unwrap_or_else(|| config.agent_url());

    let command = cli.command.unwrap_or(Commands::Chat);
    let log_file = match command {
        Commands::Chat => Some(data_dir()?.join("arcadechat.log")),
        _ => None,
    };
    init_tracing(&config.log_level(), log_file.as_deref());

    match command {
        Commands::Chat => run_chat(&config, &agent_url).await,
        Commands::Send { message, run_id } => {
            send_once(&config, &agent_url, &message, run_id.as_deref()).await
        }
        Commands::History { action } => history_command(action),
        Commands::Scores { game, limit, action } => scores_command(game.as_deref(), limit, action),
    }
}

/// Log to `log_file` when given (the chat owns the terminal), stderr otherwise.
fn init_tracing(log_level: &str, log_file: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("arcadechat={log_level},warn")));

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        // The chat owns the terminal
        None if log_file.is_some() => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init(),
    }
}

async fn run_chat(config: &Config, agent_url: &str) -> Result<()> {
    let history = HistoryStore::open_default().context("no data directory for chat history")?;
    tracing::info!(%agent_url, "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let session = Session::with_extractor(ToolhouseClient::new(agent_url), config.extractor());
    let handle = worker::spawn(session, events.sender());
    let mut app = App::new(agent_url, history, handle);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    app.save_history();
    result
}

async fn send_once(
    config: &Config,
    agent_url: &str,
    message: &str,
    run_id: Option<&str>,
) -> Result<()> {
    if message.trim().is_empty() {
        bail!("message is empty");
    }

    let mut session = Session::with_extractor(ToolhouseClient::new(agent_url), config.extractor());
    if let Some(run_id) = run_id {
        session.resume(run_id);
    }

    // Stream the reply up to the first brace; a payload there may be
    // rewritten once it parses, so the final text is reconciled below.
    let mut shown = String::new();
    let mut diverged = false;
    session
        .send(message, |msg: &ChatMessage| {
            if msg.is_user() || diverged {
                return;
            }
            let visible = msg
                .content
                .find('{')
                .map_or(msg.content.as_str(), |i| &msg.content[..i]);
            match visible.strip_prefix(shown.as_str()) {
                Some(rest) => {
                    print!("{rest}");
                    let _ = std::io::stdout().flush();
                    shown = visible.to_string();
                }
                None => diverged = true,
            }
        })
        .await;

    let Some(reply) = session.messages().last().filter(|m| !m.is_user()) else {
        return Ok(());
    };
    match reply.content.strip_prefix(shown.as_str()) {
        Some(rest) if !diverged => println!("{rest}"),
        _ if !diverged && reply.content == shown.trim_end() => println!(),
        _ => {
            if !shown.is_empty() {
                println!();
            }
            println!("{}", reply.content);
        }
    }

    if let Some(payload) = &reply.structured {
        println!(
            "\n{} {}",
            format!("[ CONNECT {} ]", payload.integration.to_uppercase())
                .magenta()
                .bold(),
            payload.url.underline()
        );
    }
    if let Some(run_id) = session.run_id() {
        eprintln!("{} {}", "run id:".dimmed(), run_id);
    }
    Ok(())
}

fn history_command(action: HistoryAction) -> Result<()> {
    let store = HistoryStore::open_default()?;
    match action {
        HistoryAction::List => {
            let sessions = store.list();
            if sessions.is_empty() {
                println!("{}", "No saved chats".dimmed());
            }
            for session in sessions {
                println!(
                    "{}  {}  {}",
                    session.id.yellow(),
                    session
                        .timestamp
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                        .dimmed(),
                    session.title.bold()
                );
            }
        }
        HistoryAction::Show { id } => {
            let messages = store.load(&id);
            if messages.is_empty() {
                bail!("no saved chat with id {id}");
            }
            for msg in messages {
                let label = match msg.role {
                    ChatRole::User => "You:".cyan().bold(),
                    ChatRole::Assistant => "AI:".yellow().bold(),
                };
                println!("{label} {}", msg.content);
                if let Some(payload) = &msg.structured {
                    println!("    {} {}", "auth link:".magenta(), payload.url);
                }
                println!();
            }
        }
        HistoryAction::Delete { id } => {
            if store.delete(&id)? {
                println!("{} {id}", "Deleted".green());
            } else {
                bail!("no saved chat with id {id}");
            }
        }
    }
    Ok(())
}

fn parse_game(name: &str) -> Result<Game> {
    Game::from_str(name).with_context(|| format!("unknown game '{name}' (expected snake or pong)"))
}

fn scores_command(game: Option<&str>, limit: usize, action: Option<ScoresAction>) -> Result<()> {
    let board = Leaderboard::open_default()?;

    if let Some(ScoresAction::Record { game, score }) = action {
        let game = parse_game(&game)?;
        if board.record(game, score)? {
            println!("{} {} {}", "Recorded".green(), game.display_name(), score);
        } else {
            println!("{}", "Score not recorded (zero scores are ignored)".dimmed());
        }
        return Ok(());
    }

    let games = match game {
        Some(name) => vec![parse_game(name)?],
        None => Game::all(),
    };
    for game in games {
        println!("{}", format!("🕹  {}", game.display_name()).bold().blue());
        let top = board.top(game, limit);
        if top.is_empty() {
            println!("   {}", "no scores yet".dimmed());
        }
        for (rank, entry) in top.iter().enumerate() {
            println!(
                "   {:>2}. {:>6}  {}",
                rank + 1,
                entry.score.to_string().yellow(),
                entry.date.with_timezone(&chrono::Local).format("%Y-%m-%d").to_string().dimmed()
            );
        }
    }
    Ok(())
}
