//! A command line front end that edits conversation summaries on a chat
//! server.

#[macro_use]
extern crate tracing;

use std::error::Error as StdError;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chat_summary::Editor;
use chat_summary::core::{Services, StoreClient, ViewSession, composer};
use chat_summary::headless::{HeadlessHost, HostEvent};
use chat_summary::model::{
    CancelReason, ConversationId, Host, InputKind, InputRequest, NoticeLevel,
    OwnerRef,
};
use chat_summary_http_store::{HttpChatStore, HttpStoreConfigBuilder};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

type BoxError = Box<dyn StdError>;

const BAR_CHAR: &str = "▎";

#[derive(Parser)]
#[command(name = "chat-summary")]
#[command(about = "Edit per-conversation summaries on a SillyTavern server", long_about = None)]
struct Cli {
    /// Base URL of the chat server.
    #[arg(
        long,
        env = "CHAT_SUMMARY_BASE_URL",
        default_value = "http://127.0.0.1:8000"
    )]
    base_url: String,

    /// CSRF token sent with every request.
    #[arg(long, env = "CHAT_SUMMARY_CSRF_TOKEN")]
    csrf_token: Option<String>,

    /// User name for basic authentication.
    #[arg(long, env = "CHAT_SUMMARY_USER")]
    user: Option<String>,

    /// Password for basic authentication.
    #[arg(long, env = "CHAT_SUMMARY_PASSWORD", requires = "user")]
    password: Option<String>,

    /// Where the extension settings are kept.
    #[arg(
        long,
        env = "CHAT_SUMMARY_SETTINGS",
        default_value = "chat-summary.json"
    )]
    settings: PathBuf,

    /// Name of the character owning the conversations.
    #[arg(long, requires = "avatar", conflicts_with = "group")]
    character: Option<String>,

    /// Avatar file of the character.
    #[arg(long)]
    avatar: Option<String>,

    /// Id of the group owning the conversations.
    #[arg(long)]
    group: Option<String>,

    /// Display name of the group.
    #[arg(long, requires = "group")]
    group_name: Option<String>,

    /// The conversation treated as the open one.
    #[arg(long)]
    chat: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the conversations of the owner
    List,
    /// Print the summary of a conversation
    Show {
        /// Conversation to show instead of the open one
        id: Option<String>,
    },
    /// Replace the summary of a conversation
    Set {
        text: String,
        /// Conversation to edit instead of the open one
        #[arg(long)]
        id: Option<String>,
    },
    /// Append a paragraph to the summary of a conversation
    Append {
        text: String,
        /// Conversation to edit instead of the open one
        #[arg(long)]
        id: Option<String>,
    },
    /// Print or edit the global template
    Template {
        /// New template; prompts for it if omitted with --edit
        #[arg(long)]
        set: Option<String>,
        /// Edit the template interactively
        #[arg(long, conflicts_with = "set")]
        edit: bool,
    },
    /// Print the prompt injected for the open conversation
    Inject,
    /// Move the visible history into a new conversation
    Migrate {
        /// Name of the new conversation; prompts for it if omitted
        #[arg(long)]
        name: Option<String>,
        /// Conversation to migrate instead of the open one
        #[arg(long)]
        from: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let (owner, owner_name) = match owner(&cli) {
        Some(owner) => owner,
        None => {
            eprintln!("either --character and --avatar or --group is required");
            return;
        }
    };

    let mut config = HttpStoreConfigBuilder::with_base_url(&cli.base_url);
    if let Some(token) = &cli.csrf_token {
        config = config.with_csrf_token(token);
    }
    if let Some(user) = &cli.user {
        config = config.with_basic_auth(user, cli.password.clone());
    }
    let store = StoreClient::new(HttpChatStore::new(config.build()));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let host = Arc::new(
        HeadlessHost::new(owner, owner_name, store.clone(), event_tx)
            .with_settings_path(&cli.settings),
    );
    if let Err(err) = host.load_chat(&ConversationId::new(&cli.chat)).await {
        eprintln!("failed to open {}: {err}", cli.chat);
        return;
    }

    let mut editor = Editor::new(Services::with_store_client(
        host.clone(),
        store,
    ));
    editor.start();

    let mut ui = Ui::new(preset_answer(&cli.command));
    let command = run(&mut editor, &host, cli.command);
    tokio::pin!(command);

    let result = loop {
        let tick = sleep(Duration::from_millis(100));
        select! {
            result = &mut command => break result,
            Some(event) = event_rx.recv() => ui.handle(event).await,
            _ = tick => ui.tick(),
        }
    };

    // Notices sent right before the command finished.
    while let Ok(event) = event_rx.try_recv() {
        ui.handle(event).await;
    }
    ui.clear_spinner();

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".bright_red().bold());
        std::process::exit(1);
    }
}

fn owner(cli: &Cli) -> Option<(OwnerRef, String)> {
    if let (Some(name), Some(avatar)) = (&cli.character, &cli.avatar) {
        let owner = OwnerRef::Character {
            name: name.clone(),
            avatar: avatar.clone(),
        };
        return Some((owner, name.clone()));
    }
    let id = cli.group.clone()?;
    let name = cli.group_name.clone().unwrap_or_else(|| id.clone());
    Some((OwnerRef::Group { id }, name))
}

fn preset_answer(command: &Command) -> Option<String> {
    match command {
        Command::Template { set, .. } => set.clone(),
        Command::Migrate { name, .. } => name.clone(),
        _ => None,
    }
}

async fn run(
    editor: &mut Editor,
    host: &HeadlessHost,
    command: Command,
) -> Result<(), BoxError> {
    let result = execute(editor, host, command).await;
    // Edits to the open conversation only live in the host until now.
    let flushed = host.flush_pending().await;
    result?;
    if flushed? {
        debug!("saved the open conversation");
    }
    Ok(())
}

async fn execute(
    editor: &mut Editor,
    host: &HeadlessHost,
    command: Command,
) -> Result<(), BoxError> {
    match command {
        Command::List => {
            editor.open_view()?;
            editor.finish_prefetch().await;
            let view = editor.view().ok_or("the editor is not open")?;
            for entry in view.listing() {
                let marker = if entry.selected { ">" } else { " " };
                let name = if entry.has_summary {
                    entry.display_name.bright_white().bold().to_string()
                } else {
                    entry.display_name.dimmed().to_string()
                };
                println!("{marker} {name}");
            }
            close(editor).await
        }
        Command::Show { id } => {
            let view = editor.open_view()?;
            let id = select_chat(view, id).await?;
            let summary =
                view.get(&id).map(|record| record.summary()).unwrap_or_default();
            if summary.trim().is_empty() {
                println!("{}", "(no summary)".dimmed());
            } else {
                println!("{summary}");
            }
            close(editor).await
        }
        Command::Set { text, id } => {
            let view = editor.open_view()?;
            let id = select_chat(view, id).await?;
            view.edit_summary(&id, &text)?;
            close(editor).await
        }
        Command::Append { text, id } => {
            let view = editor.open_view()?;
            let id = select_chat(view, id).await?;
            if !view.append_summary(&id, &text)? {
                println!("{}", "Nothing to append.".dimmed());
            }
            close(editor).await
        }
        Command::Template { set, edit } => {
            if set.is_none() && !edit {
                println!("{}", host.settings().template);
                return Ok(());
            }
            let view = editor.open_view()?;
            view.edit_template().await;
            close(editor).await
        }
        Command::Inject => {
            composer::apply_active(host);
            let content =
                host.injection().map(|injection| injection.content);
            match content.filter(|content| !content.is_empty()) {
                Some(content) => println!("{content}"),
                None => println!("{}", "(nothing injected)".dimmed()),
            }
            Ok(())
        }
        Command::Migrate { from, .. } => {
            let view = editor.open_view()?;
            select_chat(view, from).await?;
            match editor.migrate().await? {
                Some(report) => {
                    println!(
                        "{} messages moved to {} ({})",
                        report.migrated_messages,
                        report.destination.bright_white().bold(),
                        report.correlation_id.dimmed()
                    );
                }
                None => println!("{}", "Migration cancelled.".dimmed()),
            }
            if editor.view().is_some() {
                close(editor).await?;
            }
            Ok(())
        }
    }
}

async fn select_chat(
    view: &mut ViewSession,
    id: Option<String>,
) -> Result<ConversationId, BoxError> {
    let id = match id {
        Some(id) => ConversationId::new(id),
        None => view.viewing().clone(),
    };
    view.select(&id).await?;
    Ok(id)
}

async fn close(editor: &mut Editor) -> Result<(), BoxError> {
    let Some(report) = editor.close_view().await else {
        return Ok(());
    };
    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} summaries were not saved", report.failed.len()).into())
    }
}

struct Ui {
    answer: Option<String>,
    style: ProgressStyle,
    spinner: Option<ProgressBar>,
    loaders: usize,
}

impl Ui {
    fn new(answer: Option<String>) -> Self {
        let style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self {
            answer,
            style,
            spinner: None,
            loaders: 0,
        }
    }

    fn tick(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.inc(1);
        }
    }

    fn clear_spinner(&mut self) {
        // Finish the spinner before printing anything else.
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn show_spinner(&mut self) {
        if self.loaders == 0 || self.spinner.is_some() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(self.style.clone());
        spinner.set_message("Working...");
        self.spinner = Some(spinner);
    }

    async fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Loader(true) => {
                self.loaders += 1;
                self.show_spinner();
            }
            HostEvent::Loader(false) => {
                self.loaders = self.loaders.saturating_sub(1);
                if self.loaders == 0 {
                    self.clear_spinner();
                }
            }
            HostEvent::Notice(notice) => {
                self.clear_spinner();
                let bar = match notice.level {
                    NoticeLevel::Info => BAR_CHAR.bright_cyan().to_string(),
                    NoticeLevel::Success => BAR_CHAR.bright_green().to_string(),
                    NoticeLevel::Warning => {
                        BAR_CHAR.bright_yellow().to_string()
                    }
                    NoticeLevel::Error => BAR_CHAR.bright_red().to_string(),
                };
                println!("{bar}{}", notice.message);
                self.show_spinner();
            }
            HostEvent::Input(request) => {
                self.clear_spinner();
                self.respond(request).await;
                self.show_spinner();
            }
        }
    }

    async fn respond(&mut self, mut request: InputRequest) {
        if let Some(answer) = self.answer.take() {
            match request.confirm(answer) {
                Ok(()) => return,
                Err(refused) => request = refused,
            }
        }

        loop {
            let prompt = match request.kind() {
                InputKind::ChatName => "Name of the new conversation",
                InputKind::Template => "Template ({{总结}} is the summary)",
            };
            let bar = BAR_CHAR.bright_yellow();
            print!("{bar}{prompt} [{}]: ", request.initial());
            std::io::stdout().flush().ok();

            let Some(line) = read_line().await else {
                request.cancel(CancelReason::Closed);
                return;
            };
            let line = line.trim_end_matches(['\r', '\n']);
            let value = if line.is_empty() {
                request.initial().to_owned()
            } else {
                line.to_owned()
            };
            match request.confirm(value) {
                Ok(()) => return,
                Err(refused) => {
                    println!("{bar}{}", "The name must not be empty.".yellow());
                    request = refused;
                }
            }
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
