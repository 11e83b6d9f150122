mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use snapnotes_lib::notes::SortOrder;
use snapnotes_lib::storage::Category;

#[derive(Parser)]
#[command(name = "snapnotes-cli", about = "Encrypted shortcut notes", version)]
struct Cli {
    /// Config file (default: <config dir>/snapnotes/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Unlock with the password (first unlock on an empty store sets it)
    Unlock {
        /// Read the password from stdin without prompting
        #[arg(long)]
        password_stdin: bool,
    },

    /// Lock the session and clear all session data
    Lock,

    /// Forget the session key
    Logout,

    /// Show session state
    Status,

    /// List notes
    List {
        /// Case-insensitive text to look for in title or content
        #[arg(long, short)]
        search: Option<String>,
        /// Only notes in this category
        #[arg(long, short)]
        category: Option<Category>,
        /// manual, alpha or last-used
        #[arg(long, default_value = "manual")]
        sort: SortOrder,
    },

    /// Add a note
    Add {
        title: String,
        /// Note text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
        #[arg(long, short, default_value = "other")]
        category: Category,
    },

    /// Change a note
    Edit {
        /// Position shown by `list`
        number: usize,
        #[arg(long)]
        title: Option<String>,
        /// New text (use "-" to read from stdin)
        #[arg(long)]
        content: Option<String>,
        #[arg(long, short)]
        category: Option<Category>,
    },

    /// Delete a note
    Rm {
        /// Position shown by `list`
        number: usize,
    },

    /// Print a note's content and mark it as used
    Use {
        /// Position shown by `list`
        number: usize,
    },

    /// Move a note to another position
    Move {
        from: usize,
        to: usize,
    },

    /// Export all notes
    Export {
        /// Write Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
        /// Output file or directory (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace all notes with a JSON export
    Import {
        file: PathBuf,
    },

    /// Erase every note and the password (asks twice)
    Reset,

    /// Interactive session
    Shell,
}

/// Read content from stdin if "-" was given
fn resolve_content(content: Option<String>) -> Option<String> {
    match content.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
            Some(buf.trim_end_matches('\n').to_string())
        }
        _ => content,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        if app::is_fatal(&err) {
            eprintln!("No secure random source is available, nothing was changed.");
            std::process::exit(2);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.config.as_deref(), cli.data_dir)?;
    let format = &cli.format;

    match cli.command {
        Command::Unlock { password_stdin } => {
            commands::session::run_unlock(&app, password_stdin, format).await?;
        }
        Command::Lock => commands::session::run_lock(&app, format)?,
        Command::Logout => commands::session::run_logout(&app, format)?,
        Command::Status => commands::session::run_status(&app, format).await?,
        Command::List { search, category, sort } => {
            commands::list::run(&app, search, category, sort, format, use_color).await?;
        }
        Command::Add { title, content, category } => {
            let content = resolve_content(content);
            commands::edit::run_add(&app, title, content, category, format).await?;
        }
        Command::Edit { number, title, content, category } => {
            let content = resolve_content(content);
            commands::edit::run_edit(&app, number, title, content, category, format).await?;
        }
        Command::Rm { number } => commands::edit::run_rm(&app, number, format).await?,
        Command::Use { number } => commands::edit::run_use(&app, number, format).await?,
        Command::Move { from, to } => commands::edit::run_move(&app, from, to, format).await?,
        Command::Export { markdown, output } => {
            commands::transfer::run_export(&app, markdown, output.as_deref()).await?;
        }
        Command::Import { file } => commands::transfer::run_import(&app, &file, format).await?,
        Command::Reset => commands::reset::run(&app).await?,
        Command::Shell => commands::shell::run(&app, use_color).await?,
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    is_terminal(1)
}

/// Check if a file descriptor is a terminal
pub(crate) fn is_terminal(fd: i32) -> bool {
    unsafe { libc_isatty(fd) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
