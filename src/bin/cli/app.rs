use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use zeroize::Zeroizing;

use snapnotes_lib::storage::Note;
use snapnotes_lib::{AppConfig, SessionError, SessionManager};

/// Shared application state for CLI commands
pub struct App {
    pub config: AppConfig,
    pub session: SessionManager,
}

impl App {
    /// Load config and open the store it names
    pub fn new(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => AppConfig::load_from(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => AppConfig::load().context("Failed to read config")?,
        };
        if data_dir.is_some() {
            config.data_dir = data_dir;
        }

        let session = SessionManager::open(&config).context("Failed to open note store")?;
        Ok(Self { config, session })
    }

    /// Resume the stored session or fail with a hint to unlock
    pub async fn require_unlocked(&self) -> Result<()> {
        let resumed = self
            .session
            .resume()
            .await
            .context("Failed to resume session")?;
        if !resumed {
            bail!("Notes are locked. Run `snapnotes-cli unlock` first.");
        }
        self.session.record_activity()?;
        Ok(())
    }

    /// Current notes, resuming the session first
    pub async fn notes(&self) -> Result<Vec<Note>> {
        self.require_unlocked().await?;
        Ok(self.session.notes()?)
    }
}

/// Convert a 1-based position from the command line into an index
pub fn index_of(number: usize, len: usize) -> Result<usize> {
    if number == 0 || number > len {
        bail!("No note #{} (there are {})", number, len);
    }
    Ok(number - 1)
}

/// Prompt on stderr and read one line from stdin
pub fn prompt_line(prompt: &str) -> Result<String> {
    if !prompt.is_empty() {
        eprint!("{}", prompt);
        std::io::stderr().flush().ok();
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Prompt for a password on the terminal without echo
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .context("Failed to read password")
}

/// Read a password line from stdin without prompting, for scripts
pub fn read_secret_line() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(line)
}

/// True when the error chain holds a session error nothing can retry past
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<SessionError>()
            .is_some_and(SessionError::is_fatal)
    })
}
