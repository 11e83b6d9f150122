use anyhow::{bail, Result};

use snapnotes_lib::storage::MigrationOutcome;

use crate::app::{prompt_secret, read_secret_line, App};
use crate::OutputFormat;

pub async fn run_unlock(app: &App, password_stdin: bool, format: &OutputFormat) -> Result<()> {
    if app.session.resume().await? {
        match format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "success": true })),
            OutputFormat::Plain => println!("Already unlocked"),
        }
        return Ok(());
    }

    let password = if password_stdin {
        read_secret_line()?
    } else {
        prompt_secret("Password: ")?
    };
    let result = app.session.unlock(&password).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => {
            if result.success {
                println!("Unlocked");
                match result.migration {
                    Some(MigrationOutcome::SkippedUnreadable) => {
                        println!("  Notes from the previous version could not be read and were left in place")
                    }
                    Some(outcome) if outcome.migrated_count() > 0 => println!(
                        "  Encrypted {} notes from the previous version",
                        outcome.migrated_count()
                    ),
                    _ => {}
                }
            }
        }
    }

    if !result.success {
        let message = result.message.unwrap_or_else(|| "Unlock failed".to_string());
        match result.retry_delay_ms {
            Some(ms) => bail!("{} (next attempt waits {}s)", message, ms / 1000),
            None => bail!("{}", message),
        }
    }
    Ok(())
}

pub fn run_lock(app: &App, format: &OutputFormat) -> Result<()> {
    app.session.lock()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "locked": true })),
        OutputFormat::Plain => println!("Locked"),
    }
    Ok(())
}

pub fn run_logout(app: &App, format: &OutputFormat) -> Result<()> {
    app.session.logout()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "loggedOut": true })),
        OutputFormat::Plain => println!("Logged out"),
    }
    Ok(())
}

pub async fn run_status(app: &App, format: &OutputFormat) -> Result<()> {
    app.session.resume().await?;
    let status = app.session.status();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Plain => {
            println!("State: {:?}", status.state);
            if app.session.is_unlocked() {
                println!("  Notes: {}", status.note_count);
                if let Some(at) = status.last_active_at {
                    let remaining = app.config.session_timeout_secs as i64
                        - (chrono::Utc::now() - at).num_seconds();
                    println!("  Locks in: {}s without activity", remaining.max(0));
                }
            }
            if let Ok(dir) = app.config.data_dir() {
                println!("  Data: {}", dir.display());
            }
        }
    }
    Ok(())
}
