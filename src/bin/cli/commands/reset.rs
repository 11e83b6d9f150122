use anyhow::{bail, Result};

use crate::app::{prompt_line, App};

/// Erase everything after two separate confirmations
pub async fn run(app: &App) -> Result<()> {
    let first = app.session.begin_full_reset();
    let answer = prompt_line("This erases every note and the password. Continue? [y/N] ")?;
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        bail!("Reset cancelled");
    }

    let answer = prompt_line("This cannot be undone. Type ERASE to confirm: ")?;
    if answer.trim() != "ERASE" {
        bail!("Reset cancelled");
    }

    app.session.full_reset(first.confirm()).await?;
    println!("All notes erased. The next unlock sets a new password.");
    Ok(())
}
