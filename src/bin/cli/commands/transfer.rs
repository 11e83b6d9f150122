use std::path::Path;

use anyhow::{Context, Result};

use snapnotes_lib::storage::export::{self, ExportFormat};

use crate::app::App;
use crate::OutputFormat;

pub async fn run_export(app: &App, markdown: bool, output: Option<&Path>) -> Result<()> {
    let notes = app.notes().await?;
    let format = if markdown {
        ExportFormat::Markdown
    } else {
        ExportFormat::Json
    };
    let text = export::export(&notes, format)?;

    match output {
        Some(path) => {
            // A directory gets the format's default file name
            let path = if path.is_dir() {
                path.join(format.file_name())
            } else {
                path.to_path_buf()
            };
            let path = path.as_path();
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} notes to {}", notes.len(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

pub async fn run_import(app: &App, file: &Path, format: &OutputFormat) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    app.require_unlocked().await?;
    let saved = app.session.import_json(&text).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "imported": saved.len() })),
        OutputFormat::Plain => println!("Imported {} notes", saved.len()),
    }
    Ok(())
}
