use anyhow::{bail, Result};

use snapnotes_lib::notes::move_note;
use snapnotes_lib::storage::{Category, Note};

use crate::app::{index_of, App};
use crate::render::terminal::note_json;
use crate::OutputFormat;

fn report(format: &OutputFormat, action: &str, number: usize, note: &Note) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&note_json(number, note))?),
        OutputFormat::Plain => println!("{} #{} \"{}\"", action, number, note.title),
    }
    Ok(())
}

pub async fn run_add(
    app: &App,
    title: String,
    content: Option<String>,
    category: Category,
    format: &OutputFormat,
) -> Result<()> {
    let content = content.unwrap_or_default();
    if title.trim().is_empty() || content.trim().is_empty() {
        bail!("A note needs both a title and content");
    }

    let mut notes = app.notes().await?;
    notes.push(Note::new(title, content, category));
    let saved = app.session.save(notes).await?;

    let number = saved.len();
    if let Some(note) = saved.last() {
        report(format, "Added", number, note)?;
    }
    Ok(())
}

pub async fn run_edit(
    app: &App,
    number: usize,
    title: Option<String>,
    content: Option<String>,
    category: Option<Category>,
    format: &OutputFormat,
) -> Result<()> {
    if title.is_none() && content.is_none() && category.is_none() {
        bail!("Nothing to change (use --title, --content or --category)");
    }

    let mut notes = app.notes().await?;
    let index = index_of(number, notes.len())?;
    let note = &mut notes[index];
    if let Some(title) = title {
        note.title = title;
    }
    if let Some(content) = content {
        note.content = content;
    }
    if let Some(category) = category {
        note.category = category;
    }
    if note.title.trim().is_empty() || note.content.trim().is_empty() {
        bail!("A note needs both a title and content");
    }

    let saved = app.session.save(notes).await?;
    report(format, "Updated", number, &saved[index])
}

pub async fn run_rm(app: &App, number: usize, format: &OutputFormat) -> Result<()> {
    let mut notes = app.notes().await?;
    let index = index_of(number, notes.len())?;
    let removed = notes.remove(index);
    app.session.save(notes).await?;
    report(format, "Deleted", number, &removed)
}

/// Print the content so it can be piped to a clipboard tool
pub async fn run_use(app: &App, number: usize, format: &OutputFormat) -> Result<()> {
    let notes = app.notes().await?;
    let index = index_of(number, notes.len())?;
    let note = app.session.mark_used(index).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&note_json(number, &note))?),
        OutputFormat::Plain => println!("{}", note.content),
    }
    Ok(())
}

pub async fn run_move(app: &App, from: usize, to: usize, format: &OutputFormat) -> Result<()> {
    let mut notes = app.notes().await?;
    let from_index = index_of(from, notes.len())?;
    let to_index = index_of(to, notes.len())?;
    move_note(&mut notes, from_index, to_index);
    let saved = app.session.save(notes).await?;
    report(format, "Moved to", to, &saved[to_index])
}
