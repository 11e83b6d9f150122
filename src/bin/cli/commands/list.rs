use anyhow::Result;

use snapnotes_lib::notes::{NoteQuery, SortOrder};
use snapnotes_lib::storage::Category;

use crate::app::App;
use crate::render::terminal::{note_json, note_line};
use crate::OutputFormat;

pub async fn run(
    app: &App,
    search: Option<String>,
    category: Option<Category>,
    sort: SortOrder,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let notes = app.notes().await?;
    let query = NoteQuery {
        search,
        category,
        sort,
    };
    let hits = query.apply(&notes);

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = hits.iter().map(|(i, note)| note_json(i + 1, note)).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if hits.is_empty() {
                if notes.is_empty() {
                    println!("(no notes)");
                } else {
                    println!("(no matching notes)");
                }
            }
            for (i, note) in hits {
                println!("{}", note_line(i + 1, note, use_color));
            }
        }
    }
    Ok(())
}
