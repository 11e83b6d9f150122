use snapnotes_lib::storage::{Category, Note};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const GRAY: &str = "\x1b[90m";
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

fn category_color(category: Category) -> &'static str {
    match category {
        Category::Work => Color::BLUE,
        Category::Personal => Color::GREEN,
        Category::Urgent => Color::RED,
        Category::Other => Color::GRAY,
    }
}

/// First line of the content, shortened for a listing
fn preview(content: &str, max_chars: usize) -> String {
    let first = content.lines().next().unwrap_or("");
    let mut out: String = first.chars().take(max_chars).collect();
    if first.chars().count() > max_chars || content.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}

/// One listing line: `#3  Title [Work]  first line...`
pub fn note_line(number: usize, note: &Note, use_color: bool) -> String {
    let tag = format!("[{}]", note.category);
    format!(
        "{:>3}  {} {}  {}",
        paint(&format!("#{}", number), Color::DIM, use_color),
        paint(&note.title, Color::BOLD, use_color),
        paint(&tag, category_color(note.category), use_color),
        paint(&preview(&note.content, 60), Color::GRAY, use_color),
    )
}

/// Full note for `use` and the shell's `show`
pub fn note_detail(note: &Note, use_color: bool) -> String {
    let header = format!(
        "{} [{}]",
        paint(&note.title, Color::BOLD, use_color),
        paint(&note.category.to_string(), category_color(note.category), use_color)
    );
    let used = if note.last_used_at.timestamp_millis() > 0 {
        format!(
            "last used {}",
            note.last_used_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
        )
    } else {
        "never used".to_string()
    };
    format!(
        "{}\n{}\n\n{}",
        header,
        paint(&used, Color::DIM, use_color),
        note.content
    )
}

/// JSON shape used by `--format json`
pub fn note_json(number: usize, note: &Note) -> serde_json::Value {
    serde_json::json!({
        "number": number,
        "id": note.id,
        "title": note.title,
        "content": note.content,
        "category": note.category.to_string(),
        "lastUsed": note.last_used_at.to_rfc3339(),
    })
}
