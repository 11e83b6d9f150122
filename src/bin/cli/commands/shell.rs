use std::io::Write;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use zeroize::Zeroizing;

use snapnotes_lib::notes::{move_note, NoteQuery};
use snapnotes_lib::session::SessionEvent;
use snapnotes_lib::storage::{Category, Note};

use crate::app::{index_of, is_fatal, prompt_secret, App};
use crate::render::terminal::{note_detail, note_line};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
Commands:
  list [text]        list notes, optionally filtered
  show <n>           show a note
  use <n>            print a note's content and mark it used
  add                add a note
  edit <n>           edit a note
  rm <n>             delete a note
  move <from> <to>   reorder
  undo / redo        step through changes
  status             session state
  lock               lock and leave
  quit               leave, keeping the session";

const EXPIRED: &str = "Session expired after inactivity. Run `snapnotes-cli shell` to unlock again.";

enum Flow {
    Continue,
    Quit,
}

async fn read_line(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();
    Ok(input.next_line().await?)
}

/// Password from the terminal without echo, or a plain line when piped.
/// `None` on end of input.
async fn read_password(input: &mut Input) -> Result<Option<Zeroizing<String>>> {
    if crate::is_terminal(0) {
        let password = tokio::task::spawn_blocking(|| prompt_secret("Password: ")).await??;
        return Ok(Some(password));
    }
    Ok(read_line(input, "Password: ").await?.map(Zeroizing::new))
}

/// Ask for the password until it is accepted. False on end of input.
///
/// Only called before the first command line is read, so no pending stdin
/// read competes with the terminal prompt.
async fn unlock_loop(app: &App, input: &mut Input) -> Result<bool> {
    loop {
        let Some(password) = read_password(input).await? else {
            return Ok(false);
        };
        let result = app.session.unlock(&password).await?;
        if result.success {
            eprintln!("Unlocked");
            return Ok(true);
        }

        let message = result.message.unwrap_or_default();
        match result.retry_delay_ms {
            Some(ms) => eprintln!("{} (next attempt waits {}s)", message, ms / 1000),
            None => eprintln!("{}", message),
        }
    }
}

pub async fn run(app: &App, use_color: bool) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut events = app.session.subscribe();

    if !app.session.resume().await? && !unlock_loop(app, &mut input).await? {
        return Ok(());
    }
    eprintln!("Type `help` for commands.");

    loop {
        eprint!("snapnotes> ");
        std::io::stderr().flush().ok();
        let line = tokio::select! {
            line = input.next_line() => line?,
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Expired) => {
                        eprintln!("\n{}", EXPIRED);
                        break;
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };

        // The poll may not have run yet
        if app.session.check_expiry()? {
            eprintln!("{}", EXPIRED);
            break;
        }
        app.session.record_activity()?;

        match dispatch(app, &mut input, line.trim(), use_color).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    Ok(())
}

fn parse_number(arg: Option<&str>) -> Result<usize> {
    let arg = arg.context("Missing note number")?;
    arg.parse()
        .with_context(|| format!("'{}' is not a note number", arg))
}

async fn dispatch(app: &App, input: &mut Input, line: &str, use_color: bool) -> Result<Flow> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(Flow::Continue);
    };

    match command {
        "help" | "?" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Flow::Quit),
        "lock" => {
            app.session.lock()?;
            println!("Locked");
            return Ok(Flow::Quit);
        }
        "status" => {
            let status = app.session.status();
            println!(
                "{:?}, {} notes, undo {}, redo {}",
                status.state,
                status.note_count,
                if status.can_undo { "available" } else { "-" },
                if status.can_redo { "available" } else { "-" },
            );
        }
        "list" | "ls" => {
            let rest: Vec<&str> = parts.collect();
            let query = NoteQuery {
                search: (!rest.is_empty()).then(|| rest.join(" ")),
                ..Default::default()
            };
            let notes = app.session.notes()?;
            for (i, note) in query.apply(&notes) {
                println!("{}", note_line(i + 1, note, use_color));
            }
        }
        "show" => {
            let notes = app.session.notes()?;
            let index = index_of(parse_number(parts.next())?, notes.len())?;
            println!("{}", note_detail(&notes[index], use_color));
        }
        "use" => {
            let notes = app.session.notes()?;
            let index = index_of(parse_number(parts.next())?, notes.len())?;
            let note = app.session.mark_used(index).await?;
            println!("{}", note.content);
        }
        "add" => {
            let note = read_note(input, None).await?;
            let mut notes = app.session.notes()?;
            notes.push(note);
            let saved = app.session.save(notes).await?;
            println!("Added #{}", saved.len());
        }
        "edit" => {
            let mut notes = app.session.notes()?;
            let number = parse_number(parts.next())?;
            let index = index_of(number, notes.len())?;
            let edited = read_note(input, Some(&notes[index])).await?;
            notes[index] = edited;
            app.session.save(notes).await?;
            println!("Updated #{}", number);
        }
        "rm" => {
            let mut notes = app.session.notes()?;
            let number = parse_number(parts.next())?;
            let index = index_of(number, notes.len())?;
            let removed = notes.remove(index);
            app.session.save(notes).await?;
            println!("Deleted \"{}\"", removed.title);
        }
        "move" | "mv" => {
            let mut notes = app.session.notes()?;
            let from = index_of(parse_number(parts.next())?, notes.len())?;
            let to = index_of(parse_number(parts.next())?, notes.len())?;
            move_note(&mut notes, from, to);
            app.session.save(notes).await?;
            println!("Moved");
        }
        "undo" => match app.session.undo().await? {
            Some(notes) => println!("Undone ({} notes)", notes.len()),
            None => println!("Nothing to undo"),
        },
        "redo" => match app.session.redo().await? {
            Some(notes) => println!("Redone ({} notes)", notes.len()),
            None => println!("Nothing to redo"),
        },
        other => bail!("Unknown command '{}' (try `help`)", other),
    }
    Ok(Flow::Continue)
}

/// Prompt for a note's fields. Empty answers keep `existing` values.
async fn read_note(input: &mut Input, existing: Option<&Note>) -> Result<Note> {
    let hint = |value: &str| {
        if value.is_empty() {
            String::new()
        } else {
            format!(" [{}]", value)
        }
    };

    let title = read_line(input, &format!("Title{}: ", hint(existing.map_or("", |n| n.title.as_str()))))
        .await?
        .unwrap_or_default();

    eprintln!("Content (finish with an empty line):");
    let mut content_lines = Vec::new();
    while let Some(line) = input.next_line().await? {
        if line.is_empty() {
            break;
        }
        content_lines.push(line);
    }

    let current_category = existing.map(|n| n.category).unwrap_or_default();
    let category = read_line(
        input,
        &format!("Category (work/personal/urgent/other) [{}]: ", current_category),
    )
    .await?
    .unwrap_or_default();

    let mut note = existing.cloned().unwrap_or_else(|| Note::new("", "", Category::Other));
    if !title.trim().is_empty() {
        note.title = title.trim().to_string();
    }
    if !content_lines.is_empty() {
        note.content = content_lines.join("\n");
    }
    note.category = if category.trim().is_empty() {
        current_category
    } else {
        category.parse::<Category>().map_err(anyhow::Error::msg)?
    };

    if note.title.is_empty() || note.content.is_empty() {
        bail!("A note needs both a title and content");
    }
    Ok(note)
}
