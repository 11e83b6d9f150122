use crate::storage::{now_millis, Note};

/// Move the note at `from` to position `to`, as a drag-and-drop would.
///
/// Dropping on a later note places the dragged one after it, dropping on an
/// earlier note places it before. Returns false when either index is out of
/// range.
pub fn move_note(notes: &mut Vec<Note>, from: usize, to: usize) -> bool {
    if from >= notes.len() || to >= notes.len() {
        return false;
    }
    if from != to {
        let note = notes.remove(from);
        notes.insert(to, note);
    }
    true
}

/// Mark the note at `index` as just used
pub fn touch(notes: &mut [Note], index: usize) -> Option<&Note> {
    let note = notes.get_mut(index)?;
    note.last_used_at = now_millis();
    Some(note)
}
