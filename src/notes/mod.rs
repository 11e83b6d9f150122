//! Operations over the decrypted collection that need no key

pub mod ordering;
pub mod query;

pub use ordering::{move_note, touch};
pub use query::{NoteQuery, SortOrder};
