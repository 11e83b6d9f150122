pub mod edit;
pub mod list;
pub mod reset;
pub mod session;
pub mod shell;
pub mod transfer;
