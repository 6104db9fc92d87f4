//! Interactive front end: operator prompts and the menu session.

pub mod prompt;
pub mod session;

pub use prompt::{Confirmation, Prompter};
pub use session::{MenuChoice, Session};
