//! The chatssh client

mod args;
mod run;

pub use args::{Action, ChatsshArgs};
pub use run::execute;
