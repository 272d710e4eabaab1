//! Terminal front end for a deck session.

mod app;
mod audio;
mod clipboard;
mod interactive;
mod preview;

pub use app::{Action, App};
pub use interactive::run_viewer;
