//! Deck generation pipeline: content generation, visual sourcing,
//! narration, export and persistence, driven by a single session.

pub mod auth;
pub mod client;
pub mod config;
pub mod deck;
pub mod error;
pub mod narration;
pub mod persistence;
pub mod session;
pub mod visual;
pub mod wav;

pub use error::{Result, SlidesmithError};
