//! Client for the Gemini `generateContent` endpoint: deck generation and
//! speech synthesis.

pub mod client;
pub mod models;
pub mod prompt;

pub use client::{escape_stray_backslashes, GeminiClient, GeminiError};
