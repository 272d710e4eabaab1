//! Messages exchanged between a front end and the deck session.

use serde::{Deserialize, Serialize};
use slidesmith_common::{GenerationRequest, PresentationDocument};
use std::path::PathBuf;

/// Where the generation workflow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Input,
    Generating,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SessionConfigured {},
    StepChanged { step: Step },
    /// A new document replaced the previous one.
    DocumentReady { title: String, slide_count: usize },
    DocumentCleared,
    SlideShown { index: usize },
    VisualRequested { index: usize, token: u64 },
    SlideImageUpdated { index: usize, url: String },
    /// No visual could be found; the slide keeps whatever it had.
    VisualUnavailable { index: usize },
    Exported { path: PathBuf },
    Saved { id: String },
    ProjectDeleted { id: String },
    NarrationState {
        index: usize,
        state: PlaybackState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<PathBuf>,
    },
    /// Copy of the current document, in reply to `Op::Snapshot`.
    Snapshot { document: Option<PresentationDocument> },
    Notice { kind: NoticeKind, message: String },
    Error { message: String },
    ShutdownComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Op {
    Generate { request: GenerationRequest },
    ShowSlide { index: usize },
    RegenerateVisual { index: usize },
    LoadProject { id: String },
    OpenDocument { document: PresentationDocument },
    ClearProject,
    Export { out_dir: PathBuf },
    Save { name: Option<String> },
    DeleteProject { id: String },
    /// Play, pause or resume narration of a slide's script.
    ToggleNarration { index: usize },
    /// The front end finished playing the current narration.
    NarrationEnded,
    Snapshot,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub op: Op,
}

impl Submission {
    pub fn new(op: Op) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_get_unique_ids() {
        let a = Submission::new(Op::ClearProject);
        let b = Submission::new(Op::ClearProject);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn events_serialize_with_variant_tag() {
        let ev = Event::NarrationState {
            index: 2,
            state: PlaybackState::Loading,
            audio: None,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["NarrationState"]["state"], "loading");
        assert!(v["NarrationState"].get("audio").is_none());
    }
}
