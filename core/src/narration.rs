//! Narration: synthesized speech staged as temporary WAV files, plus the
//! playback cache the session drives.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use slidesmith_protocol::PlaybackState;

use crate::client::SpeechSynthesizer;
use crate::error::SpeechError;
use crate::wav::{pcm_to_wav, TTS_SAMPLE_RATE};

/// A playable WAV file. The file is removed when the handle drops.
#[derive(Debug)]
pub struct AudioHandle {
    path: tempfile::TempPath,
}

impl AudioHandle {
    pub fn from_wav(bytes: &[u8]) -> Result<Self, SpeechError> {
        let mut file = tempfile::Builder::new()
            .prefix("slidesmith-narration-")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the audio somewhere permanent. The handle keeps its own file.
    pub fn persist_to(&self, dest: &Path) -> Result<(), SpeechError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&self.path, dest)?;
        Ok(())
    }
}

/// Strip markdown emphasis and heading marks the model tends to leave in
/// scripts.
pub fn clean_script(script: &str) -> String {
    script.chars().filter(|c| !matches!(c, '*' | '#')).collect()
}

pub struct NarrationRequester {
    synth: Arc<dyn SpeechSynthesizer>,
}

impl NarrationRequester {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synth }
    }

    pub async fn synthesize(&self, script: &str, tone: Option<&str>) -> Result<AudioHandle, SpeechError> {
        let tone = tone.unwrap_or("professional");
        let pcm = self.synth.synthesize_pcm(&clean_script(script), tone).await?;
        let wav = pcm_to_wav(&pcm, TTS_SAMPLE_RATE)?;
        tracing::debug!(bytes = wav.len(), "narration synthesized");
        AudioHandle::from_wav(&wav)
    }
}

/// What the front end should do after a play/pause toggle.
#[derive(Debug, Clone)]
pub enum PlayAction {
    Pause,
    Resume(Arc<AudioHandle>),
    /// No cached audio: synthesize and hand the result back with `ticket`.
    Synthesize {
        ticket: u64,
        script: String,
        tone: Option<String>,
    },
    /// A synthesis is already in flight.
    Busy,
    /// The slide has no script.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Script {
    text: String,
    tone: Option<String>,
}

/// Playback state for the currently selected script. Audio is reused while
/// the script is unchanged.
#[derive(Debug)]
pub struct NarrationCache {
    script: Option<Script>,
    handle: Option<Arc<AudioHandle>>,
    state: PlaybackState,
    ticket: u64,
}

impl Default for NarrationCache {
    fn default() -> Self {
        Self {
            script: None,
            handle: None,
            state: PlaybackState::Idle,
            ticket: 0,
        }
    }
}

impl NarrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn handle(&self) -> Option<Arc<AudioHandle>> {
        self.handle.clone()
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        ticket == self.ticket
    }

    /// Select the script to narrate. Returns true when it differs from the
    /// previous one, in which case cached audio is dropped, playback stops
    /// and any in-flight synthesis becomes stale.
    pub fn set_script(&mut self, text: Option<&str>, tone: Option<&str>) -> bool {
        let next = text.map(|text| Script {
            text: text.to_string(),
            tone: tone.map(str::to_string),
        });
        if next == self.script {
            return false;
        }
        self.script = next;
        self.handle = None;
        self.state = PlaybackState::Idle;
        self.ticket += 1;
        true
    }

    pub fn toggle(&mut self) -> PlayAction {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Paused;
                PlayAction::Pause
            }
            PlaybackState::Loading => PlayAction::Busy,
            PlaybackState::Paused | PlaybackState::Idle => {
                if let Some(handle) = self.handle.clone() {
                    self.state = PlaybackState::Playing;
                    return PlayAction::Resume(handle);
                }
                let Some(script) = self.script.clone() else {
                    return PlayAction::Nothing;
                };
                self.ticket += 1;
                self.state = PlaybackState::Loading;
                PlayAction::Synthesize {
                    ticket: self.ticket,
                    script: script.text,
                    tone: script.tone,
                }
            }
        }
    }

    /// Adopt a synthesis result. Results for an outdated ticket are dropped
    /// and `None` is returned.
    pub fn complete(
        &mut self,
        ticket: u64,
        result: Result<AudioHandle, SpeechError>,
    ) -> Option<Arc<AudioHandle>> {
        if ticket != self.ticket {
            tracing::debug!(ticket, current = self.ticket, "dropping stale narration");
            return None;
        }
        match result {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.handle = Some(handle.clone());
                self.state = PlaybackState::Playing;
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("narration failed: {e}");
                self.state = PlaybackState::Idle;
                None
            }
        }
    }

    /// Playback reached the end. The audio stays cached for replay.
    pub fn finished(&mut self) {
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            self.state = PlaybackState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::Engine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSynth {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize_pcm(&self, script: &str, tone: &str) -> Result<String, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((script.to_string(), tone.to_string()));
            Ok(base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2, 3]))
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailingSynth {
        async fn synthesize_pcm(&self, _: &str, _: &str) -> Result<String, SpeechError> {
            Err(SpeechError::Upstream {
                status: 500,
                message: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn synthesize_writes_a_wav_that_is_removed_on_drop() {
        let synth = Arc::new(RecordingSynth::default());
        let requester = NarrationRequester::new(synth.clone());

        let handle = requester
            .synthesize("**Welcome** to # the deck", None)
            .await
            .unwrap();
        let bytes = std::fs::read(handle.path()).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), crate::wav::HEADER_LEN + 4);
        assert_eq!(
            synth.seen.lock().unwrap()[0],
            ("Welcome to  the deck".to_string(), "professional".to_string())
        );

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out").join("slide.wav");
        handle.persist_to(&dest).unwrap();

        let path = handle.path().to_path_buf();
        drop(handle);
        assert!(!path.exists());
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn upstream_failure_is_a_speech_error() {
        let requester = NarrationRequester::new(Arc::new(FailingSynth));
        let err = requester.synthesize("hi", Some("calm")).await.unwrap_err();
        assert!(matches!(err, SpeechError::Upstream { status: 500, .. }));
    }

    fn staged() -> AudioHandle {
        AudioHandle::from_wav(b"RIFF").unwrap()
    }

    #[test]
    fn unchanged_script_reuses_audio() {
        let mut cache = NarrationCache::new();
        assert!(cache.set_script(Some("Hello"), None));

        let PlayAction::Synthesize { ticket, script, .. } = cache.toggle() else {
            panic!("expected synthesis");
        };
        assert_eq!(script, "Hello");
        assert_eq!(cache.state(), PlaybackState::Loading);
        assert!(matches!(cache.toggle(), PlayAction::Busy));

        assert!(cache.complete(ticket, Ok(staged())).is_some());
        assert_eq!(cache.state(), PlaybackState::Playing);

        assert!(matches!(cache.toggle(), PlayAction::Pause));
        assert!(matches!(cache.toggle(), PlayAction::Resume(_)));
        cache.finished();
        assert_eq!(cache.state(), PlaybackState::Idle);

        assert!(!cache.set_script(Some("Hello"), None));
        assert!(matches!(cache.toggle(), PlayAction::Resume(_)));
    }

    #[test]
    fn changed_script_forces_new_synthesis() {
        let mut cache = NarrationCache::new();
        cache.set_script(Some("One"), None);
        let PlayAction::Synthesize { ticket, .. } = cache.toggle() else {
            panic!("expected synthesis");
        };
        cache.complete(ticket, Ok(staged()));

        assert!(cache.set_script(Some("One"), Some("excited")));
        assert!(cache.handle().is_none());
        assert_eq!(cache.state(), PlaybackState::Idle);
        assert!(matches!(cache.toggle(), PlayAction::Synthesize { .. }));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut cache = NarrationCache::new();
        cache.set_script(Some("First"), None);
        let PlayAction::Synthesize { ticket: old, .. } = cache.toggle() else {
            panic!("expected synthesis");
        };

        cache.set_script(Some("Second"), None);
        assert!(cache.complete(old, Ok(staged())).is_none());
        assert!(cache.handle().is_none());
        assert_eq!(cache.state(), PlaybackState::Idle);
    }

    #[test]
    fn failure_returns_to_idle_and_missing_script_does_nothing() {
        let mut cache = NarrationCache::new();
        assert!(matches!(cache.toggle(), PlayAction::Nothing));

        cache.set_script(Some("Text"), None);
        let PlayAction::Synthesize { ticket, .. } = cache.toggle() else {
            panic!("expected synthesis");
        };
        let failed = cache.complete(ticket, Err(SpeechError::MissingAudio));
        assert!(failed.is_none());
        assert_eq!(cache.state(), PlaybackState::Idle);
    }
}
