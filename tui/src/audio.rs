//! Local playback of narration WAV files.
//!
//! The session only tracks the play/pause state; this module turns those
//! state changes into sound and reports when a clip has run out so the
//! viewer can send `Op::NarrationEnded`. Built without the `audio` feature
//! (or when no output device opens) playback is silent and the end of a
//! clip is timed from the WAV header instead.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use slidesmith_core::wav::HEADER_LEN;
use slidesmith_protocol::PlaybackState;

/// What the player must do for a narration state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Playback {
    Start(PathBuf),
    Resume,
    Pause,
    Stop,
}

/// `loaded` is the clip that is paused or playing right now, if any.
pub(crate) fn plan(state: PlaybackState, audio: Option<&Path>, loaded: Option<&Path>) -> Playback {
    match (state, audio) {
        (PlaybackState::Playing, Some(path)) if loaded == Some(path) => Playback::Resume,
        (PlaybackState::Playing, Some(path)) => Playback::Start(path.to_path_buf()),
        (PlaybackState::Paused, _) if loaded.is_some() => Playback::Pause,
        _ => Playback::Stop,
    }
}

/// Playing time of a 16-bit PCM WAV, read from its header.
pub(crate) fn wav_duration(path: &Path) -> std::io::Result<Duration> {
    let mut header = [0u8; HEADER_LEN];
    std::fs::File::open(path)?.read_exact(&mut header)?;
    let byte_rate = u32::from_le_bytes([header[28], header[29], header[30], header[31]]);
    let data_len = u32::from_le_bytes([header[40], header[41], header[42], header[43]]);
    if byte_rate == 0 {
        return Ok(Duration::ZERO);
    }
    Ok(Duration::from_secs_f64(f64::from(data_len) / f64::from(byte_rate)))
}

/// Remaining playing time, advanced only while running.
#[derive(Debug, Default)]
struct Clock {
    remaining: Duration,
    running_since: Option<Instant>,
}

impl Clock {
    fn start(&mut self, length: Duration) {
        self.remaining = length;
        self.running_since = Some(Instant::now());
    }

    fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.remaining = self.remaining.saturating_sub(since.elapsed());
        }
    }

    fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        *self = Self::default();
    }

    fn run_out(&self) -> bool {
        self.running_since
            .is_some_and(|since| since.elapsed() >= self.remaining)
    }
}

#[cfg(feature = "audio")]
mod device {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;

    use anyhow::{anyhow, Result};
    use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

    pub(super) struct Output {
        _stream: OutputStream,
        sink: Sink,
    }

    impl Output {
        pub(super) fn open() -> Result<Self> {
            let stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| anyhow!("failed to open audio output: {e}"))?;
            let sink = Sink::connect_new(stream.mixer());
            Ok(Self {
                _stream: stream,
                sink,
            })
        }

        pub(super) fn start(&self, path: &Path) -> Result<()> {
            let decoder = Decoder::new(BufReader::new(File::open(path)?))
                .map_err(|e| anyhow!("failed to decode {}: {e}", path.display()))?;
            self.sink.stop();
            self.sink.append(decoder);
            self.sink.play();
            Ok(())
        }

        pub(super) fn pause(&self) {
            self.sink.pause();
        }

        pub(super) fn resume(&self) {
            self.sink.play();
        }

        pub(super) fn stop(&self) {
            self.sink.stop();
        }

        pub(super) fn drained(&self) -> bool {
            self.sink.empty()
        }
    }
}

pub(crate) struct Player {
    loaded: Option<PathBuf>,
    clock: Clock,
    #[cfg(feature = "audio")]
    output: Option<device::Output>,
    #[cfg(feature = "audio")]
    use_device: bool,
}

impl Player {
    /// Plays through the default output device when one is available.
    #[cfg(feature = "audio")]
    pub(crate) fn new() -> Self {
        Self {
            use_device: true,
            ..Self::silent()
        }
    }

    #[cfg(not(feature = "audio"))]
    pub(crate) fn new() -> Self {
        Self::silent()
    }

    /// Never touches an output device; clips only run on the clock.
    pub(crate) fn silent() -> Self {
        Self {
            loaded: None,
            clock: Clock::default(),
            #[cfg(feature = "audio")]
            output: None,
            #[cfg(feature = "audio")]
            use_device: false,
        }
    }

    pub(crate) fn loaded(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    /// Follow a `NarrationState` event from the session.
    pub(crate) fn sync(&mut self, state: PlaybackState, audio: Option<&Path>) {
        match plan(state, audio, self.loaded()) {
            Playback::Start(path) => self.start(path),
            Playback::Resume => {
                self.clock.resume();
                #[cfg(feature = "audio")]
                if let Some(output) = &self.output {
                    output.resume();
                }
            }
            Playback::Pause => {
                self.clock.pause();
                #[cfg(feature = "audio")]
                if let Some(output) = &self.output {
                    output.pause();
                }
            }
            Playback::Stop => self.stop(),
        }
    }

    fn start(&mut self, path: PathBuf) {
        self.stop();
        let length = match wav_duration(&path) {
            Ok(length) => length,
            Err(e) => {
                tracing::warn!("cannot read narration {}: {e}", path.display());
                Duration::ZERO
            }
        };
        #[cfg(feature = "audio")]
        self.start_device(&path);
        tracing::debug!("playing {} ({length:?})", path.display());
        self.clock.start(length);
        self.loaded = Some(path);
    }

    #[cfg(feature = "audio")]
    fn start_device(&mut self, path: &Path) {
        if self.use_device && self.output.is_none() {
            match device::Output::open() {
                Ok(output) => self.output = Some(output),
                Err(e) => {
                    tracing::warn!("narration will be silent: {e}");
                    self.use_device = false;
                }
            }
        }
        if let Some(output) = &self.output {
            if let Err(e) = output.start(path) {
                tracing::warn!("{e}");
                output.stop();
            }
        }
    }

    fn stop(&mut self) {
        self.loaded = None;
        self.clock.stop();
        #[cfg(feature = "audio")]
        if let Some(output) = &self.output {
            output.stop();
        }
    }

    fn run_out(&self) -> bool {
        #[cfg(feature = "audio")]
        if let Some(output) = &self.output {
            return self.clock.running_since.is_some() && output.drained();
        }
        self.clock.run_out()
    }

    /// True once when the loaded clip has played to the end.
    pub(crate) fn take_finished(&mut self) -> bool {
        if self.loaded.is_some() && self.run_out() {
            self.stop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidesmith_core::wav::wav_header;

    /// A WAV of `millis` milliseconds of silence at 24 kHz.
    fn clip(dir: &Path, name: &str, millis: usize) -> PathBuf {
        let data_len = 48 * millis;
        let mut bytes = wav_header(data_len, 24_000).unwrap().to_vec();
        bytes.resize(HEADER_LEN + data_len, 0);
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn state_changes_map_to_playback() {
        let a = Path::new("/tmp/a.wav");
        let b = Path::new("/tmp/b.wav");
        assert_eq!(plan(PlaybackState::Playing, Some(a), None), Playback::Start(a.into()));
        assert_eq!(plan(PlaybackState::Playing, Some(a), Some(a)), Playback::Resume);
        assert_eq!(plan(PlaybackState::Playing, Some(b), Some(a)), Playback::Start(b.into()));
        assert_eq!(plan(PlaybackState::Paused, None, Some(a)), Playback::Pause);
        assert_eq!(plan(PlaybackState::Paused, None, None), Playback::Stop);
        assert_eq!(plan(PlaybackState::Loading, None, Some(a)), Playback::Stop);
        assert_eq!(plan(PlaybackState::Idle, None, Some(a)), Playback::Stop);
    }

    #[test]
    fn duration_comes_from_the_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = clip(tmp.path(), "one.wav", 250);
        assert_eq!(wav_duration(&path).unwrap(), Duration::from_millis(250));
        assert!(wav_duration(&tmp.path().join("missing.wav")).is_err());
    }

    #[test]
    fn finished_is_reported_once_after_the_clip_runs_out() {
        let tmp = tempfile::tempdir().unwrap();
        let path = clip(tmp.path(), "short.wav", 20);
        let mut player = Player::silent();

        player.sync(PlaybackState::Playing, Some(&path));
        assert_eq!(player.loaded(), Some(path.as_path()));
        std::thread::sleep(Duration::from_millis(60));
        assert!(player.take_finished());
        assert!(!player.take_finished());
        assert_eq!(player.loaded(), None);

        // Playing the same clip again starts it over.
        player.sync(PlaybackState::Playing, Some(&path));
        assert_eq!(player.loaded(), Some(path.as_path()));
    }

    #[test]
    fn paused_clips_do_not_finish() {
        let tmp = tempfile::tempdir().unwrap();
        let path = clip(tmp.path(), "paused.wav", 40);
        let mut player = Player::silent();

        player.sync(PlaybackState::Playing, Some(&path));
        player.sync(PlaybackState::Paused, None);
        std::thread::sleep(Duration::from_millis(80));
        assert!(!player.take_finished());

        player.sync(PlaybackState::Playing, Some(&path));
        std::thread::sleep(Duration::from_millis(80));
        assert!(player.take_finished());
    }

    #[test]
    fn moving_away_stops_playback() {
        let tmp = tempfile::tempdir().unwrap();
        let path = clip(tmp.path(), "idle.wav", 10);
        let mut player = Player::silent();

        player.sync(PlaybackState::Playing, Some(&path));
        player.sync(PlaybackState::Idle, None);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(player.loaded(), None);
        assert!(!player.take_finished());
    }
}
