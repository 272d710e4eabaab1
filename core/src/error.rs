use slidesmith_gemini::GeminiError;
use thiserror::Error;

/// Top-level error for the deck pipeline.
#[derive(Error, Debug)]
pub enum SlidesmithError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Content generation errors. Surfaced to the user; the workflow returns to
/// the input step.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no generation API key configured")]
    MissingApiKey,

    #[error("Generation Error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("unparseable generation response: {source}")]
    Malformed {
        status: Option<u16>,
        #[source]
        source: serde_json::Error,
    },

    #[error("generation response carried no text")]
    EmptyResponse,

    #[error("generation request failed: {0}")]
    Transport(String),
}

impl GenerationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Upstream { status, .. } => Some(*status),
            GenerationError::Malformed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<GeminiError> for GenerationError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::MissingApiKey => GenerationError::MissingApiKey,
            GeminiError::Http { status, body } => GenerationError::Upstream {
                status,
                message: body,
            },
            GeminiError::Decode { status, source } => GenerationError::Malformed { status, source },
            GeminiError::MissingPayload(_) => GenerationError::EmptyResponse,
            GeminiError::Transport(e) => GenerationError::Transport(e.to_string()),
        }
    }
}

/// Visual lookup errors. Never surfaced: the slide simply has no image.
#[derive(Error, Debug)]
pub enum VisualResolutionError {
    #[error("no image-search API key configured")]
    MissingApiKey,

    #[error("image search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("image search http {status}")]
    Http { status: u16 },

    #[error("image search returned no results")]
    NoResults,
}

/// Narration errors. Never surfaced: narration stays idle.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("no speech API key configured")]
    MissingApiKey,

    #[error("TTS Error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("no audio data returned")]
    MissingAudio,

    #[error("speech request failed: {0}")]
    Transport(String),

    #[error("audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("audio payload of {bytes} bytes does not fit a WAV file")]
    AudioTooLarge { bytes: usize },

    #[error("unsupported sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("failed to stage audio: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GeminiError> for SpeechError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::MissingApiKey => SpeechError::MissingApiKey,
            GeminiError::Http { status, body } => SpeechError::Upstream {
                status,
                message: body,
            },
            GeminiError::MissingPayload(_) => SpeechError::MissingAudio,
            GeminiError::Decode { source, .. } => SpeechError::Transport(source.to_string()),
            GeminiError::Transport(e) => SpeechError::Transport(e.to_string()),
        }
    }
}

/// Export errors. Package-level failures abort the export; image failures
/// are reported through `ImageFetch` and handled per slide.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to write deck package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("failed to render deck part: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("I/O error while exporting: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch image {url}: {reason}")]
    ImageFetch { url: String, reason: String },

    #[error("deck has no slides")]
    EmptyDeck,
}

/// Project storage errors. Surfaced to the user; nothing is partially
/// written.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("sign in to manage saved projects")]
    NotSignedIn,

    #[error("project not found: {id}")]
    NotFound { id: String },

    #[error("project {id} belongs to another user")]
    Forbidden { id: String },

    #[error("project {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot locate a configuration directory")]
    NoConfigDir,

    #[error("failed to read settings file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse settings file: {source}")]
    ParseError {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, SlidesmithError>;
