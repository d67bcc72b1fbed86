//! Error types for the tutor core.
//!
//! Storage, lookup and provider failures are kept as separate enums so callers
//! can tell a broken syllabus file apart from a flaky model provider.

use std::path::Path;

/// A specialized `Result` type for tutor operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Top-level error returned by the syllabus store and the chat orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Loading or persisting the syllabus document failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No chapter carries the requested title.
    #[error("Chapter not found: '{title}'")]
    ChapterNotFound { title: String },

    /// The chapter exists but has no sub-lesson with the requested title.
    #[error("Sub-lesson '{title}' not found in chapter '{chapter}'")]
    SubLessonNotFound { chapter: String, title: String },

    /// A chat turn was submitted with no text.
    #[error("Chat message must not be empty")]
    EmptyMessage,

    /// The language-model provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl TutorError {
    pub fn chapter_not_found(title: impl Into<String>) -> Self {
        Self::ChapterNotFound {
            title: title.into(),
        }
    }

    pub fn sub_lesson_not_found(chapter: impl Into<String>, title: impl Into<String>) -> Self {
        Self::SubLessonNotFound {
            chapter: chapter.into(),
            title: title.into(),
        }
    }

    /// Returns `true` for unknown chapter or sub-lesson titles.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChapterNotFound { .. } | Self::SubLessonNotFound { .. }
        )
    }
}

/// Failures of the durable document store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The syllabus resource does not exist.
    #[error("Syllabus not found: '{location}'")]
    NotFound { location: String },

    /// Reading or writing the resource failed.
    #[error("I/O error on '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The resource is not a JSON document of the expected schema.
    #[error("Malformed syllabus '{location}': {message}")]
    Malformed { location: String, message: String },

    /// The document parsed but breaks a structural rule (duplicate titles,
    /// completion flag without a timestamp, ...).
    #[error("Invalid syllabus '{location}': {message}")]
    Invalid { location: String, message: String },
}

impl StorageError {
    pub fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            location: location.into(),
            source,
        }
    }

    pub fn from_path_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                location: path.display().to_string(),
            }
        } else {
            Self::io(path.display().to_string(), source)
        }
    }
}

/// Categories of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Invalid or missing credentials.
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// The provider answered with a server-side error.
    Server,
    /// The request never got a response.
    Network,
    /// No answer within the configured deadline.
    Timeout,
    /// The response could not be interpreted (no choices, no usage, bad JSON).
    MalformedResponse,
    /// Anything else.
    Other,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A failed call to the language-model provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Provider error ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    /// Returns `true` if a later resend of the same turn may succeed.
    ///
    /// Nothing in the core retries; this is a hint for callers.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::Server
                | ProviderErrorKind::Network
                | ProviderErrorKind::Timeout
        )
    }
}
