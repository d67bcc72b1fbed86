//! Syllabus state and per-chapter tutoring conversations.
//!
//! The crate tracks a learner's progress through a syllabus of chapters and
//! sub-lessons, mediates chat turns with a language-model provider scoped to
//! one chapter at a time, and accounts the cost of every exchange.
//!
//! - [`store::SyllabusStore`] owns the persisted [`syllabus::SyllabusDocument`].
//! - [`orchestrator::ChatOrchestrator`] runs one chat turn against an
//!   [`llm_client::LLMClient`].
//! - [`session::TutorSession`] holds the unpersisted running conversation.

pub mod error;
pub mod llm_client;
pub mod orchestrator;
pub mod pricing;
pub mod session;
pub mod storage;
pub mod store;
pub mod syllabus;

pub use error::{ProviderError, ProviderErrorKind, Result, StorageError, TutorError};
pub use orchestrator::{ChatOrchestrator, TurnOutcome};
pub use pricing::{ModelTier, PricingTable, TokenUsage};
pub use session::TutorSession;
pub use storage::{DocumentStorage, FileStorage, InMemoryStorage};
pub use store::SyllabusStore;
