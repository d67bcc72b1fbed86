//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the single tutor
//! instance of this process and the services shared by all handlers.

use crate::config::Config;
use std::sync::Arc;
use tokio::sync::Mutex;
use tutor_core::{ChatOrchestrator, DocumentStorage, SyllabusStore, TutorSession};

/// The syllabus store backing the service, with its storage type erased.
pub type Store = SyllabusStore<Box<dyn DocumentStorage>>;

/// The learner's persisted syllabus plus the running chat session.
pub struct Tutor {
    pub store: Store,
    pub session: TutorSession,
}

impl Tutor {
    pub fn new(store: Store, session: TutorSession) -> Self {
        Self { store, session }
    }
}

/// The shared application state, created once at startup and passed to all handlers.
///
/// The tutor sits behind one async mutex: intents are applied one at a time
/// and a chat turn holds the lock until it commits or fails. Reads queue behind
/// an in-flight turn, so the orchestrator's provider deadline
/// (`PROVIDER_TIMEOUT_SECS`) also bounds how long they can wait.
#[derive(Clone)]
pub struct AppState {
    pub tutor: Arc<Mutex<Tutor>>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(tutor: Tutor, orchestrator: ChatOrchestrator, config: Config) -> Self {
        Self {
            tutor: Arc::new(Mutex::new(tutor)),
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        }
    }
}
