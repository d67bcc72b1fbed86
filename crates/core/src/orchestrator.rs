//! Chat Orchestrator
//!
//! Runs one tutoring exchange end to end:
//!
//! 1. Resolve the chapter whose ledger receives the exchange.
//! 2. Append the learner's message to the running session list.
//! 3. Ask the provider for a completion.
//! 4. On success, price the usage, append `[user, assistant, info]` to the
//!    chapter ledger in a single persisted write, and add the cost to the
//!    running total.
//!
//! A turn either commits all of step 4 or nothing: on any failure the session
//! list is rolled back to where it was before the turn, so a retry resends
//! the same message exactly once.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::{ProviderError, ProviderErrorKind, Result, TutorError};
use crate::llm_client::LLMClient;
use crate::pricing::{PricingTable, TokenUsage};
use crate::session::{ExchangeRecord, TutorSession};
use crate::storage::DocumentStorage;
use crate::store::SyllabusStore;
use crate::syllabus::{Exchange, UsageInfo};

/// The result of a committed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub response: String,
    pub usage: TokenUsage,
    /// Cost of this exchange.
    pub cost: f64,
    /// Running session cost including this exchange.
    pub total_cost: f64,
}

pub struct ChatOrchestrator {
    client: Arc<dyn LLMClient>,
    pricing: PricingTable,
    timeout: Option<Duration>,
}

impl ChatOrchestrator {
    pub fn new(client: Arc<dyn LLMClient>, pricing: PricingTable) -> Self {
        Self {
            client,
            pricing,
            timeout: None,
        }
    }

    /// Fails a provider call that has not answered within `timeout` with a
    /// [`ProviderErrorKind::Timeout`] error; the turn is rolled back.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Executes one chat turn for `chapter_title` with the session's model.
    ///
    /// # Errors
    ///
    /// * [`TutorError::EmptyMessage`] for blank input; nothing is touched.
    /// * [`TutorError::ChapterNotFound`] for an unknown chapter.
    /// * [`TutorError::Provider`] when the completion fails; the ledger and
    ///   running cost are unchanged and the user message is withdrawn from
    ///   the session list.
    /// * [`TutorError::Storage`] when the ledger write fails; same rollback.
    #[instrument(skip(self, store, session, user_text), fields(model = %session.model()))]
    pub async fn submit_turn<S: DocumentStorage>(
        &self,
        store: &mut SyllabusStore<S>,
        session: &mut TutorSession,
        user_text: &str,
        chapter_title: &str,
    ) -> Result<TurnOutcome> {
        if user_text.trim().is_empty() {
            return Err(TutorError::EmptyMessage);
        }
        store.get_chapter(chapter_title)?;

        let model = session.model();
        let checkpoint = session.messages().len();
        session.push_user(user_text);

        let request = self.client.complete(session.messages(), model.provider_model());
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::new(
                        ProviderErrorKind::Timeout,
                        format!("No response within {} ms", limit.as_millis()),
                    ))
                }),
            None => request.await,
        };
        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                session.truncate_messages(checkpoint);
                warn!(error = %e, transient = e.is_transient(), "Provider call failed; turn discarded");
                return Err(e.into());
            }
        };

        let cost = self.pricing.cost_for(model, completion.usage);
        let exchange = Exchange {
            user: user_text.to_string(),
            assistant: completion.content.clone(),
            usage: UsageInfo::new(model.provider_model(), completion.usage),
        };
        if let Err(e) = store.record_exchange(chapter_title, exchange) {
            session.truncate_messages(checkpoint);
            warn!(error = %e, "Ledger write failed; turn discarded");
            return Err(e);
        }

        session.push_assistant(&completion.content);
        session.record_exchange(ExchangeRecord {
            chapter: chapter_title.to_string(),
            model,
            total_tokens: completion.usage.total_tokens,
            cost,
        });

        info!(
            total_tokens = completion.usage.total_tokens,
            cost,
            total_cost = session.total_cost(),
            "Turn committed"
        );

        Ok(TurnOutcome {
            response: completion.content,
            usage: completion.usage,
            cost,
            total_cost: session.total_cost(),
        })
    }
}
