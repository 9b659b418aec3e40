//! crates/pharmacheck_core/src/translation.rs
//!
//! Translation Cache: on-demand patient-friendly paraphrases of professional
//! interaction descriptions, computed at most once per record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::domain::{Descriptions, RecordRef};
use crate::ports::{ParaphraseService, PortError, TranslationStore};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("No description provided")]
    EmptyDescription,
    #[error("Failed to translate description: {0}")]
    Failed(String),
    #[error("Translation timed out after {0} seconds")]
    TimedOut(u64),
    #[error("{0} not found")]
    RecordNotFound(RecordRef),
    #[error("Description does not match the stored text of {0}")]
    DescriptionMismatch(RecordRef),
    #[error(transparent)]
    Port(PortError),
}

pub struct TranslationCache {
    store: Arc<dyn TranslationStore>,
    paraphraser: Arc<dyn ParaphraseService>,
    timeout: Duration,
    // One lock per record with a paraphrase in flight.
    in_flight: Mutex<HashMap<RecordRef, Arc<tokio::sync::Mutex<()>>>>,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn TranslationStore>, paraphraser: Arc<dyn ParaphraseService>) -> Self {
        Self {
            store,
            paraphraser,
            timeout: DEFAULT_TIMEOUT,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the patient-friendly text for `professional_text`.
    ///
    /// With a record address, `professional_text` must match the record's stored
    /// professional description; the stored paraphrase is returned when present,
    /// otherwise one is generated from the stored text and persisted. Concurrent
    /// requests for the same record share a single paraphrase call. Without an
    /// address the text is paraphrased and nothing is stored.
    #[instrument(skip(self, professional_text))]
    pub async fn translate(
        &self,
        record: Option<RecordRef>,
        professional_text: &str,
    ) -> Result<String, TranslationError> {
        let text = professional_text.trim();
        if text.is_empty() {
            return Err(TranslationError::EmptyDescription);
        }

        let Some(record) = record else {
            return self.paraphrase(text).await;
        };

        let stored = self.stored(record).await?;
        if !same_text(&stored.professional_description, text) {
            warn!(%record, "translation requested for text that differs from the record");
            return Err(TranslationError::DescriptionMismatch(record));
        }
        if let Some(cached) = stored.cached_ai() {
            return Ok(cached.to_string());
        }

        let gate = self.gate_for(record);
        let result = {
            let _guard = gate.lock().await;
            // Another request may have stored it while we waited.
            match self.stored(record).await {
                Ok(stored) => match stored.cached_ai() {
                    Some(cached) => Ok(cached.to_string()),
                    None => self.paraphrase_and_store(record, &stored).await,
                },
                Err(e) => Err(e),
            }
        };
        self.release_gate(record, gate);

        if result.is_ok() {
            info!(%record, "stored patient-friendly description");
        }
        result
    }

    async fn stored(&self, record: RecordRef) -> Result<Descriptions, TranslationError> {
        self.store
            .descriptions(record)
            .await
            .map_err(|e| map_port(record, e))
    }

    /// Paraphrases the record's own professional text and persists the result.
    async fn paraphrase_and_store(
        &self,
        record: RecordRef,
        stored: &Descriptions,
    ) -> Result<String, TranslationError> {
        let source = stored.professional_description.trim();
        if source.is_empty() {
            return Err(TranslationError::EmptyDescription);
        }
        let fresh = self.paraphrase(source).await?;
        self.store
            .store_ai_description(record, &fresh)
            .await
            .map_err(|e| map_port(record, e))
    }

    async fn paraphrase(&self, text: &str) -> Result<String, TranslationError> {
        let reply = tokio::time::timeout(self.timeout, self.paraphraser.paraphrase(text))
            .await
            .map_err(|_| {
                error!(timeout_secs = self.timeout.as_secs(), "paraphrase timed out");
                TranslationError::TimedOut(self.timeout.as_secs())
            })?
            .map_err(|e| {
                error!(error = %e, "paraphrase failed");
                TranslationError::Failed(e.to_string())
            })?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(TranslationError::Failed("empty response".into()));
        }
        Ok(reply.to_string())
    }

    fn gate_for(&self, record: RecordRef) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        in_flight.entry(record).or_default().clone()
    }

    fn release_gate(&self, record: RecordRef, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        // The map and this caller hold the only references.
        if Arc::strong_count(&gate) == 2 {
            in_flight.remove(&record);
        }
    }

    #[cfg(test)]
    fn gates(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

/// Equality up to whitespace runs and surrounding blanks.
fn same_text(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

fn map_port(record: RecordRef, err: PortError) -> TranslationError {
    match err {
        PortError::NotFound(_) => TranslationError::RecordNotFound(record),
        other => TranslationError::Port(other),
    }
}
