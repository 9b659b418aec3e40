//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use pharmacheck_core::ports::{
    CareTeamStore, CatalogRepository, InteractionRepository, ParaphraseService,
    SearchHistoryStore, TranslationStore, UserStore,
};
use pharmacheck_core::{CatalogLookup, InteractionAggregator, TranslationCache};
use std::sync::Arc;

//=========================================================================================
// Ports (the adapters wired in at startup)
//=========================================================================================

/// Every adapter the service needs. In production most of these are the same
/// `DbAdapter`; tests plug in the in-memory fakes.
#[derive(Clone)]
pub struct Ports {
    pub catalog: Arc<dyn CatalogRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub translations: Arc<dyn TranslationStore>,
    pub paraphraser: Arc<dyn ParaphraseService>,
    pub users: Arc<dyn UserStore>,
    pub history: Arc<dyn SearchHistoryStore>,
    pub care_team: Arc<dyn CareTeamStore>,
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<CatalogLookup>,
    pub aggregator: Arc<InteractionAggregator>,
    pub translations: Arc<TranslationCache>,
    pub users: Arc<dyn UserStore>,
    pub history: Arc<dyn SearchHistoryStore>,
    pub care_team: Arc<dyn CareTeamStore>,
}

impl AppState {
    /// Builds the core services on top of the given adapters.
    pub fn new(config: Arc<Config>, ports: Ports) -> Self {
        let catalog = Arc::new(CatalogLookup::new(ports.catalog));
        let aggregator = Arc::new(
            InteractionAggregator::new(catalog.clone(), ports.interactions)
                .with_max_medications(config.max_medications),
        );
        let translations = Arc::new(
            TranslationCache::new(ports.translations, ports.paraphraser)
                .with_timeout(config.paraphrase_timeout),
        );

        Self {
            config,
            catalog,
            aggregator,
            translations,
            users: ports.users,
            history: ports.history,
            care_team: ports.care_team,
        }
    }
}
