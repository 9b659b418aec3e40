pub mod aggregator;
pub mod catalog;
pub mod domain;
pub mod ports;
pub mod presentation;
pub mod translation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregator::{CheckError, DrugProfile, InteractionAggregator, InteractionQuery};
pub use catalog::{CatalogLookup, Validation};
pub use domain::{
    AuthSession, Bundle, CatalogEntry, CatalogItem, CatalogKind, DiseaseInteraction,
    DrugInteraction, FoodInteraction, InteractionKind, RecordRef, Role, SearchHistoryEntry,
    SearchType, Severity, User, UserCredentials,
};
pub use ports::{
    CareTeamStore, CatalogRepository, InteractionRepository, ParaphraseService, PortError,
    PortResult, SearchHistoryStore, TranslationStore, UserStore,
};
pub use presentation::{MedicationPicker, RenderedView, ResultsView};
pub use translation::{TranslationCache, TranslationError};
