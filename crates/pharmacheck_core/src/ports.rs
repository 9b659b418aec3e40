//! crates/pharmacheck_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database and text-generation backends.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AuthSession, CatalogItem, CatalogKind, Descriptions, InteractionSet, NewSearch, RecordRef, Role,
    SearchHistoryEntry, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Catalog & Interaction Ports
//=========================================================================================

/// How a catalog search matches names. Matching is always case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern<'a> {
    Prefix(&'a str),
    Contains(&'a str),
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Exact, case-insensitive name match.
    async fn find_exact(&self, kind: CatalogKind, name: &str) -> PortResult<Option<CatalogItem>>;

    /// Batch form of `find_exact`; unmatched names are simply absent from the result.
    async fn find_exact_many(
        &self,
        kind: CatalogKind,
        names: &[String],
    ) -> PortResult<Vec<CatalogItem>>;

    /// Name search ordered alphabetically, capped at `limit`.
    async fn search(
        &self,
        kind: CatalogKind,
        pattern: NamePattern<'_>,
        limit: usize,
    ) -> PortResult<Vec<CatalogItem>>;

    /// The whole catalog half, for fuzzy matching.
    async fn list_all(&self, kind: CatalogKind) -> PortResult<Vec<CatalogItem>>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// All drug-drug, food and disease records associated with a drug. Read-only.
    async fn interactions_for(&self, drug_id: i64) -> PortResult<InteractionSet>;
}

//=========================================================================================
// Translation Ports
//=========================================================================================

#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// The stored descriptions of a record. `NotFound` if the record does not exist.
    async fn descriptions(&self, record: RecordRef) -> PortResult<Descriptions>;

    /// Stores `text` unless the record already has an AI description, and returns
    /// whichever text the record holds afterwards.
    async fn store_ai_description(&self, record: RecordRef, text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait ParaphraseService: Send + Sync {
    /// Rewrites clinician-oriented interaction text for patients.
    async fn paraphrase(&self, professional_text: &str) -> PortResult<String>;
}

//=========================================================================================
// Account Ports
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username or email is taken.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User>;

    /// Looks a user up by username or email.
    async fn get_credentials(&self, login: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    /// Stores a new session and drops every expired one.
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    /// Resolves a live token to its user. Expired or unknown tokens are `Unauthorized`.
    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn append(&self, search: NewSearch) -> PortResult<SearchHistoryEntry>;

    /// Newest first.
    async fn list(&self, user_id: Uuid, limit: i64, offset: i64)
        -> PortResult<Vec<SearchHistoryEntry>>;

    async fn get(&self, user_id: Uuid, search_id: i64) -> PortResult<SearchHistoryEntry>;

    async fn delete(&self, user_id: Uuid, search_id: i64) -> PortResult<()>;

    /// Returns the number of removed entries.
    async fn clear(&self, user_id: Uuid) -> PortResult<u64>;

    async fn count(&self, user_id: Uuid) -> PortResult<i64>;
}

#[async_trait]
pub trait CareTeamStore: Send + Sync {
    /// Doctors whose username contains `query`.
    async fn search_doctors(&self, query: &str, limit: i64) -> PortResult<Vec<User>>;

    async fn all_doctors(&self) -> PortResult<Vec<User>>;

    async fn find_doctor(&self, doctor_id: Uuid) -> PortResult<User>;

    async fn find_doctor_by_username(&self, username: &str) -> PortResult<User>;

    /// Fails with `Conflict` if the link already exists.
    async fn assign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()>;

    /// Fails with `NotFound` if there is no such link.
    async fn unassign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()>;

    async fn patients_of(&self, doctor_id: Uuid) -> PortResult<Vec<User>>;

    async fn doctors_of(&self, patient_id: Uuid) -> PortResult<Vec<User>>;

    async fn is_assigned(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<bool>;
}
