//! crates/pharmacheck_core/src/testing.rs
//!
//! In-memory implementations of the ports, used by this crate's unit tests and
//! (through the `testing` feature) by the api crate's router tests.
//! Each fake appends to a `CallLog` so tests can assert on call sequencing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::same_name;
use crate::domain::{
    AuthSession, CatalogItem, CatalogKind, Descriptions, DiseaseInteraction, DrugInteraction,
    FoodInteraction, InteractionKind, InteractionSet, NewSearch, Plausibility, RecordRef, Role,
    SearchHistoryEntry, Severity, User, UserCredentials,
};
use crate::ports::{
    CareTeamStore, CatalogRepository, InteractionRepository, NamePattern, ParaphraseService,
    PortError, PortResult, SearchHistoryStore, TranslationStore, UserStore,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ordered record of port calls, shareable between fakes.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: impl Into<String>) {
        lock(&self.0).push(call.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Index of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        lock(&self.0).iter().position(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.0).iter().filter(|c| c.starts_with(prefix)).count()
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Default)]
pub struct InMemoryCatalog {
    items: Mutex<Vec<CatalogItem>>,
    log: CallLog,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            items: Mutex::default(),
            log,
        }
    }

    pub fn add_drug(&self, id: i64, name: &str, generic_name: Option<&str>) {
        lock(&self.items).push(CatalogItem {
            id,
            kind: CatalogKind::Drug,
            name: name.to_string(),
            generic_name: generic_name.map(str::to_string),
            url: None,
        });
    }

    pub fn add_condition(&self, id: i64, name: &str) {
        lock(&self.items).push(CatalogItem {
            id,
            kind: CatalogKind::Condition,
            name: name.to_string(),
            generic_name: None,
            url: None,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.entries()
    }

    fn of_kind(&self, kind: CatalogKind) -> Vec<CatalogItem> {
        let mut items: Vec<_> = lock(&self.items)
            .iter()
            .filter(|i| i.kind == kind)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        items
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_exact(&self, kind: CatalogKind, name: &str) -> PortResult<Option<CatalogItem>> {
        self.log.push(format!("find_exact({}:{})", kind, name));
        Ok(self
            .of_kind(kind)
            .into_iter()
            .find(|i| same_name(&i.name, name)))
    }

    async fn find_exact_many(
        &self,
        kind: CatalogKind,
        names: &[String],
    ) -> PortResult<Vec<CatalogItem>> {
        self.log.push(format!("find_exact_many({})", kind));
        Ok(self
            .of_kind(kind)
            .into_iter()
            .filter(|i| names.iter().any(|n| same_name(&i.name, n)))
            .collect())
    }

    async fn search(
        &self,
        kind: CatalogKind,
        pattern: NamePattern<'_>,
        limit: usize,
    ) -> PortResult<Vec<CatalogItem>> {
        self.log.push(format!("search({})", kind));
        Ok(self
            .of_kind(kind)
            .into_iter()
            .filter(|i| {
                let name = i.name.to_lowercase();
                match pattern {
                    NamePattern::Prefix(p) => name.starts_with(&p.to_lowercase()),
                    NamePattern::Contains(p) => name.contains(&p.to_lowercase()),
                }
            })
            .take(limit)
            .collect())
    }

    async fn list_all(&self, kind: CatalogKind) -> PortResult<Vec<CatalogItem>> {
        self.log.push(format!("list_all({})", kind));
        Ok(self.of_kind(kind))
    }
}

//=========================================================================================
// Interactions & Translation Store
//=========================================================================================

/// Interaction records keyed by drug id. Also serves as the translation store,
/// writing AI descriptions back onto the same records.
#[derive(Default)]
pub struct InMemoryInteractions {
    sets: Mutex<HashMap<i64, InteractionSet>>,
    log: CallLog,
}

impl InMemoryInteractions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            sets: Mutex::default(),
            log,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.entries()
    }

    pub fn add_drug_interaction(
        &self,
        drug_id: i64,
        interaction_id: i64,
        counterpart: &str,
        severity: Severity,
        professional: &str,
    ) {
        lock(&self.sets)
            .entry(drug_id)
            .or_default()
            .drug_drug
            .push(DrugInteraction {
                interaction_id,
                interacting_drug_name: counterpart.to_string(),
                severity,
                descriptions: professional_only(professional),
                url: None,
            });
    }

    pub fn add_food_interaction(&self, drug_id: i64, id: i64, name: &str, severity: Severity) {
        lock(&self.sets)
            .entry(drug_id)
            .or_default()
            .food
            .push(FoodInteraction {
                food_interaction_id: id,
                drug_id,
                interaction_name: name.to_string(),
                severity,
                hazard_level: None,
                plausibility: Plausibility::Unknown,
                descriptions: professional_only(&format!("{} interacts with drug {}", name, drug_id)),
            });
    }

    pub fn add_disease_interaction(&self, drug_id: i64, id: i64, name: &str, severity: Severity) {
        lock(&self.sets)
            .entry(drug_id)
            .or_default()
            .disease
            .push(DiseaseInteraction {
                disease_interaction_id: id,
                drug_id,
                disease_name: name.to_string(),
                severity,
                hazard_level: None,
                plausibility: Plausibility::Unknown,
                applicable_conditions: None,
                descriptions: professional_only(&format!("Use with caution in {}", name)),
            });
    }

    /// Current AI description of a record, searching every drug's set.
    pub fn ai_text(&self, record: RecordRef) -> Option<String> {
        let sets = lock(&self.sets);
        sets.values()
            .find_map(|set| descriptions_in(set, record))
            .and_then(|d| d.ai_description.clone())
    }

    pub fn set_ai_text(&self, record: RecordRef, text: &str) {
        let mut sets = lock(&self.sets);
        for set in sets.values_mut() {
            if let Some(d) = descriptions_in_mut(set, record) {
                d.ai_description = Some(text.to_string());
            }
        }
    }
}

fn professional_only(text: &str) -> Descriptions {
    Descriptions {
        professional_description: text.to_string(),
        patient_description: None,
        ai_description: None,
    }
}

fn descriptions_in(set: &InteractionSet, record: RecordRef) -> Option<&Descriptions> {
    match record.kind {
        InteractionKind::DrugDrug => set
            .drug_drug
            .iter()
            .find(|i| i.interaction_id == record.id)
            .map(|i| &i.descriptions),
        InteractionKind::Food => set
            .food
            .iter()
            .find(|i| i.food_interaction_id == record.id)
            .map(|i| &i.descriptions),
        InteractionKind::Disease => set
            .disease
            .iter()
            .find(|i| i.disease_interaction_id == record.id)
            .map(|i| &i.descriptions),
    }
}

fn descriptions_in_mut(set: &mut InteractionSet, record: RecordRef) -> Option<&mut Descriptions> {
    match record.kind {
        InteractionKind::DrugDrug => set
            .drug_drug
            .iter_mut()
            .find(|i| i.interaction_id == record.id)
            .map(|i| &mut i.descriptions),
        InteractionKind::Food => set
            .food
            .iter_mut()
            .find(|i| i.food_interaction_id == record.id)
            .map(|i| &mut i.descriptions),
        InteractionKind::Disease => set
            .disease
            .iter_mut()
            .find(|i| i.disease_interaction_id == record.id)
            .map(|i| &mut i.descriptions),
    }
}

#[async_trait]
impl InteractionRepository for InMemoryInteractions {
    async fn interactions_for(&self, drug_id: i64) -> PortResult<InteractionSet> {
        self.log.push(format!("interactions_for({})", drug_id));
        Ok(lock(&self.sets).get(&drug_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TranslationStore for InMemoryInteractions {
    async fn descriptions(&self, record: RecordRef) -> PortResult<Descriptions> {
        self.log.push(format!("descriptions({})", record));
        let sets = lock(&self.sets);
        sets.values()
            .find_map(|set| descriptions_in(set, record))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("{} not found", record)))
    }

    async fn store_ai_description(&self, record: RecordRef, text: &str) -> PortResult<String> {
        self.log.push(format!("store_ai_description({})", record));
        let mut sets = lock(&self.sets);
        let mut stored = None;
        for set in sets.values_mut() {
            if let Some(d) = descriptions_in_mut(set, record) {
                if d.cached_ai().is_none() {
                    d.ai_description = Some(text.to_string());
                }
                stored = d.ai_description.clone();
            }
        }
        stored.ok_or_else(|| PortError::NotFound(format!("{} not found", record)))
    }
}

//=========================================================================================
// Paraphraser
//=========================================================================================

/// Replies with queued results (or a fixed reply once the queue is empty),
/// optionally after a delay, and counts calls.
pub struct ScriptedParaphraser {
    replies: Mutex<VecDeque<PortResult<String>>>,
    fallback: String,
    echo: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedParaphraser {
    pub fn replying(text: &str) -> Self {
        Self {
            replies: Mutex::default(),
            fallback: text.to_string(),
            echo: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Replies with the text it was given.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::replying("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a failure for the next call.
    pub fn fail_next(&self, reason: &str) {
        lock(&self.replies).push_back(Err(PortError::Unexpected(reason.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParaphraseService for ScriptedParaphraser {
    async fn paraphrase(&self, professional_text: &str) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let queued = lock(&self.replies).pop_front();
        queued.unwrap_or_else(|| {
            Ok(if self.echo {
                professional_text.to_string()
            } else {
                self.fallback.clone()
            })
        })
    }
}

//=========================================================================================
// Accounts: users, sessions, history, care team
//=========================================================================================

#[derive(Default)]
pub struct InMemoryAccounts {
    users: Mutex<Vec<(User, String)>>,
    sessions: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    history: Mutex<Vec<SearchHistoryEntry>>,
    links: Mutex<Vec<(Uuid, Uuid)>>,
    next_search_id: AtomicUsize,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user with an already-hashed password.
    pub fn add_user(&self, username: &str, role: Role, password_hash: &str) -> User {
        let user = User {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role,
            created_at: Utc::now(),
        };
        lock(&self.users).push((user.clone(), password_hash.to_string()));
        user
    }

    /// Issues a live session token for a user.
    pub fn issue_token(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().to_string();
        lock(&self.sessions).insert(token.clone(), (user_id, Utc::now() + chrono::Duration::hours(1)));
        token
    }

    /// Number of stored sessions, live or expired.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn history_of(&self, user_id: Uuid) -> Vec<SearchHistoryEntry> {
        lock(&self.history)
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect()
    }

    fn user_by(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        lock(&self.users).iter().find(|(u, _)| pred(u)).map(|(u, _)| u.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryAccounts {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User> {
        let mut users = lock(&self.users);
        if users.iter().any(|(u, _)| u.username == username) {
            return Err(PortError::Conflict("Username already exists".into()));
        }
        if users.iter().any(|(u, _)| u.email == email) {
            return Err(PortError::Conflict("Email already registered".into()));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        users.push((user.clone(), password_hash.to_string()));
        Ok(user)
    }

    async fn get_credentials(&self, login: &str) -> PortResult<UserCredentials> {
        lock(&self.users)
            .iter()
            .find(|(u, _)| u.username == login || u.email == login)
            .map(|(u, hash)| UserCredentials {
                user: u.clone(),
                password_hash: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", login)))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.user_by(|u| u.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        let mut sessions = lock(&self.sessions);
        let now = Utc::now();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        sessions.insert(session.token.clone(), (session.user_id, session.expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid> {
        match lock(&self.sessions).get(token) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        lock(&self.sessions).remove(token);
        Ok(())
    }
}

#[async_trait]
impl SearchHistoryStore for InMemoryAccounts {
    async fn append(&self, search: NewSearch) -> PortResult<SearchHistoryEntry> {
        let id = self.next_search_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let entry = SearchHistoryEntry {
            search_id: id,
            user_id: search.user_id,
            query: search.query,
            search_type: search.search_type,
            search_data: search.search_data,
            created_at: Utc::now(),
        };
        lock(&self.history).push(entry.clone());
        Ok(entry)
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> PortResult<Vec<SearchHistoryEntry>> {
        let mut entries = self.history_of(user_id);
        entries.sort_by(|a, b| b.search_id.cmp(&a.search_id));
        Ok(entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get(&self, user_id: Uuid, search_id: i64) -> PortResult<SearchHistoryEntry> {
        self.history_of(user_id)
            .into_iter()
            .find(|h| h.search_id == search_id)
            .ok_or_else(|| PortError::NotFound("Search history entry not found".into()))
    }

    async fn delete(&self, user_id: Uuid, search_id: i64) -> PortResult<()> {
        let mut history = lock(&self.history);
        let before = history.len();
        history.retain(|h| !(h.user_id == user_id && h.search_id == search_id));
        if history.len() == before {
            return Err(PortError::NotFound("Search history entry not found".into()));
        }
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> PortResult<u64> {
        let mut history = lock(&self.history);
        let before = history.len();
        history.retain(|h| h.user_id != user_id);
        Ok((before - history.len()) as u64)
    }

    async fn count(&self, user_id: Uuid) -> PortResult<i64> {
        Ok(self.history_of(user_id).len() as i64)
    }
}

#[async_trait]
impl CareTeamStore for InMemoryAccounts {
    async fn search_doctors(&self, query: &str, limit: i64) -> PortResult<Vec<User>> {
        let query = query.to_lowercase();
        Ok(lock(&self.users)
            .iter()
            .map(|(u, _)| u)
            .filter(|u| u.role == Role::Doctor && u.username.to_lowercase().contains(&query))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn all_doctors(&self) -> PortResult<Vec<User>> {
        Ok(lock(&self.users)
            .iter()
            .map(|(u, _)| u)
            .filter(|u| u.role == Role::Doctor)
            .cloned()
            .collect())
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> PortResult<User> {
        self.user_by(|u| u.user_id == doctor_id && u.role == Role::Doctor)
            .ok_or_else(|| PortError::NotFound("Doctor not found".into()))
    }

    async fn find_doctor_by_username(&self, username: &str) -> PortResult<User> {
        self.user_by(|u| u.username == username && u.role == Role::Doctor)
            .ok_or_else(|| PortError::NotFound("Doctor not found".into()))
    }

    async fn assign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()> {
        let mut links = lock(&self.links);
        if links.contains(&(doctor_id, patient_id)) {
            return Err(PortError::Conflict(
                "Patient already assigned to this doctor".into(),
            ));
        }
        links.push((doctor_id, patient_id));
        Ok(())
    }

    async fn unassign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()> {
        let mut links = lock(&self.links);
        let before = links.len();
        links.retain(|l| *l != (doctor_id, patient_id));
        if links.len() == before {
            return Err(PortError::NotFound(
                "Patient not assigned to this doctor".into(),
            ));
        }
        Ok(())
    }

    async fn patients_of(&self, doctor_id: Uuid) -> PortResult<Vec<User>> {
        let ids: Vec<Uuid> = lock(&self.links)
            .iter()
            .filter(|(d, _)| *d == doctor_id)
            .map(|(_, p)| *p)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.user_by(|u| u.user_id == id))
            .collect())
    }

    async fn doctors_of(&self, patient_id: Uuid) -> PortResult<Vec<User>> {
        let ids: Vec<Uuid> = lock(&self.links)
            .iter()
            .filter(|(_, p)| *p == patient_id)
            .map(|(d, _)| *d)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.user_by(|u| u.user_id == id))
            .collect())
    }

    async fn is_assigned(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<bool> {
        Ok(lock(&self.links).contains(&(doctor_id, patient_id)))
    }
}
