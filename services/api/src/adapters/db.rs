//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! storage ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pharmacheck_core::domain::{
    AuthSession, CatalogItem, CatalogKind, Descriptions, DiseaseInteraction, DrugInteraction,
    FoodInteraction, InteractionKind, InteractionSet, NewSearch, Plausibility, RecordRef, Role,
    SearchHistoryEntry, SearchType, Severity, User, UserCredentials,
};
use pharmacheck_core::ports::{
    CareTeamStore, CatalogRepository, InteractionRepository, NamePattern, PortError, PortResult,
    SearchHistoryStore, TranslationStore, UserStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Escapes LIKE wildcards in user input.
fn like_escape(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CatalogRecord {
    id: i64,
    name: String,
    generic_name: Option<String>,
    url: Option<String>,
}
impl CatalogRecord {
    fn to_domain(self, kind: CatalogKind) -> CatalogItem {
        CatalogItem {
            id: self.id,
            kind,
            name: self.name,
            generic_name: self.generic_name,
            url: self.url,
        }
    }
}

fn catalog_select(kind: CatalogKind) -> &'static str {
    match kind {
        CatalogKind::Drug => "SELECT drug_id AS id, name, generic_name, url FROM drugs",
        CatalogKind::Condition => {
            "SELECT condition_id AS id, name, NULL::TEXT AS generic_name, url FROM conditions"
        }
    }
}

fn descriptions(
    professional: String,
    patient: Option<String>,
    ai: Option<String>,
) -> Descriptions {
    Descriptions {
        professional_description: professional,
        patient_description: patient,
        ai_description: ai,
    }
}

fn plausibility(raw: Option<String>) -> Plausibility {
    raw.and_then(|p| p.parse().ok()).unwrap_or_default()
}

#[derive(FromRow)]
struct DrugInteractionRecord {
    interaction_id: i64,
    interacting_drug_name: String,
    severity: String,
    professional_description: String,
    patient_description: Option<String>,
    ai_description: Option<String>,
    url: Option<String>,
}
impl DrugInteractionRecord {
    fn to_domain(self) -> DrugInteraction {
        DrugInteraction {
            interaction_id: self.interaction_id,
            interacting_drug_name: self.interacting_drug_name,
            severity: self.severity.parse().unwrap_or_default(),
            descriptions: descriptions(
                self.professional_description,
                self.patient_description,
                self.ai_description,
            ),
            url: self.url,
        }
    }
}

#[derive(FromRow)]
struct FoodInteractionRecord {
    food_interaction_id: i64,
    drug_id: i64,
    interaction_name: String,
    severity: String,
    hazard_level: Option<String>,
    plausibility: Option<String>,
    professional_description: String,
    patient_description: Option<String>,
    ai_description: Option<String>,
}
impl FoodInteractionRecord {
    fn to_domain(self) -> FoodInteraction {
        FoodInteraction {
            food_interaction_id: self.food_interaction_id,
            drug_id: self.drug_id,
            interaction_name: self.interaction_name,
            severity: self.severity.parse().unwrap_or_default(),
            hazard_level: self.hazard_level,
            plausibility: plausibility(self.plausibility),
            descriptions: descriptions(
                self.professional_description,
                self.patient_description,
                self.ai_description,
            ),
        }
    }
}

#[derive(FromRow)]
struct DiseaseInteractionRecord {
    disease_interaction_id: i64,
    drug_id: i64,
    disease_name: String,
    severity: String,
    hazard_level: Option<String>,
    plausibility: Option<String>,
    applicable_conditions: Option<String>,
    professional_description: String,
    patient_description: Option<String>,
    ai_description: Option<String>,
}
impl DiseaseInteractionRecord {
    fn to_domain(self) -> DiseaseInteraction {
        DiseaseInteraction {
            disease_interaction_id: self.disease_interaction_id,
            drug_id: self.drug_id,
            disease_name: self.disease_name,
            severity: self.severity.parse::<Severity>().unwrap_or_default(),
            hazard_level: self.hazard_level,
            plausibility: plausibility(self.plausibility),
            applicable_conditions: self.applicable_conditions,
            descriptions: descriptions(
                self.professional_description,
                self.patient_description,
                self.ai_description,
            ),
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            user_id: self.user_id,
            username: self.username,
            email: self.email,
            role: self.role.parse::<Role>().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    password_hash: String,
}

#[derive(FromRow)]
struct SearchRecord {
    search_id: i64,
    user_id: Uuid,
    query: String,
    search_type: String,
    search_data: Option<String>,
    created_at: DateTime<Utc>,
}
impl SearchRecord {
    fn to_domain(self) -> PortResult<SearchHistoryEntry> {
        Ok(SearchHistoryEntry {
            search_id: self.search_id,
            user_id: self.user_id,
            query: self.query,
            search_type: self
                .search_type
                .parse::<SearchType>()
                .map_err(PortError::Unexpected)?,
            search_data: self.search_data,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "user_id, username, email, role, created_at";
const SEARCH_COLUMNS: &str = "search_id, user_id, query, search_type, search_data, created_at";

fn users(records: Vec<UserRecord>) -> PortResult<Vec<User>> {
    records.into_iter().map(UserRecord::to_domain).collect()
}

//=========================================================================================
// Catalog & Interaction Ports
//=========================================================================================

#[async_trait]
impl CatalogRepository for DbAdapter {
    async fn find_exact(&self, kind: CatalogKind, name: &str) -> PortResult<Option<CatalogItem>> {
        let sql = format!("{} WHERE lower(name) = lower($1) LIMIT 1", catalog_select(kind));
        let record = sqlx::query_as::<_, CatalogRecord>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain(kind)))
    }

    async fn find_exact_many(
        &self,
        kind: CatalogKind,
        names: &[String],
    ) -> PortResult<Vec<CatalogItem>> {
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let sql = format!("{} WHERE lower(name) = ANY($1)", catalog_select(kind));
        let records = sqlx::query_as::<_, CatalogRecord>(&sql)
            .bind(lowered)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }

    async fn search(
        &self,
        kind: CatalogKind,
        pattern: NamePattern<'_>,
        limit: usize,
    ) -> PortResult<Vec<CatalogItem>> {
        let like = match pattern {
            NamePattern::Prefix(p) => format!("{}%", like_escape(p)),
            NamePattern::Contains(p) => format!("%{}%", like_escape(p)),
        };
        let sql = format!(
            "{} WHERE name ILIKE $1 ORDER BY lower(name) LIMIT $2",
            catalog_select(kind)
        );
        let records = sqlx::query_as::<_, CatalogRecord>(&sql)
            .bind(like)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }

    async fn list_all(&self, kind: CatalogKind) -> PortResult<Vec<CatalogItem>> {
        let sql = format!("{} ORDER BY lower(name)", catalog_select(kind));
        let records = sqlx::query_as::<_, CatalogRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }
}

#[async_trait]
impl InteractionRepository for DbAdapter {
    async fn interactions_for(&self, drug_id: i64) -> PortResult<InteractionSet> {
        let drug_drug = sqlx::query_as::<_, DrugInteractionRecord>(
            "SELECT i.interaction_id, di.interacting_drug_name, i.severity, \
                    i.professional_description, i.patient_description, i.ai_description, i.url \
             FROM drug_interactions di \
             JOIN interactions i ON i.interaction_id = di.interaction_id \
             WHERE di.drug_id = $1 \
             ORDER BY i.interaction_id",
        )
        .bind(drug_id)
        .fetch_all(&self.pool);

        let food = sqlx::query_as::<_, FoodInteractionRecord>(
            "SELECT food_interaction_id, drug_id, interaction_name, severity, hazard_level, \
                    plausibility, professional_description, patient_description, ai_description \
             FROM food_interactions WHERE drug_id = $1 ORDER BY food_interaction_id",
        )
        .bind(drug_id)
        .fetch_all(&self.pool);

        let disease = sqlx::query_as::<_, DiseaseInteractionRecord>(
            "SELECT disease_interaction_id, drug_id, disease_name, severity, hazard_level, \
                    plausibility, applicable_conditions, professional_description, \
                    patient_description, ai_description \
             FROM disease_interactions WHERE drug_id = $1 ORDER BY disease_interaction_id",
        )
        .bind(drug_id)
        .fetch_all(&self.pool);

        let (drug_drug, food, disease) =
            tokio::try_join!(drug_drug, food, disease).map_err(unexpected)?;

        Ok(InteractionSet {
            drug_drug: drug_drug.into_iter().map(|r| r.to_domain()).collect(),
            food: food.into_iter().map(|r| r.to_domain()).collect(),
            disease: disease.into_iter().map(|r| r.to_domain()).collect(),
        })
    }
}

//=========================================================================================
// Translation Store
//=========================================================================================

/// Table and primary-key column holding a record kind.
fn record_table(kind: InteractionKind) -> (&'static str, &'static str) {
    match kind {
        InteractionKind::DrugDrug => ("interactions", "interaction_id"),
        InteractionKind::Food => ("food_interactions", "food_interaction_id"),
        InteractionKind::Disease => ("disease_interactions", "disease_interaction_id"),
    }
}

#[async_trait]
impl TranslationStore for DbAdapter {
    async fn descriptions(&self, record: RecordRef) -> PortResult<Descriptions> {
        let (table, id_column) = record_table(record.kind);
        let sql = format!(
            "SELECT professional_description, patient_description, ai_description \
             FROM {} WHERE {} = $1",
            table, id_column
        );
        let row = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(&sql)
            .bind(record.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match row {
            Some((professional, patient, ai)) => Ok(descriptions(professional, patient, ai)),
            None => Err(PortError::NotFound(format!("{} not found", record))),
        }
    }

    async fn store_ai_description(&self, record: RecordRef, text: &str) -> PortResult<String> {
        let (table, id_column) = record_table(record.kind);
        // First writer wins: an existing non-blank description is kept.
        let sql = format!(
            "UPDATE {table} SET \
                 ai_description = CASE \
                     WHEN ai_description IS NULL OR btrim(ai_description) = '' THEN $1 \
                     ELSE ai_description END, \
                 updated_at = now() \
             WHERE {id_column} = $2 \
             RETURNING ai_description"
        );
        let row = sqlx::query_as::<_, (Option<String>,)>(&sql)
            .bind(text)
            .bind(record.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match row {
            Some((Some(stored),)) => Ok(stored),
            Some((None,)) => Err(PortError::Unexpected(format!(
                "{} kept no AI description after update",
                record
            ))),
            None => Err(PortError::NotFound(format!("{} not found", record))),
        }
    }
}

//=========================================================================================
// Users & Auth Sessions
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (user_id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if !is_unique_violation(&e) {
                    return unexpected(e);
                }
                let email_taken = matches!(
                    &e,
                    sqlx::Error::Database(db) if db.constraint() == Some("users_email_key")
                );
                if email_taken {
                    PortError::Conflict("Email already registered".to_string())
                } else {
                    PortError::Conflict("Username already exists".to_string())
                }
            })?;
        record.to_domain()
    }

    async fn get_credentials(&self, login: &str) -> PortResult<UserCredentials> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE username = $1 OR email = $1 LIMIT 1",
            USER_COLUMNS
        );
        let record = sqlx::query_as::<_, CredentialsRecord>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", login)))?;
        Ok(UserCredentials {
            user: record.user.to_domain()?,
            password_hash: record.password_hash,
        })
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
                _ => unexpected(e),
            })?
            .to_domain()
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        // Expired sessions are purged whenever a new one is issued.
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        sqlx::query("INSERT INTO auth_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            "SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        row.map(|(user_id,)| user_id).ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// Search History
//=========================================================================================

#[async_trait]
impl SearchHistoryStore for DbAdapter {
    async fn append(&self, search: NewSearch) -> PortResult<SearchHistoryEntry> {
        let sql = format!(
            "INSERT INTO search_history (user_id, query, search_type, search_data) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            SEARCH_COLUMNS
        );
        sqlx::query_as::<_, SearchRecord>(&sql)
            .bind(search.user_id)
            .bind(search.query)
            .bind(search.search_type.as_str())
            .bind(search.search_data)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?
            .to_domain()
    }

    async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> PortResult<Vec<SearchHistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM search_history WHERE user_id = $1 \
             ORDER BY created_at DESC, search_id DESC LIMIT $2 OFFSET $3",
            SEARCH_COLUMNS
        );
        sqlx::query_as::<_, SearchRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(SearchRecord::to_domain)
            .collect()
    }

    async fn get(&self, user_id: Uuid, search_id: i64) -> PortResult<SearchHistoryEntry> {
        let sql = format!(
            "SELECT {} FROM search_history WHERE search_id = $1 AND user_id = $2",
            SEARCH_COLUMNS
        );
        sqlx::query_as::<_, SearchRecord>(&sql)
            .bind(search_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound("Search history entry not found".to_string()))?
            .to_domain()
    }

    async fn delete(&self, user_id: Uuid, search_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM search_history WHERE search_id = $1 AND user_id = $2")
            .bind(search_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Search history entry not found".to_string()));
        }
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM search_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, user_id: Uuid) -> PortResult<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM search_history WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count)
    }
}

//=========================================================================================
// Care Team
//=========================================================================================

#[async_trait]
impl CareTeamStore for DbAdapter {
    async fn search_doctors(&self, query: &str, limit: i64) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'DOCTOR' AND username ILIKE $1 \
             ORDER BY username LIMIT $2",
            USER_COLUMNS
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(format!("%{}%", like_escape(query)))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        users(records)
    }

    async fn all_doctors(&self) -> PortResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'DOCTOR' ORDER BY username",
            USER_COLUMNS
        );
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        users(records)
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> PortResult<User> {
        let sql = format!(
            "SELECT {} FROM users WHERE user_id = $1 AND role = 'DOCTOR'",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(doctor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound("Doctor not found".to_string()))?
            .to_domain()
    }

    async fn find_doctor_by_username(&self, username: &str) -> PortResult<User> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 AND role = 'DOCTOR'",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound("Doctor not found".to_string()))?
            .to_domain()
    }

    async fn assign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()> {
        sqlx::query("INSERT INTO doctor_patients (doctor_id, patient_id) VALUES ($1, $2)")
            .bind(doctor_id)
            .bind(patient_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict("Patient already assigned to this doctor".to_string())
                } else {
                    unexpected(e)
                }
            })?;
        Ok(())
    }

    async fn unassign(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<()> {
        let result =
            sqlx::query("DELETE FROM doctor_patients WHERE doctor_id = $1 AND patient_id = $2")
                .bind(doctor_id)
                .bind(patient_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Patient not assigned to this doctor".to_string()));
        }
        Ok(())
    }

    async fn patients_of(&self, doctor_id: Uuid) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.username, u.email, u.role, u.created_at \
             FROM doctor_patients dp JOIN users u ON u.user_id = dp.patient_id \
             WHERE dp.doctor_id = $1 ORDER BY dp.assigned_at",
        )
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        users(records)
    }

    async fn doctors_of(&self, patient_id: Uuid) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.username, u.email, u.role, u.created_at \
             FROM doctor_patients dp JOIN users u ON u.user_id = dp.doctor_id \
             WHERE dp.patient_id = $1 ORDER BY dp.assigned_at",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        users(records)
    }

    async fn is_assigned(&self, doctor_id: Uuid, patient_id: Uuid) -> PortResult<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM doctor_patients WHERE doctor_id = $1 AND patient_id = $2)",
        )
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(exists)
    }
}
