//! crates/pharmacheck_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; the serde derives describe
//! the JSON shape exchanged with the browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Catalog
//=========================================================================================

/// Which half of the catalog a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Drug,
    Condition,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Drug => f.write_str("drug"),
            CatalogKind::Condition => f.write_str("condition"),
        }
    }
}

/// A drug or condition known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: CatalogKind,
    pub name: String,
    /// Only drugs carry a generic name.
    pub generic_name: Option<String>,
    pub url: Option<String>,
}

/// One autocomplete / search suggestion as sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&CatalogItem> for CatalogEntry {
    fn from(item: &CatalogItem) -> Self {
        Self {
            name: item.name.clone(),
            generic_name: item.generic_name.clone(),
            url: item.url.clone(),
        }
    }
}

//=========================================================================================
// Severity & Plausibility
//=========================================================================================

/// Categorical risk level of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    Major,
    Moderate,
    Minor,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Major => "Major",
            Severity::Moderate => "Moderate",
            Severity::Minor => "Minor",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Anything outside the four known labels is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "major" => Severity::Major,
            "moderate" => Severity::Moderate,
            "minor" => Severity::Minor,
            _ => Severity::Unknown,
        })
    }
}

/// How well-documented a food or disease interaction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Plausibility {
    High,
    Moderate,
    Low,
    #[default]
    Unknown,
}

impl Plausibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plausibility::High => "High",
            Plausibility::Moderate => "Moderate",
            Plausibility::Low => "Low",
            Plausibility::Unknown => "Unknown",
        }
    }
}

impl FromStr for Plausibility {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "high" => Plausibility::High,
            "moderate" => Plausibility::Moderate,
            "low" => Plausibility::Low,
            _ => Plausibility::Unknown,
        })
    }
}

//=========================================================================================
// Interaction Records
//=========================================================================================

/// The discriminant shared by the aggregator, the translation cache and the
/// results view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    DrugDrug,
    Food,
    Disease,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [
        InteractionKind::DrugDrug,
        InteractionKind::Food,
        InteractionKind::Disease,
    ];
}

/// Durable address of a single interaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: InteractionKind,
    pub id: i64,
}

impl RecordRef {
    pub fn new(kind: InteractionKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            InteractionKind::DrugDrug => "interaction",
            InteractionKind::Food => "food interaction",
            InteractionKind::Disease => "disease interaction",
        };
        write!(f, "{} {}", kind, self.id)
    }
}

/// The severity/description triad every interaction record carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Descriptions {
    pub professional_description: String,
    #[serde(default)]
    pub patient_description: Option<String>,
    #[serde(default)]
    pub ai_description: Option<String>,
}

impl Descriptions {
    /// The cached paraphrase, if one has been stored. Blank strings count as absent.
    pub fn cached_ai(&self) -> Option<&str> {
        non_blank(self.ai_description.as_deref())
    }

    /// Best patient-facing text: the AI paraphrase first, then the human-authored one.
    pub fn patient_text(&self) -> Option<&str> {
        self.cached_ai()
            .or_else(|| non_blank(self.patient_description.as_deref()))
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// A drug-drug interaction as listed under one of the drugs it links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub interaction_id: i64,
    /// Display name of the other drug, as recorded on the link row.
    #[serde(rename = "name")]
    pub interacting_drug_name: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub descriptions: Descriptions,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodInteraction {
    pub food_interaction_id: i64,
    pub drug_id: i64,
    pub interaction_name: String,
    pub severity: Severity,
    #[serde(default)]
    pub hazard_level: Option<String>,
    #[serde(default)]
    pub plausibility: Plausibility,
    #[serde(flatten)]
    pub descriptions: Descriptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseInteraction {
    pub disease_interaction_id: i64,
    pub drug_id: i64,
    pub disease_name: String,
    pub severity: Severity,
    #[serde(default)]
    pub hazard_level: Option<String>,
    #[serde(default)]
    pub plausibility: Plausibility,
    /// Free-text list of the conditions this warning applies to.
    #[serde(default)]
    pub applicable_conditions: Option<String>,
    #[serde(flatten)]
    pub descriptions: Descriptions,
}

/// Everything the repository knows about one drug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionSet {
    pub drug_drug: Vec<DrugInteraction>,
    pub food: Vec<FoodInteraction>,
    pub disease: Vec<DiseaseInteraction>,
}

//=========================================================================================
// Bundle
//=========================================================================================

/// A drug-drug interaction between two of the checked drugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugPairEntry {
    #[serde(flatten)]
    pub interaction: DrugInteraction,
    /// `"A ↔ B"` label for the pair.
    pub drug: String,
    pub drugs_involved: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodEntry {
    #[serde(flatten)]
    pub interaction: FoodInteraction,
    /// Canonical name of the drug this row was listed under.
    pub drug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    #[serde(flatten)]
    pub interaction: DiseaseInteraction,
    pub drug: String,
}

/// The aggregate result of one interaction check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Bundle {
    pub interactions: Vec<DrugPairEntry>,
    pub food_interactions: Vec<FoodEntry>,
    pub disease_interactions: Vec<DiseaseEntry>,
    /// Canonical names of the current medications.
    pub drugs: Vec<String>,
    #[serde(default)]
    pub prescribed_drug: String,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A borrowed view of one bundle entry, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum EntryRef<'a> {
    DrugDrug(&'a DrugPairEntry),
    Food(&'a FoodEntry),
    Disease(&'a DiseaseEntry),
}

impl<'a> EntryRef<'a> {
    pub fn kind(&self) -> InteractionKind {
        match self {
            EntryRef::DrugDrug(_) => InteractionKind::DrugDrug,
            EntryRef::Food(_) => InteractionKind::Food,
            EntryRef::Disease(_) => InteractionKind::Disease,
        }
    }

    pub fn record(&self) -> RecordRef {
        match self {
            EntryRef::DrugDrug(e) => RecordRef::new(self.kind(), e.interaction.interaction_id),
            EntryRef::Food(e) => RecordRef::new(self.kind(), e.interaction.food_interaction_id),
            EntryRef::Disease(e) => {
                RecordRef::new(self.kind(), e.interaction.disease_interaction_id)
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EntryRef::DrugDrug(e) => e.interaction.severity,
            EntryRef::Food(e) => e.interaction.severity,
            EntryRef::Disease(e) => e.interaction.severity,
        }
    }

    pub fn descriptions(&self) -> &'a Descriptions {
        match self {
            EntryRef::DrugDrug(e) => &e.interaction.descriptions,
            EntryRef::Food(e) => &e.interaction.descriptions,
            EntryRef::Disease(e) => &e.interaction.descriptions,
        }
    }

    /// Card heading: the pair, the food, or the disease.
    pub fn title(&self) -> &'a str {
        match self {
            EntryRef::DrugDrug(e) => &e.drug,
            EntryRef::Food(e) => &e.interaction.interaction_name,
            EntryRef::Disease(e) => &e.interaction.disease_name,
        }
    }

    /// Label of the source drug (or pair) the entry was listed under.
    pub fn source(&self) -> &'a str {
        match self {
            EntryRef::DrugDrug(e) => &e.drug,
            EntryRef::Food(e) => &e.drug,
            EntryRef::Disease(e) => &e.drug,
        }
    }
}

impl Bundle {
    pub fn len(&self, kind: InteractionKind) -> usize {
        match kind {
            InteractionKind::DrugDrug => self.interactions.len(),
            InteractionKind::Food => self.food_interactions.len(),
            InteractionKind::Disease => self.disease_interactions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        InteractionKind::ALL.iter().all(|k| self.len(*k) == 0)
    }

    pub fn entry(&self, kind: InteractionKind, index: usize) -> Option<EntryRef<'_>> {
        match kind {
            InteractionKind::DrugDrug => self.interactions.get(index).map(EntryRef::DrugDrug),
            InteractionKind::Food => self.food_interactions.get(index).map(EntryRef::Food),
            InteractionKind::Disease => self.disease_interactions.get(index).map(EntryRef::Disease),
        }
    }

    /// Entries of one kind, in insertion order.
    pub fn entries(&self, kind: InteractionKind) -> Vec<EntryRef<'_>> {
        (0..self.len(kind)).filter_map(|i| self.entry(kind, i)).collect()
    }

    pub fn descriptions_mut(
        &mut self,
        kind: InteractionKind,
        index: usize,
    ) -> Option<&mut Descriptions> {
        match kind {
            InteractionKind::DrugDrug => self
                .interactions
                .get_mut(index)
                .map(|e| &mut e.interaction.descriptions),
            InteractionKind::Food => self
                .food_interactions
                .get_mut(index)
                .map(|e| &mut e.interaction.descriptions),
            InteractionKind::Disease => self
                .disease_interactions
                .get_mut(index)
                .map(|e| &mut e.interaction.descriptions),
        }
    }
}

//=========================================================================================
// Users, Search History, Care Team
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PATIENT" => Ok(Role::Patient),
            "DOCTOR" => Ok(Role::Doctor),
            other => Err(format!("Invalid role '{}'. Must be PATIENT or DOCTOR", other)),
        }
    }
}

/// Represents a user - used throughout the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

// Represents an issued bearer token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    Drug,
    Condition,
    Interaction,
    FoodInteraction,
    DiseaseInteraction,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Drug => "DRUG",
            SearchType::Condition => "CONDITION",
            SearchType::Interaction => "INTERACTION",
            SearchType::FoodInteraction => "FOOD_INTERACTION",
            SearchType::DiseaseInteraction => "DISEASE_INTERACTION",
        }
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRUG" => Ok(SearchType::Drug),
            "CONDITION" => Ok(SearchType::Condition),
            "INTERACTION" => Ok(SearchType::Interaction),
            "FOOD_INTERACTION" => Ok(SearchType::FoodInteraction),
            "DISEASE_INTERACTION" => Ok(SearchType::DiseaseInteraction),
            other => Err(format!("unknown search type '{}'", other)),
        }
    }
}

/// Append-only record of one query a user ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub search_id: i64,
    pub user_id: Uuid,
    pub query: String,
    pub search_type: SearchType,
    /// Serialized result snapshot, if one was kept.
    pub search_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSearch {
    pub user_id: Uuid,
    pub query: String,
    pub search_type: SearchType,
    pub search_data: Option<String>,
}
