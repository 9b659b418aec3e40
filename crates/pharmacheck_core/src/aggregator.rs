//! crates/pharmacheck_core/src/aggregator.rs
//!
//! Interaction Aggregator: validates every user-supplied term against the
//! catalog, fetches the interaction sets of the selected drugs and merges them
//! into one `Bundle`.
//!
//! Validation is fail-fast and strictly ordered (prescribed drug, condition,
//! current medications); no interaction is fetched until all three pass.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{info, warn};

use crate::catalog::{self, CatalogLookup};
use crate::domain::{
    Bundle, CatalogItem, CatalogKind, DiseaseEntry, DrugPairEntry, FoodEntry, InteractionSet,
};
use crate::ports::{InteractionRepository, PortError};

pub const DEFAULT_MAX_MEDICATIONS: usize = 5;

/// The user's input for one interaction check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionQuery {
    pub prescribed_drug: String,
    pub current_medications: Vec<String>,
    /// Validated when present.
    pub treated_condition: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Drug not found: {0}")]
    DrugNotFound(String),
    #[error("Condition not found: {0}")]
    ConditionNotFound(String),
    #[error("Medications not found: {}", .0.join(", "))]
    MedicationsNotFound(Vec<String>),
    #[error("Maximum {max} medications allowed, got {count}")]
    TooManyMedications { count: usize, max: usize },
    #[error("At least one current medication is required")]
    NoMedications,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Every record stored for one drug, resolved from a free-text name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugProfile {
    pub drug: CatalogItem,
    pub interactions: InteractionSet,
}

pub struct InteractionAggregator {
    catalog: Arc<CatalogLookup>,
    interactions: Arc<dyn InteractionRepository>,
    max_medications: usize,
}

impl InteractionAggregator {
    pub fn new(catalog: Arc<CatalogLookup>, interactions: Arc<dyn InteractionRepository>) -> Self {
        Self {
            catalog,
            interactions,
            max_medications: DEFAULT_MAX_MEDICATIONS,
        }
    }

    pub fn with_max_medications(mut self, max: usize) -> Self {
        self.max_medications = max;
        self
    }

    pub fn max_medications(&self) -> usize {
        self.max_medications
    }

    pub async fn check_interactions(&self, query: &InteractionQuery) -> Result<Bundle, CheckError> {
        let medications = catalog::normalize_names(&query.current_medications);
        if medications.is_empty() {
            return Err(CheckError::NoMedications);
        }
        if medications.len() > self.max_medications {
            return Err(CheckError::TooManyMedications {
                count: medications.len(),
                max: self.max_medications,
            });
        }

        // --- 1. Prescribed drug ---
        let prescribed_name = query.prescribed_drug.trim();
        let prescribed = self
            .catalog
            .resolve(CatalogKind::Drug, prescribed_name)
            .await?
            .ok_or_else(|| CheckError::DrugNotFound(prescribed_name.to_string()))?;

        // --- 2. Treated condition ---
        let condition = match query.treated_condition.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(
                self.catalog
                    .resolve(CatalogKind::Condition, name)
                    .await?
                    .ok_or_else(|| CheckError::ConditionNotFound(name.to_string()))?,
            ),
            _ => None,
        };

        // --- 3. Current medications, as one batch ---
        let validation = self.catalog.validate(CatalogKind::Drug, &medications).await?;
        if !validation.is_complete() {
            return Err(CheckError::MedicationsNotFound(validation.not_found));
        }

        // --- 4. Fetch every selected drug's interaction triad ---
        let mut seen = HashSet::new();
        let selected: Vec<CatalogItem> = std::iter::once(prescribed.clone())
            .chain(validation.found.iter().cloned())
            .filter(|d| seen.insert(d.id))
            .collect();

        let sets = try_join_all(
            selected
                .iter()
                .map(|drug| self.interactions.interactions_for(drug.id)),
        )
        .await?;

        // --- 5. Merge ---
        let mut bundle = merge(&selected, sets);
        bundle.drugs = validation.found.into_iter().map(|d| d.name).collect();
        bundle.prescribed_drug = prescribed.name;
        bundle.condition = condition.map(|c| c.name);

        info!(
            drugs = selected.len(),
            drug_drug = bundle.interactions.len(),
            food = bundle.food_interactions.len(),
            disease = bundle.disease_interactions.len(),
            "interaction check complete"
        );
        Ok(bundle)
    }
}

impl InteractionAggregator {
    /// Resolves `name` exactly and returns the drug's own interaction records,
    /// unfiltered.
    pub async fn drug_profile(&self, name: &str) -> Result<DrugProfile, CheckError> {
        let name = name.trim();
        let drug = self
            .catalog
            .resolve(CatalogKind::Drug, name)
            .await?
            .ok_or_else(|| CheckError::DrugNotFound(name.to_string()))?;
        let interactions = self.interactions.interactions_for(drug.id).await?;
        info!(
            drug = %drug.name,
            drug_drug = interactions.drug_drug.len(),
            food = interactions.food.len(),
            disease = interactions.disease.len(),
            "drug profile loaded"
        );
        Ok(DrugProfile { drug, interactions })
    }
}

/// Merges per-drug interaction sets (`sets[i]` belongs to `selected[i]`).
///
/// Drug-drug records are kept only when their counterpart is another selected
/// drug, and each record or drug pair is listed once. Food and disease records
/// are concatenated per source drug.
pub fn merge(selected: &[CatalogItem], sets: Vec<InteractionSet>) -> Bundle {
    let mut bundle = Bundle::default();
    let mut seen_records = HashSet::new();
    let mut seen_pairs = HashSet::new();
    let mut seen_food = HashSet::new();
    let mut seen_disease = HashSet::new();

    for (source, set) in selected.iter().zip(sets) {
        for interaction in set.drug_drug {
            let Some(other) = selected
                .iter()
                .find(|o| o.id != source.id && catalog::refers_to(&interaction.interacting_drug_name, o))
            else {
                continue;
            };

            let pair = (source.id.min(other.id), source.id.max(other.id));
            if seen_records.contains(&interaction.interaction_id) || seen_pairs.contains(&pair) {
                continue;
            }
            seen_records.insert(interaction.interaction_id);
            seen_pairs.insert(pair);

            bundle.interactions.push(DrugPairEntry {
                drug: format!("{} ↔ {}", source.name, other.name),
                drugs_involved: [source.name.clone(), other.name.clone()],
                interaction,
            });
        }

        for interaction in set.food {
            if !seen_food.insert((source.id, interaction.interaction_name.to_lowercase())) {
                continue;
            }
            bundle.food_interactions.push(FoodEntry {
                interaction,
                drug: source.name.clone(),
            });
        }

        for interaction in set.disease {
            if !seen_disease.insert((source.id, interaction.disease_name.to_lowercase())) {
                continue;
            }
            bundle.disease_interactions.push(DiseaseEntry {
                interaction,
                drug: source.name.clone(),
            });
        }
    }

    if bundle.is_empty() {
        warn!(drugs = selected.len(), "no interactions recorded for the selected drugs");
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::testing::{CallLog, InMemoryCatalog, InMemoryInteractions};

    struct Fixture {
        log: CallLog,
        interactions: Arc<InMemoryInteractions>,
        aggregator: InteractionAggregator,
    }

    fn fixture() -> Fixture {
        let log = CallLog::new();
        let catalog = InMemoryCatalog::with_log(log.clone());
        catalog.add_drug(1, "Aspirin", None);
        catalog.add_drug(2, "Warfarin", None);
        catalog.add_drug(3, "Lisinopril", None);
        catalog.add_drug(4, "Metformin", None);
        catalog.add_drug(5, "Simvastatin", None);
        catalog.add_drug(6, "Omeprazole", None);
        catalog.add_drug(7, "Ibuprofen", None);
        catalog.add_condition(10, "Hypertension");

        let interactions = Arc::new(InMemoryInteractions::with_log(log.clone()));
        let lookup = Arc::new(CatalogLookup::new(Arc::new(catalog)));
        let aggregator = InteractionAggregator::new(lookup, interactions.clone());
        Fixture {
            log,
            interactions,
            aggregator,
        }
    }

    fn query(prescribed: &str, meds: &[&str], condition: Option<&str>) -> InteractionQuery {
        InteractionQuery {
            prescribed_drug: prescribed.to_string(),
            current_medications: meds.iter().map(|m| m.to_string()).collect(),
            treated_condition: condition.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn drug_profile_lists_every_record_of_one_drug() {
        let f = fixture();
        f.interactions
            .add_drug_interaction(2, 100, "Aspirin", Severity::Major, "Increased bleeding risk.");
        f.interactions
            .add_drug_interaction(2, 101, "Naproxen", Severity::Moderate, "Bleeding risk.");
        f.interactions.add_food_interaction(2, 200, "Alcohol", Severity::Moderate);

        let profile = f.aggregator.drug_profile(" warfarin ").await.unwrap();
        assert_eq!(profile.drug.name, "Warfarin");
        assert_eq!(profile.interactions.drug_drug.len(), 2);
        assert_eq!(profile.interactions.food.len(), 1);
        assert!(profile.interactions.disease.is_empty());
    }

    #[tokio::test]
    async fn drug_profile_of_an_unknown_drug_fetches_nothing() {
        let f = fixture();
        let err = f.aggregator.drug_profile("Xanadrin").await.unwrap_err();
        assert!(matches!(err, CheckError::DrugNotFound(ref n) if n == "Xanadrin"));
        assert_eq!(f.log.count("interactions_for"), 0);
    }

    #[tokio::test]
    async fn aspirin_warfarin_scenario_yields_one_drug_drug_entry() {
        let f = fixture();
        f.interactions
            .add_drug_interaction(2, 100, "aspirin", Severity::Major, "Increased bleeding risk.");

        let bundle = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Warfarin"], Some("Hypertension")))
            .await
            .unwrap();

        assert_eq!(bundle.interactions.len(), 1);
        assert!(bundle.food_interactions.is_empty());
        assert!(bundle.disease_interactions.is_empty());
        let entry = &bundle.interactions[0];
        assert_eq!(entry.interaction.severity, Severity::Major);
        assert_eq!(entry.drug, "Warfarin ↔ Aspirin");
        assert_eq!(bundle.drugs, vec!["Warfarin".to_string()]);
        assert_eq!(bundle.prescribed_drug, "Aspirin");
        assert_eq!(bundle.condition.as_deref(), Some("Hypertension"));
    }

    #[tokio::test]
    async fn unknown_medication_aborts_before_any_fetch() {
        let f = fixture();
        let err = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Warfarin", "Xanadrin123"], Some("Hypertension")))
            .await
            .unwrap_err();

        match err {
            CheckError::MedicationsNotFound(names) => assert_eq!(names, vec!["Xanadrin123"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.log.count("interactions_for"), 0);
    }

    #[tokio::test]
    async fn validation_runs_drug_then_condition_then_medications_before_fetching() {
        let f = fixture();
        f.aggregator
            .check_interactions(&query("Aspirin", &["Warfarin", "Lisinopril"], Some("Hypertension")))
            .await
            .unwrap();

        let drug = f.log.position("find_exact(drug").unwrap();
        let condition = f.log.position("find_exact(condition").unwrap();
        let meds = f.log.position("find_exact_many(drug)").unwrap();
        let first_fetch = f.log.position("interactions_for").unwrap();
        assert!(drug < condition && condition < meds && meds < first_fetch);
        assert_eq!(f.log.count("interactions_for"), 3);
    }

    #[tokio::test]
    async fn unknown_prescribed_drug_is_reported_first() {
        let f = fixture();
        let err = f
            .aggregator
            .check_interactions(&query("Nodrug", &["Xanadrin123"], Some("Nocondition")))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::DrugNotFound(ref n) if n == "Nodrug"));
        assert_eq!(f.log.count("find_exact(condition"), 0);
    }

    #[tokio::test]
    async fn unknown_condition_is_reported_before_medications() {
        let f = fixture();
        let err = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Xanadrin123"], Some("Nocondition")))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ConditionNotFound(ref n) if n == "Nocondition"));
        assert_eq!(f.log.count("find_exact_many"), 0);
        assert_eq!(f.log.count("interactions_for"), 0);
    }

    #[tokio::test]
    async fn five_medications_pass_and_six_are_rejected_without_lookups() {
        let f = fixture();
        let five = ["Warfarin", "Lisinopril", "Metformin", "Simvastatin", "Omeprazole"];
        assert!(f
            .aggregator
            .check_interactions(&query("Aspirin", &five, None))
            .await
            .is_ok());

        let f = fixture();
        let six = ["Warfarin", "Lisinopril", "Metformin", "Simvastatin", "Omeprazole", "Ibuprofen"];
        let err = f
            .aggregator
            .check_interactions(&query("Aspirin", &six, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::TooManyMedications { count: 6, max: 5 }));
        assert!(f.log.entries().is_empty());
    }

    #[tokio::test]
    async fn empty_medication_list_is_rejected() {
        let f = fixture();
        let err = f
            .aggregator
            .check_interactions(&query("Aspirin", &["  "], None))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::NoMedications));
    }

    #[tokio::test]
    async fn mirrored_pair_records_are_listed_once() {
        let f = fixture();
        f.interactions
            .add_drug_interaction(1, 100, "Warfarin", Severity::Major, "A-B");
        f.interactions
            .add_drug_interaction(2, 101, "Aspirin", Severity::Major, "B-A");
        f.interactions
            .add_drug_interaction(2, 100, "Aspirin", Severity::Major, "A-B");

        let bundle = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Warfarin"], None))
            .await
            .unwrap();
        assert_eq!(bundle.interactions.len(), 1);
        assert_eq!(bundle.interactions[0].interaction.interaction_id, 100);
    }

    #[tokio::test]
    async fn interactions_with_unselected_drugs_are_dropped() {
        let f = fixture();
        f.interactions
            .add_drug_interaction(1, 100, "Clopidogrel", Severity::Major, "not selected");

        let bundle = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Warfarin"], None))
            .await
            .unwrap();
        assert!(bundle.interactions.is_empty());
    }

    #[tokio::test]
    async fn food_and_disease_rows_keep_their_source_drug_label() {
        let f = fixture();
        f.interactions
            .add_food_interaction(2, 1, "Vitamin K", Severity::Moderate);
        f.interactions
            .add_food_interaction(2, 1, "Vitamin K", Severity::Moderate);
        f.interactions
            .add_food_interaction(1, 2, "Alcohol", Severity::Minor);
        f.interactions
            .add_disease_interaction(2, 5, "Bleeding", Severity::Major);

        let bundle = f
            .aggregator
            .check_interactions(&query("Aspirin", &["Warfarin"], None))
            .await
            .unwrap();

        let food: Vec<_> = bundle
            .food_interactions
            .iter()
            .map(|e| (e.drug.as_str(), e.interaction.interaction_name.as_str()))
            .collect();
        assert_eq!(food, vec![("Aspirin", "Alcohol"), ("Warfarin", "Vitamin K")]);
        assert_eq!(bundle.disease_interactions.len(), 1);
        assert_eq!(bundle.disease_interactions[0].drug, "Warfarin");
    }

    #[tokio::test]
    async fn prescribed_drug_repeated_in_medications_is_fetched_once() {
        let f = fixture();
        f.aggregator
            .check_interactions(&query("aspirin", &["Aspirin", "Warfarin"], None))
            .await
            .unwrap();
        assert_eq!(f.log.count("interactions_for(1)"), 1);
        assert_eq!(f.log.count("interactions_for"), 2);
    }
}
