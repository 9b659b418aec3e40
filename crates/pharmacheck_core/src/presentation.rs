//! crates/pharmacheck_core/src/presentation.rs
//!
//! Presentation Layer: the view state behind the results page.
//!
//! `ResultsView` owns the last fetched `Bundle` together with the per-card UI
//! state (active tab, expanded cards, translations in flight). Rendering is a
//! pure function of that state; translating a card mutates the owned bundle in
//! place and leaves every other card untouched.

use std::collections::HashSet;

use serde::Serialize;

use crate::aggregator::{CheckError, InteractionQuery, DEFAULT_MAX_MEDICATIONS};
use crate::catalog::same_name;
use crate::domain::{Bundle, EntryRef, InteractionKind, RecordRef, Severity};
use crate::translation::{TranslationCache, TranslationError};

/// Addresses one card: its tab and its position within the tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CardKey {
    pub kind: InteractionKind,
    pub index: usize,
}

impl CardKey {
    pub fn new(kind: InteractionKind, index: usize) -> Self {
        Self { kind, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Danger,
    Warning,
    Info,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeverityBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

impl From<Severity> for SeverityBadge {
    fn from(severity: Severity) -> Self {
        let tone = match severity {
            Severity::Major => BadgeTone::Danger,
            Severity::Moderate => BadgeTone::Warning,
            Severity::Minor => BadgeTone::Info,
            Severity::Unknown => BadgeTone::Neutral,
        };
        Self {
            label: severity.as_str(),
            tone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationState {
    /// The translate action is offered.
    Available,
    /// A translation is in flight; the action is disabled.
    Pending,
    Translated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub key: CardKey,
    pub record: RecordRef,
    pub title: String,
    pub source: String,
    pub badge: SeverityBadge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plausibility: Option<&'static str>,
    pub professional_description: String,
    pub patient_text: Option<String>,
    pub expanded: bool,
    pub translation: TranslationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub kind: InteractionKind,
    pub label: &'static str,
    pub count: usize,
    pub active: bool,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedView {
    pub prescribed_drug: String,
    pub condition: Option<String>,
    pub drugs: Vec<String>,
    pub tabs: Vec<Tab>,
}

fn tab_label(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::DrugDrug => "Drug Interactions",
        InteractionKind::Food => "Food Interactions",
        InteractionKind::Disease => "Disease Interactions",
    }
}

//=========================================================================================
// Results View
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ResultsView {
    bundle: Bundle,
    active: InteractionKind,
    expanded: HashSet<CardKey>,
    pending: HashSet<CardKey>,
}

impl ResultsView {
    pub fn new(bundle: Bundle) -> Self {
        Self {
            bundle,
            active: InteractionKind::DrugDrug,
            expanded: HashSet::new(),
            pending: HashSet::new(),
        }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> Bundle {
        self.bundle
    }

    pub fn active_tab(&self) -> InteractionKind {
        self.active
    }

    pub fn select_tab(&mut self, kind: InteractionKind) {
        self.active = kind;
    }

    /// Flips a card between expanded and collapsed and returns the new state.
    /// Unknown keys are ignored.
    pub fn toggle(&mut self, key: CardKey) -> bool {
        if self.bundle.entry(key.kind, key.index).is_none() {
            return false;
        }
        if self.expanded.remove(&key) {
            false
        } else {
            self.expanded.insert(key);
            true
        }
    }

    pub fn render(&self) -> RenderedView {
        let tabs = InteractionKind::ALL
            .iter()
            .map(|&kind| {
                let cards: Vec<Card> = self
                    .bundle
                    .entries(kind)
                    .into_iter()
                    .enumerate()
                    .map(|(index, entry)| self.card(CardKey::new(kind, index), entry))
                    .collect();
                Tab {
                    kind,
                    label: tab_label(kind),
                    count: cards.len(),
                    active: kind == self.active,
                    cards,
                }
            })
            .collect();

        RenderedView {
            prescribed_drug: self.bundle.prescribed_drug.clone(),
            condition: self.bundle.condition.clone(),
            drugs: self.bundle.drugs.clone(),
            tabs,
        }
    }

    fn card(&self, key: CardKey, entry: EntryRef<'_>) -> Card {
        let descriptions = entry.descriptions();
        let translation = if descriptions.cached_ai().is_some() {
            TranslationState::Translated
        } else if self.pending.contains(&key) {
            TranslationState::Pending
        } else {
            TranslationState::Available
        };
        let (hazard_level, plausibility) = match entry {
            EntryRef::DrugDrug(_) => (None, None),
            EntryRef::Food(e) => (
                e.interaction.hazard_level.clone(),
                Some(e.interaction.plausibility.as_str()),
            ),
            EntryRef::Disease(e) => (
                e.interaction.hazard_level.clone(),
                Some(e.interaction.plausibility.as_str()),
            ),
        };

        Card {
            key,
            record: entry.record(),
            title: entry.title().to_string(),
            source: entry.source().to_string(),
            badge: SeverityBadge::from(entry.severity()),
            hazard_level,
            plausibility,
            professional_description: descriptions.professional_description.clone(),
            patient_text: descriptions.patient_text().map(str::to_string),
            expanded: self.expanded.contains(&key),
            translation,
        }
    }

    /// Marks a card as translating and returns what to send to the
    /// translation cache, or `None` if the card is missing, already
    /// translated or already pending.
    pub fn begin_translation(&mut self, key: CardKey) -> Option<(RecordRef, String)> {
        let entry = self.bundle.entry(key.kind, key.index)?;
        if entry.descriptions().cached_ai().is_some() || self.pending.contains(&key) {
            return None;
        }
        let request = (
            entry.record(),
            entry.descriptions().professional_description.clone(),
        );
        self.pending.insert(key);
        Some(request)
    }

    /// Applies a translation outcome. Failure only clears the pending flag,
    /// so the card returns to its pre-attempt state.
    pub fn complete_translation(
        &mut self,
        key: CardKey,
        outcome: Result<String, TranslationError>,
    ) -> Result<String, TranslationError> {
        self.pending.remove(&key);
        let text = outcome?;
        if let Some(descriptions) = self.bundle.descriptions_mut(key.kind, key.index) {
            descriptions.ai_description = Some(text.clone());
        }
        Ok(text)
    }

    /// Translates one card through `cache` and updates it in place.
    /// A card that already has a translation returns it without a call.
    pub async fn translate(
        &mut self,
        key: CardKey,
        cache: &TranslationCache,
    ) -> Result<String, TranslationError> {
        if let Some(existing) = self
            .bundle
            .entry(key.kind, key.index)
            .and_then(|e| e.descriptions().cached_ai())
        {
            return Ok(existing.to_string());
        }
        let Some((record, text)) = self.begin_translation(key) else {
            return Err(TranslationError::Failed("translation already in progress".into()));
        };
        let outcome = cache.translate(Some(record), &text).await;
        self.complete_translation(key, outcome)
    }
}

//=========================================================================================
// Medication Picker
//=========================================================================================

/// Client-side selection state for the current-medications field.
#[derive(Debug, Clone)]
pub struct MedicationPicker {
    selected: Vec<String>,
    max: usize,
}

impl Default for MedicationPicker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEDICATIONS)
    }
}

impl MedicationPicker {
    pub fn new(max: usize) -> Self {
        Self {
            selected: Vec::new(),
            max,
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Adds a medication. Returns `Ok(false)` for blanks and case-insensitive
    /// duplicates; rejects additions past the cap.
    pub fn add(&mut self, name: &str) -> Result<bool, CheckError> {
        let name = name.trim();
        if name.is_empty() || self.selected.iter().any(|s| same_name(s, name)) {
            return Ok(false);
        }
        if self.selected.len() >= self.max {
            return Err(CheckError::TooManyMedications {
                count: self.selected.len() + 1,
                max: self.max,
            });
        }
        self.selected.push(name.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.selected.len();
        let name = name.trim();
        self.selected.retain(|s| !same_name(s, name));
        self.selected.len() != before
    }

    pub fn into_query(
        self,
        prescribed_drug: &str,
        treated_condition: Option<&str>,
    ) -> Result<InteractionQuery, CheckError> {
        if self.selected.is_empty() {
            return Err(CheckError::NoMedications);
        }
        Ok(InteractionQuery {
            prescribed_drug: prescribed_drug.trim().to_string(),
            current_medications: self.selected,
            treated_condition: treated_condition.map(str::to_string),
        })
    }
}
