//! crates/pharmacheck_core/src/catalog.rs
//!
//! Catalog Lookup: resolves free-text drug and condition names against the
//! catalog for autocomplete, search and strict validation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{CatalogEntry, CatalogItem, CatalogKind};
use crate::ports::{CatalogRepository, NamePattern, PortResult};

/// Queries shorter than this return no suggestions.
pub const MIN_QUERY_LEN: usize = 2;
pub const AUTOCOMPLETE_LIMIT: usize = 20;
const CONDITION_SEARCH_LIMIT: usize = 10;
const DRUG_FUZZY_MIN_RATIO: f64 = 0.6;
const CONDITION_FUZZY_MIN_RATIO: f64 = 0.5;
/// Normalized edit distance under which an interaction's counterpart name is
/// taken to mean a selected drug.
const COUNTERPART_MAX_DISTANCE: f64 = 0.4;

/// Outcome of a batch validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Resolved items, in input order.
    pub found: Vec<CatalogItem>,
    /// Input names (trimmed) that did not resolve, in input order.
    pub not_found: Vec<String>,
}

impl Validation {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }
}

#[derive(Clone)]
pub struct CatalogLookup {
    repo: Arc<dyn CatalogRepository>,
}

impl CatalogLookup {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }

    /// Case-insensitive suggestions for a partially typed name: prefix matches
    /// first, then substring matches, at most `AUTOCOMPLETE_LIMIT` in total.
    pub async fn autocomplete(
        &self,
        prefix: &str,
        kind: CatalogKind,
    ) -> PortResult<Vec<CatalogEntry>> {
        let query = prefix.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let mut items = self
            .repo
            .search(kind, NamePattern::Prefix(query), AUTOCOMPLETE_LIMIT)
            .await?;

        if items.len() < AUTOCOMPLETE_LIMIT {
            let seen: HashSet<i64> = items.iter().map(|i| i.id).collect();
            let extra = self
                .repo
                .search(kind, NamePattern::Contains(query), AUTOCOMPLETE_LIMIT)
                .await?;
            items.extend(
                extra
                    .into_iter()
                    .filter(|i| !seen.contains(&i.id))
                    .take(AUTOCOMPLETE_LIMIT - items.len()),
            );
        }

        debug!(%kind, query, hits = items.len(), "autocomplete");
        Ok(items.iter().map(CatalogEntry::from).collect())
    }

    /// Exact, case-insensitive resolution of a single name.
    pub async fn resolve(&self, kind: CatalogKind, name: &str) -> PortResult<Option<CatalogItem>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let item = self.repo.find_exact(kind, name).await?;
        if item.is_none() {
            warn!(%kind, name, "catalog lookup found no exact match");
        }
        Ok(item)
    }

    /// Exact, case-insensitive validation of a set of names in one repository call.
    /// Blank names are ignored and case-insensitive duplicates collapse to the first.
    pub async fn validate(&self, kind: CatalogKind, names: &[String]) -> PortResult<Validation> {
        let wanted = normalize_names(names);
        if wanted.is_empty() {
            return Ok(Validation::default());
        }

        let items = self.repo.find_exact_many(kind, &wanted).await?;

        let mut validation = Validation::default();
        for name in wanted {
            match items.iter().find(|i| same_name(&i.name, &name)) {
                Some(item) => validation.found.push(item.clone()),
                None => validation.not_found.push(name),
            }
        }

        if !validation.is_complete() {
            warn!(%kind, not_found = ?validation.not_found, "catalog validation failed");
        }
        Ok(validation)
    }

    /// Best single drug for a free-text query: exact match, then the first
    /// prefix match, then the closest fuzzy match.
    pub async fn search_drug(&self, input: &str) -> PortResult<Option<CatalogEntry>> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(None);
        }

        if let Some(item) = self.repo.find_exact(CatalogKind::Drug, query).await? {
            return Ok(Some(CatalogEntry::from(&item)));
        }

        let prefixed = self
            .repo
            .search(CatalogKind::Drug, NamePattern::Prefix(query), CONDITION_SEARCH_LIMIT)
            .await?;
        if let Some(item) = prefixed.first() {
            return Ok(Some(CatalogEntry::from(item)));
        }

        let all = self.repo.list_all(CatalogKind::Drug).await?;
        Ok(closest_match(&all, query, DRUG_FUZZY_MIN_RATIO).map(CatalogEntry::from))
    }

    /// Prefix matches for a condition, or the single closest fuzzy match when
    /// there are none. An empty result means not found.
    pub async fn search_conditions(&self, input: &str) -> PortResult<Vec<CatalogEntry>> {
        let query = input.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed = self
            .repo
            .search(
                CatalogKind::Condition,
                NamePattern::Prefix(query),
                CONDITION_SEARCH_LIMIT,
            )
            .await?;
        if !prefixed.is_empty() {
            return Ok(prefixed.iter().map(CatalogEntry::from).collect());
        }

        let all = self.repo.list_all(CatalogKind::Condition).await?;
        Ok(closest_match(&all, query, CONDITION_FUZZY_MIN_RATIO)
            .map(CatalogEntry::from)
            .into_iter()
            .collect())
    }
}

/// Trims, drops blanks and removes case-insensitive duplicates, keeping order.
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Case-insensitive name equality under full Unicode lowercasing, the same
/// folding the store applies.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// `1 - levenshtein / max_len`, computed case-insensitively over chars.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(&a, &b) as f64 / max_len as f64
}

/// Whether an interaction's counterpart name refers to `drug`, by canonical or
/// generic name.
pub fn refers_to(counterpart: &str, drug: &CatalogItem) -> bool {
    let counterpart = counterpart.trim().to_lowercase();
    if counterpart.is_empty() {
        return false;
    }
    std::iter::once(drug.name.as_str())
        .chain(drug.generic_name.as_deref())
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .any(|name| {
            counterpart.contains(&name)
                || 1.0 - similarity_ratio(&name, &counterpart) <= COUNTERPART_MAX_DISTANCE
        })
}

fn closest_match<'a>(items: &'a [CatalogItem], query: &str, min_ratio: f64) -> Option<&'a CatalogItem> {
    let mut best: Option<(&CatalogItem, f64)> = None;
    for item in items {
        let ratio = similarity_ratio(query, &item.name);
        if ratio > min_ratio && best.map_or(true, |(_, r)| ratio > r) {
            best = Some((item, ratio));
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCatalog;

    fn lookup(catalog: &Arc<InMemoryCatalog>) -> CatalogLookup {
        CatalogLookup::new(catalog.clone())
    }

    fn seeded() -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        catalog.add_drug(1, "Aspirin", Some("acetylsalicylic acid"));
        catalog.add_drug(2, "Warfarin", None);
        catalog.add_drug(3, "Atorvastatin", None);
        catalog.add_drug(4, "Baby Aspirin", None);
        catalog.add_condition(10, "Hypertension");
        catalog.add_condition(11, "Hyperlipidemia");
        catalog.add_condition(12, "Asthma");
        Arc::new(catalog)
    }

    #[tokio::test]
    async fn autocomplete_needs_two_characters() {
        let catalog = seeded();
        let hits = lookup(&catalog).autocomplete(" a ", CatalogKind::Drug).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(catalog.calls().len(), 0);
    }

    #[tokio::test]
    async fn autocomplete_lists_prefix_matches_before_substring_matches() {
        let catalog = seeded();
        let hits = lookup(&catalog).autocomplete("asp", CatalogKind::Drug).await.unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Aspirin", "Baby Aspirin"]);
        assert_eq!(hits[0].generic_name.as_deref(), Some("acetylsalicylic acid"));
    }

    #[tokio::test]
    async fn autocomplete_targets_the_requested_kind() {
        let catalog = seeded();
        let hits = lookup(&catalog).autocomplete("HYPER", CatalogKind::Condition).await.unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Hyperlipidemia", "Hypertension"]);
    }

    #[tokio::test]
    async fn validate_splits_found_and_not_found_in_one_call() {
        let catalog = seeded();
        let names = vec![
            "warfarin".to_string(),
            "  ".to_string(),
            "Xanadrin123".to_string(),
            "WARFARIN".to_string(),
        ];
        let v = lookup(&catalog).validate(CatalogKind::Drug, &names).await.unwrap();

        assert_eq!(v.found.len(), 1);
        assert_eq!(v.found[0].name, "Warfarin");
        assert_eq!(v.not_found, vec!["Xanadrin123".to_string()]);
        assert_eq!(catalog.calls(), vec!["find_exact_many(drug)".to_string()]);
    }

    #[tokio::test]
    async fn validate_folds_case_beyond_ascii() {
        let catalog = seeded();
        catalog.add_drug(5, "Éthinylestradiol", None);
        let names = vec!["éthinylestradiol".to_string(), "ÉTHINYLESTRADIOL".to_string()];
        let v = lookup(&catalog).validate(CatalogKind::Drug, &names).await.unwrap();

        assert!(v.is_complete());
        assert_eq!(v.found.len(), 1);
        assert_eq!(v.found[0].name, "Éthinylestradiol");
    }

    #[tokio::test]
    async fn validate_is_exact_not_fuzzy() {
        let catalog = seeded();
        let v = lookup(&catalog)
            .validate(CatalogKind::Drug, &["Warfarn".to_string()])
            .await
            .unwrap();
        assert!(v.found.is_empty());
        assert!(!v.is_complete());
    }

    #[tokio::test]
    async fn search_drug_falls_back_from_exact_to_prefix_to_fuzzy() {
        let catalog = seeded();
        let lookup = lookup(&catalog);

        let exact = lookup.search_drug("aspirin").await.unwrap().unwrap();
        assert_eq!(exact.name, "Aspirin");

        let prefix = lookup.search_drug("atorva").await.unwrap().unwrap();
        assert_eq!(prefix.name, "Atorvastatin");

        let fuzzy = lookup.search_drug("warfarn").await.unwrap().unwrap();
        assert_eq!(fuzzy.name, "Warfarin");

        assert!(lookup.search_drug("zzzzzzzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_conditions_returns_single_fuzzy_match_when_no_prefix_hits() {
        let catalog = seeded();
        let hits = lookup(&catalog).search_conditions("astma").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Asthma");

        let none = lookup(&catalog).search_conditions("qqqqqq").await.unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn counterpart_matching_uses_containment_and_edit_distance() {
        let warfarin = CatalogItem {
            id: 2,
            kind: CatalogKind::Drug,
            name: "Warfarin".into(),
            generic_name: None,
            url: None,
        };
        assert!(refers_to("warfarin sodium", &warfarin));
        assert!(refers_to("Warfarine", &warfarin));
        assert!(!refers_to("ibuprofen", &warfarin));
        assert!(!refers_to("", &warfarin));

        let aspirin = CatalogItem {
            id: 1,
            kind: CatalogKind::Drug,
            name: "Bayer".into(),
            generic_name: Some("aspirin".into()),
            url: None,
        };
        assert!(refers_to("Aspirin", &aspirin));
    }

    #[test]
    fn similarity_ratio_is_case_insensitive() {
        assert_eq!(similarity_ratio("ASPIRIN", "aspirin"), 1.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert!(similarity_ratio("abc", "xyz") < 0.1);
    }
}
