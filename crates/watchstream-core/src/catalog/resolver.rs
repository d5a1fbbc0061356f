//! Watch set resolution against a store.

use std::collections::HashSet;

use tracing::{debug, info};

use super::policy::NamingPolicy;
use crate::error::Error;
use crate::source::{SourceName, WatchSet};
use crate::store::ChangeStore;

/// Resolution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Only emit collections the store actually lists.
    pub verify_collections: bool,
}

/// Build a watch set from a list of database names.
///
/// Keeps the names matching `policy`, sorts them, and emits one source per
/// (database, collection) pair in `collections` order. Duplicate database
/// names and duplicate collection names are collapsed.
pub fn build_watch_set<S: AsRef<str>>(
    databases: &[S],
    policy: &NamingPolicy,
    collections: &[String],
) -> WatchSet {
    let mut matched: Vec<&str> = databases
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|name| policy.matches(name))
        .collect();
    matched.sort_unstable();
    matched.dedup();

    let collections = dedup_collections(collections);

    let sources = matched
        .into_iter()
        .flat_map(|database| {
            collections
                .iter()
                .map(move |collection| SourceName::new(database, *collection))
        })
        .collect();

    WatchSet::new(sources)
}

/// Resolve the watch set from the store's catalog.
///
/// Fails with [`Error::CatalogUnavailable`] if any listing call fails.
pub async fn resolve(
    store: &dyn ChangeStore,
    policy: &NamingPolicy,
    collections: &[String],
    options: CatalogOptions,
) -> Result<WatchSet, Error> {
    let databases = store
        .list_database_names()
        .await
        .map_err(Error::CatalogUnavailable)?;

    debug!(
        listed = databases.len(),
        pattern = policy.pattern(),
        "listed databases"
    );

    let candidates = build_watch_set(&databases, policy, collections);
    if !options.verify_collections {
        return Ok(candidates);
    }

    let mut verified = Vec::with_capacity(candidates.len());
    for database in candidates.databases() {
        let existing: HashSet<String> = store
            .list_collection_names(database)
            .await
            .map_err(Error::CatalogUnavailable)?
            .into_iter()
            .collect();

        for source in candidates.iter().filter(|s| s.database == database) {
            if existing.contains(&source.collection) {
                verified.push(source.clone());
            } else {
                info!(ns = %source, "collection not present, skipping");
            }
        }
    }

    Ok(WatchSet::new(verified))
}

fn dedup_collections(collections: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    collections
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use pretty_assertions::assert_eq;

    fn collections() -> Vec<String> {
        vec!["orders".to_string(), "trades".to_string()]
    }

    fn policy() -> NamingPolicy {
        NamingPolicy::new(r"^cryptobroker_prod_.*_00[0-9]+$").unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let databases = ["cryptobroker_prod_x_001", "cryptobroker_prod_x_2", "other_db"];
        let set = build_watch_set(&databases, &policy(), &collections());

        assert_eq!(
            set.as_slice(),
            &[
                SourceName::new("cryptobroker_prod_x_001", "orders"),
                SourceName::new("cryptobroker_prod_x_001", "trades"),
            ]
        );
    }

    #[test]
    fn test_sorted_and_deterministic() {
        let forward = [
            "cryptobroker_prod_b_002",
            "cryptobroker_prod_a_001",
            "admin",
            "cryptobroker_prod_c_0003",
        ];
        let mut reversed = forward;
        reversed.reverse();

        let first = build_watch_set(&forward, &policy(), &collections());
        let second = build_watch_set(&reversed, &policy(), &collections());
        assert_eq!(first, second);
        assert_eq!(
            first.databases(),
            vec![
                "cryptobroker_prod_a_001",
                "cryptobroker_prod_b_002",
                "cryptobroker_prod_c_0003"
            ]
        );
        assert_eq!(first.len(), 6);
    }

    #[test]
    fn test_collection_order_is_kept_and_deduplicated() {
        let cols = vec!["trades".to_string(), "orders".to_string(), "trades".to_string()];
        let set = build_watch_set(&["cryptobroker_prod_x_001"], &policy(), &cols);
        let names: Vec<&str> = set.iter().map(|s| s.collection.as_str()).collect();
        assert_eq!(names, vec!["trades", "orders"]);
    }

    #[test]
    fn test_no_match_yields_empty_set() {
        let set = build_watch_set(&["local", "config"], &policy(), &collections());
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_from_store() {
        let store = MemoryStore::new()
            .with_database("other_db", &["orders"])
            .with_database("cryptobroker_prod_y_002", &["orders"])
            .with_database("cryptobroker_prod_x_001", &["orders", "trades"]);

        let set = resolve(&store, &policy(), &collections(), CatalogOptions::default())
            .await
            .unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.as_slice()[0], SourceName::new("cryptobroker_prod_x_001", "orders"));
    }

    #[tokio::test]
    async fn test_resolve_verifies_collections() {
        let store = MemoryStore::new()
            .with_database("cryptobroker_prod_y_002", &["orders"])
            .with_database("cryptobroker_prod_x_001", &["orders", "trades"]);

        let options = CatalogOptions {
            verify_collections: true,
        };
        let set = resolve(&store, &policy(), &collections(), options)
            .await
            .unwrap();
        assert_eq!(
            set.as_slice(),
            &[
                SourceName::new("cryptobroker_prod_x_001", "orders"),
                SourceName::new("cryptobroker_prod_x_001", "trades"),
                SourceName::new("cryptobroker_prod_y_002", "orders"),
            ]
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_catalog_unavailable() {
        let store = MemoryStore::new().with_catalog_failure("not authorized on admin");

        let err = resolve(&store, &policy(), &collections(), CatalogOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CatalogUnavailable(_)));
        assert!(err.is_process_fatal());
    }
}
