//! Owner association and the automatic retry pass.

use std::collections::BTreeMap;

use log::{info, warn};
use serde_json::Value;

use crate::client::{ReferenceLister, ResourceFetcher};
use crate::error_handling::ErrorKind;

use super::payload;
use super::types::OwnerRecord;
use super::{DedupCollector, RunState};

/// Build each owner's final record from the shared cache.
///
/// References with no cache entry are omitted from `resource_ids`; the
/// ledger already says why they are missing. Pure over its inputs, so it can
/// be re-run after the retry pass merges recovered payloads.
pub(super) fn associate(
    owner_references: &BTreeMap<String, Vec<String>>,
    cache: &BTreeMap<String, Value>,
) -> BTreeMap<String, OwnerRecord> {
    owner_references
        .iter()
        .map(|(owner, references)| {
            let resource_ids = references
                .iter()
                .filter(|id| cache.contains_key(*id))
                .cloned()
                .collect();
            (
                owner.clone(),
                OwnerRecord {
                    reference_ids: references.clone(),
                    resource_ids,
                },
            )
        })
        .collect()
}

impl<L, F> DedupCollector<L, F>
where
    L: ReferenceLister,
    F: ResourceFetcher + 'static,
{
    /// One sequential retry pass over every resource that failed with a
    /// retryable kind.
    ///
    /// Successes are merged into the cache and absorbed out of the ledger.
    /// The pass never recurses: whatever fails here stays failed. A dead
    /// credential or an open circuit stops the pass early since nothing
    /// after it could succeed.
    pub(super) async fn retry_failed(&self, state: &RunState) -> usize {
        let failed_ids = self.ledger.retryable_resource_ids();
        if failed_ids.is_empty() {
            return 0;
        }

        let total = failed_ids.len();
        info!("Attempting automatic retry for {total} failed resources...");
        let mut recovered = 0usize;

        for resource_id in failed_ids {
            if self.shutdown.is_cancelled() {
                warn!("Collection interrupted; skipping remaining retries");
                break;
            }

            match self.fetcher.fetch_resource(&resource_id).await {
                Ok(mut body) => {
                    if let Some(flagged) = payload::flag_incomplete(&resource_id, &mut body) {
                        state
                            .incomplete
                            .lock()
                            .expect("incomplete list lock poisoned")
                            .push(flagged);
                    }
                    payload::annotate(&resource_id, &mut body);
                    state
                        .cache
                        .lock()
                        .expect("resource cache lock poisoned")
                        .insert(resource_id.clone(), body);
                    self.ledger.absorb_retry_success(&resource_id);
                    recovered += 1;
                    info!("Recovered resource {resource_id} on retry");
                }
                Err(e) => {
                    if e.as_fatal().is_some() {
                        warn!("Stopping retry pass: {e}");
                        break;
                    }
                    let kind = e.kind().unwrap_or(ErrorKind::Other);
                    if kind == ErrorKind::Other {
                        self.ledger
                            .record_resource_with_detail(kind, &resource_id, &e.to_string());
                    } else {
                        self.ledger.record_resource(kind, &resource_id);
                    }
                    warn!("Retry failed for resource {resource_id}: {e}");
                }
            }
        }

        if recovered > 0 {
            info!("Retry pass recovered {recovered}/{total} resources");
        }
        if recovered < total {
            warn!("Retry pass left {}/{total} resources failed", total - recovered);
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn associate_keeps_reference_order_and_drops_missing() {
        let mut owner_references = BTreeMap::new();
        owner_references.insert(
            "owner-a".to_string(),
            vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
        );

        let mut cache = BTreeMap::new();
        cache.insert("m1".to_string(), json!({}));
        cache.insert("m3".to_string(), json!({}));

        let owners = associate(&owner_references, &cache);
        let record = &owners["owner-a"];
        assert_eq!(record.reference_ids, vec!["m1", "m2", "m3"]);
        assert_eq!(record.resource_ids, vec!["m1", "m3"]);
    }

    #[test]
    fn associate_shares_cached_resources_between_owners() {
        let mut owner_references = BTreeMap::new();
        owner_references.insert("owner-a".to_string(), vec!["m2".to_string()]);
        owner_references.insert("owner-b".to_string(), vec!["m2".to_string()]);

        let mut cache = BTreeMap::new();
        cache.insert("m2".to_string(), json!({"info": {}}));

        let owners = associate(&owner_references, &cache);
        assert_eq!(owners["owner-a"].resource_ids, vec!["m2"]);
        assert_eq!(owners["owner-b"].resource_ids, vec!["m2"]);
    }

    #[test]
    fn associate_preserves_empty_owners() {
        let mut owner_references = BTreeMap::new();
        owner_references.insert("owner-a".to_string(), Vec::new());

        let owners = associate(&owner_references, &BTreeMap::new());
        assert!(owners["owner-a"].reference_ids.is_empty());
        assert!(owners["owner-a"].resource_ids.is_empty());
    }
}
