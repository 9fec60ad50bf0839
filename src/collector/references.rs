//! Reference gathering: one paged listing pass per owner.

use log::{debug, error, info, warn};

use crate::client::{ReferenceLister, ResourceFetcher};
use crate::config::PHASE1_PROGRESS_EVERY;
use crate::error_handling::{CollectorError, ErrorKind};

use super::{DedupCollector, RunState};

impl<L, F> DedupCollector<L, F>
where
    L: ReferenceLister,
    F: ResourceFetcher + 'static,
{
    /// Gather every owner's reference list, sequentially and paged.
    ///
    /// Owners whose listing fails keep an empty reference list and are
    /// recorded in the ledger by owner ID. Only a dead credential, an open
    /// circuit, or an interrupt aborts the pass; the caller persists the
    /// partial state before surfacing those.
    pub(super) async fn gather_references(
        &self,
        state: &mut RunState,
        owners: &[String],
    ) -> Result<(), CollectorError> {
        info!("Gathering references for {} owners...", owners.len());

        for (index, owner) in owners.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                warn!("Collection interrupted during reference gathering");
                return Err(CollectorError::Interrupted);
            }

            let references = match self.list_all_references(owner).await {
                Ok(references) => references,
                Err(ListingFailure::Fatal(fatal)) => {
                    state.owner_references.insert(owner.clone(), Vec::new());
                    return Err(fatal);
                }
                Err(ListingFailure::Recorded) => {
                    state.owner_references.insert(owner.clone(), Vec::new());
                    continue;
                }
            };

            if references.is_empty() {
                debug!("Owner {owner} has no references in the requested window");
                state.owner_references.insert(owner.clone(), Vec::new());
                state.owners_with_no_references.push(owner.clone());
                self.ledger.record_owner(ErrorKind::NotFound, owner);
            } else {
                state.owner_references.insert(owner.clone(), references);
            }

            if (index + 1) % PHASE1_PROGRESS_EVERY == 0 {
                info!("Gathered references for {}/{} owners", index + 1, owners.len());
            }
        }

        info!(
            "Reference gathering complete: {} owners, {} with no references",
            owners.len(),
            state.owners_with_no_references.len()
        );
        Ok(())
    }

    /// Page through one owner's full reference history.
    async fn list_all_references(&self, owner: &str) -> Result<Vec<String>, ListingFailure> {
        let mut references = Vec::new();
        let mut start = 0;

        loop {
            let page = match self
                .lister
                .list_references(
                    owner,
                    start,
                    self.options.page_size,
                    self.options.time_window.as_ref(),
                )
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    if let Some(fatal) = e.as_fatal() {
                        error!("Aborting reference gathering at owner {owner}: {e}");
                        return Err(ListingFailure::Fatal(fatal));
                    }
                    let kind = e.kind().unwrap_or(ErrorKind::Other);
                    self.ledger.record_owner(kind, owner);
                    warn!("Failed to list references for owner {owner}: {e}");
                    return Err(ListingFailure::Recorded);
                }
            };

            let page_len = page.len();
            references.extend(page);
            if page_len < self.options.page_size {
                break;
            }
            start += page_len;
        }

        Ok(references)
    }
}

/// Why one owner's listing produced no references.
enum ListingFailure {
    /// Recorded in the ledger; the pass continues with the next owner.
    Recorded,
    /// Ends the whole pass.
    Fatal(CollectorError),
}
