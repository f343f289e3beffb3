//! Explicit expansion of collectives into their member causes.
//!
//! A selected collective occupies one slot while the donor edits.  Before a
//! box is created its member causes must be known so the payout payload can
//! list every cause.  Expansion is a separate, observable step with its own
//! loading/error state instead of a hidden fetch during submission.

use crate::allocation::{AllocationSet, BeneficiaryId, BeneficiaryKind};
use crate::collaborator::{BeneficiaryPayload, CollaboratorError, DonationCollaborator};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Where a collective's expansion stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ExpansionState {
    /// A fetch is outstanding.
    Loading,
    /// Member cause ids, in backend order.
    Ready(Vec<BeneficiaryId>),
    /// The last fetch failed; calling `expand` again retries.
    Failed(String),
}

/// A payload could not be built because a collective is not expanded yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("collective {collective_id} has not been expanded")]
pub struct ExpansionPending {
    /// Collective lacking member causes.
    pub collective_id: BeneficiaryId,
}

/// Per-session cache of collective expansions.
#[derive(Debug, Clone, Default)]
pub struct CollectiveCache {
    entries: HashMap<BeneficiaryId, ExpansionState>,
}

impl CollectiveCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `collective_id`, if it was ever requested.
    pub fn state(&self, collective_id: &str) -> Option<&ExpansionState> {
        self.entries.get(collective_id)
    }

    /// Member causes when expansion has completed.
    pub fn causes(&self, collective_id: &str) -> Option<&[BeneficiaryId]> {
        match self.entries.get(collective_id) {
            Some(ExpansionState::Ready(causes)) => Some(causes),
            _ => None,
        }
    }

    /// Records an expansion obtained elsewhere.
    pub fn insert(&mut self, collective_id: impl Into<BeneficiaryId>, causes: Vec<BeneficiaryId>) {
        self.entries
            .insert(collective_id.into(), ExpansionState::Ready(causes));
    }

    /// Fetches member causes for `collective_id` unless already cached.
    pub async fn expand(
        &mut self,
        collective_id: &str,
        collaborator: &dyn DonationCollaborator,
    ) -> Result<Vec<BeneficiaryId>, CollaboratorError> {
        if let Some(causes) = self.causes(collective_id) {
            return Ok(causes.to_vec());
        }
        self.entries
            .insert(collective_id.to_string(), ExpansionState::Loading);
        match collaborator.get_collective_by_id(collective_id).await {
            Ok(detail) => {
                let causes: Vec<BeneficiaryId> =
                    detail.causes.into_iter().map(|cause| cause.id).collect();
                debug!(collective_id, causes = causes.len(), "collective expanded");
                self.entries.insert(
                    collective_id.to_string(),
                    ExpansionState::Ready(causes.clone()),
                );
                Ok(causes)
            }
            Err(err) => {
                warn!(collective_id, error = %err, "collective expansion failed");
                self.entries.insert(
                    collective_id.to_string(),
                    ExpansionState::Failed(err.to_string()),
                );
                Err(err)
            }
        }
    }

    /// Expands every collective in `set`, stopping at the first failure.
    pub async fn expand_all(
        &mut self,
        set: &AllocationSet,
        collaborator: &dyn DonationCollaborator,
    ) -> Result<(), CollaboratorError> {
        for collective_id in set.collective_ids() {
            self.expand(&collective_id, collaborator).await?;
        }
        Ok(())
    }

    /// Number of causes `set` pays out to once collectives are expanded.
    ///
    /// Unexpanded collectives count as one.
    pub fn expanded_count(&self, set: &AllocationSet) -> u32 {
        set.iter()
            .map(|entry| match entry.kind {
                BeneficiaryKind::Cause => 1,
                BeneficiaryKind::Collective => self.weight_of(&entry.id),
            })
            .fold(0u32, u32::saturating_add)
    }

    /// Slots a collective occupies when counting expanded causes.
    pub fn weight_of(&self, collective_id: &str) -> u32 {
        self.causes(collective_id)
            .map(|causes| u32::try_from(causes.len()).unwrap_or(u32::MAX).max(1))
            .unwrap_or(1)
    }

    /// Builds the payout payload for `set`.
    ///
    /// Direct causes come first in selection order, followed by each
    /// collective's member causes attributed to that collective.  A cause id
    /// appears once; the first occurrence wins.
    pub fn beneficiary_payload(
        &self,
        set: &AllocationSet,
    ) -> Result<Vec<BeneficiaryPayload>, ExpansionPending> {
        let mut seen = HashSet::new();
        let mut payload = Vec::new();
        for entry in set.iter().filter(|e| e.kind == BeneficiaryKind::Cause) {
            if seen.insert(entry.id.clone()) {
                payload.push(BeneficiaryPayload {
                    cause_id: entry.id.clone(),
                    attributed_collective_id: entry.attributed_collective_id.clone(),
                });
            }
        }
        for entry in set.iter().filter(|e| e.kind == BeneficiaryKind::Collective) {
            let causes = self.causes(&entry.id).ok_or_else(|| ExpansionPending {
                collective_id: entry.id.clone(),
            })?;
            for cause_id in causes {
                if seen.insert(cause_id.clone()) {
                    payload.push(BeneficiaryPayload {
                        cause_id: cause_id.clone(),
                        attributed_collective_id: Some(entry.id.clone()),
                    });
                }
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::BeneficiaryRef;
    use crate::testing::InMemoryCollaborator;

    fn ids(list: &[&str]) -> Vec<BeneficiaryId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn payload_dedups_by_cause_id() {
        let mut cache = CollectiveCache::new();
        cache.insert("k1", ids(&["c1", "c2", "c3"]));
        let set: AllocationSet = vec![
            BeneficiaryRef::cause("c2"),
            BeneficiaryRef::collective("k1"),
        ]
        .into_iter()
        .collect();
        let payload = cache.beneficiary_payload(&set).unwrap();
        let causes: Vec<_> = payload.iter().map(|p| p.cause_id.as_str()).collect();
        assert_eq!(causes, vec!["c2", "c1", "c3"]);
        assert_eq!(payload[0].attributed_collective_id, None);
        assert_eq!(payload[1].attributed_collective_id.as_deref(), Some("k1"));
    }

    #[test]
    fn payload_requires_expansion() {
        let cache = CollectiveCache::new();
        let set: AllocationSet = vec![BeneficiaryRef::collective("k9")].into_iter().collect();
        let err = cache.beneficiary_payload(&set).unwrap_err();
        assert_eq!(err.collective_id, "k9");
    }

    #[test]
    fn expanded_count_weighs_known_collectives() {
        let mut cache = CollectiveCache::new();
        cache.insert("k1", ids(&["c1", "c2", "c3"]));
        let set: AllocationSet = vec![
            BeneficiaryRef::cause("c9"),
            BeneficiaryRef::collective("k1"),
            BeneficiaryRef::collective("k2"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.count(), 3);
        assert_eq!(cache.expanded_count(&set), 5);
    }

    #[tokio::test]
    async fn expand_caches_and_records_failures() {
        let backend = InMemoryCollaborator::new();
        backend.add_collective("k1", &["c1", "c2"]);
        let mut cache = CollectiveCache::new();

        let causes = cache.expand("k1", &backend).await.unwrap();
        assert_eq!(causes, ids(&["c1", "c2"]));
        assert_eq!(backend.calls("get_collective_by_id"), 1);
        cache.expand("k1", &backend).await.unwrap();
        assert_eq!(backend.calls("get_collective_by_id"), 1);

        assert!(cache.expand("missing", &backend).await.is_err());
        assert!(matches!(
            cache.state("missing"),
            Some(ExpansionState::Failed(_))
        ));
    }
}
