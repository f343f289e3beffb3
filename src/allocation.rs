//! Ordered set of selected beneficiaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a cause or collective as issued by the backend.
pub type BeneficiaryId = String;

/// What a beneficiary reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeneficiaryKind {
    /// A single nonprofit.
    Cause,
    /// A named group of causes selectable as one unit.
    Collective,
}

impl fmt::Display for BeneficiaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cause => f.write_str("cause"),
            Self::Collective => f.write_str("collective"),
        }
    }
}

/// A selected cause or collective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryRef {
    /// Backend id.
    pub id: BeneficiaryId,
    /// Cause or collective.
    pub kind: BeneficiaryKind,
    /// Collective through which the donor found this cause, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributed_collective_id: Option<BeneficiaryId>,
}

impl BeneficiaryRef {
    /// A directly selected cause.
    pub fn cause(id: impl Into<BeneficiaryId>) -> Self {
        Self {
            id: id.into(),
            kind: BeneficiaryKind::Cause,
            attributed_collective_id: None,
        }
    }

    /// A cause selected from within a collective's page.
    pub fn attributed_cause(id: impl Into<BeneficiaryId>, collective: impl Into<BeneficiaryId>) -> Self {
        Self {
            id: id.into(),
            kind: BeneficiaryKind::Cause,
            attributed_collective_id: Some(collective.into()),
        }
    }

    /// A collective selected as a whole.
    pub fn collective(id: impl Into<BeneficiaryId>) -> Self {
        Self {
            id: id.into(),
            kind: BeneficiaryKind::Collective,
            attributed_collective_id: None,
        }
    }

    /// Whether this reference has the given identity.
    pub fn matches(&self, id: &str, kind: BeneficiaryKind) -> bool {
        self.kind == kind && self.id == id
    }
}

/// Local set invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The `(id, kind)` pair is already selected.
    #[error("{kind} {id} is already selected")]
    DuplicateBeneficiary {
        /// Offending id.
        id: BeneficiaryId,
        /// Offending kind.
        kind: BeneficiaryKind,
    },
    /// The `(id, kind)` pair is not selected.
    #[error("{kind} {id} is not selected")]
    NotFound {
        /// Missing id.
        id: BeneficiaryId,
        /// Missing kind.
        kind: BeneficiaryKind,
    },
}

/// Beneficiaries in selection order, unique by `(id, kind)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationSet {
    entries: Vec<BeneficiaryRef>,
}

impl AllocationSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `beneficiary` unless its `(id, kind)` is already present.
    pub fn add(&mut self, beneficiary: BeneficiaryRef) -> Result<(), AllocationError> {
        if self.contains(&beneficiary.id, beneficiary.kind) {
            return Err(AllocationError::DuplicateBeneficiary {
                id: beneficiary.id,
                kind: beneficiary.kind,
            });
        }
        self.entries.push(beneficiary);
        Ok(())
    }

    /// Removes and returns the entry for `(id, kind)`.
    pub fn remove(&mut self, id: &str, kind: BeneficiaryKind) -> Result<BeneficiaryRef, AllocationError> {
        match self.entries.iter().position(|entry| entry.matches(id, kind)) {
            Some(index) => Ok(self.entries.remove(index)),
            None => Err(AllocationError::NotFound {
                id: id.to_string(),
                kind,
            }),
        }
    }

    /// Number of top-level entries; a collective counts once.
    pub fn count(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether `(id, kind)` is selected.
    pub fn contains(&self, id: &str, kind: BeneficiaryKind) -> bool {
        self.entries.iter().any(|entry| entry.matches(id, kind))
    }

    /// Entries in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &BeneficiaryRef> {
        self.entries.iter()
    }

    /// Ids of selected causes, in selection order.
    pub fn cause_ids(&self) -> Vec<BeneficiaryId> {
        self.ids_of(BeneficiaryKind::Cause)
    }

    /// Ids of selected collectives, in selection order.
    pub fn collective_ids(&self) -> Vec<BeneficiaryId> {
        self.ids_of(BeneficiaryKind::Collective)
    }

    fn ids_of(&self, kind: BeneficiaryKind) -> Vec<BeneficiaryId> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.id.clone())
            .collect()
    }
}

impl FromIterator<BeneficiaryRef> for AllocationSet {
    /// Collects references, silently keeping the first of any duplicates.
    fn from_iter<I: IntoIterator<Item = BeneficiaryRef>>(iter: I) -> Self {
        let mut set = Self::new();
        for beneficiary in iter {
            let _ = set.add(beneficiary);
        }
        set
    }
}
