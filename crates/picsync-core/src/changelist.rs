//! Changelist diffs and product-info replies
//!
//! Both are ephemeral: a diff only lives for the duration of one poll and a
//! reply only until it is routed to its requester or dispatched.

use crate::types::{AppId, ChangeNumber, EntityRef, PackageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ----------------------------------------------------------------------------
// Changelist Diff
// ----------------------------------------------------------------------------

/// One entity named in a changelist diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity: EntityRef,
    /// Change number the platform reports for this entity
    pub change_number: ChangeNumber,
}

/// Result of one "changes since" poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelistDiff {
    pub current_change_number: ChangeNumber,
    #[serde(default)]
    pub app_changes: BTreeMap<AppId, ChangeNumber>,
    #[serde(default)]
    pub package_changes: BTreeMap<PackageId, ChangeNumber>,
}

impl ChangelistDiff {
    pub fn new(current_change_number: ChangeNumber) -> Self {
        Self {
            current_change_number,
            ..Self::default()
        }
    }

    pub fn with_app(mut self, app: AppId, change_number: ChangeNumber) -> Self {
        self.app_changes.insert(app, change_number);
        self
    }

    pub fn with_package(mut self, package: PackageId, change_number: ChangeNumber) -> Self {
        self.package_changes.insert(package, change_number);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.app_changes.is_empty() && self.package_changes.is_empty()
    }

    pub fn app_ids(&self) -> Vec<AppId> {
        self.app_changes.keys().copied().collect()
    }

    pub fn package_ids(&self) -> Vec<PackageId> {
        self.package_changes.keys().copied().collect()
    }

    /// Apps first, then packages, each in ascending id order
    pub fn entity_changes(&self) -> impl Iterator<Item = EntityChange> + '_ {
        let apps = self.app_changes.iter().map(|(id, cn)| EntityChange {
            entity: EntityRef::App(*id),
            change_number: *cn,
        });
        let packages = self.package_changes.iter().map(|(id, cn)| EntityChange {
            entity: EntityRef::Package(*id),
            change_number: *cn,
        });
        apps.chain(packages)
    }
}

// ----------------------------------------------------------------------------
// Product Info Reply
// ----------------------------------------------------------------------------

/// Metadata for a single entity as returned by the platform
///
/// The payload is opaque to the orchestration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub change_number: ChangeNumber,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ProductInfo {
    pub fn new(change_number: ChangeNumber, payload: serde_json::Value) -> Self {
        Self {
            change_number,
            payload,
        }
    }
}

/// Reply to a product-info request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfoReply {
    #[serde(default)]
    pub apps: BTreeMap<AppId, ProductInfo>,
    #[serde(default)]
    pub packages: BTreeMap<PackageId, ProductInfo>,
    /// Apps the platform could not resolve
    #[serde(default)]
    pub unknown_apps: Vec<AppId>,
    /// Packages the platform could not resolve
    #[serde(default)]
    pub unknown_packages: Vec<PackageId>,
}

impl ProductInfoReply {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
            && self.packages.is_empty()
            && self.unknown_apps.is_empty()
            && self.unknown_packages.is_empty()
    }

    pub fn known_count(&self) -> usize {
        self.apps.len() + self.packages.len()
    }
}
