//! Per-entity processor interface

use crate::{
    changelist::ProductInfo,
    errors::ProcessingError,
    types::{AppId, EntityRef},
};

/// Business processing of one entity's metadata
///
/// Invoked concurrently for distinct entities; implementations must tolerate
/// that. Failures are reported per call and never retried by the caller.
#[async_trait::async_trait]
pub trait EntityProcessor: Send + Sync {
    async fn process(&self, entity: EntityRef, info: ProductInfo) -> Result<(), ProcessingError>;

    /// Handle an app id the platform could not resolve
    async fn process_unknown(&self, app: AppId) -> Result<(), ProcessingError>;
}
