//! Boundary contracts implemented by collaborators.
//!
//! The core never fetches, reads mailboxes or touches disk: website scrapers
//! and newsletter segmentation are variant producers behind one capability,
//! and persistence is a sink that receives the finished result set.

use async_trait::async_trait;

use crate::domain::{CanonicalEvent, Fragment};
use crate::pipeline::RunStats;

/// Anything that can produce fragments with source context.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Human-readable name for logging and run summaries
    fn source_name(&self) -> &str;

    /// Supply the fragments this source retrieved. Fetch failures are the
    /// collaborator's concern; the core only ever sees retrieved fragments.
    async fn fetch_fragments(&self) -> anyhow::Result<Vec<Fragment>>;
}

/// Receives the finalized catalog and run statistics. Storage formats,
/// atomicity and versioning are the implementation's concern.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    async fn write_catalog(
        &self,
        events: &[CanonicalEvent],
        stats: &RunStats,
    ) -> anyhow::Result<()>;
}
