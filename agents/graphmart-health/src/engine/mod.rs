//! Health engine
//!
//! Status classification, readiness polling, aggregation and continuous
//! monitoring over an external status fetcher. Artifacts are always checked
//! one at a time, in the order given.

mod aggregator;
mod classifier;
mod monitor;
mod poller;

pub use aggregator::*;
pub use classifier::*;
pub use monitor::*;
pub use poller::*;

use crate::contracts::{ArtifactId, RawStatus};
use crate::error::FetchResult;
use async_trait::async_trait;
use std::time::Duration;

/// Read access to artifact status on the remote service
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Short status token, e.g. `Online`
    async fn status(&self, id: &ArtifactId) -> FetchResult<String>;

    /// Detailed status with layer and step records
    async fn status_detail(&self, id: &ArtifactId) -> FetchResult<RawStatus>;

    /// Display title
    async fn title(&self, id: &ArtifactId) -> FetchResult<String>;
}

/// Lifecycle operations on an artifact
#[async_trait]
pub trait GraphmartController: Send + Sync {
    /// Reload all layers from source
    async fn reload(&self, id: &ArtifactId) -> FetchResult<()>;

    /// Refresh dirty layers only
    async fn refresh(&self, id: &ArtifactId) -> FetchResult<()>;
}

/// Authenticated round-trip used as a proxy for directory-service health
#[async_trait]
pub trait AuthProbe: Send + Sync {
    /// Perform one authenticated request and return its latency
    async fn probe_auth(&self) -> FetchResult<Duration>;
}
