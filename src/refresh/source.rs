//! The external data source the scheduler refreshes from

use crate::location::Location;
use async_trait::async_trait;

/// Remote store of location records.
///
/// Implementations may fail with any error; failures are retried by the
/// scheduler and classified by the error handler. Fetch calls are expected
/// to carry their own timeout.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Fetch a single location by id
    async fn fetch_location(&self, id: &str) -> anyhow::Result<Location>;

    /// Fetch every location
    async fn fetch_all_locations(&self) -> anyhow::Result<Vec<Location>>;
}
