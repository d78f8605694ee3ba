//! Provider seam: paginated instance sources and how to connect to them.

use async_trait::async_trait;

use crate::error::InventoryError;
use crate::filter::FetchFilter;
use crate::record::InstanceRecord;

/// One `DescribeInstances` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeInstancesRequest {
    pub filter: FetchFilter,
    /// Continuation token from the previous page.
    pub next_token: Option<String>,
}

impl DescribeInstancesRequest {
    pub fn new(filter: FetchFilter) -> Self {
        Self {
            filter,
            next_token: None,
        }
    }

    /// Same base query, continued at `token`.
    pub fn continued(&self, token: String) -> Self {
        Self {
            filter: self.filter.clone(),
            next_token: Some(token),
        }
    }
}

/// A group of instances launched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reservation {
    pub instances: Vec<InstanceRecord>,
}

/// One page of a `DescribeInstances` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstancePage {
    pub reservations: Vec<Reservation>,
    /// Present when more pages follow.
    pub next_token: Option<String>,
}

/// A paginated source of instance records for one profile and region.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    /// Fetch a single page.
    async fn describe_instances(
        &self,
        request: &DescribeInstancesRequest,
    ) -> Result<InstancePage, InventoryError>;
}

/// Builds an [`InstanceSource`] scoped to a profile and region.
///
/// Connecting may resolve credentials, which can involve network calls.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    type Source: InstanceSource;

    async fn connect(&self, profile: &str, region: &str) -> Result<Self::Source, InventoryError>;
}
