//! Tabular EC2 instance metadata reports across AWS profiles and regions.
//!
//! Instances are fetched for every (profile, region) pair, following
//! pagination, and kept as untyped nested records. Tags are normalized into
//! a map and each record is stamped with the `Region` and `SourceProfile` it
//! came from. A column map turns records into rows: a fixed set of columns
//! plus any number of user-supplied dot paths into the record.
//!
//! # Example
//!
//! ```ignore
//! use ec2_inventory::{
//!     ArbitraryPaths, Ec2ClientFactory, InventoryError, MetadataAggregator, ReportConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), InventoryError> {
//!     let config = ReportConfig {
//!         regions: vec!["us-east-1".into(), "eu-west-1".into()],
//!         tag_key: "team".into(),
//!         paths: ArbitraryPaths::Many(vec!["Placement.AvailabilityZone".into()]),
//!         ..ReportConfig::default()
//!     };
//!
//!     // Validates paths and the sort column before any request is sent.
//!     let plan = config.plan()?;
//!
//!     let mut aggregator = MetadataAggregator::new(Ec2ClientFactory::new());
//!     let report = plan.run(&mut aggregator).await?;
//!     println!("{}", report.table);
//!     Ok(())
//! }
//! ```
//!
//! # Column paths
//!
//! | Path | Reads |
//! |------|-------|
//! | `Placement.AvailabilityZone` | `record["Placement"]["AvailabilityZone"]` |
//! | `NetworkInterfaces.0.Association.PublicIp` | first interface's public IP |
//! | `Tags.Name` | value of the `Name` tag |
//!
//! Cells that cannot be resolved render as `unknown`.

mod aggregate;
mod client;
mod columns;
mod config;
mod credentials;
mod error;
mod fetch;
mod filter;
mod path;
mod provider;
mod providers;
mod record;
mod report;
mod table;
mod tags;

pub use aggregate::{AggregationScope, FetchUnit, MetadataAggregator};
pub use client::{
    default_endpoint, service_endpoint, Ec2Client, Ec2ClientFactory, QueryClient, DEFAULT_TIMEOUT,
};
pub use columns::{tag_label, ArbitraryPaths, ColumnMap};
pub use config::{comma_list, parse_regions, ReportConfig, ReportPlan, ALL_REGIONS};
pub use credentials::{
    load_credentials, run_credential_process, AssumeRoleConfig, CredentialFiles,
    CredentialResolver, CredentialSource, Credentials,
};
pub use error::InventoryError;
pub use fetch::fetch_all;
pub use filter::FetchFilter;
pub use path::{ColumnPath, PathSegment, UNKNOWN};
pub use provider::{
    DescribeInstancesRequest, InstancePage, InstanceSource, Reservation, SourceFactory,
};
pub use record::{InstanceRecord, PROFILE_FIELD, REGION_FIELD, TAGS_FIELD};
pub use report::Report;
pub use table::{compare_values, Table};
pub use tags::normalize_tags;
