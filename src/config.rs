//! Report parameters and their validation.

use crate::aggregate::AggregationScope;
use crate::columns::{tag_label, ArbitraryPaths, ColumnMap};
use crate::error::InventoryError;
use crate::filter::FetchFilter;

/// Regions queried when `all` is requested.
pub const ALL_REGIONS: &[&str] = &[
    "ap-south-1",
    "eu-west-3",
    "eu-west-2",
    "eu-west-1",
    "ap-northeast-2",
    "ap-northeast-1",
    "sa-east-1",
    "ca-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "eu-central-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// Region queried when none is given.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Tag key displayed (and filtered on in strict mode) when none is given.
pub const DEFAULT_TAG_KEY: &str = "ops_group";

/// Split a comma-delimited list, dropping whitespace and empty entries.
pub fn comma_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|item| item.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Expand a region argument: `all` or a comma-delimited list.
pub fn parse_regions(input: &str) -> Vec<String> {
    if input.trim() == "all" {
        ALL_REGIONS.iter().map(|r| r.to_string()).collect()
    } else {
        comma_list(input)
    }
}

/// Validated parameters of one report run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub profiles: Vec<String>,
    pub regions: Vec<String>,
    pub tag_key: String,
    pub tag_value: Option<String>,
    pub strict: bool,
    pub paths: ArbitraryPaths,
    /// Column to sort by; the tag column when unset.
    pub sort_by: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            profiles: vec![crate::credentials::DEFAULT_PROFILE.to_string()],
            regions: vec![DEFAULT_REGION.to_string()],
            tag_key: DEFAULT_TAG_KEY.to_string(),
            tag_value: None,
            strict: false,
            paths: ArbitraryPaths::None,
            sort_by: None,
        }
    }
}

/// Everything derived from a [`ReportConfig`] before any request is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPlan {
    pub scope: AggregationScope,
    pub filter: FetchFilter,
    pub strict: bool,
    pub columns: ColumnMap,
    pub sort_by: String,
}

impl ReportConfig {
    /// Label of the column rows are sorted by.
    pub fn sort_label(&self) -> String {
        self.sort_by
            .clone()
            .unwrap_or_else(|| tag_label(&self.tag_key))
    }

    /// Validate the parameters and derive the scope, filter and column map.
    ///
    /// # Errors
    ///
    /// Fails with a validation error (`InvalidArgument`, `MalformedColumnSpec`
    /// or `UnknownSortColumn`) without touching the network.
    pub fn plan(&self) -> Result<ReportPlan, InventoryError> {
        if self.profiles.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "at least one profile is required".to_string(),
            ));
        }
        if self.regions.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "at least one region is required".to_string(),
            ));
        }

        let columns = ColumnMap::build(&self.tag_key, &self.paths)?;
        let sort_by = self.sort_label();
        if !columns.contains(&sort_by) {
            return Err(InventoryError::UnknownSortColumn(sort_by));
        }

        Ok(ReportPlan {
            scope: AggregationScope::new(self.profiles.clone(), self.regions.clone()),
            filter: FetchFilter::from_parts(Some(&self.tag_key), self.tag_value.as_deref()),
            strict: self.strict,
            columns,
            sort_by,
        })
    }
}
