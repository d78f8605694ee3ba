//! End-to-end report: aggregate, then render.

use crate::aggregate::MetadataAggregator;
use crate::config::ReportPlan;
use crate::error::InventoryError;
use crate::provider::SourceFactory;
use crate::record::InstanceRecord;
use crate::table::Table;

/// Aggregated records and the table rendered from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub records: Vec<InstanceRecord>,
    pub table: Table,
}

impl ReportPlan {
    /// Fetch every unit of the plan and render the sorted table.
    ///
    /// # Errors
    ///
    /// Any failing unit aborts the run; no partial report is produced.
    pub async fn run<F: SourceFactory>(
        &self,
        aggregator: &mut MetadataAggregator<F>,
    ) -> Result<Report, InventoryError> {
        let records = aggregator
            .aggregate(&self.scope, &self.filter, self.strict)
            .await?;
        let table = Table::render(&records, &self.columns, &self.sort_by)?;
        Ok(Report { records, table })
    }
}
