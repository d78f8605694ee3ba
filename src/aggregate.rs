//! Fan-out of instance fetches across profiles and regions.

use serde_json::Value;
use tracing::{info, warn};

use crate::error::InventoryError;
use crate::fetch::fetch_all;
use crate::filter::FetchFilter;
use crate::provider::SourceFactory;
use crate::record::{InstanceRecord, PROFILE_FIELD, REGION_FIELD};
use crate::tags::normalize_tags;

/// A single (profile, region) fetch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit<'a> {
    /// Zero-based position in iteration order.
    pub index: usize,
    /// Total number of units in the scope.
    pub total: usize,
    pub profile: &'a str,
    pub region: &'a str,
}

/// The cross-product of profiles and regions, profiles outermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationScope {
    profiles: Vec<String>,
    regions: Vec<String>,
}

impl AggregationScope {
    pub fn new(profiles: Vec<String>, regions: Vec<String>) -> Self {
        Self { profiles, regions }
    }

    pub fn len(&self) -> usize {
        self.profiles.len() * self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate units in their fixed order.
    pub fn units(&self) -> impl Iterator<Item = FetchUnit<'_>> {
        let total = self.len();
        self.profiles
            .iter()
            .flat_map(move |profile| self.regions.iter().map(move |region| (profile, region)))
            .enumerate()
            .map(move |(index, (profile, region))| FetchUnit {
                index,
                total,
                profile,
                region,
            })
    }
}

/// Drives [`fetch_all`] over every unit of an [`AggregationScope`].
pub struct MetadataAggregator<F> {
    factory: F,
    progress: Option<Box<dyn FnMut(&FetchUnit<'_>) + Send>>,
}

impl<F: SourceFactory> MetadataAggregator<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            progress: None,
        }
    }

    /// Call `progress` before each unit starts.
    pub fn on_unit(mut self, progress: impl FnMut(&FetchUnit<'_>) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Collect instance records from every unit in `scope`.
    ///
    /// In strict mode the provider applies `filter`; otherwise every instance
    /// is fetched and `filter` is ignored. Records are never filtered locally.
    /// Each record gets its tags normalized and `Region` / `SourceProfile`
    /// set to its origin unit.
    ///
    /// # Errors
    ///
    /// The first failing unit aborts the whole aggregation with an
    /// `InventoryError::Unit` naming its profile and region.
    pub async fn aggregate(
        &mut self,
        scope: &AggregationScope,
        filter: &FetchFilter,
        strict: bool,
    ) -> Result<Vec<InstanceRecord>, InventoryError> {
        let unit_filter = if strict {
            filter.clone()
        } else {
            FetchFilter::None
        };
        let mut records = Vec::new();

        for unit in scope.units() {
            if let Some(progress) = self.progress.as_mut() {
                progress(&unit);
            }

            let batch = self
                .fetch_unit(unit.profile, unit.region, &unit_filter)
                .await
                .map_err(|err| {
                    warn!(profile = unit.profile, region = unit.region, error = %err, "fetch failed");
                    err.in_unit(unit.profile, unit.region)
                })?;

            info!(
                profile = unit.profile,
                region = unit.region,
                instances = batch.len(),
                "fetched unit {}/{}",
                unit.index + 1,
                unit.total
            );
            records.extend(batch);
        }

        Ok(records)
    }

    async fn fetch_unit(
        &self,
        profile: &str,
        region: &str,
        filter: &FetchFilter,
    ) -> Result<Vec<InstanceRecord>, InventoryError> {
        let source = self.factory.connect(profile, region).await?;
        let mut batch = fetch_all(&source, filter).await?;
        for record in &mut batch {
            normalize_tags(record);
            record.insert(REGION_FIELD, Value::String(region.to_string()));
            record.insert(PROFILE_FIELD, Value::String(profile.to_string()));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::{page, PagedSource};
    use crate::provider::InstancePage;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Hands out canned pages per (profile, region) and logs every connect.
    #[derive(Default)]
    struct FakeFactory {
        pages: HashMap<(String, String), Vec<InstancePage>>,
        failing: Option<(String, String)>,
        connects: Mutex<Vec<(String, String)>>,
    }

    impl FakeFactory {
        fn with_unit(mut self, profile: &str, region: &str, pages: Vec<InstancePage>) -> Self {
            self.pages
                .insert((profile.to_string(), region.to_string()), pages);
            self
        }

        fn failing_at(mut self, profile: &str, region: &str) -> Self {
            self.failing = Some((profile.to_string(), region.to_string()));
            self
        }
    }

    #[async_trait::async_trait]
    impl SourceFactory for &FakeFactory {
        type Source = PagedSource;

        async fn connect(&self, profile: &str, region: &str) -> Result<PagedSource, InventoryError> {
            let key = (profile.to_string(), region.to_string());
            self.connects.lock().unwrap().push(key.clone());
            if self.failing.as_ref() == Some(&key) {
                return Err(InventoryError::Provider {
                    status: 403,
                    code: "UnauthorizedOperation".to_string(),
                    message: "denied".to_string(),
                });
            }
            let pages = self
                .pages
                .get(&key)
                .cloned()
                .unwrap_or_else(|| vec![InstancePage::default()]);
            Ok(PagedSource::new(pages))
        }
    }

    fn scope(profiles: &[&str], regions: &[&str]) -> AggregationScope {
        AggregationScope::new(
            profiles.iter().map(|s| s.to_string()).collect(),
            regions.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_scope_units_profiles_outer() {
        let scope = scope(&["a", "b"], &["x", "y"]);
        let units: Vec<_> = scope.units().map(|u| (u.profile, u.region)).collect();
        assert_eq!(units, [("a", "x"), ("a", "y"), ("b", "x"), ("b", "y")]);
        assert_eq!(scope.len(), 4);
        assert!(scope.units().all(|u| u.total == 4));
    }

    #[test]
    fn test_empty_scope() {
        assert!(scope(&["a"], &[]).is_empty());
        assert_eq!(scope(&["a"], &[]).units().count(), 0);
    }

    #[tokio::test]
    async fn test_aggregate_cross_product_with_provenance() {
        let factory = FakeFactory::default()
            .with_unit("a", "x", vec![page(&[&["i-ax1", "i-ax2"]], None)])
            .with_unit("a", "y", vec![page(&[&["i-ay1"]], Some("t")), page(&[&["i-ay2"]], None)])
            .with_unit("b", "x", vec![page(&[], None)])
            .with_unit("b", "y", vec![page(&[&["i-by1"]], None)]);

        let mut aggregator = MetadataAggregator::new(&factory);
        let records = aggregator
            .aggregate(&scope(&["a", "b"], &["x", "y"]), &FetchFilter::None, false)
            .await
            .unwrap();

        assert_eq!(factory.connects.lock().unwrap().len(), 4);
        assert_eq!(records.len(), 5);

        let origins: Vec<(String, String, String)> = records
            .iter()
            .map(|r| {
                (
                    r.get("InstanceId").unwrap().as_str().unwrap().to_string(),
                    r.get("SourceProfile").unwrap().as_str().unwrap().to_string(),
                    r.get("Region").unwrap().as_str().unwrap().to_string(),
                )
            })
            .collect();
        for (id, profile, region) in &origins {
            assert_eq!(id, &format!("i-{}{}{}", profile, region, &id[id.len() - 1..]));
        }
    }

    #[tokio::test]
    async fn test_aggregate_normalizes_tags() {
        let mut raw = page(&[&["i-1"]], None);
        raw.reservations[0].instances[0].insert(
            "Tags",
            json!([{"Key": "team", "Value": "infra"}]),
        );
        let factory = FakeFactory::default().with_unit("p", "r", vec![raw]);

        let records = MetadataAggregator::new(&factory)
            .aggregate(&scope(&["p"], &["r"]), &FetchFilter::None, false)
            .await
            .unwrap();

        assert_eq!(records[0].get("Tags"), Some(&json!({"team": "infra"})));
    }

    #[tokio::test]
    async fn test_filter_only_sent_in_strict_mode() {
        let filter = FetchFilter::ByKeyAndValue("team".into(), "infra".into());

        struct Recording(Arc<Mutex<Vec<FetchFilter>>>);
        struct RecordingSource(Arc<Mutex<Vec<FetchFilter>>>);

        #[async_trait::async_trait]
        impl crate::provider::InstanceSource for RecordingSource {
            async fn describe_instances(
                &self,
                request: &crate::provider::DescribeInstancesRequest,
            ) -> Result<InstancePage, InventoryError> {
                self.0.lock().unwrap().push(request.filter.clone());
                Ok(InstancePage::default())
            }
        }

        #[async_trait::async_trait]
        impl SourceFactory for Recording {
            type Source = RecordingSource;

            async fn connect(&self, _: &str, _: &str) -> Result<RecordingSource, InventoryError> {
                Ok(RecordingSource(self.0.clone()))
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aggregator = MetadataAggregator::new(Recording(seen.clone()));
        let scope = scope(&["p"], &["r"]);

        aggregator.aggregate(&scope, &filter, false).await.unwrap();
        aggregator.aggregate(&scope, &filter, true).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![FetchFilter::None, filter]);
    }

    #[tokio::test]
    async fn test_failing_unit_aborts_run() {
        let factory = FakeFactory::default()
            .with_unit("a", "x", vec![page(&[&["i-1"]], None)])
            .failing_at("a", "y");

        let result = MetadataAggregator::new(&factory)
            .aggregate(&scope(&["a", "b"], &["x", "y"]), &FetchFilter::None, false)
            .await;

        match result {
            Err(InventoryError::Unit {
                profile, region, ..
            }) => {
                assert_eq!(profile, "a");
                assert_eq!(region, "y");
            }
            other => panic!("expected unit error, got {:?}", other),
        }
        // Units after the failure are never started.
        assert_eq!(factory.connects.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_reports_each_unit() {
        let factory = FakeFactory::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        MetadataAggregator::new(&factory)
            .on_unit(move |unit| {
                sink.lock()
                    .unwrap()
                    .push(format!("{}/{} {}/{}", unit.index + 1, unit.total, unit.region, unit.profile));
            })
            .aggregate(&scope(&["a"], &["x", "y"]), &FetchFilter::None, false)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["1/2 x/a", "2/2 y/a"]);
    }
}
