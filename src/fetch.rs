//! Paginated retrieval of every instance for one profile and region.

use tracing::debug;

use crate::error::InventoryError;
use crate::filter::FetchFilter;
use crate::provider::{DescribeInstancesRequest, InstanceSource};
use crate::record::InstanceRecord;

/// Fetch all instance records from `source`, following continuation tokens.
///
/// Instances from every reservation on every page are returned in the order
/// they were encountered. Pagination stops at the first page without a token.
///
/// # Errors
///
/// The first failing page aborts the call; records from earlier pages are
/// dropped. Nothing is retried.
pub async fn fetch_all<S>(
    source: &S,
    filter: &FetchFilter,
) -> Result<Vec<InstanceRecord>, InventoryError>
where
    S: InstanceSource + ?Sized,
{
    let mut request = DescribeInstancesRequest::new(filter.clone());
    let mut records = Vec::new();
    let mut pages = 0usize;

    loop {
        let page = source.describe_instances(&request).await?;
        pages += 1;

        let before = records.len();
        for reservation in page.reservations {
            records.extend(reservation.instances);
        }
        debug!(page = pages, instances = records.len() - before, "fetched page");

        match page.next_token {
            Some(token) => request = request.continued(token),
            None => break,
        }
    }

    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{InstancePage, Reservation};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves canned pages in order and records every request it saw.
    pub(crate) struct PagedSource {
        pages: Vec<Result<InstancePage, InventoryError>>,
        pub(crate) requests: Mutex<Vec<DescribeInstancesRequest>>,
    }

    impl PagedSource {
        pub(crate) fn new(pages: Vec<InstancePage>) -> Self {
            Self::with_results(pages.into_iter().map(Ok).collect())
        }

        pub(crate) fn with_results(pages: Vec<Result<InstancePage, InventoryError>>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InstanceSource for PagedSource {
        async fn describe_instances(
            &self,
            request: &DescribeInstancesRequest,
        ) -> Result<InstancePage, InventoryError> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push(request.clone());
            match self.pages.get(index) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(err)) => Err(InventoryError::Xml(err.to_string())),
                None => panic!("requested page {} but only {} exist", index, self.pages.len()),
            }
        }
    }

    pub(crate) fn instance(id: &str) -> InstanceRecord {
        InstanceRecord::from_value(json!({ "InstanceId": id })).unwrap()
    }

    pub(crate) fn page(groups: &[&[&str]], next_token: Option<&str>) -> InstancePage {
        InstancePage {
            reservations: groups
                .iter()
                .map(|ids| Reservation {
                    instances: ids.iter().map(|id| instance(id)).collect(),
                })
                .collect(),
            next_token: next_token.map(str::to_string),
        }
    }

    fn ids(records: &[InstanceRecord]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r.get("InstanceId").and_then(|v| v.as_str()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_single_page_flattens_reservations() {
        let source = PagedSource::new(vec![page(&[&["i-1", "i-2"], &[], &["i-3"]], None)]);
        let records = fetch_all(&source, &FetchFilter::None).await.unwrap();
        assert_eq!(ids(&records), ["i-1", "i-2", "i-3"]);
        assert_eq!(source.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follows_tokens_until_last_page() {
        let source = PagedSource::new(vec![
            page(&[&["i-1"]], Some("t1")),
            page(&[&["i-2", "i-3"]], Some("t2")),
            page(&[&["i-4"]], None),
        ]);
        let filter = FetchFilter::ByKey("team".into());
        let records = fetch_all(&source, &filter).await.unwrap();

        assert_eq!(ids(&records), ["i-1", "i-2", "i-3", "i-4"]);

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].next_token, None);
        assert_eq!(requests[1].next_token.as_deref(), Some("t1"));
        assert_eq!(requests[2].next_token.as_deref(), Some("t2"));
        assert!(requests.iter().all(|r| r.filter == filter));
    }

    #[tokio::test]
    async fn test_empty_pages_are_not_an_error() {
        let source = PagedSource::new(vec![page(&[], Some("t1")), page(&[], None)]);
        let records = fetch_all(&source, &FetchFilter::None).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_failure_drops_accumulated_pages() {
        let source = PagedSource::with_results(vec![
            Ok(page(&[&["i-1"]], Some("t1"))),
            Err(InventoryError::Xml("boom".into())),
        ]);
        let result = fetch_all(&source, &FetchFilter::None).await;
        assert!(matches!(result, Err(InventoryError::Xml(_))));
        assert_eq!(source.requests.lock().unwrap().len(), 2);
    }
}
