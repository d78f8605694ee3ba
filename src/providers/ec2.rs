//! EC2 `DescribeInstances` over the Query protocol.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::Ec2Client;
use crate::error::InventoryError;
use crate::provider::{DescribeInstancesRequest, InstancePage, InstanceSource, Reservation};
use crate::record::InstanceRecord;

use super::{parse_error, xml};

/// EC2 API version sent with every request.
pub const API_VERSION: &str = "2016-11-15";

const ACTION: &str = "DescribeInstances";

/// Form body for one `DescribeInstances` call.
pub fn request_body(request: &DescribeInstancesRequest) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("Action", ACTION);
    form.append_pair("Version", API_VERSION);
    for (name, value) in request.filter.query_params() {
        form.append_pair(&name, &value);
    }
    if let Some(token) = &request.next_token {
        form.append_pair("NextToken", token);
    }
    form.finish()
}

/// Decode a successful `DescribeInstances` response.
///
/// # Errors
///
/// Returns `InventoryError::Xml` if the document is malformed or is not a
/// `DescribeInstancesResponse`.
pub fn parse_page(body: &str) -> Result<InstancePage, InventoryError> {
    let document = xml::decode(body)?;
    let response = document.get("DescribeInstancesResponse").ok_or_else(|| {
        InventoryError::Xml("missing DescribeInstancesResponse element".to_string())
    })?;

    let reservations = list(response.get("Reservations"))
        .into_iter()
        .map(|reservation| Reservation {
            instances: list(reservation.get("Instances"))
                .into_iter()
                .filter_map(InstanceRecord::from_value)
                .collect(),
        })
        .collect();

    let next_token = response
        .get("NextToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(InstancePage {
        reservations,
        next_token,
    })
}

/// Normalize an optional list value: arrays as-is, a lone object as one item.
fn list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(object @ Value::Object(_)) => vec![object.clone()],
        _ => Vec::new(),
    }
}

/// Fetch one page of instances.
pub async fn describe_instances(
    client: &Ec2Client,
    request: &DescribeInstancesRequest,
) -> Result<InstancePage, InventoryError> {
    debug!(
        region = client.region(),
        filter = %request.filter,
        continued = request.next_token.is_some(),
        "describe instances"
    );

    let (status, body) = client.query().post_form(request_body(request)).await?;
    if !(200..300).contains(&status) {
        let err = parse_error(status, &body);
        warn!(region = client.region(), error = %err, "describe instances rejected");
        return Err(err);
    }

    parse_page(&body)
}

#[async_trait]
impl InstanceSource for Ec2Client {
    async fn describe_instances(
        &self,
        request: &DescribeInstancesRequest,
    ) -> Result<InstancePage, InventoryError> {
        describe_instances(self, request).await
    }
}
