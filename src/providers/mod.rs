pub mod ec2;
pub mod sts;
pub mod xml;

use serde_json::Value;

use crate::error::InventoryError;

/// Largest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Decode a Query-protocol error response into `InventoryError::Provider`.
///
/// EC2 wraps errors as `Response/Errors/Error`, STS as `ErrorResponse/Error`.
pub fn parse_error(status: u16, body: &str) -> InventoryError {
    let error = xml::decode(body).ok().and_then(|document| {
        let errors = match document.get("Response") {
            Some(response) => response.get("Errors")?.get("Error")?,
            None => document.get("ErrorResponse")?.get("Error")?,
        };
        match errors {
            Value::Array(items) => items.first().cloned(),
            other => Some(other.clone()),
        }
    });

    let text = |field: &str| {
        error
            .as_ref()
            .and_then(|e| e.get(field))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    };

    InventoryError::Provider {
        status,
        code: text("Code").unwrap_or_else(|| "Unknown".to_string()),
        message: text("Message").unwrap_or_else(|| truncate(body, MAX_ERROR_BODY)),
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
