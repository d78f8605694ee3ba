//! Error types for inventory operations.

use thiserror::Error;

/// Errors that can occur while collecting or reporting instance metadata.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The provider rejected a query (bad credentials, bad region, throttling, denial).
    #[error("provider error ({status}) {code}: {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },

    /// A single (profile, region) fetch unit failed.
    #[error("{profile}/{region}: {source}")]
    Unit {
        profile: String,
        region: String,
        #[source]
        source: Box<InventoryError>,
    },

    /// Credentials for a profile could not be resolved.
    #[error("credentials: {0}")]
    Credentials(String),

    /// Request signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Provider response was not well-formed XML.
    #[error("xml: {0}")]
    Xml(String),

    /// A user-supplied column path is empty or invalid.
    #[error("malformed column path: {0:?}")]
    MalformedColumnSpec(String),

    /// The requested sort column is not part of the column map.
    #[error("unknown sort column: {0:?}")]
    UnknownSortColumn(String),

    /// Some other invocation parameter is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP request error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    /// Attach the originating fetch unit to an error.
    pub(crate) fn in_unit(self, profile: &str, region: &str) -> Self {
        InventoryError::Unit {
            profile: profile.to_string(),
            region: region.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns true for errors raised by input validation, before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InventoryError::MalformedColumnSpec(_)
                | InventoryError::UnknownSortColumn(_)
                | InventoryError::InvalidArgument(_)
        )
    }
}
