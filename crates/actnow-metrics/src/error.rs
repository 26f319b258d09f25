//! Errors that cross the refresh boundary.
//!
//! Resolver and pipeline failures are folded into these three variants; a
//! recovered upstream failure is not an error and shows up as
//! `DataSource::Cache` on the result instead.

use actnow_core::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefreshError {
    /// No override, no cached region, and the live lookup failed.
    #[error("Region could not be determined")]
    LocationUnresolved,

    /// Upstream data failed validation and no cache entry is young enough.
    #[error("Upstream data unusable: {reason}")]
    UpstreamUnusable { reason: String },

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl RefreshError {
    pub fn upstream_unusable(reason: impl Into<String>) -> Self {
        Self::UpstreamUnusable {
            reason: reason.into(),
        }
    }

    /// User-facing text for the widget's error state.
    pub fn user_message(&self) -> String {
        match self {
            Self::LocationUnresolved => {
                "Please specify a 5-digit FIPS code for this widget to load county-level data."
                    .to_string()
            }
            Self::UpstreamUnusable { .. } => "Couldn't connect to the server.".to_string(),
            Self::Unexpected(msg) => msg.clone(),
        }
    }

    /// Whether the host should show the dedicated "can't connect" layout
    /// rather than an inline message.
    pub fn is_upstream_unusable(&self) -> bool {
        matches!(self, Self::UpstreamUnusable { .. })
    }
}

impl From<AppError> for RefreshError {
    fn from(e: AppError) -> Self {
        Self::Unexpected(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actnow_core::CacheError;

    #[test]
    fn test_user_messages() {
        assert!(RefreshError::LocationUnresolved.user_message().contains("FIPS"));
        assert_eq!(
            RefreshError::upstream_unusable("cache too old").user_message(),
            "Couldn't connect to the server."
        );
    }

    #[test]
    fn test_app_error_becomes_unexpected() {
        let err: RefreshError = AppError::Cache(CacheError::Corrupt {
            key: "fips-06037-historical-data.json".into(),
            message: "EOF".into(),
        })
        .into();
        assert!(matches!(err, RefreshError::Unexpected(_)));
        assert!(!err.is_upstream_unusable());
    }

    #[test]
    fn test_upstream_unusable_flag() {
        assert!(RefreshError::upstream_unusable("x").is_upstream_unusable());
        assert!(!RefreshError::LocationUnresolved.is_upstream_unusable());
    }
}
