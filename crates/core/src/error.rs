//! Library error types.
//!
//! Services use `anyhow::Result` internally; this typed error is the
//! boundary surface for callers that need to discriminate failure classes.

use thiserror::Error;

/// Library errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("translation request failed")]
    Translation(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_display_transparently() {
        let err: Error = anyhow::anyhow!("variable read failed").into();
        assert_eq!(err.to_string(), "variable read failed");
    }
}
