//! SQL identifier validation
//!
//! Every table, column and database name is validated here before it is
//! interpolated into a SQL string. Anything outside the identifier grammar
//! is rejected, so injection through object names is impossible.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SyncError};

static VALID_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Validate a SQL identifier, returning it unchanged on success.
///
/// `context` names what is being validated ("table name", "column name", ...)
/// and appears in the error.
pub fn validate_identifier<'a>(name: &'a str, context: &'static str) -> Result<&'a str> {
    if name.is_empty() {
        return Err(SyncError::EmptyIdentifier { context });
    }

    if !VALID_IDENTIFIER.is_match(name) {
        return Err(SyncError::InvalidIdentifier {
            context,
            name: name.to_string(),
        });
    }

    Ok(name)
}
