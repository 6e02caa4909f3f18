//! Dataset identifier policy.
//!
//! Dataset ids become durable directory names and URL segments, so the
//! grammar is strict: lowercase letters, digits, dash, underscore; must start
//! with a letter or digit; length 2 to 64.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PublishError, Result};

const DATASET_ID_GRAMMAR: &str = "^[a-z0-9][a-z0-9_-]{1,63}$";

static DATASET_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DATASET_ID_GRAMMAR).expect("dataset id pattern is valid")
});

pub fn is_valid_dataset_id(id: &str) -> bool {
    DATASET_ID.is_match(id)
}

pub fn require_valid_dataset_id(id: &str) -> Result<()> {
    if is_valid_dataset_id(id) {
        Ok(())
    } else {
        Err(PublishError::validation(format!(
            "invalid dataset id '{id}'; expected pattern {DATASET_ID_GRAMMAR}"
        )))
    }
}
