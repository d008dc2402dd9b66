//! Form re-encoding for forwarded payloads.

use hookbench_core::FormData;

use crate::error::{ForwardError, Result};

/// Form-encodes `form`, keeping only the first value of each key.
///
/// Keys appear in submission order. Later values of a repeated key are
/// dropped, so `a=1&a=2` forwards as `a=1`.
///
/// # Errors
///
/// Returns `ForwardError::Encoding` if the encoder rejects the pairs.
pub fn encode_first_values(form: &FormData) -> Result<String> {
    let pairs: Vec<(&str, &str)> = form.first_values().collect();
    serde_urlencoded::to_string(pairs)
        .map_err(|e| ForwardError::Encoding { message: e.to_string() })
}
