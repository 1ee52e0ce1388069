//! Shared HTTP response handling for remote providers.

use reqwest::Response;
use serde::de::DeserializeOwned;

use ragfusion_core::{FusionError, Result};

/// Read a response body, turning transport failures and non-2xx statuses
/// into provider errors.
pub(crate) async fn read_body(provider: &str, operation: &str, res: Response) -> Result<String> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| FusionError::provider(provider, format!("{}: {}", operation, e)))?;

    if !status.is_success() {
        return Err(FusionError::provider(
            provider,
            format!("{} failed with {}: {}", operation, status, body.trim()),
        ));
    }

    Ok(body)
}

/// Decode a JSON body, reporting malformed payloads as provider errors.
pub(crate) fn decode<T: DeserializeOwned>(provider: &str, operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        FusionError::provider(provider, format!("{}: invalid response: {}", operation, e))
    })
}

/// Map a transport error into a provider error.
pub(crate) fn transport(provider: &str, operation: &str) -> impl FnOnce(reqwest::Error) -> FusionError {
    let provider = provider.to_string();
    let operation = operation.to_string();
    move |e| FusionError::provider(provider, format!("{}: {}", operation, e))
}
