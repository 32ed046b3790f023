use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// Turns a non-success response into [`ProviderError::Http`], keeping the body
/// for the error report.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Checks the status, then deserializes the body.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
    let resp = check_status(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

/// Removes a trailing slash so paths can be appended with `format!`.
pub(crate) fn trim_endpoint(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}
