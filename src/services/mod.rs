pub mod insolation;
pub mod irradiance;
pub mod location_service;
pub mod pipeline;
pub mod power_model;
pub mod weather_service;

use crate::error::{ProviderError, ProviderResult};

/// Turn a non-2xx response into `ProviderError::Status`, keeping the body for logs.
pub(crate) async fn ensure_success(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, mapping decode failures to `ProviderError::Malformed`.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> ProviderResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(e.to_string()))
}
