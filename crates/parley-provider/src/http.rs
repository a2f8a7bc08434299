use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Send a request and decode the JSON body. Empty bodies decode to `Null`.
pub(crate) async fn send_json(service: &'static str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    read_json(service, response).await
}

async fn read_json(service: &'static str, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        debug!(service, status = status.as_u16(), "backend request failed");
        return Err(ProviderError::Http {
            service,
            status: status.as_u16(),
            body: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// String field or empty.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}
