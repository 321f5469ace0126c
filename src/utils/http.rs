use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct HttpResponse<T> {
    pub code: u16,
    pub message: String,
    pub body: T,
}

impl<T> HttpResponse<T> {
    pub fn new(code: u16, message: String, body: T) -> Self {
        Self { code, message, body }
    }
}

/// Shared client for the companion API and the storage gateway.
///
/// Only connecting is bounded: audio separation and artifact uploads can
/// take minutes. Short calls set their own per-request timeout.
pub fn build_client(connect_timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()?;
    Ok(client)
}
