//! HTTP acquisition of feed archives. The pipeline itself never touches
//! the network; this layer only turns a URL into archive bytes.

mod auth;
mod client;

pub use auth::{ApiKey, UrlParam};
pub use client::{BasicClient, HttpClient};

use anyhow::Result;

/// Downloads the raw bytes of a feed archive.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.bytes().await?.to_vec())
}
