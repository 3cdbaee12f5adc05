//! Azure Resource Graph
//!
//! Posts a query and follows `$skipToken` until the service stops returning
//! one. All pages are fetched before anything is handed back.

use super::error::RequestError;
use super::http::AzureHttpClient;
use super::Endpoints;
use crate::inventory::{MachineRow, ResourceGraphRequest};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// One page of a Resource Graph response
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<MachineRow>,
    #[serde(rename = "$skipToken", default)]
    skip_token: Option<String>,
}

impl QueryResponse {
    /// Continuation for the next page. An empty token ends the loop.
    fn next_token(&mut self) -> Option<String> {
        self.skip_token.take().filter(|token| !token.is_empty())
    }
}

/// Fetch all rows for `request`, one page at a time
///
/// A failure on any page fails the whole fetch.
pub async fn fetch_machines(
    http: &AzureHttpClient,
    endpoints: &Endpoints,
    token: &SecretString,
    request: &ResourceGraphRequest,
) -> Result<Vec<MachineRow>, RequestError> {
    let url = endpoints.resource_graph_url();
    let mut rows = Vec::new();
    let mut page_request = request.clone();
    let mut page = 1usize;

    loop {
        let mut response: QueryResponse = http
            .post_json(&url, token.expose_secret(), &page_request)
            .await?;

        tracing::info!(
            "Resource Graph page {} returned {} rows",
            page,
            response.data.len()
        );

        let next_token = response.next_token();
        rows.append(&mut response.data);

        match next_token {
            Some(skip_token) => {
                page_request = request.with_skip_token(skip_token);
                page += 1;
            }
            None => break,
        }
    }

    tracing::info!("Fetched {} rows in {} pages", rows.len(), page);

    Ok(rows)
}
