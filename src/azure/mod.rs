//! Azure API interaction module
//!
//! This module provides the pieces needed to talk to Azure: an HTTP client,
//! OAuth2 token acquisition and the paginated Resource Graph query.
//!
//! # Module Structure
//!
//! - [`auth`] - Client credentials token request against Microsoft Entra ID
//! - [`error`] - Timeout / failure classification of requests
//! - [`graph`] - Resource Graph query with `$skipToken` pagination
//! - [`http`] - HTTP client wrapper with timeout and proxy settings
//!
//! # Example
//!
//! ```ignore
//! use ms_azure_addon::azure::{auth, graph, http::AzureHttpClient, Endpoints};
//!
//! async fn example(credentials: &auth::ClientCredentials) -> anyhow::Result<()> {
//!     let endpoints = Endpoints::default();
//!     let http = AzureHttpClient::new(Duration::from_secs(10), &Default::default())?;
//!     let token = auth::fetch_token(&http, &endpoints, credentials).await?;
//!     let rows = graph::fetch_machines(&http, &endpoints, &token, &request).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
pub mod graph;
pub mod http;

use url::Url;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_MANAGEMENT_HOST: &str = "https://management.azure.com";

/// Resource Graph API version, returns rows as an object array
pub const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";

/// Base URLs of the login and management endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    authority: String,
    management: String,
}

impl Endpoints {
    /// Endpoints for a non-public cloud, or a test server
    pub fn new(authority: &str, management: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            authority: normalize(authority)?,
            management: normalize(management)?,
        })
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority,
            urlencoding::encode(tenant_id)
        )
    }

    pub fn resource_graph_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
            self.management, RESOURCE_GRAPH_API_VERSION
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY_HOST.to_string(),
            management: DEFAULT_MANAGEMENT_HOST.to_string(),
        }
    }
}

fn normalize(base: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(base)?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}
