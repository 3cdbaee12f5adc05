//! Azure Authentication
//!
//! Acquires an access token for the Azure Resource Manager API with the
//! OAuth2 client credentials flow of a Microsoft Entra app registration.

use super::error::RequestError;
use super::http::AzureHttpClient;
use super::Endpoints;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Scope for Azure Resource Manager (and thus Resource Graph) access
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// App registration credentials
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub app_id: String,
    pub secret: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Request an access token for the management API
pub async fn fetch_token(
    http: &AzureHttpClient,
    endpoints: &Endpoints,
    credentials: &ClientCredentials,
) -> Result<SecretString, RequestError> {
    let url = endpoints.token_url(&credentials.tenant_id);

    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.app_id.as_str()),
        ("client_secret", credentials.secret.expose_secret()),
        ("scope", MANAGEMENT_SCOPE),
    ];

    let response: TokenResponse = http.post_form(&url, &form).await?;

    let Some(token) = response.access_token else {
        return Err(RequestError::Failed {
            message: "Token response did not contain an access_token".to_string(),
            body: None,
        });
    };

    tracing::info!("Access token acquired for app {}", credentials.app_id);

    Ok(SecretString::new(token.into()))
}
