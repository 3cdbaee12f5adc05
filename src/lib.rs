//! Azure Arc and VM extension inventory for monitoring
//!
//! Queries the Azure Resource Graph for Arc onboarded machines, virtual
//! machines and their extensions, and prints one piggyback block per host
//! and monitored service.
//!
//! The pipeline is strictly sequential: one token request, then the query
//! pages one after another, then aggregation and output.

pub mod azure;
pub mod config;
pub mod error;
pub mod inventory;
pub mod secret;

use azure::auth::{self, ClientCredentials};
use azure::graph;
use azure::http::AzureHttpClient;
use config::AgentConfig;
use error::AgentError;
use inventory::{aggregate, query, write_sections, ResourceGraphRequest};
use std::io::Write;

/// Run the agent once, writing sections to `out`.
///
/// Nothing is written unless every page was fetched.
pub async fn run<W: Write>(config: &AgentConfig, out: &mut W) -> Result<(), AgentError> {
    if config.services.is_empty() {
        tracing::info!("No services to monitor, nothing to do");
        return Ok(());
    }

    let credentials = ClientCredentials {
        tenant_id: config.tenant_id.clone(),
        app_id: config.app_id.clone(),
        secret: config.secret.resolve()?,
    };

    let http = AzureHttpClient::new(config.timeout, &config.proxy)?;

    let token = auth::fetch_token(&http, &config.endpoints, &credentials)
        .await
        .map_err(AgentError::Token)?;

    let variant = query::build(&config.services);
    tracing::info!(
        "Querying {:?} variant for {:?}",
        variant,
        config.services.iter().map(|s| s.as_str()).collect::<Vec<_>>()
    );

    let request = ResourceGraphRequest::new(&config.scope, variant);
    let rows = graph::fetch_machines(&http, &config.endpoints, &token, &request)
        .await
        .map_err(AgentError::Query)?;

    let machines = aggregate(rows);
    let lines = write_sections(out, &config.services, &machines)?;

    tracing::info!("Wrote {} lines for {} machines", lines, machines.len());

    Ok(())
}
