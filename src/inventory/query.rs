//! Resource Graph query selection
//!
//! Maps the requested services onto one of four fixed KQL templates and
//! wraps the chosen template into the body posted to the Resource Graph API.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource type of an Azure Arc onboarded machine
pub const HYBRID_MACHINE_TYPE: &str = "microsoft.hybridcompute/machines";

/// Resource type of an Azure virtual machine
pub const VIRTUAL_MACHINE_TYPE: &str = "microsoft.compute/virtualmachines";

/// A monitored service, as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    ArcState,
    ArcExtensions,
    VmExtensions,
}

impl Service {
    pub const ALL: [Service; 3] = [
        Service::ArcState,
        Service::ArcExtensions,
        Service::VmExtensions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Service::ArcState => "azure_arc_states",
            Service::ArcExtensions => "azure_arc_extensions",
            Service::VmExtensions => "azure_vm_extensions",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "unknown service '{0}' (expected azure_arc_states, azure_arc_extensions or azure_vm_extensions)"
)]
pub struct UnknownService(pub String);

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s.trim())
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

/// The set of services requested for this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSelector {
    services: BTreeSet<Service>,
}

impl ServiceSelector {
    /// Parse service names, ignoring blank entries
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownService>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| !name.as_ref().trim().is_empty())
            .map(|name| name.as_ref().parse::<Service>())
            .collect()
    }

    pub fn contains(&self, service: Service) -> bool {
        self.services.contains(&service)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Service> + '_ {
        self.services.iter().copied()
    }
}

impl FromIterator<Service> for ServiceSelector {
    fn from_iter<T: IntoIterator<Item = Service>>(iter: T) -> Self {
        Self {
            services: iter.into_iter().collect(),
        }
    }
}

const COMBINED_QUERY: &str = "resources \
| where type =~ 'microsoft.hybridcompute/machines' or type =~ 'microsoft.compute/virtualmachines' \
| extend JoinId = tolower(id), ArcState = tostring(properties.status) \
| join kind=leftouter ( \
resources \
| where type =~ 'microsoft.hybridcompute/machines/extensions' or type =~ 'microsoft.compute/virtualmachines/extensions' \
| extend JoinId = tolower(substring(id, 0, indexof(id, '/extensions'))), ExtensionName = name, ProvisioningState = tostring(properties.provisioningState) \
| project JoinId, ExtensionName, ProvisioningState \
) on JoinId \
| where not(type =~ 'microsoft.compute/virtualmachines' and isempty(ExtensionName)) \
| summarize ExtensionExists = max(iff(isnotempty(ExtensionName), 1, 0)), \
Extensions = make_list_if(pack('ExtensionName', ExtensionName, 'ProvisioningState', ProvisioningState), isnotempty(ExtensionName)) \
by MachineId = id, MachineName = name, type = tolower(type), ArcState";

const ARC_EXTENSIONS_QUERY: &str = "resources \
| where type =~ 'microsoft.hybridcompute/machines' \
| extend JoinId = tolower(id), ArcState = tostring(properties.status) \
| join kind=leftouter ( \
resources \
| where type =~ 'microsoft.hybridcompute/machines/extensions' \
| extend JoinId = tolower(substring(id, 0, indexof(id, '/extensions'))), ExtensionName = name, ProvisioningState = tostring(properties.provisioningState) \
| project JoinId, ExtensionName, ProvisioningState \
) on JoinId \
| summarize ExtensionExists = max(iff(isnotempty(ExtensionName), 1, 0)), \
Extensions = make_list_if(pack('ExtensionName', ExtensionName, 'ProvisioningState', ProvisioningState), isnotempty(ExtensionName)) \
by MachineId = id, MachineName = name, type = tolower(type), ArcState";

const VM_EXTENSIONS_QUERY: &str = "resources \
| where type =~ 'microsoft.compute/virtualmachines' \
| extend JoinId = tolower(id) \
| join kind=leftouter ( \
resources \
| where type =~ 'microsoft.compute/virtualmachines/extensions' \
| extend JoinId = tolower(substring(id, 0, indexof(id, '/extensions'))), ExtensionName = name, ProvisioningState = tostring(properties.provisioningState) \
| project JoinId, ExtensionName, ProvisioningState \
) on JoinId \
| where ExtensionName != '' \
| summarize ExtensionExists = max(iff(isnotempty(ExtensionName), 1, 0)), \
Extensions = make_list(pack('ExtensionName', ExtensionName, 'ProvisioningState', ProvisioningState)) \
by MachineId = id, MachineName = name, type = tolower(type)";

const ARC_STATE_QUERY: &str = "resources \
| where type =~ 'microsoft.hybridcompute/machines' \
| project MachineId = id, MachineName = name, type = tolower(type), ArcState = tostring(properties.status)";

/// One of the four fixed query templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariant {
    /// Arc machines and virtual machines, each joined to its extensions
    Combined,
    /// Arc machines joined to their extensions
    ArcExtensions,
    /// Virtual machines with at least one extension
    VmExtensions,
    /// Arc machines and their connection state only
    ArcState,
}

impl QueryVariant {
    /// Pick the template for a selector. The first matching rule wins.
    pub fn select(selector: &ServiceSelector) -> Self {
        let arc = selector.contains(Service::ArcExtensions) || selector.contains(Service::ArcState);
        let vm = selector.contains(Service::VmExtensions);

        if arc && vm {
            QueryVariant::Combined
        } else if selector.contains(Service::ArcExtensions) {
            QueryVariant::ArcExtensions
        } else if vm {
            QueryVariant::VmExtensions
        } else {
            QueryVariant::ArcState
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            QueryVariant::Combined => COMBINED_QUERY,
            QueryVariant::ArcExtensions => ARC_EXTENSIONS_QUERY,
            QueryVariant::VmExtensions => VM_EXTENSIONS_QUERY,
            QueryVariant::ArcState => ARC_STATE_QUERY,
        }
    }
}

/// Build the query template for the requested services
pub fn build(selector: &ServiceSelector) -> QueryVariant {
    QueryVariant::select(selector)
}

/// Which part of the tenant the query runs against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryScope {
    /// Everything the app registration can read
    #[default]
    Tenant,
    Subscriptions(Vec<String>),
    ManagementGroups(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOptions {
    #[serde(rename = "$skipToken")]
    pub skip_token: String,
}

/// Body of a Resource Graph query request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraphRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub management_groups: Vec<String>,
    pub query: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RequestOptions>,
}

impl ResourceGraphRequest {
    pub fn new(scope: &QueryScope, variant: QueryVariant) -> Self {
        let (subscriptions, management_groups) = match scope {
            QueryScope::Tenant => (Vec::new(), Vec::new()),
            QueryScope::Subscriptions(ids) => (ids.clone(), Vec::new()),
            QueryScope::ManagementGroups(ids) => (Vec::new(), ids.clone()),
        };

        Self {
            subscriptions,
            management_groups,
            query: variant.text(),
            options: None,
        }
    }

    /// The same request, continuing at `skip_token`
    pub fn with_skip_token(&self, skip_token: String) -> Self {
        Self {
            options: Some(RequestOptions { skip_token }),
            ..self.clone()
        }
    }
}
