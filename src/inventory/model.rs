//! Machine inventory records
//!
//! `MachineRow` is one row as returned by the Resource Graph API,
//! `AggregatedMachine` is the per-host view written to the agent output.

use super::query::{HYBRID_MACHINE_TYPE, VIRTUAL_MACHINE_TYPE};
use serde::{Deserialize, Deserializer, Serialize};

/// An extension installed on a machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    #[serde(rename = "ExtensionName", default)]
    pub name: String,
    #[serde(rename = "ProvisioningState", default)]
    pub provisioning_state: String,
}

/// One machine as returned by the query, already joined with its extensions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MachineRow {
    #[serde(rename = "MachineId", default)]
    pub machine_id: String,
    #[serde(rename = "MachineName")]
    pub machine_name: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(rename = "ArcState", default)]
    pub arc_state: Option<String>,
    #[serde(rename = "Extensions", default)]
    pub extensions: Option<Vec<Extension>>,
    #[serde(rename = "ExtensionExists", default, deserialize_with = "deserialize_flag")]
    pub extension_exists: Option<i64>,
}

/// Accepts `0`/`1` as well as `false`/`true`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    Ok(Option::<Flag>::deserialize(deserializer)?.map(|flag| match flag {
        Flag::Int(value) => value,
        Flag::Bool(value) => i64::from(value),
    }))
}

/// Per-host view of a machine
///
/// Serialized as-is into the machine extension section, so the field names
/// and order are part of the output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedMachine {
    pub arc_status: String,
    pub extensions_exists: Option<i64>,
    pub extensions: Option<Vec<Extension>>,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl AggregatedMachine {
    pub fn is_hybrid_machine(&self) -> bool {
        self.resource_type.eq_ignore_ascii_case(HYBRID_MACHINE_TYPE)
    }

    pub fn is_virtual_machine(&self) -> bool {
        self.resource_type.eq_ignore_ascii_case(VIRTUAL_MACHINE_TYPE)
    }
}

impl From<MachineRow> for AggregatedMachine {
    fn from(row: MachineRow) -> Self {
        Self {
            arc_status: row.arc_state.unwrap_or_default(),
            extensions_exists: row.extension_exists,
            extensions: row.extensions,
            resource_type: row.resource_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_from_combined_query() {
        let row: MachineRow = serde_json::from_value(json!({
            "MachineId": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.HybridCompute/machines/srv01",
            "MachineName": "srv01",
            "type": "microsoft.hybridcompute/machines",
            "ArcState": "Connected",
            "ExtensionExists": 1,
            "Extensions": [
                {"ExtensionName": "AzureMonitorWindowsAgent", "ProvisioningState": "Succeeded"}
            ]
        }))
        .unwrap();

        assert_eq!(row.machine_name, "srv01");
        assert_eq!(row.arc_state.as_deref(), Some("Connected"));
        assert_eq!(row.extension_exists, Some(1));
        assert_eq!(row.extensions.unwrap()[0].name, "AzureMonitorWindowsAgent");
    }

    #[test]
    fn test_row_missing_optional_fields() {
        let row: MachineRow = serde_json::from_value(json!({
            "MachineName": "vm01",
            "type": "microsoft.compute/virtualmachines"
        }))
        .unwrap();

        assert_eq!(row.arc_state, None);
        assert_eq!(row.extension_exists, None);
        assert_eq!(row.extensions, None);
    }

    #[test]
    fn test_flag_accepts_booleans_and_null() {
        let row: MachineRow = serde_json::from_value(json!({
            "MachineName": "vm01",
            "ExtensionExists": true
        }))
        .unwrap();
        assert_eq!(row.extension_exists, Some(1));

        let row: MachineRow = serde_json::from_value(json!({
            "MachineName": "vm01",
            "ExtensionExists": null
        }))
        .unwrap();
        assert_eq!(row.extension_exists, None);
    }

    #[test]
    fn test_aggregated_machine_json_layout() {
        let machine = AggregatedMachine {
            arc_status: String::new(),
            extensions_exists: None,
            extensions: None,
            resource_type: VIRTUAL_MACHINE_TYPE.to_string(),
        };

        assert_eq!(
            serde_json::to_string(&machine).unwrap(),
            r#"{"arc_status":"","extensions_exists":null,"extensions":null,"type":"microsoft.compute/virtualmachines"}"#
        );
        assert!(machine.is_virtual_machine());
        assert!(!machine.is_hybrid_machine());
    }
}
