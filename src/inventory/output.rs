//! Agent output
//!
//! Renders aggregated machines as piggyback host blocks:
//!
//! ```text
//! <<<<srv01>>>>
//! <<<ms_azure_arc_state:sep(0)>>>
//! Connected
//! <<<<>>>>
//! ```
//!
//! One pass per requested service, so a host can appear in two blocks.

use super::aggregate::MachineMap;
use super::model::AggregatedMachine;
use super::query::{Service, ServiceSelector};
use std::io::Write;
use thiserror::Error;

/// Section carrying the Arc connection state
pub const ARC_STATE_SECTION: &str = "ms_azure_arc_state";

/// Section carrying the machine and its extensions as JSON
pub const MACHINE_EXTENSION_SECTION: &str = "ms_azure_machine_extension";

const HOST_FOOTER: &str = "<<<<>>>>";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize machine: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write agent output: {0}")]
    Io(#[from] std::io::Error),
}

/// Which machines get a machine extension section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtensionFilter {
    /// `extensions_exists` is exactly 1
    HasExtensions,
    /// Virtual machines only. The VM extension query already drops
    /// machines without extensions.
    VirtualMachine,
}

impl ExtensionFilter {
    fn for_selector(selector: &ServiceSelector) -> Option<Self> {
        let arc = selector.contains(Service::ArcExtensions);
        let vm = selector.contains(Service::VmExtensions);

        match (arc, vm) {
            (true, _) => Some(ExtensionFilter::HasExtensions),
            (false, true) => Some(ExtensionFilter::VirtualMachine),
            (false, false) => None,
        }
    }

    fn matches(self, machine: &AggregatedMachine) -> bool {
        match self {
            ExtensionFilter::HasExtensions => machine.extensions_exists == Some(1),
            ExtensionFilter::VirtualMachine => machine.is_virtual_machine(),
        }
    }
}

fn host_block(
    host: &str,
    section: &str,
    payload: serde_json::Result<String>,
) -> [serde_json::Result<String>; 4] {
    [
        Ok(format!("<<<<{host}>>>>")),
        Ok(format!("<<<{section}:sep(0)>>>")),
        payload,
        Ok(HOST_FOOTER.to_string()),
    ]
}

/// Lazily render the output lines for the requested services.
///
/// Only JSON serialization of a machine can fail.
pub fn format_sections<'a>(
    selector: &ServiceSelector,
    machines: &'a MachineMap,
) -> impl Iterator<Item = serde_json::Result<String>> + 'a {
    let arc_state = selector.contains(Service::ArcState).then(move || {
        machines
            .iter()
            .filter(|(_, machine)| machine.is_hybrid_machine())
            .flat_map(|(name, machine)| {
                host_block(name, ARC_STATE_SECTION, Ok(machine.arc_status.clone()))
            })
    });

    let extensions = ExtensionFilter::for_selector(selector).map(move |filter| {
        machines
            .iter()
            .filter(move |(_, machine)| filter.matches(machine))
            .flat_map(|(name, machine)| {
                host_block(
                    name,
                    MACHINE_EXTENSION_SECTION,
                    serde_json::to_string(machine),
                )
            })
    });

    arc_state
        .into_iter()
        .flatten()
        .chain(extensions.into_iter().flatten())
}

/// Write all sections to `out`, returning the number of lines written
pub fn write_sections<W: Write>(
    out: &mut W,
    selector: &ServiceSelector,
    machines: &MachineMap,
) -> Result<usize, OutputError> {
    let mut lines = 0;
    for line in format_sections(selector, machines) {
        writeln!(out, "{}", line?)?;
        lines += 1;
    }
    out.flush()?;
    Ok(lines)
}
