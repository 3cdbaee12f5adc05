//! Folds query rows into one entry per machine name.

use super::model::{AggregatedMachine, MachineRow};
use std::collections::BTreeMap;

/// Machines keyed by display name, iterated in name order
pub type MachineMap = BTreeMap<String, AggregatedMachine>;

/// Fold rows into a per-machine map.
///
/// Rows are keyed by `MachineName`, not by resource ID, so two machines that
/// share a name in different subscriptions collapse into one entry. The
/// later row wins.
pub fn aggregate<I>(rows: I) -> MachineMap
where
    I: IntoIterator<Item = MachineRow>,
{
    rows.into_iter().fold(MachineMap::new(), |mut machines, row| {
        let name = row.machine_name.clone();
        if let Some(previous) = machines.insert(name, AggregatedMachine::from(row)) {
            tracing::debug!(
                "Duplicate machine name, replacing entry of type {}",
                previous.resource_type
            );
        }
        machines
    })
}
