use crate::availability::AvailabilityIndex;
use crate::data::{AssignedSlot, TaLoad, TaName};
use std::collections::HashMap;

/// Per-TA assigned-period counts for display.
///
/// The engine's counter is sparse (only TAs actually selected appear); the
/// summary normalizes it to the full roster, zeros included, in
/// availability-table order.
pub fn load_summary(availability: &AvailabilityIndex, load: &HashMap<TaName, u32>) -> Vec<TaLoad> {
    availability
        .ta_names()
        .map(|ta_name| TaLoad {
            ta_name: ta_name.to_string(),
            assigned_periods: load.get(ta_name).copied().unwrap_or(0),
        })
        .collect()
}

/// The output rows no TA could cover.
pub fn unassigned(timetable: &[AssignedSlot]) -> Vec<AssignedSlot> {
    timetable
        .iter()
        .filter(|row| !row.assigned_ta.is_assigned())
        .cloned()
        .collect()
}
