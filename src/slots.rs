use crate::data::{SlotId, TimetableRow, TimetableSlot};

/// Joins day and period into the slot identity shared with the availability
/// table's columns.
pub fn slot_id(day: &str, period: &str) -> SlotId {
    format!("{} {}", day, period)
}

/// Derives the ordered assignment targets from the uploaded timetable.
///
/// Rows missing any of year group, subject, day or period are dropped, a
/// deliberate lenient-input policy. The rest keep their upload order: the
/// engine processes slots in exactly this order and is greedy, so the order
/// is part of the observable behavior.
pub fn enumerate_slots(rows: &[TimetableRow]) -> Vec<TimetableSlot> {
    rows.iter()
        .filter_map(|row| match (&row.year_group, &row.subject, &row.day, &row.period) {
            (Some(year_group), Some(subject), Some(day), Some(period)) => Some(TimetableSlot {
                year_group: year_group.clone(),
                subject: subject.clone(),
                day: day.clone(),
                period: period.clone(),
                slot_id: slot_id(day, period),
            }),
            _ => None,
        })
        .collect()
}
