use crate::data::{AllocError, AvailabilityMark, AvailabilityRow, SlotId, TaName};
use std::collections::HashMap;

/// Normalized availability lookup, built once per run from the uploaded
/// table.
///
/// TA order follows the input table; the engine's fallback tier breaks load
/// ties in this order.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityIndex {
    order: Vec<TaName>,
    rows: HashMap<TaName, HashMap<SlotId, bool>>,
}

impl AvailabilityIndex {
    /// Builds the lookup, rejecting duplicate TA identities before any
    /// assignment can happen.
    pub fn build(raw: &[AvailabilityRow]) -> Result<Self, AllocError> {
        let mut index = AvailabilityIndex::default();
        for row in raw {
            if index.rows.contains_key(&row.ta_name) {
                return Err(AllocError::DuplicateTa(row.ta_name.clone()));
            }
            let marks = row
                .marks
                .iter()
                .map(|(slot_id, mark)| (slot_id.clone(), is_affirmative(mark.as_ref())))
                .collect();
            index.order.push(row.ta_name.clone());
            index.rows.insert(row.ta_name.clone(), marks);
        }
        Ok(index)
    }

    /// Unknown TAs and unknown slot columns are simply "not available",
    /// never an error.
    pub fn is_available(&self, ta: &str, slot_id: &str) -> bool {
        self.rows
            .get(ta)
            .and_then(|marks| marks.get(slot_id))
            .copied()
            .unwrap_or(false)
    }

    /// TA names in input-table order.
    pub fn ta_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

/// Affirmative marks are a true boolean, the check-mark, or "true" in any
/// case, surrounding whitespace ignored. Blanks, nulls and every other
/// string mean unavailable.
fn is_affirmative(mark: Option<&AvailabilityMark>) -> bool {
    match mark {
        Some(AvailabilityMark::Flag(flag)) => *flag,
        Some(AvailabilityMark::Text(text)) => {
            let text = text.trim();
            text == "✓" || text.eq_ignore_ascii_case("true")
        }
        None => false,
    }
}
