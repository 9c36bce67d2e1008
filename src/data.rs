use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// Type aliases for clarity
pub type TaName = String;
pub type SlotId = String;

/// The marker recorded in place of a TA name when no eligible candidate
/// exists. Not a valid TA name.
pub const NO_TA_SENTINEL: &str = "⚠ No TA available";

/// One uploaded timetable row. Fields may be blank; rows missing any of the
/// four are dropped at enumeration rather than rejected.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRow {
    #[serde(default)]
    pub year_group: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

/// A single teachable period derived from a complete timetable row.
/// Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableSlot {
    pub year_group: String,
    pub subject: String,
    pub day: String,
    pub period: String,
    pub slot_id: SlotId,
}

/// One cell of the uploaded availability table: a native boolean or free
/// text such as the check-mark. Absent and null cells arrive as `None`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AvailabilityMark {
    Flag(bool),
    Text(String),
}

/// One uploaded availability row: a TA plus one mark per slot column.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRow {
    pub ta_name: TaName,
    #[serde(flatten)]
    pub marks: HashMap<SlotId, Option<AvailabilityMark>>,
}

/// The uploaded and persisted preference shape. A missing year group or
/// subject is a wildcard matching any value, not a missing value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRow {
    #[serde(default)]
    pub year_group: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub ta_name: TaName,
}

/// The engine's verdict for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Assigned(TaName),
    Unassigned,
}

impl SlotOutcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, SlotOutcome::Assigned(_))
    }
}

impl fmt::Display for SlotOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotOutcome::Assigned(ta) => write!(f, "{}", ta),
            SlotOutcome::Unassigned => write!(f, "{}", NO_TA_SENTINEL),
        }
    }
}

// On the wire the outcome is the TA name or the sentinel string, matching
// the persisted timetable format.
impl Serialize for SlotOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SlotOutcome::Assigned(ta) => serializer.serialize_str(ta),
            SlotOutcome::Unassigned => serializer.serialize_str(NO_TA_SENTINEL),
        }
    }
}

/// One output timetable row: the original class and period columns plus the
/// engine's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSlot {
    pub year_group: String,
    pub subject: String,
    pub day: String,
    pub period: String,
    pub assigned_ta: SlotOutcome,
}

/// One row of the TA load summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaLoad {
    pub ta_name: TaName,
    pub assigned_periods: u32,
}

/// The three uploaded tables for one assignment run. The preference batch
/// is merged with the persisted store before assignment starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub timetable: Vec<TimetableRow>,
    pub availability: Vec<AvailabilityRow>,
    #[serde(default)]
    pub preferences: Vec<PreferenceRow>,
}

/// The final output of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutput {
    pub timetable: Vec<AssignedSlot>,
    pub load_summary: Vec<TaLoad>,
    pub unassigned: Vec<AssignedSlot>,
}

/// Failures the core can surface. A slot nobody can cover is a normal
/// outcome (`SlotOutcome::Unassigned`), never an error.
#[derive(Debug, Error)]
pub enum AllocError {
    /// Duplicate TA identity in the availability table. Fatal before any
    /// assignment happens: availability would be ambiguous.
    #[error("duplicate TA name in availability table: {0}")]
    DuplicateTa(TaName),
    /// Invalid positional delete against the preference store; the store is
    /// left unchanged.
    #[error("preference index {index} is out of range ({len} rows)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("failed to read or write preference table: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to access preference table: {0}")]
    Io(#[from] std::io::Error),
}
