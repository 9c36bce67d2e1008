use crate::data::{AllocError, PreferenceRow, TaName};
use itertools::Itertools;

/// A preference field: one specific value, or a wildcard matching anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Any,
    Only(String),
}

impl Scope {
    fn from_option(value: &Option<String>) -> Self {
        match value {
            Some(value) => Scope::Only(value.clone()),
            None => Scope::Any,
        }
    }

    fn as_option(&self) -> Option<String> {
        match self {
            Scope::Any => None,
            Scope::Only(value) => Some(value.clone()),
        }
    }

    /// Wildcard-or-equal.
    pub fn covers(&self, value: &str) -> bool {
        match self {
            Scope::Any => true,
            Scope::Only(only) => only == value,
        }
    }
}

/// One stored preference. Wildcards are distinct key values, so
/// `(Any, "Maths", Alice)` and `("Year 7", "Maths", Alice)` coexist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Preference {
    pub year_group: Scope,
    pub subject: Scope,
    pub ta_name: TaName,
}

impl Preference {
    fn from_row(row: &PreferenceRow) -> Self {
        Preference {
            year_group: Scope::from_option(&row.year_group),
            subject: Scope::from_option(&row.subject),
            ta_name: row.ta_name.clone(),
        }
    }

    fn to_row(&self) -> PreferenceRow {
        PreferenceRow {
            year_group: self.year_group.as_option(),
            subject: self.subject.as_option(),
            ta_name: self.ta_name.clone(),
        }
    }

    pub fn applies_to(&self, year_group: &str, subject: &str) -> bool {
        self.year_group.covers(year_group) && self.subject.covers(subject)
    }
}

/// The owned, ordered preference collection.
///
/// Order is load-bearing: persisted rows precede freshly uploaded ones, and
/// `matching` feeds the engine's stable tie-break in exactly this order.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    rows: Vec<Preference>,
}

impl PreferenceStore {
    pub fn from_rows(rows: &[PreferenceRow]) -> Self {
        PreferenceStore {
            rows: dedup(rows.iter().map(Preference::from_row)),
        }
    }

    /// Union of this store and a freshly uploaded batch, de-duplicated on
    /// the (year group, subject, TA) key. First seen wins.
    pub fn merged_with(&self, incoming: &[PreferenceRow]) -> Self {
        PreferenceStore {
            rows: dedup(
                self.rows
                    .iter()
                    .cloned()
                    .chain(incoming.iter().map(Preference::from_row)),
            ),
        }
    }

    /// Replaces a TA's preferences over the selected scopes.
    ///
    /// An empty selection means the wildcard. A stored row of this TA is
    /// removed when its year group equals one of the selected years or is
    /// the wildcard, and its subject matches likewise; the cartesian product
    /// of the selections is then appended. One call can so coarsen or narrow
    /// a TA's prior rows.
    pub fn upsert(&mut self, ta_name: &str, year_groups: &[String], subjects: &[String]) {
        let year_groups = selection(year_groups);
        let subjects = selection(subjects);
        self.rows.retain(|p| {
            !(p.ta_name == ta_name
                && year_groups
                    .iter()
                    .any(|y| p.year_group == *y || p.year_group == Scope::Any)
                && subjects
                    .iter()
                    .any(|s| p.subject == *s || p.subject == Scope::Any))
        });
        for year_group in &year_groups {
            for subject in &subjects {
                self.rows.push(Preference {
                    year_group: year_group.clone(),
                    subject: subject.clone(),
                    ta_name: ta_name.to_string(),
                });
            }
        }
        let rows = std::mem::take(&mut self.rows);
        self.rows = dedup(rows.into_iter());
    }

    /// Pins one exact class to one TA: every stored row naming exactly this
    /// (year group, subject) pair is replaced, whoever held it. Wildcard
    /// rows are untouched.
    pub fn pin_class(&mut self, year_group: &str, subject: &str, ta_name: &str) {
        let year_group = Scope::Only(year_group.to_string());
        let subject = Scope::Only(subject.to_string());
        self.rows
            .retain(|p| !(p.year_group == year_group && p.subject == subject));
        self.rows.push(Preference {
            year_group,
            subject,
            ta_name: ta_name.to_string(),
        });
    }

    /// Deletes one row by its position in the current ordered snapshot.
    pub fn remove_at(&mut self, index: usize) -> Result<Preference, AllocError> {
        if index >= self.rows.len() {
            return Err(AllocError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// TA names whose preferences apply to this class, in stored order.
    pub fn matching(&self, year_group: &str, subject: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|p| p.applies_to(year_group, subject))
            .map(|p| p.ta_name.as_str())
            .collect()
    }

    /// Ordered snapshot in the persisted wire shape.
    pub fn rows(&self) -> Vec<PreferenceRow> {
        self.rows.iter().map(Preference::to_row).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn selection(values: &[String]) -> Vec<Scope> {
    if values.is_empty() {
        vec![Scope::Any]
    } else {
        values.iter().cloned().map(Scope::Only).collect()
    }
}

fn dedup(rows: impl Iterator<Item = Preference>) -> Vec<Preference> {
    rows.unique().collect()
}
