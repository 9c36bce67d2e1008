use crate::availability::AvailabilityIndex;
use crate::data::{
    AllocError, AssignedSlot, AssignmentInput, AssignmentOutput, SlotId, SlotOutcome, TaName,
    TimetableSlot,
};
use crate::preferences::PreferenceStore;
use crate::report;
use crate::slots;
use log::{info, trace};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// One assignment pass over an enumerated timetable.
///
/// Each slot's decision depends on every assignment made before it, so the
/// outcome is a function of slot order: same input order, same result.
pub struct Engine<'a> {
    availability: &'a AvailabilityIndex,
    preferences: &'a PreferenceStore,
    // Incremental indices: who already holds this day+period, and who
    // already covers this recurring class somewhere in the run.
    by_slot_id: HashMap<SlotId, HashSet<TaName>>,
    by_class: HashMap<(String, String), HashSet<TaName>>,
    load: HashMap<TaName, u32>,
}

impl<'a> Engine<'a> {
    pub fn new(availability: &'a AvailabilityIndex, preferences: &'a PreferenceStore) -> Self {
        Engine {
            availability,
            preferences,
            by_slot_id: HashMap::new(),
            by_class: HashMap::new(),
            load: HashMap::new(),
        }
    }

    /// Selects the best eligible TA for one slot and records the assignment.
    ///
    /// Tier order: preferred TAs already covering this class earlier in the
    /// run, then any satisfiable preference, then anyone available, then the
    /// sentinel. Within a tier the least-loaded candidate wins; ties keep
    /// the first candidate in tier order.
    pub fn assign(&mut self, slot: &TimetableSlot) -> SlotOutcome {
        let preferred = self.preferences.matching(&slot.year_group, &slot.subject);
        let valid: Vec<&str> = preferred
            .iter()
            .copied()
            .filter(|ta| self.eligible(ta, &slot.slot_id))
            .collect();

        let class_key = (slot.year_group.clone(), slot.subject.clone());
        let consistent: Vec<&str> = match self.by_class.get(&class_key) {
            Some(covering) => valid
                .iter()
                .copied()
                .filter(|ta| covering.contains(*ta))
                .collect(),
            None => Vec::new(),
        };

        let pick = self
            .least_loaded(&consistent)
            .or_else(|| self.least_loaded(&valid))
            .or_else(|| {
                let fallback: Vec<&str> = self
                    .availability
                    .ta_names()
                    .filter(|ta| self.eligible(ta, &slot.slot_id))
                    .collect();
                self.least_loaded(&fallback)
            });

        match pick {
            Some(ta) => {
                let ta = ta.to_string();
                *self.load.entry(ta.clone()).or_insert(0) += 1;
                self.by_slot_id
                    .entry(slot.slot_id.clone())
                    .or_default()
                    .insert(ta.clone());
                self.by_class.entry(class_key).or_default().insert(ta.clone());
                SlotOutcome::Assigned(ta)
            }
            None => SlotOutcome::Unassigned,
        }
    }

    /// Available for the period and not already booked into another row
    /// sharing the same slot id. Unknown TAs fail the availability check.
    fn eligible(&self, ta: &str, slot_id: &str) -> bool {
        self.availability.is_available(ta, slot_id)
            && !self
                .by_slot_id
                .get(slot_id)
                .is_some_and(|booked| booked.contains(ta))
    }

    /// First candidate with the smallest running load; a TA never selected
    /// so far counts as zero.
    fn least_loaded<'c>(&self, candidates: &[&'c str]) -> Option<&'c str> {
        let mut best: Option<(&'c str, u32)> = None;
        for &ta in candidates {
            let load = self.load.get(ta).copied().unwrap_or(0);
            if best.map_or(true, |(_, lowest)| load < lowest) {
                best = Some((ta, load));
            }
        }
        best.map(|(ta, _)| ta)
    }

    /// The sparse per-run counter: only TAs actually selected appear.
    pub fn load(&self) -> &HashMap<TaName, u32> {
        &self.load
    }
}

/// Runs one full assignment pass.
///
/// The availability index is built first; its duplicate-TA check is the only
/// fatal precondition and fires before anything is assigned. The persisted
/// preference store and the uploaded batch are merged into the working
/// snapshot, slots are enumerated, then assigned strictly in order.
pub fn run(
    input: &AssignmentInput,
    persisted: &PreferenceStore,
) -> Result<AssignmentOutput, AllocError> {
    let started = Instant::now();
    let availability = AvailabilityIndex::build(&input.availability)?;
    let working = persisted.merged_with(&input.preferences);
    let targets = slots::enumerate_slots(&input.timetable);
    info!(
        "Assigning {} slots across {} TAs with {} preference rows...",
        targets.len(),
        availability.len(),
        working.len()
    );

    let mut engine = Engine::new(&availability, &working);
    let mut timetable = Vec::with_capacity(targets.len());
    for slot in &targets {
        let outcome = engine.assign(slot);
        trace!(
            "{} {} @ {} -> {}",
            slot.year_group, slot.subject, slot.slot_id, outcome
        );
        timetable.push(AssignedSlot {
            year_group: slot.year_group.clone(),
            subject: slot.subject.clone(),
            day: slot.day.clone(),
            period: slot.period.clone(),
            assigned_ta: outcome,
        });
    }
    info!("Assignment finished in {:.2?}", started.elapsed());

    let load_summary = report::load_summary(&availability, engine.load());
    let unassigned = report::unassigned(&timetable);
    Ok(AssignmentOutput {
        timetable,
        load_summary,
        unassigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AvailabilityRow, PreferenceRow, TimetableRow};
    use serde_json::json;

    fn availability_row(value: serde_json::Value) -> AvailabilityRow {
        serde_json::from_value(value).unwrap()
    }

    fn timetable_row(year_group: &str, subject: &str, day: &str, period: &str) -> TimetableRow {
        TimetableRow {
            year_group: Some(year_group.to_string()),
            subject: Some(subject.to_string()),
            day: Some(day.to_string()),
            period: Some(period.to_string()),
        }
    }

    fn pref(year_group: Option<&str>, subject: Option<&str>, ta_name: &str) -> PreferenceRow {
        PreferenceRow {
            year_group: year_group.map(str::to_string),
            subject: subject.map(str::to_string),
            ta_name: ta_name.to_string(),
        }
    }

    fn assigned(output: &AssignmentOutput) -> Vec<String> {
        output
            .timetable
            .iter()
            .map(|row| row.assigned_ta.to_string())
            .collect()
    }

    #[test]
    fn assigns_the_only_available_ta() {
        let input = AssignmentInput {
            timetable: vec![timetable_row("Year 7", "Maths", "Monday", "P1")],
            availability: vec![
                availability_row(json!({"taName": "Alice", "Monday P1": "✓"})),
                availability_row(json!({"taName": "Bob", "Monday P1": ""})),
            ],
            preferences: vec![],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Alice"]);
        assert!(output.unassigned.is_empty());
        assert_eq!(output.load_summary[0].ta_name, "Alice");
        assert_eq!(output.load_summary[0].assigned_periods, 1);
        assert_eq!(output.load_summary[1].ta_name, "Bob");
        assert_eq!(output.load_summary[1].assigned_periods, 0);
    }

    #[test]
    fn never_double_books_a_period() {
        // Two parallel classes in the same day+period, one available TA:
        // the second row must get the sentinel, not Alice twice.
        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 8", "Science", "Monday", "P1"),
            ],
            availability: vec![availability_row(
                json!({"taName": "Alice", "Monday P1": "✓"}),
            )],
            preferences: vec![],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(
            output.timetable[0].assigned_ta,
            SlotOutcome::Assigned("Alice".to_string())
        );
        assert_eq!(output.timetable[1].assigned_ta, SlotOutcome::Unassigned);
        assert_eq!(output.unassigned.len(), 1);
        assert_eq!(output.unassigned[0].subject, "Science");
    }

    #[test]
    fn sentinel_slot_never_enters_the_load_counter() {
        let availability = AvailabilityIndex::build(&[availability_row(
            json!({"taName": "Alice", "Monday P1": ""}),
        )])
        .unwrap();
        let prefs = PreferenceStore::default();
        let mut engine = Engine::new(&availability, &prefs);
        let slot = TimetableSlot {
            year_group: "Year 7".to_string(),
            subject: "Maths".to_string(),
            day: "Monday".to_string(),
            period: "P1".to_string(),
            slot_id: "Monday P1".to_string(),
        };
        assert_eq!(engine.assign(&slot), SlotOutcome::Unassigned);
        assert!(engine.load().is_empty());
    }

    #[test]
    fn fallback_balances_load_with_stable_ties() {
        // No preferences at all: every slot resolves in the fallback tier.
        // Ties go to availability-table order, so the two TAs alternate.
        let everywhere = json!({"Monday P1": "✓", "Tuesday P1": "✓", "Wednesday P1": "✓"});
        let mut alice = json!({"taName": "Alice"});
        let mut bob = json!({"taName": "Bob"});
        alice.as_object_mut().unwrap().extend(everywhere.as_object().unwrap().clone());
        bob.as_object_mut().unwrap().extend(everywhere.as_object().unwrap().clone());

        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 8", "Science", "Tuesday", "P1"),
                timetable_row("Year 9", "English", "Wednesday", "P1"),
            ],
            availability: vec![availability_row(alice), availability_row(bob)],
            preferences: vec![],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Alice", "Bob", "Alice"]);
    }

    #[test]
    fn preferred_ta_beats_fallback_order() {
        let input = AssignmentInput {
            timetable: vec![timetable_row("Year 7", "Maths", "Monday", "P1")],
            availability: vec![
                availability_row(json!({"taName": "Alice", "Monday P1": "✓"})),
                availability_row(json!({"taName": "Bob", "Monday P1": "✓"})),
            ],
            preferences: vec![pref(Some("Year 7"), Some("Maths"), "Bob")],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Bob"]);
    }

    #[test]
    fn wildcard_preference_applies_to_every_class() {
        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 11", "Drama", "Friday", "P5"),
            ],
            availability: vec![
                availability_row(
                    json!({"taName": "Alice", "Monday P1": "✓", "Friday P5": "✓"}),
                ),
                availability_row(
                    json!({"taName": "Bob", "Monday P1": "✓", "Friday P5": "✓"}),
                ),
            ],
            preferences: vec![pref(None, None, "Bob")],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Bob", "Bob"]);
    }

    #[test]
    fn unsatisfiable_preference_falls_back_to_anyone_available() {
        // Carol is preferred but absent from the availability table.
        let input = AssignmentInput {
            timetable: vec![timetable_row("Year 7", "Maths", "Monday", "P1")],
            availability: vec![availability_row(
                json!({"taName": "Alice", "Monday P1": "✓"}),
            )],
            preferences: vec![pref(Some("Year 7"), Some("Maths"), "Carol")],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Alice"]);
    }

    #[test]
    fn consistency_tier_dominates_plain_preference() {
        // Both TAs are preferred for Year 7 Maths. Bob covers the Monday
        // session because Alice is away; on Tuesday Bob already has the
        // higher load, yet still wins: he is the one with prior sessions of
        // this exact class.
        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 7", "Maths", "Tuesday", "P2"),
            ],
            availability: vec![
                availability_row(
                    json!({"taName": "Alice", "Monday P1": "", "Tuesday P2": "✓"}),
                ),
                availability_row(
                    json!({"taName": "Bob", "Monday P1": "✓", "Tuesday P2": "✓"}),
                ),
            ],
            preferences: vec![
                pref(Some("Year 7"), Some("Maths"), "Alice"),
                pref(Some("Year 7"), Some("Maths"), "Bob"),
            ],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Bob", "Bob"]);
    }

    #[test]
    fn least_loaded_wins_within_the_consistency_tier() {
        // Monday: tie at zero load, store order picks Alice. Tuesday: Alice
        // is away, Bob covers; both now cover Year 7 Maths. Thursday: tie at
        // one each, Alice again by store order. Friday: Alice is at two,
        // Bob at one, so the consistency tier itself prefers Bob.
        let all_days =
            json!({"Monday P1": "✓", "Tuesday P1": "✓", "Thursday P1": "✓", "Friday P1": "✓"});
        let mut bob = json!({"taName": "Bob"});
        bob.as_object_mut().unwrap().extend(all_days.as_object().unwrap().clone());
        let alice = json!({
            "taName": "Alice",
            "Monday P1": "✓", "Tuesday P1": "", "Thursday P1": "✓", "Friday P1": "✓",
        });

        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 7", "Maths", "Tuesday", "P1"),
                timetable_row("Year 7", "Maths", "Thursday", "P1"),
                timetable_row("Year 7", "Maths", "Friday", "P1"),
            ],
            availability: vec![availability_row(alice), availability_row(bob)],
            preferences: vec![
                pref(Some("Year 7"), Some("Maths"), "Alice"),
                pref(Some("Year 7"), Some("Maths"), "Bob"),
            ],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Alice", "Bob", "Alice", "Bob"]);
    }

    #[test]
    fn minimum_load_tie_break_prefers_lighter_ta() {
        // Alice picks up two early periods, Bob one; on the shared Friday
        // slot both are equally eligible and Bob's lower load must win.
        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 7", "Maths", "Tuesday", "P1"),
                timetable_row("Year 8", "Science", "Wednesday", "P1"),
                timetable_row("Year 9", "English", "Friday", "P1"),
            ],
            availability: vec![
                availability_row(json!({
                    "taName": "Alice",
                    "Monday P1": "✓", "Tuesday P1": "✓", "Wednesday P1": "", "Friday P1": "✓",
                })),
                availability_row(json!({
                    "taName": "Bob",
                    "Monday P1": "", "Tuesday P1": "", "Wednesday P1": "✓", "Friday P1": "✓",
                })),
            ],
            preferences: vec![],
        };
        let output = run(&input, &PreferenceStore::default()).unwrap();
        assert_eq!(assigned(&output), vec!["Alice", "Alice", "Bob", "Bob"]);
    }

    #[test]
    fn duplicate_ta_aborts_the_whole_run() {
        let input = AssignmentInput {
            timetable: vec![timetable_row("Year 7", "Maths", "Monday", "P1")],
            availability: vec![
                availability_row(json!({"taName": "Alice", "Monday P1": "✓"})),
                availability_row(json!({"taName": "Alice", "Monday P1": ""})),
            ],
            preferences: vec![],
        };
        let result = run(&input, &PreferenceStore::default());
        assert!(matches!(result, Err(AllocError::DuplicateTa(name)) if name == "Alice"));
    }

    #[test]
    fn rerun_over_unchanged_snapshot_is_identical() {
        let input = AssignmentInput {
            timetable: vec![
                timetable_row("Year 7", "Maths", "Monday", "P1"),
                timetable_row("Year 8", "Science", "Monday", "P2"),
                timetable_row("Year 7", "Maths", "Tuesday", "P1"),
            ],
            availability: vec![
                availability_row(
                    json!({"taName": "Alice", "Monday P1": "✓", "Monday P2": "✓", "Tuesday P1": "✓"}),
                ),
                availability_row(
                    json!({"taName": "Bob", "Monday P1": "✓", "Monday P2": "✓", "Tuesday P1": "✓"}),
                ),
            ],
            preferences: vec![pref(None, Some("Maths"), "Bob")],
        };
        let persisted = PreferenceStore::from_rows(&[pref(Some("Year 8"), None, "Alice")]);
        let first = run(&input, &persisted).unwrap();
        let second = run(&input, &persisted).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn merged_preferences_keep_persisted_rows_first() {
        // Persisted store prefers Alice, the uploaded batch prefers Bob for
        // the same class; at equal load the earlier (persisted) row wins.
        let input = AssignmentInput {
            timetable: vec![timetable_row("Year 7", "Maths", "Monday", "P1")],
            availability: vec![
                availability_row(json!({"taName": "Bob", "Monday P1": "✓"})),
                availability_row(json!({"taName": "Alice", "Monday P1": "✓"})),
            ],
            preferences: vec![pref(Some("Year 7"), Some("Maths"), "Bob")],
        };
        let persisted = PreferenceStore::from_rows(&[pref(Some("Year 7"), Some("Maths"), "Alice")]);
        let output = run(&input, &persisted).unwrap();
        assert_eq!(assigned(&output), vec!["Alice"]);
    }
}
