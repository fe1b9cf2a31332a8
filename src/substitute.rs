use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::calendar::SchoolDate;
use crate::roster::{RosterRepository, Teacher};
use crate::schedule::{ScheduleRepository, BREAK_PERIOD, PERIODS};
use crate::store::{keys, KvStore};

/// date key -> absent teacher names, in marking order.
type AbsenceMap = HashMap<String, Vec<String>>;
/// date key -> `"<period>-<class>"` -> substitute teacher name.
type OverrideMap = HashMap<String, HashMap<String, String>>;

/// One (period, class) occurrence an absent teacher was assigned to.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub period: String,
    pub class_name: String,
    pub subject: String,
}

#[derive(Debug)]
pub enum ToggleOutcome {
    /// Weekend; nothing was changed.
    Holiday,
    /// The teacher was absent and is no longer. Overrides already created
    /// for their sessions are deliberately left in place.
    Cleared,
    /// The teacher is now marked absent; their sessions for the date.
    Marked(Vec<Session>),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub removed_absences: usize,
    pub removed_overrides: usize,
}

/// The absence -> eligible-substitute -> override workflow. Reads the
/// schedule and roster, owns the date-keyed absence and override maps.
pub struct SubstituteEngine<'a> {
    store: &'a KvStore<'a>,
    schedule: &'a ScheduleRepository<'a>,
    roster: &'a RosterRepository<'a>,
}

impl<'a> SubstituteEngine<'a> {
    pub fn new(
        store: &'a KvStore<'a>,
        schedule: &'a ScheduleRepository<'a>,
        roster: &'a RosterRepository<'a>,
    ) -> Self {
        SubstituteEngine {
            store,
            schedule,
            roster,
        }
    }

    pub fn absences_for(&self, date_key: &str) -> anyhow::Result<Vec<String>> {
        let all: AbsenceMap = self.store.get_as(keys::DAILY_ABSENCES)?.unwrap_or_default();
        Ok(all.get(date_key).cloned().unwrap_or_default())
    }

    pub fn overrides_for(&self, date_key: &str) -> anyhow::Result<HashMap<String, String>> {
        let all: OverrideMap = self
            .store
            .get_as(keys::SUBSTITUTE_SCHEDULE)?
            .unwrap_or_default();
        Ok(all.get(date_key).cloned().unwrap_or_default())
    }

    /// Marks or un-marks the teacher for the date. Un-marking keeps any
    /// overrides already created for their sessions (stale by design; see
    /// `reconcile`).
    pub fn toggle_absence(
        &self,
        date: &SchoolDate,
        teacher_name: &str,
    ) -> anyhow::Result<ToggleOutcome> {
        let Some(day) = date.day_name else {
            return Ok(ToggleOutcome::Holiday);
        };

        let mut all: AbsenceMap = self.store.get_as(keys::DAILY_ABSENCES)?.unwrap_or_default();
        let today = all.entry(date.date_key.clone()).or_default();

        let outcome = if let Some(pos) = today.iter().position(|n| n == teacher_name) {
            today.remove(pos);
            ToggleOutcome::Cleared
        } else {
            today.push(teacher_name.to_string());
            ToggleOutcome::Marked(self.affected_sessions(day, teacher_name))
        };

        self.store.set(keys::DAILY_ABSENCES, &all)?;
        Ok(outcome)
    }

    /// Every (period, class) of the day where the base schedule assigns
    /// `teacher_name`, in period-then-class order. The break is never a
    /// session. Empty when the teacher has no periods that day.
    pub fn affected_sessions(&self, day: &str, teacher_name: &str) -> Vec<Session> {
        let Some(day_grid) = self.schedule.day_grid(day) else {
            return Vec::new();
        };

        let mut sessions = Vec::new();
        for period in PERIODS {
            if period == BREAK_PERIOD {
                continue;
            }
            let Some(period_cells) = day_grid.get(period) else {
                continue;
            };
            for class_name in &self.schedule.classes {
                if let Some(cell) = period_cells.get(class_name) {
                    if cell.teacher == teacher_name {
                        sessions.push(Session {
                            period: period.to_string(),
                            class_name: class_name.clone(),
                            subject: cell.subject.clone(),
                        });
                    }
                }
            }
        }
        sessions
    }

    /// Teachers free to cover (day, period): every roster teacher, in
    /// roster order, who is neither the absent teacher nor in the period's
    /// busy set. The busy set comes from the unmodified base schedule —
    /// overrides already assigned do not make a teacher busy here.
    pub fn eligible_substitutes(
        &self,
        day: &str,
        period: &str,
        absent_teacher: &str,
    ) -> Vec<&Teacher> {
        let mut busy: HashSet<&str> = HashSet::new();
        if let Some(period_cells) = self.schedule.day_grid(day).and_then(|d| d.get(period)) {
            for class_name in &self.schedule.classes {
                if let Some(cell) = period_cells.get(class_name) {
                    if !cell.teacher.is_empty() {
                        busy.insert(cell.teacher.as_str());
                    }
                }
            }
        }

        self.roster
            .teachers
            .iter()
            .filter(|t| t.name != absent_teacher && !busy.contains(t.name.as_str()))
            .collect()
    }

    /// Sets or clears the override at `"<period>-<class>"` for the date.
    /// An empty substitute removes the key entirely. Overwrites are
    /// idempotent; eligibility is not re-checked here.
    pub fn assign_substitute(
        &self,
        date_key: &str,
        session_key: &str,
        substitute_name: &str,
    ) -> anyhow::Result<()> {
        let mut all: OverrideMap = self
            .store
            .get_as(keys::SUBSTITUTE_SCHEDULE)?
            .unwrap_or_default();
        let today = all.entry(date_key.to_string()).or_default();

        let substitute_name = substitute_name.trim();
        if substitute_name.is_empty() {
            today.remove(session_key);
        } else {
            today.insert(session_key.to_string(), substitute_name.to_string());
        }

        self.store.set(keys::SUBSTITUTE_SCHEDULE, &all)
    }

    /// Explicit cleanup after roster edits: drops the date's absence
    /// entries and overrides that name teachers no longer on the roster.
    pub fn reconcile(&self, date_key: &str) -> anyhow::Result<ReconcileReport> {
        let mut absences: AbsenceMap =
            self.store.get_as(keys::DAILY_ABSENCES)?.unwrap_or_default();
        let mut overrides: OverrideMap = self
            .store
            .get_as(keys::SUBSTITUTE_SCHEDULE)?
            .unwrap_or_default();

        let mut removed_absences = 0;
        if let Some(today) = absences.get_mut(date_key) {
            let before = today.len();
            today.retain(|name| self.roster.contains_name(name));
            removed_absences = before - today.len();
        }

        let mut removed_overrides = 0;
        if let Some(today) = overrides.get_mut(date_key) {
            let before = today.len();
            today.retain(|_, name| self.roster.contains_name(name));
            removed_overrides = before - today.len();
        }

        if removed_absences > 0 {
            self.store.set(keys::DAILY_ABSENCES, &absences)?;
        }
        if removed_overrides > 0 {
            self.store.set(keys::SUBSTITUTE_SCHEDULE, &overrides)?;
        }
        Ok(ReconcileReport {
            removed_absences,
            removed_overrides,
        })
    }
}
