use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::calendar::SchoolDate;
use crate::store::{keys, KvStore};

/// School week: Sunday through Thursday. Friday/Saturday are the weekend
/// and never appear in the grid.
pub const DAYS: [&str; 5] = ["الأحد", "الإثنين", "الثلاثاء", "الأربعاء", "الخميس"];

/// Daily teaching slots in display order. `الفسحة` is the break and is
/// never a teaching session.
pub const PERIODS: [&str; 8] = [
    "الأولى",
    "الثانية",
    "الثالثة",
    "الفسحة",
    "الرابعة",
    "الخامسة",
    "السادسة",
    "السابعة",
];

pub const BREAK_PERIOD: &str = "الفسحة";

pub const STAFF_SLOTS: usize = 5;

pub fn default_classes() -> Vec<String> {
    [
        "1/1", "1/2", "1/3", "2/1", "2/2", "3/1", "3/2", "4/1", "4/2", "5/1", "5/2", "6/1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodTime {
    pub start: String,
    pub end: String,
}

pub fn default_period_times() -> HashMap<String, PeriodTime> {
    let defaults = [
        ("الأولى", "07:30", "08:10"),
        ("الثانية", "08:15", "08:55"),
        ("الثالثة", "09:00", "09:40"),
        ("الفسحة", "09:40", "10:10"),
        ("الرابعة", "10:10", "10:50"),
        ("الخامسة", "10:55", "11:35"),
        ("السادسة", "11:40", "12:20"),
        ("السابعة", "12:25", "13:05"),
    ];
    defaults
        .iter()
        .map(|(p, s, e)| {
            (
                p.to_string(),
                PeriodTime {
                    start: s.to_string(),
                    end: e.to_string(),
                },
            )
        })
        .collect()
}

/// One grid cell. Both fields empty means unscheduled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub teacher: String,
}

impl Cell {
    pub fn is_scheduled(&self) -> bool {
        !self.subject.is_empty() && !self.teacher.is_empty()
    }
}

/// day -> period -> class -> cell, fully materialized.
pub type Grid = HashMap<String, HashMap<String, HashMap<String, Cell>>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellField {
    Subject,
    Teacher,
}

impl CellField {
    pub fn parse(raw: &str) -> Option<CellField> {
        match raw {
            "subject" => Some(CellField::Subject),
            "teacher" => Some(CellField::Teacher),
            _ => None,
        }
    }
}

/// One resolved row of the live-display projection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRow {
    pub class_name: String,
    pub subject: String,
    pub teacher: String,
    pub is_substitute: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodData {
    pub day: String,
    pub period: String,
    pub classes: Vec<PeriodRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffData {
    pub day: String,
    pub supervisors: Vec<String>,
    pub duty_staff: Vec<String>,
}

/// Owns the weekly grid, the class/period configuration and the supervisor
/// and duty rosters. The period-data projection is the single read path the
/// display consumes; substitute overrides are merged there and nowhere else.
pub struct ScheduleRepository<'a> {
    store: &'a KvStore<'a>,
    pub classes: Vec<String>,
    pub period_times: HashMap<String, PeriodTime>,
    pub grid: Grid,
    pub supervisors: HashMap<String, Vec<String>>,
    pub duty_staff: HashMap<String, Vec<String>>,
}

impl<'a> ScheduleRepository<'a> {
    pub fn load(store: &'a KvStore<'a>) -> anyhow::Result<Self> {
        let classes: Vec<String> = store
            .get_as(keys::CLASS_NAMES)?
            .unwrap_or_else(default_classes);
        let period_times: HashMap<String, PeriodTime> = store
            .get_as(keys::PERIOD_TIMES)?
            .unwrap_or_else(default_period_times);
        let mut grid: Grid = store.get_as(keys::WEEKLY_SCHEDULE)?.unwrap_or_default();
        materialize_grid(&mut grid, &classes);
        let supervisors = store.get_as(keys::SUPERVISORS)?.unwrap_or_default();
        let duty_staff = store.get_as(keys::DUTY_STAFF)?.unwrap_or_default();

        Ok(ScheduleRepository {
            store,
            classes,
            period_times,
            grid,
            supervisors,
            duty_staff,
        })
    }

    pub fn is_known_day(day: &str) -> bool {
        DAYS.contains(&day)
    }

    pub fn is_known_period(period: &str) -> bool {
        PERIODS.contains(&period)
    }

    pub fn day_grid(&self, day: &str) -> Option<&HashMap<String, HashMap<String, Cell>>> {
        self.grid.get(day)
    }

    /// Scans the other classes of (day, period) for a cell already holding
    /// `teacher_name`. Returns the first conflicting class in class-list
    /// order, which is also the class reported to the operator.
    pub fn teacher_conflict(
        &self,
        day: &str,
        period: &str,
        current_class: &str,
        teacher_name: &str,
    ) -> Option<String> {
        let period_cells = self.grid.get(day)?.get(period)?;
        for class_name in &self.classes {
            if class_name == current_class {
                continue;
            }
            if let Some(cell) = period_cells.get(class_name) {
                if cell.teacher == teacher_name {
                    return Some(class_name.clone());
                }
            }
        }
        None
    }

    /// Writes one cell field and persists the grid immediately. Callers
    /// must have run `teacher_conflict` first for non-empty teacher writes;
    /// the IPC layer is the only write path and does so.
    pub fn set_cell(
        &mut self,
        day: &str,
        period: &str,
        class_name: &str,
        field: CellField,
        value: &str,
    ) -> anyhow::Result<()> {
        let cell = self
            .grid
            .entry(day.to_string())
            .or_default()
            .entry(period.to_string())
            .or_default()
            .entry(class_name.to_string())
            .or_default();
        match field {
            CellField::Subject => cell.subject = value.to_string(),
            CellField::Teacher => cell.teacher = value.to_string(),
        }
        self.store.set(keys::WEEKLY_SCHEDULE, &self.grid)
    }

    /// Replaces the class-section list. Cells of surviving names are kept;
    /// cells of removed names are dropped with the column.
    pub fn set_class_names(&mut self, class_names: Vec<String>) -> anyhow::Result<()> {
        self.classes = class_names;
        let classes = &self.classes;
        for day_grid in self.grid.values_mut() {
            for period_cells in day_grid.values_mut() {
                period_cells.retain(|name, _| classes.contains(name));
            }
        }
        materialize_grid(&mut self.grid, &self.classes);
        self.store.set(keys::CLASS_NAMES, &self.classes)?;
        self.store.set(keys::WEEKLY_SCHEDULE, &self.grid)
    }

    pub fn set_period_time(&mut self, period: &str, start: &str, end: &str) -> anyhow::Result<()> {
        self.period_times.insert(
            period.to_string(),
            PeriodTime {
                start: start.to_string(),
                end: end.to_string(),
            },
        );
        self.store.set(keys::PERIOD_TIMES, &self.period_times)
    }

    pub fn set_supervisor(&mut self, day: &str, index: usize, name: &str) -> anyhow::Result<()> {
        let slots = self
            .supervisors
            .entry(day.to_string())
            .or_insert_with(|| vec![String::new(); STAFF_SLOTS]);
        slots.resize(STAFF_SLOTS, String::new());
        slots[index] = name.to_string();
        self.store.set(keys::SUPERVISORS, &self.supervisors)
    }

    pub fn set_duty_staff(&mut self, day: &str, index: usize, name: &str) -> anyhow::Result<()> {
        let slots = self
            .duty_staff
            .entry(day.to_string())
            .or_insert_with(|| vec![String::new(); STAFF_SLOTS]);
        slots.resize(STAFF_SLOTS, String::new());
        slots[index] = name.to_string();
        self.store.set(keys::DUTY_STAFF, &self.duty_staff)
    }

    /// The live-display read path: resolves the date's day, merges any
    /// substitute override stored under `"<period>-<class>"` for that date,
    /// and returns the per-class rows with `isSubstitute` flags. `None` on
    /// the weekend.
    pub fn period_data(
        &self,
        date: &SchoolDate,
        period: &str,
    ) -> anyhow::Result<Option<PeriodData>> {
        let Some(day) = date.day_name else {
            return Ok(None);
        };
        let Some(period_cells) = self.grid.get(day).and_then(|d| d.get(period)) else {
            return Ok(None);
        };

        let all_overrides: HashMap<String, HashMap<String, String>> = self
            .store
            .get_as(keys::SUBSTITUTE_SCHEDULE)?
            .unwrap_or_default();
        let today_overrides = all_overrides.get(&date.date_key);

        let mut rows = Vec::new();
        for class_name in &self.classes {
            let Some(cell) = period_cells.get(class_name) else {
                continue;
            };
            if !cell.is_scheduled() {
                continue;
            }
            let session_key = format!("{}-{}", period, class_name);
            let substitute = today_overrides.and_then(|m| m.get(&session_key));
            rows.push(PeriodRow {
                class_name: class_name.clone(),
                subject: cell.subject.clone(),
                teacher: substitute.cloned().unwrap_or_else(|| cell.teacher.clone()),
                is_substitute: substitute.is_some(),
            });
        }

        Ok(Some(PeriodData {
            day: day.to_string(),
            period: period.to_string(),
            classes: rows,
        }))
    }

    /// Active (non-empty) supervisors and duty staff for the date's day,
    /// `None` on the weekend.
    pub fn today_staff(&self, date: &SchoolDate) -> Option<StaffData> {
        let day = date.day_name?;
        let active = |slots: Option<&Vec<String>>| -> Vec<String> {
            slots
                .map(|v| {
                    v.iter()
                        .filter(|s| !s.trim().is_empty())
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        Some(StaffData {
            day: day.to_string(),
            supervisors: active(self.supervisors.get(day)),
            duty_staff: active(self.duty_staff.get(day)),
        })
    }

    /// Maps a wall clock to the period whose window contains it. Bounds are
    /// inclusive on both ends, matching the display's behavior at the exact
    /// boundary minute.
    pub fn period_at(&self, clock: &str) -> Option<(String, PeriodTime)> {
        for period in PERIODS {
            if let Some(times) = self.period_times.get(period) {
                if clock >= times.start.as_str() && clock <= times.end.as_str() {
                    return Some((period.to_string(), times.clone()));
                }
            }
        }
        None
    }

    /// First period starting after the clock, for the "next period" banner.
    pub fn next_period_after(&self, clock: &str) -> Option<(String, PeriodTime)> {
        for period in PERIODS {
            if let Some(times) = self.period_times.get(period) {
                if times.start.as_str() > clock {
                    return Some((period.to_string(), times.clone()));
                }
            }
        }
        None
    }
}

/// Ensures every (day, period, class) combination exists so lookups never
/// need existence checks deeper than the keys themselves.
pub fn materialize_grid(grid: &mut Grid, classes: &[String]) {
    for day in DAYS {
        let day_grid = grid.entry(day.to_string()).or_default();
        for period in PERIODS {
            let period_cells = day_grid.entry(period.to_string()).or_default();
            for class_name in classes {
                period_cells.entry(class_name.clone()).or_default();
            }
        }
    }
}
