use chrono::{Datelike, Local, NaiveDate, Timelike};

use crate::schedule::DAYS;

/// The date context every temporal operation runs against. Resolved once
/// per request from an explicit `date` param (tests, backdating) or the
/// local clock, never captured at startup.
#[derive(Debug, Clone)]
pub struct SchoolDate {
    /// `YYYY-MM-DD`, the key absence and override maps are stored under.
    pub date_key: String,
    /// School day name, `None` on Friday/Saturday (weekend).
    pub day_name: Option<&'static str>,
}

impl SchoolDate {
    pub fn resolve(param: Option<&str>) -> Result<SchoolDate, String> {
        let date = match param {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| format!("date must be YYYY-MM-DD, got {:?}", raw))?,
            None => Local::now().date_naive(),
        };
        Ok(SchoolDate::from_date(date))
    }

    pub fn from_date(date: NaiveDate) -> SchoolDate {
        // Sunday..Thursday are indices 0..4; Friday (5) and Saturday (6)
        // have no school day.
        let idx = date.weekday().num_days_from_sunday() as usize;
        SchoolDate {
            date_key: date.format("%Y-%m-%d").to_string(),
            day_name: DAYS.get(idx).copied(),
        }
    }

}

/// Wall-clock `HH:MM`, zero-padded so lexicographic comparison against the
/// stored period times works.
pub fn resolve_clock(param: Option<&str>) -> Result<String, String> {
    match param {
        Some(raw) => {
            let t = raw.trim();
            if !is_valid_clock(t) {
                return Err(format!("time must be HH:MM, got {:?}", raw));
            }
            Ok(t.to_string())
        }
        None => {
            let now = Local::now();
            Ok(format!("{:02}:{:02}", now.hour(), now.minute()))
        }
    }
}

pub fn is_valid_clock(t: &str) -> bool {
    let Some((h, m)) = t.split_once(':') else {
        return false;
    };
    if h.len() != 2 || m.len() != 2 {
        return false;
    }
    let (Ok(h), Ok(m)) = (h.parse::<u32>(), m.parse::<u32>()) else {
        return false;
    };
    h < 24 && m < 60
}
