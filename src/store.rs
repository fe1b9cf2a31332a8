use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Store key names. Also the top-level keys of an exported backup
/// document.
pub mod keys {
    pub const WEEKLY_SCHEDULE: &str = "weeklySchedule";
    pub const CLASS_NAMES: &str = "classNames";
    pub const PERIOD_TIMES: &str = "periodTimes";
    pub const TEACHERS: &str = "teachers";
    pub const DAILY_ABSENCES: &str = "dailyAbsences";
    pub const SUBSTITUTE_SCHEDULE: &str = "substituteSchedule";
    pub const SUPERVISORS: &str = "supervisors";
    pub const DUTY_STAFF: &str = "dutyStaff";
    pub const APP_SETTINGS: &str = "appSettings";
}

/// Flat key-value store over the workspace database. Values are arbitrary
/// JSON documents; a missing key is `None` and callers supply their own
/// defaults.
pub struct KvStore<'a> {
    conn: &'a Connection,
}

impl<'a> KvStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        KvStore { conn }
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv(key, value) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, &raw),
        )?;
        Ok(())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }

    /// Every key's current value, for export.
    pub fn export_all(&self) -> anyhow::Result<Map<String, Value>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Map::new();
        for (key, raw) in rows {
            out.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(out)
    }

    /// Replaces the entire store with the supplied key/value pairs.
    /// Runs in a transaction so a failed write never leaves a half-imported
    /// store behind.
    pub fn import_all(&self, data: &Map<String, Value>) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM kv", [])?;
        for (key, value) in data {
            let raw = serde_json::to_string(value)?;
            tx.execute("INSERT INTO kv(key, value) VALUES(?, ?)", (key, &raw))?;
        }
        tx.commit()?;
        Ok(())
    }
}
