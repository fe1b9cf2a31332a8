use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::calendar::SchoolDate;
use crate::store::{keys, KvStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub phone: String,
    pub created_at: String,
}

#[derive(Debug, PartialEq)]
pub enum AddTeacherError {
    /// Name or subject empty after trimming.
    MissingField,
    /// Absence and override records match on the name string, so two
    /// roster entries must never share one.
    DuplicateName,
}

/// CRUD over teacher records. Identity is a time-based id; matching in the
/// absence workflow is by name, kept unambiguous by the duplicate check.
pub struct RosterRepository<'a> {
    store: &'a KvStore<'a>,
    pub teachers: Vec<Teacher>,
}

impl<'a> RosterRepository<'a> {
    pub fn load(store: &'a KvStore<'a>) -> anyhow::Result<Self> {
        let teachers = store.get_as(keys::TEACHERS)?.unwrap_or_default();
        Ok(RosterRepository { store, teachers })
    }

    pub fn add(
        &mut self,
        name: &str,
        subject: &str,
        phone: &str,
        created: &SchoolDate,
    ) -> anyhow::Result<Result<Teacher, AddTeacherError>> {
        let name = name.trim();
        let subject = subject.trim();
        if name.is_empty() || subject.is_empty() {
            return Ok(Err(AddTeacherError::MissingField));
        }
        if self.teachers.iter().any(|t| t.name == name) {
            return Ok(Err(AddTeacherError::DuplicateName));
        }

        let teacher = Teacher {
            id: self.next_id(),
            name: name.to_string(),
            subject: subject.to_string(),
            phone: phone.trim().to_string(),
            created_at: created.date_key.clone(),
        };
        self.teachers.push(teacher.clone());
        self.store.set(keys::TEACHERS, &self.teachers)?;
        Ok(Ok(teacher))
    }

    /// Removes by id. Absence and override records referencing the name are
    /// left alone; `absence.reconcile` is the explicit cleanup pass.
    pub fn remove(&mut self, id: i64) -> anyhow::Result<bool> {
        let before = self.teachers.len();
        self.teachers.retain(|t| t.id != id);
        if self.teachers.len() == before {
            return Ok(false);
        }
        self.store.set(keys::TEACHERS, &self.teachers)?;
        Ok(true)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.teachers.iter().any(|t| t.name == name)
    }

    /// Epoch milliseconds, bumped past the roster maximum so rapid adds in
    /// the same millisecond still get distinct ids.
    fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let max = self.teachers.iter().map(|t| t.id).max().unwrap_or(0);
        now.max(max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute(
            "CREATE TABLE kv(key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .expect("create kv");
        conn
    }

    #[test]
    fn add_trims_validates_and_rejects_duplicates() {
        let conn = mem_conn();
        let store = KvStore::new(&conn);
        let mut roster = RosterRepository::load(&store).expect("load");
        let date = SchoolDate::resolve(Some("2026-08-23")).expect("date");

        assert!(matches!(
            roster.add("  ", "رياضيات", "", &date).expect("add"),
            Err(AddTeacherError::MissingField)
        ));
        let ahmad = roster
            .add(" أحمد ", "رياضيات", " 0501234567 ", &date)
            .expect("add")
            .expect("ok");
        assert_eq!(ahmad.name, "أحمد");
        assert_eq!(ahmad.phone, "0501234567");
        assert_eq!(ahmad.created_at, "2026-08-23");

        assert!(matches!(
            roster.add("أحمد", "علوم", "", &date).expect("add"),
            Err(AddTeacherError::DuplicateName)
        ));
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let conn = mem_conn();
        let store = KvStore::new(&conn);
        let mut roster = RosterRepository::load(&store).expect("load");
        let date = SchoolDate::resolve(Some("2026-08-23")).expect("date");

        let a = roster.add("أحمد", "رياضيات", "", &date).expect("add").expect("ok");
        let b = roster.add("سارة", "علوم", "", &date).expect("add").expect("ok");
        let c = roster.add("خالد", "لغة", "", &date).expect("add").expect("ok");
        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn remove_is_by_id_and_reports_misses() {
        let conn = mem_conn();
        let store = KvStore::new(&conn);
        let mut roster = RosterRepository::load(&store).expect("load");
        let date = SchoolDate::resolve(Some("2026-08-23")).expect("date");
        let a = roster.add("أحمد", "رياضيات", "", &date).expect("add").expect("ok");

        assert!(roster.remove(a.id).expect("remove"));
        assert!(!roster.remove(a.id).expect("remove again"));
        assert!(!roster.contains_name("أحمد"));
    }
}
