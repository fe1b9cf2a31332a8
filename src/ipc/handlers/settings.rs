use crate::calendar::SchoolDate;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::RosterRepository;
use crate::schedule::ScheduleRepository;
use crate::store::{keys, KvStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn storage_err(e: anyhow::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    school_name: String,
    language: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            school_name: "الجداول الدراسية اليومية".to_string(),
            language: "ar".to_string(),
        }
    }
}

fn settings_get(store: &KvStore) -> Result<serde_json::Value, HandlerErr> {
    let settings: AppSettings = store
        .get_as(keys::APP_SETTINGS)
        .map_err(storage_err)?
        .unwrap_or_default();
    Ok(json!({ "settings": settings }))
}

fn settings_set(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut settings: AppSettings = store
        .get_as(keys::APP_SETTINGS)
        .map_err(storage_err)?
        .unwrap_or_default();

    if let Some(name) = params.get("schoolName").and_then(|v| v.as_str()) {
        let name = name.trim();
        if name.is_empty() {
            return Err(HandlerErr {
                code: "bad_params",
                message: "schoolName must not be empty".to_string(),
                details: None,
            });
        }
        settings.school_name = name.to_string();
    }
    if let Some(language) = params.get("language").and_then(|v| v.as_str()) {
        settings.language = language.trim().to_string();
    }

    store
        .set(keys::APP_SETTINGS, &settings)
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        })?;
    Ok(json!({ "settings": settings }))
}

fn stats_get(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = SchoolDate::resolve(params.get("date").and_then(|v| v.as_str())).map_err(|m| {
        HandlerErr {
            code: "bad_params",
            message: m,
            details: None,
        }
    })?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;

    let scheduled_sessions: usize = schedule
        .grid
        .values()
        .flat_map(|day| day.values())
        .flat_map(|period| period.values())
        .filter(|cell| cell.is_scheduled())
        .count();

    let storage_bytes: usize = store
        .export_all()
        .map_err(storage_err)?
        .values()
        .map(|v| v.to_string().len())
        .sum();

    Ok(json!({
        "teacherCount": roster.teachers.len(),
        "scheduledSessions": scheduled_sessions,
        "storageBytes": storage_bytes,
        "asOf": date.date_key,
    }))
}

fn backup_export(store: &KvStore) -> Result<serde_json::Value, HandlerErr> {
    let data = store.export_all().map_err(storage_err)?;
    Ok(json!({
        "data": data,
        "exportDate": Utc::now().to_rfc3339(),
    }))
}

fn backup_import(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(data) = params.get("data").and_then(|v| v.as_object()) else {
        return Err(HandlerErr {
            code: "bad_import",
            message: "data must be an object of key/value pairs".to_string(),
            details: None,
        });
    };

    store.import_all(data).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(json!({ "imported": data.len() }))
}

fn dispatch(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&KvStore, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store = KvStore::new(conn);
    match f(&store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(dispatch(state, req, |s, _| settings_get(s))),
        "settings.set" => Some(dispatch(state, req, settings_set)),
        "stats.get" => Some(dispatch(state, req, stats_get)),
        "backup.export" => Some(dispatch(state, req, |s, _| backup_export(s))),
        "backup.import" => Some(dispatch(state, req, backup_import)),
        _ => None,
    }
}
