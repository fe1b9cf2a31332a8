use crate::calendar::SchoolDate;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{AddTeacherError, RosterRepository};
use crate::store::KvStore;
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

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn resolve_date(params: &serde_json::Value) -> Result<SchoolDate, HandlerErr> {
    SchoolDate::resolve(params.get("date").and_then(|v| v.as_str())).map_err(|m| HandlerErr {
        code: "bad_params",
        message: m,
        details: None,
    })
}

fn teachers_list(store: &KvStore) -> Result<serde_json::Value, HandlerErr> {
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    Ok(json!({ "teachers": roster.teachers }))
}

fn teachers_add(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let subject = get_required_str(params, "subject")?;
    let phone = params
        .get("phone")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let date = resolve_date(params)?;

    let mut roster = RosterRepository::load(store).map_err(storage_err)?;
    match roster
        .add(&name, &subject, &phone, &date)
        .map_err(storage_err)?
    {
        Ok(teacher) => Ok(json!({ "teacher": teacher })),
        Err(AddTeacherError::MissingField) => Err(HandlerErr {
            code: "bad_params",
            message: "name and subject must not be empty".to_string(),
            details: None,
        }),
        Err(AddTeacherError::DuplicateName) => Err(HandlerErr {
            code: "duplicate",
            message: format!("a teacher named {} already exists", name.trim()),
            details: None,
        }),
    }
}

fn teachers_remove(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = params
        .get("teacherId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing teacherId".to_string(),
            details: None,
        })?;

    let mut roster = RosterRepository::load(store).map_err(storage_err)?;
    if !roster.remove(teacher_id).map_err(storage_err)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "teacher not found".to_string(),
            details: Some(json!({ "teacherId": teacher_id })),
        });
    }
    Ok(json!({ "ok": true }))
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
        "teachers.list" => Some(dispatch(state, req, |s, _| teachers_list(s))),
        "teachers.add" => Some(dispatch(state, req, teachers_add)),
        "teachers.remove" => Some(dispatch(state, req, teachers_remove)),
        _ => None,
    }
}
