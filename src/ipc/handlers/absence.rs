use crate::calendar::SchoolDate;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::RosterRepository;
use crate::schedule::ScheduleRepository;
use crate::store::KvStore;
use crate::substitute::{SubstituteEngine, ToggleOutcome};
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

fn holiday_err() -> HandlerErr {
    HandlerErr {
        code: "holiday",
        message: "لا يمكن تسجيل غياب في يوم عطلة".to_string(),
        details: None,
    }
}

/// Session cards for one absent teacher: each with its override (if any)
/// and the eligible-substitute list for its period.
fn session_cards(
    engine: &SubstituteEngine,
    date: &SchoolDate,
    day: &str,
    teacher_name: &str,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let overrides = engine.overrides_for(&date.date_key)?;
    let cards = engine
        .affected_sessions(day, teacher_name)
        .into_iter()
        .map(|session| {
            let session_key = format!("{}-{}", session.period, session.class_name);
            let eligible: Vec<_> = engine
                .eligible_substitutes(day, &session.period, teacher_name)
                .into_iter()
                .map(|t| json!({ "id": t.id, "name": t.name, "subject": t.subject }))
                .collect();
            json!({
                "period": session.period,
                "className": session.class_name,
                "subject": session.subject,
                "sessionKey": session_key,
                "assigned": overrides.get(&session_key),
                "eligible": eligible,
            })
        })
        .collect();
    Ok(cards)
}

fn absence_open(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = resolve_date(params)?;
    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    let absences = engine.absences_for(&date.date_key).map_err(storage_err)?;
    let overrides = engine.overrides_for(&date.date_key).map_err(storage_err)?;

    // With exactly one absentee their session cards open directly; with
    // several the operator must pick one first.
    let focus = match (date.day_name, absences.as_slice()) {
        (Some(day), [only]) => {
            let cards = session_cards(&engine, &date, day, only).map_err(storage_err)?;
            json!({ "teacherName": only, "sessions": cards })
        }
        _ => serde_json::Value::Null,
    };

    Ok(json!({
        "date": date.date_key,
        "day": date.day_name,
        "absences": absences,
        "overrides": overrides,
        "focus": focus,
    }))
}

fn absence_toggle(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_name = get_required_str(params, "teacherName")?;
    let date = resolve_date(params)?;

    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    if !roster.contains_name(&teacher_name) {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("no roster teacher named {}", teacher_name),
            details: None,
        });
    }
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    match engine
        .toggle_absence(&date, &teacher_name)
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        })? {
        ToggleOutcome::Holiday => Err(holiday_err()),
        ToggleOutcome::Cleared => Ok(json!({
            "status": "cleared",
            "date": date.date_key,
            "teacherName": teacher_name,
        })),
        ToggleOutcome::Marked(sessions) => Ok(json!({
            "status": "marked",
            "date": date.date_key,
            "teacherName": teacher_name,
            "sessions": sessions,
        })),
    }
}

fn absence_sessions(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_name = get_required_str(params, "teacherName")?;
    let date = resolve_date(params)?;
    let Some(day) = date.day_name else {
        return Err(holiday_err());
    };

    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    let cards = session_cards(&engine, &date, day, &teacher_name).map_err(storage_err)?;
    Ok(json!({
        "date": date.date_key,
        "day": day,
        "teacherName": teacher_name,
        "sessions": cards,
    }))
}

fn absence_eligible(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let period = get_required_str(params, "period")?;
    let teacher_name = get_required_str(params, "teacherName")?;
    let date = resolve_date(params)?;
    let Some(day) = date.day_name else {
        return Err(holiday_err());
    };
    if !ScheduleRepository::is_known_period(&period) {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("unknown period: {}", period),
            details: None,
        });
    }

    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    let eligible: Vec<_> = engine
        .eligible_substitutes(day, &period, &teacher_name)
        .into_iter()
        .map(|t| json!({ "id": t.id, "name": t.name, "subject": t.subject }))
        .collect();
    Ok(json!({
        "date": date.date_key,
        "day": day,
        "period": period,
        "eligible": eligible,
    }))
}

fn absence_assign(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_key = get_required_str(params, "sessionKey")?;
    let substitute_name = get_required_str(params, "substituteName")?;
    let date = resolve_date(params)?;

    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    engine
        .assign_substitute(&date.date_key, &session_key, &substitute_name)
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        })?;
    Ok(json!({
        "date": date.date_key,
        "overrides": engine.overrides_for(&date.date_key).map_err(storage_err)?,
    }))
}

fn absence_reconcile(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = resolve_date(params)?;
    let schedule = ScheduleRepository::load(store).map_err(storage_err)?;
    let roster = RosterRepository::load(store).map_err(storage_err)?;
    let engine = SubstituteEngine::new(store, &schedule, &roster);

    let report = engine.reconcile(&date.date_key).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(json!({ "date": date.date_key, "report": report }))
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
        "absence.open" => Some(dispatch(state, req, absence_open)),
        "absence.toggle" => Some(dispatch(state, req, absence_toggle)),
        "absence.sessions" => Some(dispatch(state, req, absence_sessions)),
        "absence.eligible" => Some(dispatch(state, req, absence_eligible)),
        "absence.assign" => Some(dispatch(state, req, absence_assign)),
        "absence.reconcile" => Some(dispatch(state, req, absence_reconcile)),
        _ => None,
    }
}
