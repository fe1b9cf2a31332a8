use crate::calendar::is_valid_clock;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{CellField, ScheduleRepository, DAYS, PERIODS, STAFF_SLOTS};
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
        code: "db_update_failed",
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

fn require_known_day(day: &str) -> Result<(), HandlerErr> {
    if ScheduleRepository::is_known_day(day) {
        return Ok(());
    }
    Err(HandlerErr {
        code: "bad_params",
        message: format!("unknown day: {}", day),
        details: Some(json!({ "days": DAYS })),
    })
}

fn require_known_period(period: &str) -> Result<(), HandlerErr> {
    if ScheduleRepository::is_known_period(period) {
        return Ok(());
    }
    Err(HandlerErr {
        code: "bad_params",
        message: format!("unknown period: {}", period),
        details: Some(json!({ "periods": PERIODS })),
    })
}

fn schedule_open(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let day = get_required_str(params, "day")?;
    require_known_day(&day)?;
    let repo = ScheduleRepository::load(store).map_err(storage_err)?;

    Ok(json!({
        "day": day,
        "days": DAYS,
        "periods": PERIODS,
        "classes": repo.classes,
        "periodTimes": repo.period_times,
        "grid": repo.day_grid(&day),
        "supervisors": repo.supervisors.get(&day).cloned().unwrap_or_else(|| vec![String::new(); STAFF_SLOTS]),
        "dutyStaff": repo.duty_staff.get(&day).cloned().unwrap_or_else(|| vec![String::new(); STAFF_SLOTS]),
    }))
}

fn schedule_set_cell(store: &KvStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let day = get_required_str(params, "day")?;
    let period = get_required_str(params, "period")?;
    let class_name = get_required_str(params, "className")?;
    let field_raw = get_required_str(params, "field")?;
    let value = get_required_str(params, "value")?.trim().to_string();

    require_known_day(&day)?;
    require_known_period(&period)?;
    let field = CellField::parse(&field_raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: "field must be subject or teacher".to_string(),
        details: None,
    })?;

    let mut repo = ScheduleRepository::load(store).map_err(storage_err)?;
    if !repo.classes.contains(&class_name) {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("unknown class: {}", class_name),
            details: None,
        });
    }

    // The double-booking invariant is enforced here, at the only write
    // path: a rejected write leaves the prior cell value untouched.
    if field == CellField::Teacher && !value.is_empty() {
        if let Some(conflicting) = repo.teacher_conflict(&day, &period, &class_name, &value) {
            return Err(HandlerErr {
                code: "conflict",
                message: format!("المعلم {} موجود بالفعل في الصف {}", value, conflicting),
                details: Some(json!({
                    "day": day,
                    "period": period,
                    "conflictingClass": conflicting,
                })),
            });
        }
    }

    repo.set_cell(&day, &period, &class_name, field, &value)
        .map_err(storage_err)?;
    Ok(json!({ "ok": true }))
}

fn schedule_set_period_time(
    store: &KvStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let period = get_required_str(params, "period")?;
    let start = get_required_str(params, "start")?.trim().to_string();
    let end = get_required_str(params, "end")?.trim().to_string();

    require_known_period(&period)?;
    if !is_valid_clock(&start) || !is_valid_clock(&end) || start > end {
        return Err(HandlerErr {
            code: "bad_params",
            message: "start and end must be HH:MM with start <= end".to_string(),
            details: Some(json!({ "start": start, "end": end })),
        });
    }

    let mut repo = ScheduleRepository::load(store).map_err(storage_err)?;
    repo.set_period_time(&period, &start, &end)
        .map_err(storage_err)?;
    Ok(json!({ "ok": true }))
}

fn schedule_set_class_names(
    store: &KvStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw) = params.get("classNames").and_then(|v| v.as_array()) else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "missing classNames".to_string(),
            details: None,
        });
    };
    let mut class_names = Vec::new();
    for v in raw {
        let Some(name) = v.as_str().map(|s| s.trim().to_string()) else {
            return Err(HandlerErr {
                code: "bad_params",
                message: "classNames must be strings".to_string(),
                details: None,
            });
        };
        if name.is_empty() {
            continue;
        }
        if class_names.contains(&name) {
            return Err(HandlerErr {
                code: "duplicate",
                message: format!("duplicate class name: {}", name),
                details: None,
            });
        }
        class_names.push(name);
    }
    if class_names.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "classNames must not be empty".to_string(),
            details: None,
        });
    }

    let mut repo = ScheduleRepository::load(store).map_err(storage_err)?;
    repo.set_class_names(class_names.clone()).map_err(storage_err)?;
    Ok(json!({ "classes": class_names }))
}

fn set_staff_slot(
    store: &KvStore,
    params: &serde_json::Value,
    duty: bool,
) -> Result<serde_json::Value, HandlerErr> {
    let day = get_required_str(params, "day")?;
    let name = get_required_str(params, "name")?.trim().to_string();
    let index = params
        .get("index")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing index".to_string(),
            details: None,
        })? as usize;

    require_known_day(&day)?;
    if index >= STAFF_SLOTS {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("index must be 0..{}", STAFF_SLOTS),
            details: None,
        });
    }

    let mut repo = ScheduleRepository::load(store).map_err(storage_err)?;
    if duty {
        repo.set_duty_staff(&day, index, &name).map_err(storage_err)?;
    } else {
        repo.set_supervisor(&day, index, &name).map_err(storage_err)?;
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
        "schedule.open" => Some(dispatch(state, req, schedule_open)),
        "schedule.setCell" => Some(dispatch(state, req, schedule_set_cell)),
        "schedule.setPeriodTime" => Some(dispatch(state, req, schedule_set_period_time)),
        "schedule.setClassNames" => Some(dispatch(state, req, schedule_set_class_names)),
        "schedule.setSupervisor" => Some(dispatch(state, req, |s, p| set_staff_slot(s, p, false))),
        "schedule.setDutyStaff" => Some(dispatch(state, req, |s, p| set_staff_slot(s, p, true))),
        _ => None,
    }
}
