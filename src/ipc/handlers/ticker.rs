use crate::calendar::{resolve_clock, SchoolDate};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::ScheduleRepository;
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

fn resolve_date(params: &serde_json::Value) -> Result<SchoolDate, HandlerErr> {
    SchoolDate::resolve(params.get("date").and_then(|v| v.as_str())).map_err(|m| HandlerErr {
        code: "bad_params",
        message: m,
        details: None,
    })
}

fn ticker_current_period(
    store: &KvStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let clock = resolve_clock(params.get("time").and_then(|v| v.as_str())).map_err(|m| {
        HandlerErr {
            code: "bad_params",
            message: m,
            details: None,
        }
    })?;
    let repo = ScheduleRepository::load(store).map_err(storage_err)?;

    let as_json = |slot: Option<(String, crate::schedule::PeriodTime)>| match slot {
        Some((period, times)) => json!({
            "period": period,
            "start": times.start,
            "end": times.end,
        }),
        None => serde_json::Value::Null,
    };

    Ok(json!({
        "time": clock,
        "current": as_json(repo.period_at(&clock)),
        "next": as_json(repo.next_period_after(&clock)),
    }))
}

fn ticker_period_data(
    store: &KvStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(period) = params.get("period").and_then(|v| v.as_str()) else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "missing period".to_string(),
            details: None,
        });
    };
    if !ScheduleRepository::is_known_period(period) {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("unknown period: {}", period),
            details: None,
        });
    }
    let date = resolve_date(params)?;

    let repo = ScheduleRepository::load(store).map_err(storage_err)?;
    let data = repo.period_data(&date, period).map_err(storage_err)?;
    Ok(json!({ "date": date.date_key, "data": data }))
}

fn ticker_today_staff(
    store: &KvStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = resolve_date(params)?;
    let repo = ScheduleRepository::load(store).map_err(storage_err)?;
    Ok(json!({ "date": date.date_key, "data": repo.today_staff(&date) }))
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
        "ticker.currentPeriod" => Some(dispatch(state, req, ticker_current_period)),
        "ticker.periodData" => Some(dispatch(state, req, ticker_period_data)),
        "ticker.todayStaff" => Some(dispatch(state, req, ticker_today_staff)),
        _ => None,
    }
}
