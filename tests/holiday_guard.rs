use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_jadwald");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn jadwald");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u32,
}

impl Sidecar {
    fn start(workspace: &PathBuf) -> Sidecar {
        let (child, stdin, reader) = spawn_sidecar();
        let mut s = Sidecar {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        let resp = s.request(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
        s
    }

    fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response");
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    fn finish(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

const FRIDAY: &str = "2026-08-28";
const SATURDAY: &str = "2026-08-29";

#[test]
fn weekend_rejects_absence_and_empties_the_display() {
    let workspace = temp_dir("jadwal-holiday");
    let mut s = Sidecar::start(&workspace);

    let resp = s.request(
        "teachers.add",
        json!({ "name": "أحمد", "subject": "رياضيات" }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
    let resp = s.request(
        "schedule.setSupervisor",
        json!({ "day": "الأحد", "index": 0, "name": "مشرف" }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));

    for date in [FRIDAY, SATURDAY] {
        let resp = s.request(
            "absence.toggle",
            json!({ "teacherName": "أحمد", "date": date }),
        );
        assert_eq!(
            resp.pointer("/error/code").and_then(|v| v.as_str()),
            Some("holiday"),
            "toggle on {}",
            date
        );

        // Nothing was recorded for the weekend date.
        let resp = s.request("absence.open", json!({ "date": date }));
        assert!(resp.pointer("/result/day").expect("day").is_null());
        assert_eq!(
            resp.pointer("/result/absences")
                .and_then(|v| v.as_array())
                .map(|a| a.len()),
            Some(0)
        );

        let resp = s.request(
            "ticker.periodData",
            json!({ "period": "الأولى", "date": date }),
        );
        assert!(resp.pointer("/result/data").expect("data").is_null());

        let resp = s.request("ticker.todayStaff", json!({ "date": date }));
        assert!(resp.pointer("/result/data").expect("data").is_null());
    }

    // Sessions and eligibility are holiday-guarded too.
    let resp = s.request(
        "absence.sessions",
        json!({ "teacherName": "أحمد", "date": FRIDAY }),
    );
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("holiday")
    );
    let resp = s.request(
        "absence.eligible",
        json!({ "period": "الأولى", "teacherName": "أحمد", "date": FRIDAY }),
    );
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("holiday")
    );

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}
