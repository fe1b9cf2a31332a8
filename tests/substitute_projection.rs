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

const SUNDAY: &str = "2026-08-23";

fn seed(s: &mut Sidecar) {
    for (name, subject) in [("أحمد", "رياضيات"), ("سارة", "علوم"), ("خالد", "لغة")] {
        let resp = s.request(
            "teachers.add",
            json!({ "name": name, "subject": subject, "date": SUNDAY }),
        );
        assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
    }
    for (class_name, subject, teacher) in
        [("1/1", "رياضيات", "أحمد"), ("1/2", "علوم", "سارة")]
    {
        for (field, value) in [("subject", subject), ("teacher", teacher)] {
            let resp = s.request(
                "schedule.setCell",
                json!({
                    "day": "الأحد",
                    "period": "الثالثة",
                    "className": class_name,
                    "field": field,
                    "value": value,
                }),
            );
            assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
        }
    }
}

fn row_for<'a>(data: &'a serde_json::Value, class_name: &str) -> &'a serde_json::Value {
    data.pointer("/result/data/classes")
        .and_then(|v| v.as_array())
        .expect("classes")
        .iter()
        .find(|row| row.get("className").and_then(|v| v.as_str()) == Some(class_name))
        .expect("row")
}

#[test]
fn assigned_substitute_shows_up_flagged_in_the_projection() {
    let workspace = temp_dir("jadwal-projection");
    let mut s = Sidecar::start(&workspace);
    seed(&mut s);

    let _ = s.request(
        "absence.toggle",
        json!({ "teacherName": "أحمد", "date": SUNDAY }),
    );
    let _ = s.request(
        "absence.assign",
        json!({ "sessionKey": "الثالثة-1/1", "substituteName": "خالد", "date": SUNDAY }),
    );

    let resp = s.request(
        "ticker.periodData",
        json!({ "period": "الثالثة", "date": SUNDAY }),
    );
    assert_eq!(
        resp.pointer("/result/data/day").and_then(|v| v.as_str()),
        Some("الأحد")
    );
    let row = row_for(&resp, "1/1");
    assert_eq!(row.get("teacher").and_then(|v| v.as_str()), Some("خالد"));
    assert_eq!(row.get("isSubstitute").and_then(|v| v.as_bool()), Some(true));

    // The untouched class keeps its original teacher, unflagged.
    let row = row_for(&resp, "1/2");
    assert_eq!(row.get("teacher").and_then(|v| v.as_str()), Some("سارة"));
    assert_eq!(row.get("isSubstitute").and_then(|v| v.as_bool()), Some(false));

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn override_overwrite_is_idempotent_and_empty_clears() {
    let workspace = temp_dir("jadwal-assign");
    let mut s = Sidecar::start(&workspace);
    seed(&mut s);
    let key = "الثالثة-1/1";

    let resp = s.request(
        "absence.assign",
        json!({ "sessionKey": key, "substituteName": "خالد", "date": SUNDAY }),
    );
    let overrides = resp.pointer("/result/overrides").expect("overrides");
    assert_eq!(overrides.get(key).and_then(|v| v.as_str()), Some("خالد"));

    // Overwrite, regardless of prior value.
    let resp = s.request(
        "absence.assign",
        json!({ "sessionKey": key, "substituteName": "سارة", "date": SUNDAY }),
    );
    let overrides = resp.pointer("/result/overrides").expect("overrides");
    assert_eq!(overrides.get(key).and_then(|v| v.as_str()), Some("سارة"));

    // Empty selection removes the key entirely.
    let resp = s.request(
        "absence.assign",
        json!({ "sessionKey": key, "substituteName": "", "date": SUNDAY }),
    );
    let overrides = resp
        .pointer("/result/overrides")
        .and_then(|v| v.as_object())
        .expect("overrides");
    assert!(!overrides.contains_key(key));

    // Projection falls back to the base schedule.
    let resp = s.request(
        "ticker.periodData",
        json!({ "period": "الثالثة", "date": SUNDAY }),
    );
    let row = row_for(&resp, "1/1");
    assert_eq!(row.get("teacher").and_then(|v| v.as_str()), Some("أحمد"));
    assert_eq!(row.get("isSubstitute").and_then(|v| v.as_bool()), Some(false));

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn overrides_are_scoped_to_their_date() {
    let workspace = temp_dir("jadwal-datescope");
    let mut s = Sidecar::start(&workspace);
    seed(&mut s);

    let _ = s.request(
        "absence.assign",
        json!({ "sessionKey": "الثالثة-1/1", "substituteName": "خالد", "date": SUNDAY }),
    );

    // The following Sunday shares the day grid but not the override.
    let resp = s.request(
        "ticker.periodData",
        json!({ "period": "الثالثة", "date": "2026-08-30" }),
    );
    let row = row_for(&resp, "1/1");
    assert_eq!(row.get("teacher").and_then(|v| v.as_str()), Some("أحمد"));
    assert_eq!(row.get("isSubstitute").and_then(|v| v.as_bool()), Some(false));

    s.finish();
    let _ = std::fs::remove_dir_all(workspace);
}
