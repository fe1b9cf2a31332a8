use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("jadwal.sqlite3");
    let conn = Connection::open(db_path)?;

    // The whole dashboard state is a flat key-value store: each key holds
    // one JSON document (grid, roster, absence map, ...).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}
