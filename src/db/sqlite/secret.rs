use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS client_secret (
    client_id TEXT PRIMARY KEY NOT NULL,
    secret TEXT NOT NULL
);
"#;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn save_secret(tx: &Transaction, client_id: &str, secret: &str) -> Result<()> {
    let sql = r#"
    INSERT INTO client_secret (client_id, secret) VALUES (?, ?)
    ON CONFLICT(client_id) DO UPDATE SET secret = excluded.secret
    "#;
    // Never log the secret itself.
    debug!("Database save_secret: {sql}, {client_id}");
    tx.execute(sql, params![client_id, secret])?;
    Ok(())
}

pub fn get_secret(tx: &Transaction, client_id: &str) -> Result<Option<String>> {
    let sql = "SELECT secret FROM client_secret WHERE client_id = ?";
    debug!("Database get_secret: {sql}, {client_id}");
    let secret = tx
        .query_row(sql, params![client_id], |row| row.get(0))
        .optional()?;
    Ok(secret)
}
