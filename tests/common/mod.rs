#![allow(dead_code)]

use std::io::Error;
use std::path::Path;

pub const BORROWER: &str = r#"{"name":"Ada Lovelace","email":"ada@example.com","phone":"555-0100"}"#;
pub const LOAN: &str = r#"{"borrower_id":1,"amount":400,"interest_rate":25,"duration_weeks":5}"#;

/// Writes a request script with `method, path, body` columns.
pub fn write_requests(path: &Path, rows: &[(&str, &str, &str)]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["method", "path", "body"])?;
    for (method, path, body) in rows {
        wtr.write_record([*method, *path, *body])?;
    }
    wtr.flush()?;
    Ok(())
}

/// A JSON body as it appears in the `body` column of the response CSV.
pub fn csv_body(json: &str) -> String {
    format!("\"{}\"", json.replace('"', "\"\""))
}
