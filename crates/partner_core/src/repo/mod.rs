//! Repository layer: the partner store collaborator.
//!
//! # Responsibility
//! - Define store contracts consumed by the hierarchy services.
//! - Isolate SQLite query details from synchronization logic.
//!
//! # Invariants
//! - Write paths call `Partner::validate()` before SQL mutations.
//! - Child listings only return active records, in creation order.
//! - Repositories never run synchronization; they are plain storage.

pub mod category_repo;
pub mod partner_repo;

use rusqlite::Connection;
use uuid::Uuid;

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("invalid boolean value `{other}` in {column}")),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid `{value}` in {column}"))
}

pub(crate) fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Escapes `%`, `_` and `\` for `LIKE ... ESCAPE '\'` patterns.
pub(crate) fn like_contains(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::{int_to_bool, like_contains};

    #[test]
    fn like_contains_escapes_wildcards() {
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn int_to_bool_rejects_out_of_range_values() {
        assert!(int_to_bool(1, "partners.active").unwrap());
        assert!(int_to_bool(2, "partners.active")
            .unwrap_err()
            .contains("partners.active"));
    }
}
