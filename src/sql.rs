//! SQL text helpers.

/// Quote an identifier for interpolation into DDL.
///
/// Database names can't be bound as parameters in `CREATE DATABASE` /
/// `DROP DATABASE`, so they are always double-quoted with embedded quotes
/// doubled. Case is preserved.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
