//! Schema scripts to ordered DDL statement lists.

use anyhow::{Context, Result};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::fs;
use std::path::Path;

/// Split a script into its statements, in order.
///
/// Statements are parsed with the PostgreSQL dialect and rendered back one by
/// one, so comments and formatting are not preserved.
pub fn split_statements(sql: &str) -> Result<Vec<String>> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .context("parse DDL (Postgres dialect)")?;
    Ok(statements.iter().map(|s| s.to_string()).collect())
}

/// Read `path` and split it with [`split_statements`].
pub fn load_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read DDL file {}", path.display()))?;
    split_statements(&contents).with_context(|| format!("Invalid DDL in {}", path.display()))
}
