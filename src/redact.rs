//! Redaction for anything that ends up in logs or CLI output.
//!
//! Service hosts carry credentials; DDL may carry literals. Neither is ever
//! logged verbatim.

use url::Url;

/// Maximum statement length kept in logs (characters).
const MAX_STATEMENT_LENGTH: usize = 120;

/// Mask the password of a connection URL and drop its query string.
///
/// Keeps scheme, user, host, port and path.
pub fn redact_dsn(dsn: &str) -> String {
    if let Ok(mut url) = Url::parse(dsn) {
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.set_query(None);
        return url.to_string();
    }

    // Unparseable: keep only what follows the last '@' (passwords may contain '@')
    let without_query = dsn.split('?').next().unwrap_or(dsn);
    match (without_query.find("://"), without_query.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &without_query[..scheme_end + 3], &without_query[at + 1..])
        }
        (None, Some(_)) => "***REDACTED***".to_string(),
        _ => without_query.to_string(),
    }
}

/// Shorten a statement for logging and replace quoted literals with `'...'`.
pub fn redact_statement(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if !in_literal {
            if c == '\'' {
                in_literal = true;
            } else {
                out.push(if c.is_whitespace() { ' ' } else { c });
            }
            continue;
        }
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
            } else {
                out.push_str("'...'");
                in_literal = false;
            }
        }
    }
    if in_literal {
        out.push_str("'...'");
    }

    if out.chars().count() > MAX_STATEMENT_LENGTH {
        let cut: String = out.chars().take(MAX_STATEMENT_LENGTH).collect();
        format!("{cut}...")
    } else {
        out
    }
}
