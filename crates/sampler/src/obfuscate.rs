//! SQL literal obfuscation
//!
//! Replaces quoted strings and numeric literals with `?` so query text can
//! leave the process without carrying user data.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_SINGLE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'(?:[^'\\]|\\.|'')*'").expect("valid single-quote pattern"));

static RE_DOUBLE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.|"")*""#).expect("valid double-quote pattern"));

/// Identifiers and numeric literals in one pass, so digits inside an
/// identifier never start a number and hex or exponent tails never start an
/// identifier
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<number>0[xX][0-9A-Fa-f]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)|[A-Za-z_][A-Za-z0-9_]*",
    )
    .expect("valid token pattern")
});

/// Replace literals in `sql` with `?`
///
/// # Example
///
/// ```
/// use tracewarden_sampler::obfuscate_sql;
///
/// assert_eq!(
///     obfuscate_sql("SELECT * FROM users WHERE name = 'bob' AND age > 30"),
///     "SELECT * FROM users WHERE name = ? AND age > ?"
/// );
/// ```
pub fn obfuscate_sql(sql: &str) -> String {
    let sql = RE_SINGLE_QUOTED.replace_all(sql, "?");
    let sql = RE_DOUBLE_QUOTED.replace_all(&sql, "?");
    replace_numbers(&sql)
}

/// Numbers inside identifiers such as `t1` or `col_2` are left alone
fn replace_numbers(sql: &str) -> String {
    RE_TOKEN
        .replace_all(sql, |caps: &Captures<'_>| {
            if caps.name("number").is_some() {
                "?".to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
