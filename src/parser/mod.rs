pub mod record;

use chrono::{DateTime, Local};
use fancy_regex::Regex;

use crate::error::Error;
use record::{FieldValue, LogRecord};

pub use record::{coerce_records, NUMERIC_FIELDS};

/// Apache timestamp as it appears inside `%t` brackets.
const APACHE_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// A line parser compiled from an Apache `LogFormat` string.
///
/// Each format directive becomes one capture group; field names follow the
/// conventional `LogFormat` vocabulary (`remote_host`, `time_received`,
/// `status`, `response_bytes_clf`, `time_us`, ...). Lines that do not match
/// the compiled pattern parse to `None`; that is a per-line event, not an
/// error.
#[derive(Debug)]
pub struct LineParser {
    regex: Regex,
    names: Vec<String>,
    format: String,
}

impl LineParser {
    pub fn new(format: &str) -> Result<Self, Error> {
        let (pattern, names) = compile_format(format)?;
        let regex = Regex::new(&pattern).map_err(|e| {
            Error::Configuration(format!("log format {format:?} compiles to a bad pattern: {e}"))
        })?;
        Ok(LineParser {
            regex,
            names,
            format: format.to_string(),
        })
    }

    /// Field names the compiled format produces, in directive order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parse one log line. `None` means the line does not match the format
    /// or carries an unreadable timestamp.
    pub fn parse(&self, line: &str) -> Option<LogRecord> {
        let captures = self.regex.captures(line).ok().flatten()?;
        let mut record = LogRecord::new();
        for (idx, name) in self.names.iter().enumerate() {
            let raw = captures.get(idx + 1)?.as_str();
            if name == "time_received" {
                let ts = parse_apache_time(raw)?;
                record.insert(name.clone(), FieldValue::Time(ts));
            } else {
                record.insert(name.clone(), FieldValue::Str(raw.to_string()));
            }
        }
        Some(record)
    }
}

/// Parse `[10/Oct/2024:13:55:36 +0000]` (brackets optional) into local time.
fn parse_apache_time(raw: &str) -> Option<DateTime<Local>> {
    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    DateTime::parse_from_str(inner, APACHE_TIME_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

/// Translate a `LogFormat` string into an anchored regex pattern plus the
/// ordered list of field names, one per capture group.
fn compile_format(format: &str) -> Result<(String, Vec<String>), Error> {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            escape_literal(c, &mut pattern);
            continue;
        }

        // Optional modifiers: %>s, %<s and `%{Name}i` style arguments
        let mut arg = None;
        while let Some(&next) = chars.peek() {
            match next {
                '>' | '<' => {
                    chars.next();
                }
                '{' => {
                    chars.next();
                    let mut inner = String::new();
                    for a in chars.by_ref() {
                        if a == '}' {
                            break;
                        }
                        inner.push(a);
                    }
                    arg = Some(inner);
                }
                _ => break,
            }
        }

        let directive = chars.next().ok_or_else(|| {
            Error::Configuration(format!("log format {format:?} ends in a bare '%'"))
        })?;

        if directive == '%' {
            escape_literal('%', &mut pattern);
            continue;
        }

        let (name, group) = directive_field(directive, arg.as_deref(), format)?;
        pattern.push('(');
        pattern.push_str(group);
        pattern.push(')');
        names.push(name);
    }

    pattern.push('$');
    Ok((pattern, names))
}

fn directive_field(
    directive: char,
    arg: Option<&str>,
    format: &str,
) -> Result<(String, &'static str), Error> {
    let field = match directive {
        'h' => ("remote_host", r"\S+"),
        'a' => ("remote_ip", r"\S+"),
        'A' => ("local_ip", r"\S+"),
        'l' => ("remote_logname", r"\S+"),
        'u' => ("remote_user", r"\S+"),
        't' => ("time_received", r"\[[^\]]+\]"),
        'r' => ("request_first_line", r#"[^"]*"#),
        'm' => ("request_method", r"\S+"),
        'U' => ("url_path", r"\S+"),
        'q' => ("query_string", r"\S*"),
        'H' => ("request_protocol", r"\S+"),
        's' => ("status", r"\d{3}|-"),
        'b' => ("response_bytes_clf", r"\d+|-"),
        'B' => ("response_bytes", r"\d+"),
        'D' => ("time_us", r"\d+|-"),
        'T' => ("time_s", r"[\d.]+"),
        'k' => ("num_keepalives", r"\d+"),
        'I' => ("bytes_rx", r"\d+"),
        'O' => ("bytes_tx", r"\d+"),
        'v' => ("server_name", r"\S+"),
        'p' => ("server_port", r"\d+"),
        'P' => ("pid", r"\d+"),
        'f' => ("filename", r"\S+"),
        'i' | 'o' => {
            let header = arg.ok_or_else(|| {
                Error::Configuration(format!(
                    "log format {format:?}: %{directive} needs a {{Header}} argument"
                ))
            })?;
            let prefix = if directive == 'i' {
                "request_header"
            } else {
                "response_header"
            };
            return Ok((format!("{prefix}_{}", header_slug(header)), r#"[^"]*"#));
        }
        other => {
            return Err(Error::Configuration(format!(
                "log format {format:?} uses unsupported directive %{other}"
            )))
        }
    };
    Ok((field.0.to_string(), field.1))
}

/// `User-Agent` -> `user_agent`
fn header_slug(header: &str) -> String {
    header
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_literal(c: char, pattern: &mut String) {
    if matches!(
        c,
        '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
    ) {
        pattern.push('\\');
    }
    pattern.push(c);
}
