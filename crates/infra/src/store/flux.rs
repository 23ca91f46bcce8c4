//! InfluxDB v2 text formats: line protocol, Flux queries, delete predicates, and the
//! CSV result encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use super::r#trait::{Condition, DeletePredicate, Point, Row, RowQuery, StoreError};

/// Columns of a query result that are not tags.
const RESERVED_COLUMNS: &[&str] = &[
    "", "result", "table", "_start", "_stop", "_time", "_value", "_field", "_measurement",
];

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Line protocol
// ─────────────────────────────────────────────────────────────────────────────

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn escape_field_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render one point as a line of line protocol with a nanosecond timestamp.
pub(crate) fn line_protocol(point: &Point) -> Result<String, StoreError> {
    if point.fields.is_empty() {
        return Err(StoreError::InvalidRequest("point has no fields".to_string()));
    }
    let nanos = point
        .time
        .timestamp_nanos_opt()
        .ok_or_else(|| StoreError::InvalidRequest("timestamp out of range".to_string()))?;

    let mut line = escape_measurement(&point.measurement);
    // Empty tag values are not representable.
    for (k, v) in point.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        line.push_str(&escape_key(k));
        line.push('=');
        line.push_str(&escape_key(v));
    }

    let fields: Vec<String> = point
        .fields
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", escape_key(k), escape_field_string(v)))
        .collect();
    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&nanos.to_string());
    Ok(line)
}

// ─────────────────────────────────────────────────────────────────────────────
// Flux
// ─────────────────────────────────────────────────────────────────────────────

/// Quote a value as a Flux string literal.
pub(crate) fn flux_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{escaped}\"")
}

fn flux_condition(condition: &Condition) -> String {
    match condition {
        Condition::Tag { key, value } => {
            format!("r[{}] == {}", flux_string(key), flux_string(value))
        }
        Condition::Field { field, value } => format!(
            "r._field == {} and r._value == {}",
            flux_string(field),
            flux_string(value)
        ),
    }
}

pub(crate) fn flux_query(bucket: &str, query: &RowQuery) -> String {
    let mut flux = format!(
        "from(bucket: {})\n  |> range(start: {}, stop: {})\n  |> filter(fn: (r) => r._measurement == {})",
        flux_string(bucket),
        rfc3339(query.range.start),
        rfc3339(query.range.stop),
        flux_string(&query.measurement),
    );
    for condition in &query.conditions {
        flux.push_str(&format!("\n  |> filter(fn: (r) => {})", flux_condition(condition)));
    }
    if let Some(tag) = &query.sort_desc_by_tag {
        flux.push_str(&format!(
            "\n  |> group()\n  |> sort(columns: [{}], desc: true)",
            flux_string(tag)
        ));
    }
    if let Some(window) = query.window {
        flux.push_str(&format!(
            "\n  |> limit(n: {}, offset: {})",
            window.limit, window.offset
        ));
    }
    flux
}

// ─────────────────────────────────────────────────────────────────────────────
// Delete predicate
// ─────────────────────────────────────────────────────────────────────────────

fn predicate_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

pub(crate) fn delete_predicate(predicate: &DeletePredicate) -> String {
    let mut parts = vec![format!(
        "_measurement={}",
        predicate_string(&predicate.measurement)
    )];
    for (k, v) in &predicate.tags {
        parts.push(format!("{k}={}", predicate_string(v)));
    }
    parts.join(" AND ")
}

pub(crate) fn delete_body(start: DateTime<Utc>, stop: DateTime<Utc>, predicate: &DeletePredicate) -> serde_json::Value {
    serde_json::json!({
        "start": rfc3339(start),
        "stop": rfc3339(stop),
        "predicate": delete_predicate(predicate),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// CSV results
// ─────────────────────────────────────────────────────────────────────────────

/// Split CSV text into records. A blank line yields an empty record; it separates
/// result tables.
fn csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line_has_content = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                line_has_content = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                line_has_content = true;
            }
            '\r' => {}
            '\n' => {
                if line_has_content {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                } else {
                    records.push(Vec::new());
                }
                line_has_content = false;
            }
            _ => {
                field.push(c);
                line_has_content = true;
            }
        }
    }
    if line_has_content {
        record.push(field);
        records.push(record);
    }
    records
}

/// Parse a header-only (no annotations) CSV query response into rows.
///
/// Every non-reserved column is treated as a tag; empty tag cells are dropped. An
/// unparseable `_time` falls back to the Unix epoch.
pub(crate) fn parse_query_response(text: &str) -> Result<Vec<Row>, StoreError> {
    let mut rows = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for record in csv_records(text) {
        if record.is_empty() {
            header = None;
            continue;
        }
        let Some(columns) = header.as_ref() else {
            header = Some(record);
            continue;
        };

        let cell = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| record.get(i))
                .map(String::as_str)
        };

        if cell("_field").is_none() {
            if let Some(message) = cell("error") {
                return Err(StoreError::Rejected {
                    status: 200,
                    body: message.to_string(),
                });
            }
        }

        let field = cell("_field")
            .ok_or_else(|| StoreError::Malformed("result has no _field column".to_string()))?
            .to_string();
        let value = cell("_value")
            .ok_or_else(|| StoreError::Malformed("result has no _value column".to_string()))?
            .to_string();
        let time = cell("_time")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let measurement = cell("_measurement").unwrap_or_default().to_string();

        let tags: BTreeMap<String, String> = columns
            .iter()
            .zip(record.iter())
            .filter(|(name, value)| !RESERVED_COLUMNS.contains(&name.as_str()) && !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        rows.push(Row {
            time,
            measurement,
            tags,
            field,
            value,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RowQuery, TimeRange};
    use chrono::TimeZone;

    #[test]
    fn line_protocol_escapes_and_quotes() {
        let t = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let point = Point::new("Users", t)
            .tag("UserId", "a b")
            .tag("Type", "Admin")
            .field("Name", "Ann \"the\" Admin")
            .field("Company", " ");
        let line = line_protocol(&point).unwrap();
        assert_eq!(
            line,
            "Users,Type=Admin,UserId=a\\ b Name=\"Ann \\\"the\\\" Admin\",Company=\" \" 1700000000000000005"
        );
    }

    #[test]
    fn flux_literals_cannot_break_out() {
        assert_eq!(flux_string(r#"a") |> drop()"#), r#""a\") |> drop()""#);
        assert_eq!(flux_string("${x}"), "\"\\${x}\"");
    }

    #[test]
    fn flux_query_renders_filters_sort_and_window() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let q = RowQuery::new("Users", TimeRange::up_to(now))
            .tag_eq("Type", "Admin")
            .field_eq("Email", "a@x.com")
            .sort_desc_by("UserId")
            .window(650, 0);
        let flux = flux_query("users", &q);
        assert!(flux.starts_with("from(bucket: \"users\")"));
        assert!(flux.contains("range(start: 1970-01-01T00:00:00.000000000Z, stop: 2023-11-14T22:13:20.000000000Z)"));
        assert!(flux.contains("r[\"Type\"] == \"Admin\""));
        assert!(flux.contains("r._field == \"Email\" and r._value == \"a@x.com\""));
        assert!(flux.contains("sort(columns: [\"UserId\"], desc: true)"));
        assert!(flux.ends_with("limit(n: 650, offset: 0)"));
    }

    #[test]
    fn largest_window_renders_as_a_signed_limit() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let q = RowQuery::new("Users", TimeRange::up_to(now)).window(i64::MAX as usize, 0);
        assert!(flux_query("users", &q).ends_with("limit(n: 9223372036854775807, offset: 0)"));
    }

    #[test]
    fn delete_predicate_format() {
        let p = DeletePredicate::new("Users").tag_eq("UserId", "abc");
        assert_eq!(delete_predicate(&p), "_measurement=\"Users\" AND UserId=\"abc\"");
    }

    #[test]
    fn csv_response_is_parsed_into_rows() {
        let body = "\
,result,table,_start,_stop,_time,_value,_field,_measurement,Type,UserId\r
,_result,0,1970-01-01T00:00:00Z,2024-01-01T00:00:00Z,2023-11-14T22:13:20Z,Ann,Name,Users,Admin,u1\r
,_result,0,1970-01-01T00:00:00Z,2024-01-01T00:00:00Z,2023-11-14T22:13:20Z,\"a,b \"\"quoted\"\"\",Company,Users,Admin,u1\r
\r
,result,table,_start,_stop,_time,_value,_field,_measurement,CompanyId\r
,_result,1,1970-01-01T00:00:00Z,2024-01-01T00:00:00Z,bad-time,AC,ShortId,Companies,Acme\r
";
        let rows = parse_query_response(body).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].field, "Name");
        assert_eq!(rows[0].value, "Ann");
        assert_eq!(rows[0].tag("UserId"), Some("u1"));
        assert_eq!(rows[0].tag("Type"), Some("Admin"));
        assert_eq!(rows[1].value, "a,b \"quoted\"");
        assert_eq!(rows[2].measurement, "Companies");
        assert_eq!(rows[2].tag("CompanyId"), Some("Acme"));
        assert_eq!(rows[2].time, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn empty_response_has_no_rows() {
        assert!(parse_query_response("").unwrap().is_empty());
        assert!(parse_query_response("\r\n").unwrap().is_empty());
    }

    #[test]
    fn in_band_error_is_surfaced() {
        let body = "error,reference\nfailed to compile,897\n";
        assert!(matches!(
            parse_query_response(body),
            Err(StoreError::Rejected { .. })
        ));
    }
}
