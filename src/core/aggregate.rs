// LogMeter - GPL-3.0-or-later
// This file is part of LogMeter.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// LogMeter is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LogMeter is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LogMeter.  If not, see <https://www.gnu.org/licenses/>.

//! Filtering, grouping and reduction of window records into stat rows.

use indexmap::IndexMap;

use crate::core::window::TimeWindow;
use crate::error::Error;
use crate::parser::record::{FieldValue, LogRecord};

/// A statistic over one group of records.
pub type Reducer = Box<dyn Fn(&[&LogRecord]) -> FieldValue>;

/// One AND-combined set of field constraints.
pub type ConstraintSet = IndexMap<String, FieldValue>;

/// What to compute over a window's records: which records to keep, how to
/// partition them and which statistics to evaluate per partition.
#[derive(Default)]
pub struct AggregationSpec {
    /// Fields whose value tuple partitions the records. Order defines the
    /// tuple; encounter order defines group order.
    pub group_by: Vec<String>,
    /// OR-of-ANDs: a record passes if any constraint set accepts it. An
    /// empty list accepts everything.
    pub filters: Vec<ConstraintSet>,
    /// Output name to reducer, in output order.
    pub stats: IndexMap<String, Reducer>,
}

/// One output row: group-by values, the window's start time and one value
/// per configured statistic.
pub type StatRow = IndexMap<String, FieldValue>;

/// Compute stat rows for one key's window records. Empty input yields an
/// empty row set.
pub fn aggregate(
    key: &str,
    records: &[LogRecord],
    window: &TimeWindow,
    spec: &AggregationSpec,
) -> Vec<StatRow> {
    let filtered: Vec<&LogRecord> = records
        .iter()
        .filter(|record| passes_filters(record, &spec.filters))
        .collect();

    // Partition in encounter order; a missing group field is one shared slot
    let mut groups: IndexMap<Vec<Option<FieldValue>>, Vec<&LogRecord>> = IndexMap::new();
    for record in filtered {
        let group_key: Vec<Option<FieldValue>> = spec
            .group_by
            .iter()
            .map(|field| record.get(field).cloned())
            .collect();
        groups.entry(group_key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(group_key, members)| {
            let mut row = StatRow::new();
            row.insert("id".to_string(), FieldValue::Str(key.to_string()));
            row.insert("time".to_string(), FieldValue::Time(window.time_from));
            for (field, value) in spec.group_by.iter().zip(group_key) {
                if let Some(value) = value {
                    row.insert(field.clone(), value);
                }
            }
            for (name, reducer) in &spec.stats {
                row.insert(name.clone(), reducer(&members));
            }
            row
        })
        .collect()
}

/// A record passes when some constraint set matches. Within a set, a field
/// that is absent from the record does not exclude it.
fn passes_filters(record: &LogRecord, filters: &[ConstraintSet]) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().any(|set| {
        set.iter()
            .all(|(field, expected)| record.get(field).is_none_or(|actual| actual == expected))
    })
}

/// Build a reducer from its CLI name: `count`, or `sum:FIELD`, `avg:FIELD`,
/// `min:FIELD`, `max:FIELD`. Records where the field is absent or
/// non-numeric are skipped by the numeric reducers.
pub fn reducer_from_name(name: &str) -> Result<Reducer, Error> {
    if name == "count" {
        return Ok(Box::new(|group: &[&LogRecord]| {
            FieldValue::Int(group.len() as i64)
        }));
    }

    let (op, field) = name.split_once(':').ok_or_else(|| {
        Error::Configuration(format!(
            "unknown statistic {name:?}; expected count, sum:FIELD, avg:FIELD, min:FIELD or max:FIELD"
        ))
    })?;
    let field = field.to_string();

    let reducer: Reducer = match op {
        "sum" => Box::new(move |group| FieldValue::Float(numeric_values(group, &field).sum())),
        "avg" => Box::new(move |group| {
            let values: Vec<f64> = numeric_values(group, &field).collect();
            if values.is_empty() {
                FieldValue::Float(0.0)
            } else {
                FieldValue::Float(values.iter().sum::<f64>() / values.len() as f64)
            }
        }),
        "min" => Box::new(move |group| {
            FieldValue::Float(numeric_values(group, &field).fold(f64::INFINITY, f64::min))
        }),
        "max" => Box::new(move |group| {
            FieldValue::Float(numeric_values(group, &field).fold(f64::NEG_INFINITY, f64::max))
        }),
        other => {
            return Err(Error::Configuration(format!(
                "unknown statistic operation {other:?} in {name:?}"
            )))
        }
    };
    Ok(reducer)
}

fn numeric_values<'a>(
    group: &'a [&LogRecord],
    field: &'a str,
) -> impl Iterator<Item = f64> + 'a {
    group
        .iter()
        .filter_map(move |record| record.get(field).and_then(FieldValue::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TimeWindow {
        let from = chrono::Local.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap();
        let to = chrono::Local.with_ymd_and_hms(2024, 1, 1, 10, 6, 0).unwrap();
        TimeWindow {
            time_from: from,
            time_to: to,
        }
    }

    fn record(method: &str, status: &str, time_us: i64) -> LogRecord {
        let mut r = LogRecord::new();
        r.insert("request_method", FieldValue::Str(method.to_string()));
        r.insert("status", FieldValue::Str(status.to_string()));
        r.insert("time_us", FieldValue::Int(time_us));
        r
    }

    fn spec(group_by: &[&str], stats: &[(&str, &str)]) -> AggregationSpec {
        let mut s = AggregationSpec {
            group_by: group_by.iter().map(ToString::to_string).collect(),
            ..AggregationSpec::default()
        };
        for (name, reducer) in stats {
            s.stats
                .insert((*name).to_string(), reducer_from_name(reducer).unwrap());
        }
        s
    }

    #[test]
    fn test_empty_records_give_empty_rows() {
        let spec = spec(&["request_method"], &[("requests", "count")]);
        assert!(aggregate("web", &[], &window(), &spec).is_empty());
    }

    #[test]
    fn test_groups_in_encounter_order() {
        let records = vec![
            record("GET", "200", 100),
            record("POST", "200", 300),
            record("GET", "404", 500),
        ];
        let spec = spec(&["request_method"], &[("requests", "count")]);
        let rows = aggregate("web", &records, &window(), &spec);

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].get("request_method"),
            Some(&FieldValue::Str("GET".to_string()))
        );
        assert_eq!(rows[0].get("requests"), Some(&FieldValue::Int(2)));
        assert_eq!(
            rows[1].get("request_method"),
            Some(&FieldValue::Str("POST".to_string()))
        );
        assert_eq!(rows[1].get("requests"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_rows_carry_key_and_window_time() {
        let records = vec![record("GET", "200", 100)];
        let spec = spec(&[], &[("requests", "count")]);
        let rows = aggregate("frontend", &records, &window(), &spec);

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("id"),
            Some(&FieldValue::Str("frontend".to_string()))
        );
        assert_eq!(
            rows[0].get("time"),
            Some(&FieldValue::Time(window().time_from))
        );
    }

    #[test]
    fn test_filters_are_or_of_ands() {
        let records = vec![
            record("GET", "200", 100),
            record("GET", "500", 200),
            record("POST", "200", 300),
            record("POST", "500", 400),
        ];
        let mut s = spec(&[], &[("requests", "count")]);
        // GET+200, or anything POST
        let mut get_ok = ConstraintSet::new();
        get_ok.insert("request_method".to_string(), FieldValue::Str("GET".to_string()));
        get_ok.insert("status".to_string(), FieldValue::Str("200".to_string()));
        let mut post = ConstraintSet::new();
        post.insert("request_method".to_string(), FieldValue::Str("POST".to_string()));
        s.filters = vec![get_ok, post];

        let rows = aggregate("web", &records, &window(), &s);
        assert_eq!(rows[0].get("requests"), Some(&FieldValue::Int(3)));
    }

    #[test]
    fn test_filter_on_absent_field_does_not_exclude() {
        let mut bare = LogRecord::new();
        bare.insert("status", FieldValue::Str("200".to_string()));

        let mut s = spec(&[], &[("requests", "count")]);
        let mut set = ConstraintSet::new();
        set.insert("request_method".to_string(), FieldValue::Str("GET".to_string()));
        s.filters = vec![set];

        let rows = aggregate("web", &[bare], &window(), &s);
        assert_eq!(rows[0].get("requests"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_missing_group_field_is_single_implicit_group() {
        let mut bare = LogRecord::new();
        bare.insert("status", FieldValue::Str("200".to_string()));
        let records = vec![bare.clone(), bare];

        let spec = spec(&["request_method"], &[("requests", "count")]);
        let rows = aggregate("web", &records, &window(), &spec);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("requests"), Some(&FieldValue::Int(2)));
        // The absent field stays absent in the row
        assert!(rows[0].get("request_method").is_none());
    }

    #[test]
    fn test_numeric_reducers() {
        let records = vec![
            record("GET", "200", 100),
            record("GET", "200", 200),
            record("GET", "200", 600),
        ];
        let spec = spec(
            &[],
            &[
                ("total_us", "sum:time_us"),
                ("mean_us", "avg:time_us"),
                ("min_us", "min:time_us"),
                ("max_us", "max:time_us"),
            ],
        );
        let rows = aggregate("web", &records, &window(), &spec);
        assert_eq!(rows[0].get("total_us"), Some(&FieldValue::Float(900.0)));
        assert_eq!(rows[0].get("mean_us"), Some(&FieldValue::Float(300.0)));
        assert_eq!(rows[0].get("min_us"), Some(&FieldValue::Float(100.0)));
        assert_eq!(rows[0].get("max_us"), Some(&FieldValue::Float(600.0)));
    }

    #[test]
    fn test_bad_reducer_name_is_configuration_error() {
        assert!(matches!(
            reducer_from_name("median:time_us"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            reducer_from_name("countish"),
            Err(Error::Configuration(_))
        ));
    }
}
