//! Table declarations and row classification.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use backmon_units::{now_epoch_secs, CAPTURE_TIME_KEY};

use crate::datatype::Datatype;
use crate::escape::{escape, COMMA_SPACE};
use crate::retention::RetentionPolicy;
use crate::{Error, Result};

/// Column names recognized as timestamps on tables without a declared
/// time key, in fill-in order.
pub const TIME_KEY_NAMES: [&str; 3] = ["time", CAPTURE_TIME_KEY, "logTime"];

/// Field inserted when a row classifies to no fields at all; line protocol
/// requires at least one.
pub const MISSING_FIELD_NAME: &str = "MISSING_FIELD";
const MISSING_FIELD_VALUE: i64 = 42;

fn structural_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\s\[\]{}"]"#).expect("valid regex"))
}

/// Whether a table's columns were declared up front or are inferred
/// per-row by heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Declared,
    Fallback,
}

/// A non-fatal observation made while classifying a row. Warnings surface
/// schema drift without rejecting data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitWarning {
    /// A column neither declared as field nor tag; stored as a field.
    UndeclaredColumn { table: String, column: String },
    /// The row carried no usable field, a placeholder was inserted.
    NoFields { table: String },
    /// The row carried no timestamp, the wall clock was used.
    NoTimestamp { table: String },
    /// The table has no declared schema, the heuristic split was used.
    FallbackSplit { table: String },
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitWarning::UndeclaredColumn { table, column } => {
                write!(f, "table `{table}`: column `{column}` is not declared, storing it as a field")
            }
            SplitWarning::NoFields { table } => {
                write!(f, "table `{table}`: row has no fields, inserting `{MISSING_FIELD_NAME}`")
            }
            SplitWarning::NoTimestamp { table } => {
                write!(f, "table `{table}`: row has no timestamp, using the current time")
            }
            SplitWarning::FallbackSplit { table } => {
                write!(f, "table `{table}`: no schema declared, using the heuristic split")
            }
        }
    }
}

/// A row classified into its line-protocol roles.
#[derive(Debug, Clone, Default)]
pub struct SplitRow {
    pub tags: BTreeMap<String, Value>,
    pub fields: BTreeMap<String, Value>,
    pub timestamp: Option<Value>,
    pub warnings: Vec<SplitWarning>,
}

/// A measurement declaration: its columns, timestamp key and retention
/// policy. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Table {
    database: String,
    name: String,
    fields: BTreeMap<String, Datatype>,
    tags: Vec<String>,
    time_key: String,
    retention_policy: RetentionPolicy,
    kind: SchemaKind,
}

impl Table {
    /// Declares a table. An empty field map yields a [`SchemaKind::Fallback`]
    /// table whose rows are split heuristically.
    pub fn new(
        database: impl Into<String>,
        name: &str,
        fields: BTreeMap<String, Datatype>,
        tags: Vec<String>,
        time_key: Option<&str>,
        retention_policy: RetentionPolicy,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("table needs a name"));
        }
        if fields.keys().any(|f| tags.iter().any(|t| t == f)) {
            return Err(Error::InvalidArgument(
                "a column cannot be both field and tag",
            ));
        }
        let kind = if fields.is_empty() {
            SchemaKind::Fallback
        } else {
            SchemaKind::Declared
        };
        Ok(Self {
            database: database.into(),
            name: escape(name, &COMMA_SPACE),
            fields,
            tags,
            time_key: time_key.unwrap_or("time").to_string(),
            retention_policy,
            kind,
        })
    }

    /// A schema-less table for measurements seen at runtime without a
    /// declaration. Infallible: used by database lookup, which never fails.
    pub(crate) fn fallback(
        database: impl Into<String>,
        name: &str,
        retention_policy: RetentionPolicy,
    ) -> Self {
        Self {
            database: database.into(),
            name: escape(name, &COMMA_SPACE),
            fields: BTreeMap::new(),
            tags: Vec::new(),
            time_key: "time".to_string(),
            retention_policy,
            kind: SchemaKind::Fallback,
        }
    }

    /// Escaped measurement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn fields(&self) -> &BTreeMap<String, Datatype> {
        &self.fields
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn time_key(&self) -> &str {
        &self.time_key
    }

    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.retention_policy
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Classifies a row into tags, fields and a timestamp.
    ///
    /// Null values and empty strings are dropped. Declared tables route
    /// columns by their declaration and store undeclared columns as fields
    /// with a warning; fallback tables infer the role of each column from
    /// its value. The timestamp stays in whatever precision the row carried,
    /// it is normalized at encoding time.
    pub fn split_row(&self, row: &Map<String, Value>) -> Result<SplitRow> {
        if row.is_empty() {
            return Err(Error::EmptyRow);
        }
        match self.kind {
            SchemaKind::Declared => Ok(self.split_declared(row)),
            SchemaKind::Fallback => Ok(self.split_fallback(row)),
        }
    }

    fn split_declared(&self, row: &Map<String, Value>) -> SplitRow {
        let mut out = SplitRow::default();
        // the declared time key wins over the generic names once seen
        let mut time_locked = false;

        for (key, value) in row {
            if is_absent(value) {
                continue;
            }

            let is_time_name = key == &self.time_key || TIME_KEY_NAMES.contains(&key.as_str());
            if is_time_name {
                if key == &self.time_key {
                    out.timestamp = Some(value.clone());
                    time_locked = true;
                } else if key == CAPTURE_TIME_KEY {
                    // capture time only fills a gap, never overrides
                    if out.timestamp.is_none() {
                        out.timestamp = Some(value.clone());
                    }
                } else if !time_locked {
                    out.timestamp = Some(value.clone());
                }
            }

            if self.fields.contains_key(key) {
                out.fields.insert(key.clone(), value.clone());
            } else if self.tags.iter().any(|t| t == key) {
                out.tags.insert(key.clone(), value.clone());
            } else if !is_time_name {
                out.warnings.push(SplitWarning::UndeclaredColumn {
                    table: self.name.clone(),
                    column: key.clone(),
                });
                out.fields.insert(key.clone(), value.clone());
            }
        }

        out
    }

    fn split_fallback(&self, row: &Map<String, Value>) -> SplitRow {
        let mut out = SplitRow::default();
        out.warnings.push(SplitWarning::FallbackSplit {
            table: self.name.clone(),
        });

        for (key, value) in row {
            if is_absent(value) {
                continue;
            }

            if TIME_KEY_NAMES.contains(&key.as_str()) {
                // logTime may rewrite an earlier pick, the other names
                // only fill a gap
                if out.timestamp.is_none() || key == "logTime" {
                    out.timestamp = Some(value.clone());
                }
                continue;
            }

            match value {
                Value::Number(_) | Value::Bool(_) => {
                    out.fields.insert(key.clone(), value.clone());
                }
                Value::String(s) => {
                    // structural characters make a value unfit as a tag
                    if structural_re().is_match(s) {
                        out.fields.insert(key.clone(), value.clone());
                    } else {
                        out.tags.insert(key.clone(), value.clone());
                    }
                }
                // nested data is stringified and kept as a field
                other => {
                    out.fields
                        .insert(key.clone(), Value::String(other.to_string()));
                }
            }
        }

        if out.fields.is_empty() {
            out.fields
                .insert(MISSING_FIELD_NAME.to_string(), json!(MISSING_FIELD_VALUE));
            out.warnings.push(SplitWarning::NoFields {
                table: self.name.clone(),
            });
        }
        if out.timestamp.is_none() {
            out.timestamp = Some(json!(now_epoch_secs()));
            out.warnings.push(SplitWarning::NoTimestamp {
                table: self.name.clone(),
            });
        }

        out
    }
}

fn is_absent(value: &Value) -> bool {
    value.is_null() || matches!(value, Value::String(s) if s.is_empty())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.database,
            self.retention_policy.name(),
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rp() -> RetentionPolicy {
        RetentionPolicy::new("autogen", "testdb", "INF", 1, "0s", false).unwrap()
    }

    fn declared_table() -> Table {
        let fields = BTreeMap::from([
            ("cpu".to_string(), Datatype::Float),
            ("note".to_string(), Datatype::String),
        ]);
        Table::new(
            "testdb",
            "cpuram",
            fields,
            vec!["host".to_string()],
            None,
            rp(),
        )
        .unwrap()
    }

    fn row(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn declared_split_routes_columns() {
        let table = declared_table();
        let split = table
            .split_row(&row(&[
                ("time", json!(1000)),
                ("cpu", json!(50)),
                ("host", json!("a b")),
            ]))
            .unwrap();
        assert_eq!(split.fields, BTreeMap::from([("cpu".to_string(), json!(50))]));
        assert_eq!(
            split.tags,
            BTreeMap::from([("host".to_string(), json!("a b"))])
        );
        assert_eq!(split.timestamp, Some(json!(1000)));
        assert!(split.warnings.is_empty());
    }

    #[test]
    fn nulls_and_empty_strings_are_dropped() {
        let table = declared_table();
        let split = table
            .split_row(&row(&[
                ("cpu", json!(null)),
                ("note", json!("")),
                ("host", json!("h1")),
            ]))
            .unwrap();
        assert!(split.fields.is_empty());
        assert_eq!(split.tags.len(), 1);
    }

    #[test]
    fn undeclared_columns_become_fields_with_warning() {
        let table = declared_table();
        let split = table
            .split_row(&row(&[("cpu", json!(1.0)), ("extra", json!(7))]))
            .unwrap();
        assert_eq!(split.fields["extra"], json!(7));
        assert!(matches!(
            split.warnings.as_slice(),
            [SplitWarning::UndeclaredColumn { column, .. }] if column == "extra"
        ));
    }

    #[test]
    fn declared_time_key_wins_over_generic_names() {
        let fields = BTreeMap::from([("cpu".to_string(), Datatype::Float)]);
        let table = Table::new("testdb", "t", fields, vec![], Some("logTime"), rp()).unwrap();
        let split = table
            .split_row(&row(&[
                ("cpu", json!(1.0)),
                ("logTime", json!(111)),
                ("time", json!(222)),
            ]))
            .unwrap();
        assert_eq!(split.timestamp, Some(json!(111)));
    }

    #[test]
    fn capture_time_only_fills_gaps() {
        let table = declared_table();
        let split = table
            .split_row(&row(&[
                ("cpu", json!(1.0)),
                (CAPTURE_TIME_KEY, json!(111)),
                ("time", json!(222)),
            ]))
            .unwrap();
        assert_eq!(split.timestamp, Some(json!(222)));

        let split = table
            .split_row(&row(&[("cpu", json!(1.0)), (CAPTURE_TIME_KEY, json!(111))]))
            .unwrap();
        assert_eq!(split.timestamp, Some(json!(111)));
    }

    #[test]
    fn empty_row_is_an_error() {
        let table = declared_table();
        assert!(matches!(
            table.split_row(&Map::new()),
            Err(Error::EmptyRow)
        ));
    }

    #[test]
    fn fields_and_tags_must_be_disjoint() {
        let fields = BTreeMap::from([("x".to_string(), Datatype::Int)]);
        let result = Table::new("testdb", "t", fields, vec!["x".to_string()], None, rp());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn measurement_names_are_escaped() {
        let table = Table::new("testdb", "my table,x", BTreeMap::new(), vec![], None, rp());
        assert_eq!(table.unwrap().name(), r"my\ table\,x");
    }

    #[test]
    fn fallback_split_infers_roles() {
        let table = Table::fallback("testdb", "adhoc", rp());
        let split = table
            .split_row(&row(&[
                ("count", json!(3)),
                ("ok", json!(true)),
                ("host", json!("node1")),
                ("message", json!("has spaces")),
                ("nested", json!({"a": 1})),
                ("time", json!(1000)),
            ]))
            .unwrap();
        assert!(split.fields.contains_key("count"));
        assert!(split.fields.contains_key("ok"));
        assert!(split.fields.contains_key("message"));
        assert_eq!(split.fields["nested"], json!(r#"{"a":1}"#));
        assert_eq!(split.tags, BTreeMap::from([("host".to_string(), json!("node1"))]));
        assert_eq!(split.timestamp, Some(json!(1000)));
        assert!(split
            .warnings
            .iter()
            .any(|w| matches!(w, SplitWarning::FallbackSplit { .. })));
    }

    #[test]
    fn fallback_split_prefers_logtime() {
        let table = Table::fallback("testdb", "adhoc", rp());
        // logTime sorts before time, but the priority must not depend on
        // iteration order
        let split = table
            .split_row(&row(&[
                ("count", json!(3)),
                ("logTime", json!(2)),
                ("time", json!(1)),
            ]))
            .unwrap();
        assert_eq!(split.timestamp, Some(json!(2)));
    }

    #[test]
    fn fallback_split_fills_missing_pieces() {
        let table = Table::fallback("testdb", "adhoc", rp());
        let split = table.split_row(&row(&[("host", json!("node1"))])).unwrap();
        assert_eq!(split.fields[MISSING_FIELD_NAME], json!(42));
        assert!(split.timestamp.is_some());
        assert!(split
            .warnings
            .iter()
            .any(|w| matches!(w, SplitWarning::NoFields { .. })));
        assert!(split
            .warnings
            .iter()
            .any(|w| matches!(w, SplitWarning::NoTimestamp { .. })));
    }
}
