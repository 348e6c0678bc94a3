//! Query structures: line-protocol inserts, selections/deletions and
//! continuous queries.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

use backmon_units::{check_time_literal, now_epoch_secs, to_epoch_secs};

use crate::datatype::Datatype;
use crate::escape::{escape, COMMA_EQ_SPACE, DOUBLE_QUOTE};
use crate::retention::RetentionPolicy;
use crate::table::{SplitRow, Table};
use crate::{Error, Result};

/// Query keyword, determining which clauses are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    Delete,
    Insert,
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Keyword::Select => "SELECT",
            Keyword::Delete => "DELETE",
            Keyword::Insert => "INSERT",
        })
    }
}

/// Sort direction of an `ORDER BY "time"` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        })
    }
}

/// A single line-protocol point, fully formatted at construction.
///
/// Keys and values are escaped and rendered according to the table's
/// declared datatypes (or auto-detection for undeclared columns), so
/// [`InsertQuery::to_query`] is a pure join.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    table: Arc<Table>,
    fields: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    timestamp: i64,
}

impl InsertQuery {
    /// Encodes a classified row. Fails with [`Error::NoFieldsToInsert`] if
    /// nothing usable remains and the table declares no string field to
    /// autofill.
    pub fn new(table: Arc<Table>, split: SplitRow) -> Result<Self> {
        let timestamp = match &split.timestamp {
            Some(v) => to_epoch_secs(v)?,
            None => now_epoch_secs(),
        };

        let mut fields = format_fields(&table, &split.fields)?;
        if fields.is_empty() {
            // a point without fields is unrepresentable; fill the first
            // declared string field with a marker value
            let autofill = table
                .fields()
                .iter()
                .find(|(_, dt)| **dt == Datatype::String);
            match autofill {
                Some((key, _)) => {
                    fields.insert(escape(key, &COMMA_EQ_SPACE), "\"autofilled\"".to_string());
                }
                None => return Err(Error::NoFieldsToInsert(table.name().to_string())),
            }
        }

        Ok(Self {
            tags: format_tags(&split.tags),
            table,
            fields,
            timestamp,
        })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn keyword(&self) -> Keyword {
        Keyword::Insert
    }

    /// Renders the point as one line of line protocol, second precision.
    pub fn to_query(&self) -> String {
        let mut line = self.table.name().to_string();
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line.push(' ');
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&self.timestamp.to_string());
        line
    }
}

/// The value as it appears in the row, without quoting.
fn render_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_fields(
    table: &Table,
    fields: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (key, value) in fields {
        if value.is_null() || matches!(value, Value::String(s) if s.is_empty()) {
            continue;
        }
        let datatype = table
            .fields()
            .get(key)
            .copied()
            .unwrap_or_else(|| Datatype::detect(value));
        let rendered = match datatype {
            Datatype::String => {
                format!("\"{}\"", escape(&render_raw(value), &DOUBLE_QUOTE))
            }
            Datatype::Timestamp => format!("{}i", to_epoch_secs(value)?),
            Datatype::Int => format!("{}i", render_raw(value)),
            Datatype::Float | Datatype::Bool | Datatype::None => render_raw(value),
        };
        out.insert(escape(key, &COMMA_EQ_SPACE), rendered);
    }
    Ok(out)
}

fn format_tags(tags: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    tags.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            (
                escape(key, &COMMA_EQ_SPACE),
                escape(&render_raw(value), &COMMA_EQ_SPACE),
            )
        })
        .collect()
}

/// A `SELECT` or `DELETE` statement, validated at build time.
#[derive(Debug, Clone)]
pub struct SelectionQuery {
    keyword: Keyword,
    tables: Vec<Arc<Table>>,
    into_table: Option<Arc<Table>>,
    fields: Vec<String>,
    where_clause: Option<String>,
    group_list: Option<Vec<String>>,
    order_direction: Option<OrderDirection>,
    limit: u64,
    s_limit: u64,
}

impl SelectionQuery {
    pub fn build(keyword: Keyword, tables: Vec<Arc<Table>>) -> SelectionQueryBuilder {
        SelectionQueryBuilder {
            keyword,
            tables,
            into_table: None,
            fields: None,
            where_clause: None,
            group_list: None,
            order_direction: None,
            limit: 0,
            s_limit: 0,
        }
    }

    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    pub fn tables(&self) -> &[Arc<Table>] {
        &self.tables
    }

    pub fn into_table(&self) -> Option<&Arc<Table>> {
        self.into_table.as_ref()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn group_list(&self) -> Option<&[String]> {
        self.group_list.as_deref()
    }

    pub fn to_query(&self) -> String {
        let mut segments: Vec<String> = vec![self.keyword.to_string()];

        if self.keyword == Keyword::Select {
            segments.push(self.fields.join(","));
        }
        if let Some(into) = &self.into_table {
            segments.push(format!("INTO {into}"));
        }

        // DELETE does not accept fully-qualified measurement names
        let from: Vec<String> = match self.keyword {
            Keyword::Delete => self.tables.iter().map(|t| t.name().to_string()).collect(),
            _ => self.tables.iter().map(|t| t.to_string()).collect(),
        };
        segments.push(format!("FROM {}", from.join(",")));

        if let Some(where_clause) = &self.where_clause {
            segments.push(format!("WHERE {where_clause}"));
        }
        if let Some(group_list) = &self.group_list {
            segments.push(format!("GROUP BY {}", group_list.join(",")));
        }
        if let Some(direction) = self.order_direction {
            segments.push(format!("ORDER BY \"time\" {direction}"));
        }
        if self.limit > 0 {
            segments.push(format!("LIMIT {}", self.limit));
        }
        if self.s_limit > 0 {
            segments.push(format!("SLIMIT {}", self.s_limit));
        }

        segments.join(" ")
    }
}

/// Builder for [`SelectionQuery`]; [`SelectionQueryBuilder::build`] checks
/// clause legality for the keyword.
#[derive(Debug)]
pub struct SelectionQueryBuilder {
    keyword: Keyword,
    tables: Vec<Arc<Table>>,
    into_table: Option<Arc<Table>>,
    fields: Option<Vec<String>>,
    where_clause: Option<String>,
    group_list: Option<Vec<String>>,
    order_direction: Option<OrderDirection>,
    limit: u64,
    s_limit: u64,
}

impl SelectionQueryBuilder {
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn into_table(mut self, table: Arc<Table>) -> Self {
        self.into_table = Some(table);
        self
    }

    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    pub fn group_list<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_list = Some(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_direction(mut self, direction: OrderDirection) -> Self {
        self.order_direction = Some(direction);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn s_limit(mut self, s_limit: u64) -> Self {
        self.s_limit = s_limit;
        self
    }

    pub fn build(self) -> Result<SelectionQuery> {
        if self.tables.is_empty() {
            return Err(Error::InvalidArgument(
                "need a table to gather information from",
            ));
        }
        match self.keyword {
            Keyword::Insert => {
                return Err(Error::InvalidArgument(
                    "INSERT is not a selection keyword",
                ))
            }
            Keyword::Delete => {
                if self.into_table.is_some()
                    || self.fields.is_some()
                    || self.group_list.is_some()
                    || self.order_direction.is_some()
                    || self.limit > 0
                    || self.s_limit > 0
                {
                    return Err(Error::InvalidCombination(
                        "DELETE only accepts FROM and WHERE clauses",
                    ));
                }
            }
            Keyword::Select => {}
        }

        // an empty selection means everything
        let mut fields = self.fields.unwrap_or_default();
        if fields.is_empty() {
            fields = vec!["*".to_string()];
        }
        let group_list = self.group_list.map(|g| {
            if g.is_empty() {
                vec!["*".to_string()]
            } else {
                g
            }
        });

        Ok(SelectionQuery {
            keyword: self.keyword,
            tables: self.tables,
            into_table: self.into_table,
            fields,
            where_clause: self.where_clause,
            group_list,
            order_direction: self.order_direction,
            limit: self.limit,
            s_limit: self.s_limit,
        })
    }
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s\s+").expect("valid regex"))
}

/// A `CREATE CONTINUOUS QUERY` statement.
///
/// The full statement text is rendered once at construction; equality,
/// ordering and hashing compare that text, which is also how a declared
/// query is matched against `SHOW CONTINUOUS QUERIES` output.
#[derive(Debug, Clone)]
pub struct ContinuousQuery {
    name: String,
    database: String,
    select_query: Option<SelectionQuery>,
    rendered: String,
}

impl ContinuousQuery {
    /// Builds a continuous query from either a [`SelectionQuery`] with an
    /// `INTO` clause or a raw select string. Exactly one of the two must be
    /// given. `every` and `for_interval` become a `RESAMPLE` clause and must
    /// be valid time literals.
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        select_query: Option<&SelectionQuery>,
        raw_select: Option<&str>,
        every: Option<&str>,
        for_interval: Option<&str>,
    ) -> Result<Self> {
        let name = name.into();
        let database = database.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("continuous query needs a name"));
        }
        if database.is_empty() {
            return Err(Error::InvalidArgument("continuous query needs a database"));
        }

        let (select, select_query) = match (select_query, raw_select) {
            (Some(query), None) => {
                if query.into_table.is_none() {
                    return Err(Error::InvalidCombination(
                        "a continuous query needs an INTO clause",
                    ));
                }
                (query.to_query(), Some(query.clone()))
            }
            (None, Some(raw)) => (raw.to_string(), None),
            _ => {
                return Err(Error::InvalidCombination(
                    "give either a select query or a raw select string",
                ))
            }
        };

        let mut resample = String::new();
        if every.is_some() || for_interval.is_some() {
            resample.push_str("RESAMPLE");
            if let Some(every) = every {
                if !check_time_literal(every) {
                    return Err(Error::Units(backmon_units::Error::InvalidDuration(
                        every.to_string(),
                    )));
                }
                resample.push_str(&format!(" EVERY {every}"));
            }
            if let Some(for_interval) = for_interval {
                if !check_time_literal(for_interval) {
                    return Err(Error::Units(backmon_units::Error::InvalidDuration(
                        for_interval.to_string(),
                    )));
                }
                resample.push_str(&format!(" FOR {for_interval}"));
            }
        }

        let rendered = format!(
            "CREATE CONTINUOUS QUERY {name} ON {database} {resample} BEGIN {select} END"
        );
        let rendered = spaces_re().replace_all(&rendered, " ").into_owned();

        Ok(Self {
            name,
            database,
            select_query,
            rendered,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// The structured select behind this query, if it was not built from a
    /// raw string.
    pub fn select_query(&self) -> Option<&SelectionQuery> {
        self.select_query.as_ref()
    }

    pub fn to_query(&self) -> &str {
        &self.rendered
    }
}

impl PartialEq for ContinuousQuery {
    fn eq(&self, other: &Self) -> bool {
        self.rendered == other.rendered
    }
}

impl Eq for ContinuousQuery {}

impl Hash for ContinuousQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered.hash(state);
    }
}

impl PartialOrd for ContinuousQuery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContinuousQuery {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rendered.cmp(&other.rendered)
    }
}

impl fmt::Display for ContinuousQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// A downsampling continuous query awaiting its table.
///
/// Table definitions declare these; once the table exists, the template is
/// resolved into a concrete [`ContinuousQuery`] that aggregates the table
/// into a coarser retention policy.
#[derive(Debug, Clone)]
pub struct ContinuousQueryTemplate {
    fields: Vec<String>,
    target_policy: RetentionPolicy,
    group_time: String,
    group_args: Vec<String>,
    where_clause: Option<String>,
    for_interval: String,
}

impl ContinuousQueryTemplate {
    /// Standard downsampling template: aggregates `fields` into the target
    /// policy grouped by `time(group_time)` and every tag.
    pub fn downsample(
        fields: &[&str],
        target_policy: RetentionPolicy,
        group_time: &str,
    ) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            target_policy,
            group_time: group_time.to_string(),
            group_args: vec!["*".to_string()],
            where_clause: None,
            for_interval: "7d".to_string(),
        }
    }

    pub fn with_group_args(mut self, args: &[&str]) -> Self {
        self.group_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_where(mut self, clause: &str) -> Self {
        self.where_clause = Some(clause.to_string());
        self
    }

    pub fn target_policy(&self) -> &RetentionPolicy {
        &self.target_policy
    }

    /// Resolves the template against its source table.
    pub fn resolve(&self, table: &Arc<Table>, name: &str) -> Result<ContinuousQuery> {
        let into_table = Arc::new(Table::new(
            table.database(),
            table.name(),
            BTreeMap::new(),
            Vec::new(),
            None,
            self.target_policy.clone(),
        )?);

        let mut group = vec![format!("time({})", self.group_time)];
        group.extend(self.group_args.iter().cloned());

        let mut builder = SelectionQuery::build(Keyword::Select, vec![Arc::clone(table)])
            .fields(self.fields.clone())
            .into_table(into_table)
            .group_list(group);
        if let Some(clause) = &self.where_clause {
            builder = builder.where_clause(clause.clone());
        }
        let select = builder.build()?;

        ContinuousQuery::new(
            name,
            table.database(),
            Some(&select),
            None,
            None,
            Some(&self.for_interval),
        )
    }
}
