//! Blocking InfluxDB 1.x client for the backmon monitoring pipeline.
//!
//! [`Client`] owns the declared [`Database`] schema and a write buffer.
//! Rows are classified and encoded into line protocol when buffered, sent
//! in batches on flush, and every send is self-instrumented into the
//! `influx_metrics` measurement. On connect the declared retention policies
//! and continuous queries are reconciled against the server.

pub mod config;
pub mod report;
pub mod response;

use std::collections::BTreeMap;
use std::mem;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use reqwest::{Method, StatusCode};
use serde_json::{json, Map, Value};
use url::Url;

use backmon_model::definitions::add_table_definitions;
use backmon_model::table::SplitRow;
use backmon_model::{
    Database, InsertQuery, Keyword, RetentionPolicy, SelectionQuery, Table,
};
use backmon_units::now_epoch_secs;

pub use config::InfluxConfig;
pub use report::ErrorTally;
pub use response::QueryResponse;

/// Maximum number of lines sent per write request.
pub const MAX_BATCH_LINES: usize = 10_000;

/// A table's buffer is force-flushed beyond this many pending lines.
const BUFFER_LINE_LIMIT: usize = 5 * MAX_BATCH_LINES;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Database copies move months of data per statement.
const COPY_TIMEOUT: Duration = Duration::from_secs(7200);

fn partial_write_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"partial write:[\s\w]+=(\d+)").expect("valid regex"))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error while processing the request: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("server responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("invalid server URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("multiple retention policies are declared as default: {0}")]
    MultipleDefaultPolicies(String),

    #[error("unexpected query response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Model(#[from] backmon_model::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Blocking client: schema owner, write buffer and HTTP transport.
#[derive(Debug)]
pub struct Client {
    base_url: Url,
    http: reqwest::blocking::Client,
    username: String,
    password: String,
    accept_invalid_certs: bool,
    database: Database,
    metrics_table: Arc<Table>,
    version: Option<String>,
    insert_buffer: BTreeMap<String, Vec<InsertQuery>>,
    tally: ErrorTally,
}

impl Client {
    /// Creates a client with the full table definitions declared on its
    /// database. No network traffic happens before [`Client::connect`].
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url())?;
        let accept_invalid_certs = !config.verify_ssl;
        let http = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut database = Database::new(&config.db_name);
        add_table_definitions(&mut database)?;
        let metrics_table = database.table("influx_metrics");

        Ok(Self {
            base_url,
            http,
            username: config.username.clone(),
            password: config.password.clone(),
            accept_invalid_certs,
            database,
            metrics_table,
            version: None,
            insert_buffer: BTreeMap::new(),
            tally: ErrorTally::default(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// Server version reported by the last ping.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn tally(&self) -> &ErrorTally {
        &self.tally
    }

    /// Verifies connectivity, creates the database if needed and reconciles
    /// retention policies and continuous queries with the server.
    pub fn connect(&mut self) -> Result<()> {
        let version = self.ping()?;
        tracing::debug!(%version, "connected to influxdb");

        let database_name = self.database.name().to_string();
        // nothing happens if it already exists
        self.run_query(
            Method::POST,
            &database_name,
            &format!("CREATE DATABASE \"{database_name}\""),
        )?;

        self.check_create_retention_policies(&database_name)?;
        self.check_create_continuous_queries()?;
        Ok(())
    }

    /// Flushes the buffer twice (the first pass re-buffers its own send
    /// statistics) and reports the error tally.
    pub fn disconnect(&mut self) {
        tracing::debug!("disconnecting influx database");
        for _ in 0..2 {
            if let Err(error) = self.flush_insert_buffer() {
                tracing::error!(%error, "failed to flush buffer on disconnect, possible data loss");
            }
        }
        if self.tally.is_clean() {
            tracing::debug!("disconnected without errors");
        } else {
            tracing::warn!(
                dropped_rows = self.tally.dropped_rows(),
                failed_batches = self.tally.failed_batches(),
                "disconnected with errors"
            );
        }
    }

    /// Pings the server and records the version it reports.
    pub fn ping(&mut self) -> Result<String> {
        let url = self.base_url.join("ping")?;
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiError {
                code: status,
                message: response.text().unwrap_or_default(),
            });
        }
        let version = response
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        self.version = Some(version.clone());
        Ok(version)
    }

    /// Classifies and buffers rows for the named table. Bad rows are
    /// logged and tallied, never fatal. Only buffers; call
    /// [`Client::flush_insert_buffer`] to send.
    pub fn insert_rows(&mut self, table_name: &str, rows: &[Map<String, Value>]) -> Result<()> {
        if table_name.is_empty() {
            return Err(Error::Model(backmon_model::Error::InvalidArgument(
                "table name needs to be set in insert",
            )));
        }
        if rows.is_empty() {
            tracing::debug!(table = table_name, "nothing to insert, empty row list");
            return Ok(());
        }

        let table = self.database.table(table_name);
        let mut queries = Vec::with_capacity(rows.len());
        for row in rows {
            let split = match table.split_row(row) {
                Ok(split) => split,
                Err(error) => {
                    tracing::error!(table = table.name(), %error, "skipping one row");
                    self.tally.row_dropped(error.to_string());
                    continue;
                }
            };
            for warning in &split.warnings {
                tracing::warn!("{warning}");
            }
            match InsertQuery::new(Arc::clone(&table), split) {
                Ok(query) => queries.push(query),
                Err(error) => {
                    tracing::error!(table = table.name(), %error, "skipping one row");
                    self.tally.row_dropped(error.to_string());
                }
            }
        }
        tracing::debug!(
            table = table.name(),
            count = queries.len(),
            "appended rows to the insert buffer"
        );

        let buffered = {
            let buffer = self.insert_buffer.entry(table.name().to_string()).or_default();
            buffer.extend(queries);
            buffer.len()
        };
        // safety valve against unbounded memory growth
        if buffered > BUFFER_LINE_LIMIT {
            self.flush_insert_buffer()?;
        }
        Ok(())
    }

    /// Sends the buffered lines per table in batches of
    /// [`MAX_BATCH_LINES`]. Failed batches are tallied, not raised; a
    /// partial write below the batch limit counts as success since it only
    /// means points older than the retention policy were dropped.
    ///
    /// Send statistics remain in the buffer afterwards, flush again to
    /// send those too.
    pub fn flush_insert_buffer(&mut self) -> Result<()> {
        if self.insert_buffer.is_empty() {
            return Ok(());
        }

        // taken out up front so the send statistics can be re-buffered
        let buffered = mem::take(&mut self.insert_buffer);

        for (_, queries) in buffered {
            let Some(first) = queries.first() else {
                continue;
            };
            let table = Arc::clone(first.table());
            let retention_policy = table.retention_policy().name().to_string();
            let lines: Vec<String> = queries.iter().map(InsertQuery::to_query).collect();

            let started = Instant::now();
            for chunk in lines.chunks(MAX_BATCH_LINES) {
                if let Err(error) = self.write_lines(&retention_policy, chunk) {
                    tracing::error!(table = table.name(), %error, "error when sending insert buffer");
                    self.tally.batch_failed(error.to_string());
                }
            }
            let elapsed = started.elapsed();

            let count = lines.len();
            self.buffer_send_metrics(Keyword::Insert, &[(table, count)], elapsed, count)?;
        }
        Ok(())
    }

    /// Sends a single `SELECT` or `DELETE`. Buffered data of a queried
    /// table is flushed first so the query sees it.
    pub fn send_selection_query(&mut self, query: &SelectionQuery) -> Result<QueryResponse> {
        if query
            .tables()
            .iter()
            .any(|table| self.insert_buffer.contains_key(table.name()))
        {
            self.flush_insert_buffer()?;
        }

        // SELECT INTO and DELETE modify data and must be POSTed
        let method = match query.keyword() {
            Keyword::Select if query.into_table().is_none() => Method::GET,
            _ => Method::POST,
        };

        let database_name = self.database.name().to_string();
        let started = Instant::now();
        let response = self.run_query(method, &database_name, &query.to_query())?;
        let elapsed = started.elapsed();

        let per_table = response.value_count() / query.tables().len().max(1);
        let counts: Vec<(Arc<Table>, usize)> = query
            .tables()
            .iter()
            .map(|table| (Arc::clone(table), per_table))
            .collect();
        self.buffer_send_metrics(query.keyword(), &counts, elapsed, 1)?;

        Ok(response)
    }

    /// Compares the declared retention policies against
    /// `SHOW RETENTION POLICIES` and creates or alters the differing ones.
    ///
    /// Fails before any request if more than one policy claims default.
    pub fn check_create_retention_policies(&self, database_name: &str) -> Result<()> {
        let defaults: Vec<&str> = self
            .database
            .retention_policies()
            .iter()
            .filter(|rp| rp.is_default())
            .map(RetentionPolicy::name)
            .collect();
        if defaults.len() > 1 {
            return Err(Error::MultipleDefaultPolicies(defaults.join(", ")));
        }

        let response = self.run_query(
            Method::GET,
            database_name,
            &format!("SHOW RETENTION POLICIES ON \"{database_name}\""),
        )?;
        if let Some(error) = response.first_error() {
            return Err(Error::UnexpectedResponse(error.to_string()));
        }

        let mut existing: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
        for series in response.series() {
            for row in series.rows() {
                if let Some(name) = row.get("name").and_then(Value::as_str) {
                    existing.insert(name.to_string(), row);
                }
            }
        }

        let mut add_list = Vec::new();
        let mut alter_list = Vec::new();
        for policy in self.database.retention_policies() {
            match existing.get(policy.name()) {
                None => add_list.push(policy),
                Some(row) if !policy_matches(policy, row) => alter_list.push(policy),
                Some(_) => {}
            }
        }

        tracing::debug!(
            missing = add_list.len(),
            differing = alter_list.len(),
            "reconciling retention policies"
        );
        for policy in add_list {
            self.run_query(
                Method::POST,
                database_name,
                &policy_statement("CREATE", policy, database_name),
            )?;
        }
        for policy in alter_list {
            self.run_query(
                Method::POST,
                database_name,
                &policy_statement("ALTER", policy, database_name),
            )?;
        }
        Ok(())
    }

    /// Compares the declared continuous queries against
    /// `SHOW CONTINUOUS QUERIES`. A query whose server-side text differs is
    /// dropped and re-created, since CQs cannot be altered.
    pub fn check_create_continuous_queries(&self) -> Result<()> {
        let database_name = self.database.name().to_string();
        let response = self.run_query(Method::GET, &database_name, "SHOW CONTINUOUS QUERIES")?;
        if let Some(error) = response.first_error() {
            return Err(Error::UnexpectedResponse(error.to_string()));
        }

        let mut existing: BTreeMap<String, String> = BTreeMap::new();
        for series in response.series().filter(|series| series.name == database_name) {
            for row in series.rows() {
                if let (Some(name), Some(query)) = (
                    row.get("name").and_then(Value::as_str),
                    row.get("query").and_then(Value::as_str),
                ) {
                    existing.insert(name.to_string(), query.to_string());
                }
            }
        }

        let mut create_list = Vec::new();
        let mut drop_list = Vec::new();
        for declared in self.database.continuous_queries() {
            match existing.get(declared.name()) {
                None => create_list.push(declared),
                Some(server_text) if server_text != declared.to_query() => {
                    drop_list.push(declared);
                    create_list.push(declared);
                }
                Some(_) => {}
            }
        }

        tracing::debug!(
            dropping = drop_list.len(),
            creating = create_list.len(),
            "reconciling continuous queries"
        );
        for stale in drop_list {
            self.run_query(
                Method::POST,
                &database_name,
                &format!(
                    "DROP CONTINUOUS QUERY \"{}\" ON \"{}\"",
                    stale.name(),
                    stale.database()
                ),
            )?;
        }
        for declared in create_list {
            self.run_query(Method::POST, &database_name, declared.to_query())?;
        }
        Ok(())
    }

    /// Copies all declared measurements into another database, sorting
    /// `autogen` leftovers into their proper retention policies and
    /// re-aggregating the continuous-query targets.
    ///
    /// Statements are sent with a long timeout; partial writes below the
    /// batch limit are expected and only counted.
    pub fn copy_database(&mut self, new_database_name: &str) -> Result<()> {
        if new_database_name.is_empty() {
            return Err(Error::Model(backmon_model::Error::InvalidArgument(
                "copy_database requires a new database name to copy to",
            )));
        }
        tracing::info!(
            from = self.database.name(),
            to = new_database_name,
            "copying database, including data from the autogen retention policy"
        );

        self.run_query(
            Method::POST,
            new_database_name,
            &format!("CREATE DATABASE \"{new_database_name}\""),
        )?;
        // continuous queries are not carried over, the statements below
        // transfer their data instead
        self.check_create_retention_policies(new_database_name)?;

        let statements = self.copy_statements(new_database_name)?;
        tracing::info!(count = statements.len(), "starting the transfer");

        let transfer = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .timeout(COPY_TIMEOUT)
            .build()?;

        let database_name = self.database.name().to_string();
        let mut line_count: u64 = 0;
        let mut partial: u64 = 0;
        let mut critical: u64 = 0;

        for (i, statement) in statements.iter().enumerate() {
            match self.run_query_with(&transfer, Method::POST, &database_name, statement) {
                Ok(response) => {
                    if let Some(error) = response.first_error() {
                        classify_copy_failure(error, statement, &mut partial, &mut critical);
                    } else {
                        let written: u64 = response
                            .series()
                            .flat_map(|series| series.rows())
                            .filter_map(|row| row.get("written").and_then(Value::as_u64))
                            .sum();
                        line_count += written;
                        if (i + 1) % 10 == 0 {
                            tracing::info!(
                                statement = i + 1,
                                total = statements.len(),
                                line_count,
                                "transfer progress"
                            );
                        }
                    }
                }
                Err(Error::ApiError { message, .. }) => {
                    classify_copy_failure(&message, statement, &mut partial, &mut critical);
                }
                Err(other) => return Err(other),
            }
        }

        tracing::info!(line_count, "finished copying");
        if partial > 0 {
            tracing::warn!(
                partial,
                "some statements dropped points beyond their retention policy, no action needed"
            );
        }
        if critical > 0 {
            tracing::error!(
                critical,
                "some statements failed, retry them manually from the autogen policy with a shorter WHERE clause"
            );
        } else if line_count == 0 {
            tracing::error!("no data was transferred, check the source database name");
        }
        Ok(())
    }

    /// The `SELECT * INTO` statements a database copy consists of: two per
    /// table (from `autogen` and from its own policy, bounded by the policy
    /// duration) and two per continuous query (rebuilt against the target,
    /// bounded by the duration of the policy it writes into).
    pub fn copy_statements(&self, new_database_name: &str) -> Result<Vec<String>> {
        let source_db = self.database.name();
        let mut statements = Vec::new();

        for table in self.database.tables().values() {
            let policy = table.retention_policy();
            let bound = if policy.duration() == "0s" {
                String::new()
            } else {
                format!(" WHERE time > now() - {}", policy.duration())
            };
            for from_policy in ["autogen", policy.name()] {
                statements.push(format!(
                    "SELECT * INTO {new_database_name}.{rp}.{table} FROM {source_db}.{from_policy}.{table}{bound} GROUP BY *",
                    rp = policy.name(),
                    table = table.name(),
                ));
            }
        }

        let autogen = RetentionPolicy::new("autogen", source_db, "INF", 1, "0s", false)?;
        for continuous_query in self.database.continuous_queries() {
            let Some(select) = continuous_query.select_query() else {
                tracing::error!(
                    name = continuous_query.name(),
                    "continuous query has no structured select, adjust the copy manually"
                );
                continue;
            };
            let (Some(into), Some(source)) = (select.into_table(), select.tables().first())
            else {
                continue;
            };

            let bound = (into.retention_policy().duration() != "0s")
                .then(|| format!("time > now() - {}", into.retention_policy().duration()));
            let where_clause = match (select.where_clause(), bound) {
                (Some(clause), Some(bound)) => Some(format!("{clause} AND {bound}")),
                (Some(clause), None) => Some(clause.to_string()),
                (None, Some(bound)) => Some(bound),
                (None, None) => None,
            };

            let new_into = Arc::new(Table::new(
                new_database_name,
                into.name(),
                BTreeMap::new(),
                Vec::new(),
                None,
                into.retention_policy().clone(),
            )?);

            for from_policy in [source.retention_policy(), &autogen] {
                let from_table = Arc::new(Table::new(
                    source_db,
                    source.name(),
                    BTreeMap::new(),
                    Vec::new(),
                    None,
                    from_policy.clone(),
                )?);
                let mut builder =
                    SelectionQuery::build(Keyword::Select, vec![from_table])
                        .fields(select.fields().to_vec())
                        .into_table(Arc::clone(&new_into));
                if let Some(group) = select.group_list() {
                    builder = builder.group_list(group.to_vec());
                }
                if let Some(clause) = &where_clause {
                    builder = builder.where_clause(clause.clone());
                }
                statements.push(builder.build()?.to_query());
            }
        }

        Ok(statements)
    }

    /// Buffers one `influx_metrics` row per table of a finished send. The
    /// batch duration is split across tables pro rata to their item count.
    fn buffer_send_metrics(
        &mut self,
        keyword: Keyword,
        tables_count: &[(Arc<Table>, usize)],
        elapsed: Duration,
        batch_size: usize,
    ) -> Result<()> {
        let batch_size = batch_size.max(1);
        let timestamp = json!(now_epoch_secs());

        for (table, item_count) in tables_count {
            let share = (*item_count).max(1) as f64 / batch_size as f64;
            let split = SplitRow {
                tags: BTreeMap::from([
                    ("keyword".to_string(), json!(keyword.to_string())),
                    ("tableName".to_string(), json!(table.name())),
                ]),
                fields: BTreeMap::from([
                    (
                        "duration_ms".to_string(),
                        json!(elapsed.as_secs_f64() * 1000.0 * share),
                    ),
                    ("item_count".to_string(), json!(*item_count as u64)),
                ]),
                timestamp: Some(timestamp.clone()),
                warnings: Vec::new(),
            };
            let query = InsertQuery::new(Arc::clone(&self.metrics_table), split)?;
            self.insert_buffer
                .entry(self.metrics_table.name().to_string())
                .or_default()
                .push(query);
        }
        Ok(())
    }

    fn write_lines(&self, retention_policy: &str, lines: &[String]) -> Result<()> {
        let url = self.base_url.join("write")?;
        let response = self
            .http
            .post(url)
            .query(&[
                ("db", self.database.name()),
                ("rp", retention_policy),
                ("precision", "s"),
            ])
            .basic_auth(&self.username, Some(&self.password))
            .body(lines.join("\n"))
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().unwrap_or_default();
        if let Some(dropped) = partial_write_count(&message) {
            if dropped < MAX_BATCH_LINES as u64 {
                tracing::debug!(dropped, "partial write below the batch limit, ignoring");
                return Ok(());
            }
        }
        Err(Error::ApiError {
            code: status,
            message,
        })
    }

    fn run_query(&self, method: Method, database: &str, query: &str) -> Result<QueryResponse> {
        self.run_query_with(&self.http, method, database, query)
    }

    fn run_query_with(
        &self,
        http: &reqwest::blocking::Client,
        method: Method,
        database: &str,
        query: &str,
    ) -> Result<QueryResponse> {
        let url = self.base_url.join("query")?;
        tracing::trace!(query, "sending query");
        let response = http
            .request(method, url)
            .query(&[("db", database), ("q", query), ("epoch", "s")])
            .basic_auth(&self.username, Some(&self.password))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ApiError {
                code: status,
                message: response.text().unwrap_or_default(),
            });
        }
        Ok(response.json()?)
    }
}

/// Lines dropped according to a partial-write error message, if it is one.
fn partial_write_count(message: &str) -> Option<u64> {
    partial_write_re()
        .captures(message)
        .and_then(|caps| caps[1].parse().ok())
}

fn classify_copy_failure(message: &str, statement: &str, partial: &mut u64, critical: &mut u64) {
    match partial_write_count(message) {
        Some(dropped) if dropped < MAX_BATCH_LINES as u64 => *partial += 1,
        _ => {
            tracing::error!(statement, message, "transfer statement failed");
            *critical += 1;
        }
    }
}

fn policy_matches(policy: &RetentionPolicy, row: &Map<String, Value>) -> bool {
    let duration_ok = row.get("duration").and_then(Value::as_str) == Some(policy.duration());
    let replication_ok =
        row.get("replicaN").and_then(Value::as_u64) == Some(u64::from(policy.replication()));
    let default_ok = row.get("default").and_then(Value::as_bool) == Some(policy.is_default());
    // "0s" means the server picks the shard duration, nothing to compare
    let shard_ok = policy.shard_duration() == "0s"
        || row.get("shardGroupDuration").and_then(Value::as_str) == Some(policy.shard_duration());
    duration_ok && replication_ok && default_ok && shard_ok
}

fn policy_statement(verb: &str, policy: &RetentionPolicy, database_name: &str) -> String {
    let mut statement = format!(
        "{verb} RETENTION POLICY \"{}\" ON \"{database_name}\" DURATION {} REPLICATION {}",
        policy.name(),
        policy.duration(),
        policy.replication(),
    );
    if policy.shard_duration() != "0s" {
        statement.push_str(&format!(" SHARD DURATION {}", policy.shard_duration()));
    }
    if policy.is_default() {
        statement.push_str(" DEFAULT");
    }
    statement
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn test_config(address: &str, port: u16) -> InfluxConfig {
        InfluxConfig {
            username: "influxAdmin".to_string(),
            password: "secret".to_string(),
            address: address.to_string(),
            port,
            ssl: false,
            verify_ssl: true,
            db_name: "testdb".to_string(),
        }
    }

    fn test_client(server: &mockito::Server) -> Client {
        let url = Url::parse(&server.url()).unwrap();
        let config = test_config(url.host_str().unwrap(), url.port().unwrap());
        Client::new(&config).unwrap()
    }

    #[test]
    fn ping_reports_the_server_version() {
        let mut server = mockito::Server::new();
        let ping = server
            .mock("GET", "/ping")
            .with_status(204)
            .with_header("X-Influxdb-Version", "1.8.10")
            .create();

        let mut client = test_client(&server);
        assert_eq!(client.ping().unwrap(), "1.8.10");
        assert_eq!(client.version(), Some("1.8.10"));
        ping.assert();
    }

    #[test]
    fn flush_writes_line_protocol_to_the_tables_policy() {
        let mut server = mockito::Server::new();
        let write = server
            .mock("POST", "/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "testdb".into()),
                Matcher::UrlEncoded("rp".into(), "rp_days_14".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            .match_body(Matcher::Exact("cpuram cpuUtil=55.5 1000".to_string()))
            .with_status(204)
            .create();

        let mut client = test_client(&server);
        let row: Map<String, Value> =
            serde_json::from_value(json!({"time": 1000, "cpuUtil": 55.5})).unwrap();
        client.insert_rows("cpuram", &[row]).unwrap();
        client.flush_insert_buffer().unwrap();

        write.assert();
        assert!(client.tally().is_clean());
    }

    #[test]
    fn partial_writes_below_the_batch_limit_are_ignored() {
        let mut server = mockito::Server::new();
        let write = server
            .mock("POST", "/write")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("partial write: points beyond retention policy dropped=5")
            .create();

        let mut client = test_client(&server);
        let row: Map<String, Value> =
            serde_json::from_value(json!({"time": 1000, "cpuUtil": 55.5})).unwrap();
        client.insert_rows("cpuram", &[row]).unwrap();
        client.flush_insert_buffer().unwrap();

        write.assert();
        assert!(client.tally().is_clean());
    }

    #[test]
    fn failed_write_batches_are_tallied_not_raised() {
        let mut server = mockito::Server::new();
        let write = server
            .mock("POST", "/write")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .create();

        let mut client = test_client(&server);
        let row: Map<String, Value> =
            serde_json::from_value(json!({"time": 1000, "cpuUtil": 55.5})).unwrap();
        client.insert_rows("cpuram", &[row]).unwrap();
        client.flush_insert_buffer().unwrap();

        write.assert();
        assert_eq!(client.tally().failed_batches(), 1);
    }

    #[test]
    fn selection_queries_return_parsed_series() {
        let mut server = mockito::Server::new();
        let query = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "SELECT * FROM testdb.rp_days_14.cpuram".into(),
            ))
            .with_body(
                json!({"results": [{"statement_id": 0, "series": [{
                    "name": "cpuram",
                    "columns": ["time", "cpuUtil"],
                    "values": [[1000, 55.5], [2000, 60.0]]
                }]}]})
                .to_string(),
            )
            .create();

        let mut client = test_client(&server);
        let table = client.database().table("cpuram");
        let select = SelectionQuery::build(Keyword::Select, vec![table])
            .build()
            .unwrap();
        let response = client.send_selection_query(&select).unwrap();

        query.assert();
        assert_eq!(response.value_count(), 2);
    }

    #[test]
    fn multiple_default_policies_fail_before_any_request() {
        let config = test_config("localhost", 8086);
        let mut client = Client::new(&config).unwrap();
        client.database_mut().add_retention_policy(
            RetentionPolicy::new("rp_dup", "testdb", "1d", 1, "0s", true).unwrap(),
        );

        let error = client.check_create_retention_policies("testdb").unwrap_err();
        assert!(matches!(error, Error::MultipleDefaultPolicies(_)), "{error}");
    }

    #[test]
    fn missing_and_differing_policies_are_created_and_altered() {
        let mut server = mockito::Server::new();
        // rp_days_90 has the wrong duration, rp_days_7 is missing
        let show = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "SHOW RETENTION POLICIES ON \"testdb\"".into(),
            ))
            .with_body(
                json!({"results": [{"statement_id": 0, "series": [{
                    "columns": ["name", "duration", "shardGroupDuration", "replicaN", "default"],
                    "values": [
                        ["autogen", "0s", "168h0m0s", 1, false],
                        ["rp_inf", "0s", "168h0m0s", 1, false],
                        ["rp_year", "9408h0m0s", "168h0m0s", 1, false],
                        ["rp_half_year", "4704h0m0s", "168h0m0s", 1, false],
                        ["rp_days_90", "720h0m0s", "24h0m0s", 1, false],
                        ["rp_days_14", "336h0m0s", "24h0m0s", 1, true]
                    ]
                }]}]})
                .to_string(),
            )
            .create();
        let create = server
            .mock("POST", "/query")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "CREATE RETENTION POLICY \"rp_days_7\" ON \"testdb\" DURATION 168h0m0s REPLICATION 1"
                    .into(),
            ))
            .with_body("{}")
            .expect(1)
            .create();
        let alter = server
            .mock("POST", "/query")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "ALTER RETENTION POLICY \"rp_days_90\" ON \"testdb\" DURATION 2160h0m0s REPLICATION 1"
                    .into(),
            ))
            .with_body("{}")
            .expect(1)
            .create();

        let client = test_client(&server);
        client.check_create_retention_policies("testdb").unwrap();

        show.assert();
        create.assert();
        alter.assert();
    }

    #[test]
    fn changed_continuous_queries_are_dropped_and_recreated() {
        let mut server = mockito::Server::new();
        let show = server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "SHOW CONTINUOUS QUERIES".into(),
            ))
            .with_body(
                json!({"results": [{"statement_id": 0, "series": [{
                    "name": "testdb",
                    "columns": ["name", "query"],
                    "values": [["cq_jobs_0",
                        "CREATE CONTINUOUS QUERY cq_jobs_0 ON testdb BEGIN SELECT stale END"]]
                }]}]})
                .to_string(),
            )
            .create();

        let client = test_client(&server);
        // every declared query is created, plus one drop for the stale text
        let total = client.database().continuous_queries().len();
        let posts = server
            .mock("POST", "/query")
            .match_query(Matcher::Any)
            .with_body("{}")
            .expect(total + 1)
            .create();

        client.check_create_continuous_queries().unwrap();
        show.assert();
        posts.assert();
    }

    #[test]
    fn copy_statements_cover_tables_and_downsampled_targets() {
        let config = test_config("localhost", 8086);
        let client = Client::new(&config).unwrap();
        let statements = client.copy_statements("newdb").unwrap();

        let tables = client.database().tables().len();
        let queries = client.database().continuous_queries().len();
        assert_eq!(statements.len(), 2 * tables + 2 * queries);

        // per-table copies, bounded by the table's own policy duration
        assert!(statements.contains(&
            "SELECT * INTO newdb.rp_days_14.cpuram FROM testdb.autogen.cpuram WHERE time > now() - 336h0m0s GROUP BY *".to_string()));
        assert!(statements.contains(&
            "SELECT * INTO newdb.rp_days_14.cpuram FROM testdb.rp_days_14.cpuram WHERE time > now() - 336h0m0s GROUP BY *".to_string()));

        // downsampled jobs land in rp_inf, which keeps data forever, so the
        // rebuilt statements carry no time bound
        let into_inf: Vec<&String> = statements
            .iter()
            .filter(|s| s.contains("INTO newdb.rp_inf.jobs FROM"))
            .collect();
        assert_eq!(into_inf.len(), 2);
        assert!(into_inf.iter().any(|s| s.contains("FROM testdb.rp_days_90.jobs")));
        assert!(into_inf.iter().any(|s| s.contains("FROM testdb.autogen.jobs")));
        assert!(into_inf.iter().all(|s| !s.contains("WHERE")));
    }
}
