//! The database: tables, retention policies and continuous queries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::queries::ContinuousQuery;
use crate::retention::RetentionPolicy;
use crate::table::Table;

/// Everything declared about one InfluxDB database.
///
/// Tables are shared via [`Arc`]: the write buffer keys batches by table and
/// every [`crate::InsertQuery`] holds a handle to its table.
#[derive(Debug)]
pub struct Database {
    name: String,
    tables: BTreeMap<String, Arc<Table>>,
    retention_policies: BTreeSet<RetentionPolicy>,
    continuous_queries: BTreeSet<ContinuousQuery>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
            retention_policies: BTreeSet::new(),
            continuous_queries: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &BTreeMap<String, Arc<Table>> {
        &self.tables
    }

    pub fn retention_policies(&self) -> &BTreeSet<RetentionPolicy> {
        &self.retention_policies
    }

    pub fn continuous_queries(&self) -> &BTreeSet<ContinuousQuery> {
        &self.continuous_queries
    }

    pub fn add_retention_policy(&mut self, policy: RetentionPolicy) {
        self.retention_policies.insert(policy);
    }

    pub fn add_continuous_query(&mut self, query: ContinuousQuery) {
        self.continuous_queries.insert(query);
    }

    /// Registers a declared table, returning the shared handle.
    pub fn add_table(&mut self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        self.tables
            .insert(table.name().to_string(), Arc::clone(&table));
        table
    }

    /// Looks up a table by name. Unknown names yield a schema-less table
    /// bound to the default retention policy, so lookup never fails and
    /// undeclared measurements still get stored.
    pub fn table(&self, name: &str) -> Arc<Table> {
        if let Some(table) = self.tables.get(name) {
            return Arc::clone(table);
        }
        tracing::debug!(table = name, "table not declared, using a fallback schema");
        Arc::new(Table::fallback(
            &self.name,
            name,
            self.default_retention_policy(),
        ))
    }

    /// The declared default policy, or `autogen` (keep forever) when none
    /// is marked default.
    pub fn default_retention_policy(&self) -> RetentionPolicy {
        self.retention_policies
            .iter()
            .find(|rp| rp.is_default())
            .cloned()
            .unwrap_or_else(|| {
                RetentionPolicy::new("autogen", &self.name, "INF", 1, "0s", false)
                    .expect("autogen policy is well-formed")
            })
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::datatype::Datatype;
    use crate::table::SchemaKind;

    fn rp(name: &str, default: bool) -> RetentionPolicy {
        RetentionPolicy::new(name, "testdb", "14d", 1, "0s", default).unwrap()
    }

    #[test]
    fn lookup_returns_declared_tables() {
        let mut db = Database::new("testdb");
        let fields = BTreeMap::from([("cpu".to_string(), Datatype::Float)]);
        db.add_table(
            Table::new("testdb", "cpuram", fields, vec![], None, rp("rp_days_14", true)).unwrap(),
        );

        let table = db.table("cpuram");
        assert_eq!(table.kind(), SchemaKind::Declared);
        assert_eq!(table.retention_policy().name(), "rp_days_14");
    }

    #[test]
    fn unknown_tables_get_a_fallback_schema() {
        let mut db = Database::new("testdb");
        db.add_retention_policy(rp("rp_days_14", true));

        let table = db.table("surprise");
        assert_eq!(table.kind(), SchemaKind::Fallback);
        assert_eq!(table.retention_policy().name(), "rp_days_14");
        // the fallback table is not registered
        assert!(db.tables().get("surprise").is_none());
    }

    #[test]
    fn default_policy_falls_back_to_autogen() {
        let db = Database::new("testdb");
        let rp = db.default_retention_policy();
        assert_eq!(rp.name(), "autogen");
        assert_eq!(rp.duration(), "0s");
    }
}
