//! Retention policy declarations.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::{json, Map, Value};

use backmon_units::transform_time_literal;

use crate::{Error, Result};

/// A declared retention policy, validated and canonicalized at construction
/// and immutable thereafter.
///
/// Durations are stored in the server's own `{h}h{m}m{s}s` shape so that a
/// declared policy compares equal to the same policy as reported by
/// `SHOW RETENTION POLICIES`. Equality, ordering and hashing cover exactly
/// the attributes the server reports; the owning database name is carried
/// for display only.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    name: String,
    database: String,
    duration: String,
    replication: u32,
    shard_duration: String,
    default: bool,
}

impl RetentionPolicy {
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        duration: &str,
        replication: u32,
        shard_duration: &str,
        default: bool,
    ) -> Result<Self> {
        let name = name.into();
        let database = database.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("retention policy needs a name"));
        }
        if database.is_empty() {
            return Err(Error::InvalidArgument("retention policy needs a database"));
        }
        if replication == 0 {
            return Err(Error::InvalidArgument(
                "retention policy replication must be at least 1",
            ));
        }
        Ok(Self {
            name,
            database,
            duration: transform_time_literal(duration)?,
            replication,
            shard_duration: transform_time_literal(shard_duration)?,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Canonicalized duration; `"0s"` means keep forever.
    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn replication(&self) -> u32 {
        self.replication
    }

    pub fn shard_duration(&self) -> &str {
        &self.shard_duration
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    /// The policy as the server reports it, used to diff declared policies
    /// against `SHOW RETENTION POLICIES` output.
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".into(), json!(self.name));
        map.insert("duration".into(), json!(self.duration));
        map.insert("shardGroupDuration".into(), json!(self.shard_duration));
        map.insert("replicaN".into(), json!(self.replication));
        map.insert("default".into(), json!(self.default));
        map
    }

    fn wire_key(&self) -> (&str, &str, &str, u32, bool) {
        (
            &self.name,
            &self.duration,
            &self.shard_duration,
            self.replication,
            self.default,
        )
    }
}

impl PartialEq for RetentionPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.wire_key() == other.wire_key()
    }
}

impl Eq for RetentionPolicy {}

impl Hash for RetentionPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wire_key().hash(state);
    }
}

impl PartialOrd for RetentionPolicy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RetentionPolicy {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wire_key().cmp(&other.wire_key())
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_canonicalized() {
        let rp = RetentionPolicy::new("rp_days_90", "backmon", "90d", 1, "0s", false).unwrap();
        assert_eq!(rp.duration(), "2160h0m0s");
        assert_eq!(rp.shard_duration(), "0s");
    }

    #[test]
    fn infinite_duration_is_zero_seconds() {
        let rp = RetentionPolicy::new("autogen", "backmon", "INF", 1, "0s", false).unwrap();
        assert_eq!(rp.duration(), "0s");
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(RetentionPolicy::new("", "backmon", "90d", 1, "0s", false).is_err());
        assert!(RetentionPolicy::new("rp", "", "90d", 1, "0s", false).is_err());
        assert!(RetentionPolicy::new("rp", "backmon", "90d", 0, "0s", false).is_err());
        assert!(RetentionPolicy::new("rp", "backmon", "soon", 1, "0s", false).is_err());
    }

    #[test]
    fn equality_ignores_the_database() {
        let a = RetentionPolicy::new("rp", "db_a", "14d", 1, "0s", true).unwrap();
        let b = RetentionPolicy::new("rp", "db_b", "14d", 1, "0s", true).unwrap();
        assert_eq!(a, b);

        let c = RetentionPolicy::new("rp", "db_a", "14d", 1, "0s", false).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn wire_form_matches_server_report() {
        let rp = RetentionPolicy::new("rp_days_14", "backmon", "14d", 1, "0s", true).unwrap();
        let wire = rp.to_wire();
        assert_eq!(wire["name"], json!("rp_days_14"));
        assert_eq!(wire["duration"], json!("336h0m0s"));
        assert_eq!(wire["shardGroupDuration"], json!("0s"));
        assert_eq!(wire["replicaN"], json!(1));
        assert_eq!(wire["default"], json!(true));
    }
}
