//! Connection settings, usually read from the monitoring config file.

use serde::Deserialize;

fn default_verify_ssl() -> bool {
    true
}

/// Connection parameters of the InfluxDB server.
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    pub username: String,
    pub password: String,
    #[serde(rename = "srv_address")]
    pub address: String,
    #[serde(rename = "srv_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(rename = "dbName")]
    pub db_name: String,
}

impl InfluxConfig {
    /// The server base URL derived from address, port and the ssl flag.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_config_file_shape() {
        let config: InfluxConfig = serde_json::from_str(
            r#"{
                "username": "influxAdmin",
                "password": "secret",
                "ssl": true,
                "verify_ssl": false,
                "srv_address": "influx.example.org",
                "srv_port": 8086,
                "dbName": "backupMonitor"
            }"#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://influx.example.org:8086");
        assert_eq!(config.db_name, "backupMonitor");
        assert!(!config.verify_ssl);
    }

    #[test]
    fn ssl_flags_default_to_safe_values() {
        let config: InfluxConfig = serde_json::from_str(
            r#"{
                "username": "u",
                "password": "p",
                "srv_address": "localhost",
                "srv_port": 8086,
                "dbName": "db"
            }"#,
        )
        .unwrap();
        assert!(!config.ssl);
        assert!(config.verify_ssl);
        assert_eq!(config.base_url(), "http://localhost:8086");
    }
}
