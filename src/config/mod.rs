// Configuration module entry point
// Loads layered configuration and holds shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::{AppState, ConnectionGuard};
pub use types::Config;

/// Default config file name, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: built-in defaults, the config file
    /// (optional), then `SERVER_`-prefixed environment variables using `__`
    /// as the nesting separator (e.g. `SERVER_SERVER__PORT=9000`).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_grace_period", 10)?
            .set_default("http.server_name", "greeter/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("greeter-config-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("/nonexistent/greeter/config").unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.performance.keep_alive_timeout, 75);
        assert_eq!(cfg.performance.shutdown_grace_period, 10);
        assert_eq!(cfg.performance.max_connections, None);
        assert_eq!(cfg.http.max_body_size, 10_485_760);
        assert!(cfg.server.workers.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_temp_config(
            "override",
            r#"
[server]
host = "0.0.0.0"
port = 9100
workers = 2

[logging]
level = "warn"
access_log = false
access_log_format = "json"

[performance]
max_connections = 64

[http]
server_name = "test-server"
"#,
        );
        let base = path.with_extension("");
        let cfg = Config::load_from(base.to_str().unwrap()).unwrap();

        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.logging.level, "warn");
        assert!(!cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "json");
        assert_eq!(cfg.performance.max_connections, Some(64));
        // untouched keys keep their defaults
        assert_eq!(cfg.performance.read_timeout, 30);
        assert_eq!(cfg.http.server_name, "test-server");

        let addr = cfg.get_socket_addr().unwrap();
        assert_eq!(addr.port(), 9100);
    }

    #[test]
    fn test_invalid_socket_addr() {
        let mut cfg = Config::load_from("/nonexistent/greeter/config").unwrap();
        cfg.server.host = "not a host".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
