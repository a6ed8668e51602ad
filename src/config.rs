use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub ws: WsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

/// WebSocket tuning parameters.
///
/// Defaults follow the usual keepalive scheme: pings go out at 90% of the
/// pong deadline so a live client always answers before the read side
/// gives up on it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WsConfig {
    /// Max interval without traffic from the peer before the read side
    /// considers the connection dead, in seconds.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,
    /// Per-frame write deadline, in seconds.
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,
    /// Maximum inbound frame size, in bytes.
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: usize,
    /// Per-connection outbound queue capacity, in envelopes.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl WsConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Keepalive probe interval; must stay below `pong_wait`.
    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs * 9 / 10)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            pong_wait_secs: default_pong_wait(),
            write_wait_secs: default_write_wait(),
            max_frame_bytes: default_max_frame(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

fn default_max_frame() -> usize {
    512
}

fn default_outbound_queue() -> usize {
    256
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    server: ServerConfig,
    logging: LoggingConfig,
    database_url: Option<String>,
    ws: WsConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            database_url: None,
            ws: WsConfig::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.logging.json = enabled;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_ws(mut self, ws: WsConfig) -> Self {
        self.ws = ws;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized: `HOST`, `PORT`, `LOG_LEVEL`, `LOG_FORMAT` (`text`|`json`),
    /// `DATABASE_URL`, `WS_MAX_FRAME_BYTES`, `WS_OUTBOUND_QUEUE`.
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json = format.eq_ignore_ascii_case("json");
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Ok(max_frame) = std::env::var("WS_MAX_FRAME_BYTES") {
            if let Ok(bytes) = max_frame.parse() {
                self.ws.max_frame_bytes = bytes;
            }
        }
        if let Ok(queue) = std::env::var("WS_OUTBOUND_QUEUE") {
            if let Ok(capacity) = queue.parse() {
                self.ws.outbound_queue = capacity;
            }
        }
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, the server address is
    /// invalid, the log level is unknown, or a WebSocket parameter is zero.
    pub fn build(self) -> crate::error::Result<Config> {
        let database_url = self.database_url.ok_or_else(|| {
            crate::error::Error::invalid_request("DATABASE_URL must be set")
        })?;
        if database_url.is_empty() {
            return Err(crate::error::Error::invalid_request(
                "DATABASE_URL must not be empty",
            ));
        }

        self.server.addr().map_err(|e| {
            crate::error::Error::invalid_request(format!(
                "invalid server address {}:{} - {}",
                self.server.host, self.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(crate::error::Error::invalid_request(format!(
                "invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.ws.pong_wait_secs == 0 {
            return Err(crate::error::Error::invalid_request(
                "WebSocket pong wait must be greater than 0",
            ));
        }
        if self.ws.max_frame_bytes == 0 {
            return Err(crate::error::Error::invalid_request(
                "WebSocket max frame size must be greater than 0",
            ));
        }
        if self.ws.outbound_queue == 0 {
            return Err(crate::error::Error::invalid_request(
                "WebSocket outbound queue capacity must be greater than 0",
            ));
        }

        Ok(Config {
            server: self.server,
            logging: self.logging,
            database: DatabaseConfig {
                url: database_url,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout: default_connect_timeout(),
            },
            ws: self.ws,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new()
            .with_database_url("postgres://localhost/game")
            .build()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ws.pong_wait_secs, 60);
        assert_eq!(config.ws.write_wait_secs, 10);
        assert_eq!(config.ws.max_frame_bytes, 512);
        assert_eq!(config.ws.outbound_queue, 256);
    }

    #[test]
    fn test_ping_period_below_pong_wait() {
        let ws = WsConfig::default();
        assert!(ws.ping_period() < ws.pong_wait());
        assert_eq!(ws.ping_period(), Duration::from_secs(54));
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        let result = ConfigBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_level_is_an_error() {
        let result = ConfigBuilder::new()
            .with_database_url("postgres://localhost/game")
            .with_log_level("loud")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_database_url("postgres://localhost/game")
            .with_port(9000)
            .with_json_logging(true)
            .build()
            .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.logging.json);
    }
}
