//! Server configuration.
//!
//! All settings are read once at startup from `POOLGATE_*` environment
//! variables; unset variables fall back to the defaults of the reference
//! deployment.

use poolgate_core::error::{Error, Result};

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub http_port: u16,
    /// Debug mode (pretty logs, relaxed startup checks).
    pub debug: bool,
    /// Telemetry topic this service subscribes to.
    pub telemetry_topic: String,
    /// Base of the per-pool command topics.
    pub command_topic_base: String,
    /// MQTT transport settings.
    pub mqtt: MqttConfig,
}

/// MQTT transport settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier. Must be unique per worker process, or the broker
    /// disconnects the duplicate and the pair churns forever.
    pub client_id: String,
    /// Optional broker username.
    pub username: Option<String>,
    /// Optional broker password.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keepalive_secs: u64,
    /// How long a dispatch waits for broker acknowledgment.
    pub publish_timeout_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "test.mosquitto.org".to_string(),
            port: 1883,
            client_id: format!("poolgate-{}", std::process::id()),
            username: None,
            password: None,
            keepalive_secs: 30,
            publish_timeout_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            telemetry_topic: "uca/iot/piscine".to_string(),
            command_topic_base: "uca/iot/piscine/cmd".to_string(),
            mqtt: MqttConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` when a variable is set but fails to
    /// parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("POOLGATE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("POOLGATE_DEBUG")? {
            config.debug = debug;
        }
        if let Some(topic) = env_string("POOLGATE_TELEMETRY_TOPIC") {
            config.telemetry_topic = topic;
        }
        if let Some(base) = env_string("POOLGATE_COMMAND_TOPIC_BASE") {
            config.command_topic_base = base;
        }

        if let Some(host) = env_string("POOLGATE_MQTT_HOST") {
            config.mqtt.host = host;
        }
        if let Some(port) = env_u16("POOLGATE_MQTT_PORT")? {
            config.mqtt.port = port;
        }
        if let Some(client_id) = env_string("POOLGATE_MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        config.mqtt.username = env_string("POOLGATE_MQTT_USERNAME");
        config.mqtt.password = env_string("POOLGATE_MQTT_PASSWORD");
        if let Some(secs) = env_u64("POOLGATE_MQTT_KEEPALIVE_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "POOLGATE_MQTT_KEEPALIVE_SECS must be greater than 0".to_string(),
                ));
            }
            config.mqtt.keepalive_secs = secs;
        }
        if let Some(secs) = env_u64("POOLGATE_PUBLISH_TIMEOUT_SECS")? {
            config.mqtt.publish_timeout_secs = secs;
        }

        // Topics are concatenated with `/`; trailing separators in the
        // configured values would double up.
        config.telemetry_topic = config.telemetry_topic.trim_end_matches('/').to_string();
        config.command_topic_base = config.command_topic_base.trim_end_matches('/').to_string();

        if config.telemetry_topic.is_empty() {
            return Err(Error::InvalidInput(
                "POOLGATE_TELEMETRY_TOPIC must not be empty".to_string(),
            ));
        }
        if config.command_topic_base.is_empty() {
            return Err(Error::InvalidInput(
                "POOLGATE_COMMAND_TOPIC_BASE must not be empty".to_string(),
            ));
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(Error::InvalidInput(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.telemetry_topic, "uca/iot/piscine");
        assert_eq!(config.command_topic_base, "uca/iot/piscine/cmd");
        assert_eq!(config.mqtt.host, "test.mosquitto.org");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.keepalive_secs, 30);
        assert_eq!(config.mqtt.publish_timeout_secs, 5);
        assert!(config.mqtt.client_id.starts_with("poolgate-"));
    }

    #[test]
    fn test_client_id_is_unique_per_process() {
        let config = Config::default();
        assert!(config
            .mqtt
            .client_id
            .strip_prefix("poolgate-")
            .is_some_and(|pid| pid.parse::<u32>().is_ok()));
    }
}
