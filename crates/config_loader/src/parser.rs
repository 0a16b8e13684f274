//! Config parsing
//!
//! Supports TOML (primary) and JSON.

use contracts::{ContractError, ShipperConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML config
pub fn parse_toml(content: &str) -> Result<ShipperConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON config
pub fn parse_json(content: &str) -> Result<ShipperConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ShipperConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Severity, SinkType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
group_id = "payments"
stream_id = "worker-1"

[sink]
sink_type = "memory"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.group_id, "payments");
        assert_eq!(config.stream_id, "worker-1");
        assert_eq!(config.sink.sink_type, SinkType::Memory);
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
group_id = "payments"
stream_id = "worker-1"
queue_capacity = 500
flush_interval_ms = 1000
start_enabled = false
max_level = "info"
append_timeout_ms = 3000
refresh_token_on_conflict = true

[sink]
sink_type = "file"
[sink.params]
base_path = "/var/lib/shipper"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.flush_interval_ms, 1000);
        assert!(!config.start_enabled);
        assert_eq!(config.max_level, Severity::Info);
        assert_eq!(config.append_timeout_ms, Some(3000));
        assert!(config.refresh_token_on_conflict);
        assert_eq!(
            config.sink.params.get("base_path").map(String::as_str),
            Some("/var/lib/shipper")
        );
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "group_id": "payments",
            "stream_id": "worker-1",
            "sink": { "sink_type": "memory" }
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.queue_capacity, 100);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = parse_toml("this is not [valid toml");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_sink_type() {
        let content = r#"
group_id = "payments"
stream_id = "worker-1"

[sink]
sink_type = "carrier_pigeon"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
