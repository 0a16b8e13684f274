//! Config validation
//!
//! Rules:
//! - group_id / stream_id non-empty
//! - 0 < queue_capacity <= MAX_QUEUE_CAPACITY
//! - flush_interval_ms > 0
//! - append_timeout_ms > 0 when set
//! - file sink has a base_path

use ::validator::Validate;

use contracts::{ContractError, ShipperConfig, SinkType};

/// Validate a ShipperConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ShipperConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_timeout(config)?;
    validate_sink(config)?;
    Ok(())
}

/// Field-level rules declared on the struct
fn validate_fields(config: &ShipperConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

fn validate_timeout(config: &ShipperConfig) -> Result<(), ContractError> {
    if config.append_timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            "append_timeout_ms",
            "append_timeout_ms must be > 0 when set",
        ));
    }
    Ok(())
}

/// Sink-specific parameters
fn validate_sink(config: &ShipperConfig) -> Result<(), ContractError> {
    match config.sink.sink_type {
        SinkType::Memory => Ok(()),
        SinkType::File => match config.sink.params.get("base_path") {
            Some(path) if !path.is_empty() => Ok(()),
            _ => Err(ContractError::config_validation(
                "sink.params.base_path",
                "file sink requires a non-empty base_path",
            )),
        },
    }
}
