use crate::config::error::{ConfigError, Result};
use crate::config::loader::RetrySettings;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// Validates [`RetrySettings`] against the embedded JSON schema
pub struct SchemaValidator {
    schema: JSONSchema,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    pub fn new() -> Result<Self> {
        let schema_str = include_str!("schemas/retry_settings.schema.json");
        let schema_value: Value = serde_json::from_str(schema_str).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to parse settings schema: {e}"))
        })?;

        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| {
                ConfigError::SchemaValidationError(format!(
                    "Failed to compile settings schema: {e}"
                ))
            })?;

        Ok(Self { schema })
    }

    /// Reports every violation, not just the first.
    pub fn validate(&self, settings: &RetrySettings) -> Result<()> {
        let value = serde_json::to_value(settings).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to serialize settings: {e}"))
        })?;

        if let Err(errors) = self.schema.validate(&value) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path_str = e.instance_path.to_string();
                    let path = if path_str.is_empty() {
                        "root".to_string()
                    } else {
                        path_str
                    };
                    format!("{e} at '{path}'")
                })
                .collect();

            return Err(ConfigError::SchemaValidationError(format!(
                "Configuration validation failed ({} error{}):\n  - {}",
                messages.len(),
                if messages.len() == 1 { "" } else { "s" },
                messages.join("\n  - ")
            )));
        }

        Ok(())
    }
}
