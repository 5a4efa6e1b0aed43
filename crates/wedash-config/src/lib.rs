mod discover;
mod model;
mod raw;

pub use discover::{discover, BUILD_SCRIPTS, SIDECAR_FILE};
pub use model::ServiceFile;

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error(s): {0}")]
    Validation(String),
}

/// Load a service sidecar file from a file path.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read or parsed.
pub fn load_from_path(path: &std::path::Path) -> Result<ServiceFile, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_auto(&text, path)
}

/// Parse a service sidecar file, picking the format from the path extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the text cannot be parsed.
pub fn parse_auto(text: &str, path: &std::path::Path) -> Result<ServiceFile, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text),
        _ => Err(ConfigError::Validation("unknown config extension".into())),
    }
}

/// Parse a service sidecar file from a TOML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the text cannot be parsed or fails validation.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str) -> Result<ServiceFile, ConfigError> {
    let raw = toml::from_str::<raw::RawServiceFile>(config)?;
    raw.try_into()
}
