use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::EngineConfig;

/// Load configuration from a file using the config crate
/// Supports TOML, YAML and JSON, chosen by file extension.
pub fn load_config(config_path: &str) -> Result<EngineConfig> {
    let config_path = Path::new(config_path);

    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml, // Default to TOML
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let engine_config: EngineConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(engine_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::Builder;

    use super::*;
    use crate::config::models::RouteConfig;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(suffix).tempfile().unwrap();
        write!(temp_file, "{}", content).unwrap();
        temp_file
    }

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
listen_addr = "0.0.0.0:9000"
api_version = "/v1"

[logging]
json = true
slow_request_threshold = "250ms"

[[routes]]
type = "proxy"
pattern = "/users/**"
target = "http://users:8080"
rewrite = true

[[routes]]
type = "redirect"
pattern = "/docs"
location = "https://example.com/docs"
"#;
        let temp_file = write_temp(".toml", toml_content);

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.api_version, "/v1");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.routes.len(), 2);
        assert!(matches!(
            &config.routes[0],
            RouteConfig::Proxy { rewrite: true, .. }
        ));
        assert_eq!(config.routes[1].method(), "GET");
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:3000"
middleware:
  request_id: true
routes:
  - type: "redirect"
    pattern: "/old"
    method: "GET"
    location: "/new"
"#;
        let temp_file = write_temp(".yaml", yaml_content);

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert!(config.middleware.request_id);
        assert!(config.middleware.request_logging);
        assert_eq!(config.routes[0].pattern(), "/old");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config("/definitely/not/here.toml");
        assert!(result.is_err());
    }
}
