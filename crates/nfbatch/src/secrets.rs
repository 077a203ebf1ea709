//! API key resolution for the structured extraction service.
//!
//! A key may come from, in priority order:
//!
//! 1. a direct value in the config (`api_key`), handy for local testing
//! 2. a file (`api_key_file`), the Docker secrets pattern
//! 3. an environment variable (`api_key_env`, or the provider's default variable)

use secrecy::SecretString;
use std::fs;

use crate::config::ExtractionConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return match fs::read_to_string(&expanded) {
            Ok(content) => Ok(SecretString::from(content.trim().to_string())),
            Err(e) => Err(SecretError::FileReadError {
                path: expanded,
                source: e,
            }),
        };
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        // Env vars set from files often carry a trailing newline.
        return match std::env::var(var_name) {
            Ok(value) => Ok(SecretString::from(value.trim())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but an absent source is `Ok(None)`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolves the API key for the configured extraction provider.
///
/// Providers that need no key (ollama, custom) yield `None` when nothing is
/// configured or their env var is unset. Providers that need one fail.
pub fn resolve_api_key(config: &ExtractionConfig) -> Result<Option<SecretString>> {
    let env_var = config.resolved_api_key_env();
    let result = resolve_secret_optional(
        config.api_key.as_deref(),
        config.api_key_file.as_deref(),
        env_var.as_deref(),
    );

    match result {
        Err(SecretError::EnvVarNotSet { .. }) if !config.provider.requires_api_key() => Ok(None),
        Ok(None) if config.provider.requires_api_key() => Err(SecretError::NoSourceProvided),
        other => other,
    }
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("NFBATCH_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("NFBATCH_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("NFBATCH_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("NFBATCH_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("NFBATCH_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("NFBATCH_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("NFBATCH_TEST_SECRET_3", "env_value\n");
        let result = resolve_secret(None, None, Some("NFBATCH_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("NFBATCH_TEST_SECRET_3");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, Some(""), None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_env_var_not_set_error() {
        let result = resolve_secret(None, None, Some("NFBATCH_DEFINITELY_NOT_SET_12345"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    fn test_resolve_secret_optional_none() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_api_key_from_provider_default_env() {
        std::env::set_var("GROQ_API_KEY", "gsk_test");
        let config = ExtractionConfig {
            provider: Provider::Groq,
            ..ExtractionConfig::default()
        };

        let key = resolve_api_key(&config).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "gsk_test");
        std::env::remove_var("GROQ_API_KEY");
    }

    #[test]
    #[serial]
    fn test_api_key_for_anthropic() {
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-test");
        let config = ExtractionConfig {
            provider: Provider::Anthropic,
            ..ExtractionConfig::default()
        };

        let key = resolve_api_key(&config).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "sk-ant-test");

        std::env::remove_var("ANTHROPIC_API_KEY");
        assert!(matches!(
            resolve_api_key(&config),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_api_key_required_but_missing() {
        std::env::remove_var("MISTRAL_API_KEY");
        let config = ExtractionConfig {
            provider: Provider::Mistral,
            ..ExtractionConfig::default()
        };

        assert!(matches!(
            resolve_api_key(&config),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_api_key_optional_for_ollama() {
        let config = ExtractionConfig {
            provider: Provider::Ollama,
            api_key_env: Some("NFBATCH_OLLAMA_KEY_UNSET".to_string()),
            ..ExtractionConfig::default()
        };

        assert!(resolve_api_key(&config).unwrap().is_none());
    }

    #[test]
    fn test_api_key_direct_value() {
        let config = ExtractionConfig {
            provider: Provider::Openai,
            api_key: Some("sk-direct".to_string()),
            ..ExtractionConfig::default()
        };

        let key = resolve_api_key(&config).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "sk-direct");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/run/secrets/key"), "/run/secrets/key");
    }
}
