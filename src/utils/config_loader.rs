use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::{env, fs};
use thiserror::Error;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)\}").expect("static pattern"));

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub async fn load_from_file<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = tokio::fs::read_to_string(file_name).await?;
    parse_with_env(&contents)
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = fs::read_to_string(file_name)?;
    parse_with_env(&contents)
}

/// Parses TOML after substituting `${VAR}` references from the environment.
pub fn parse_with_env<T: DeserializeOwned>(contents: &str) -> Result<T, LoadConfigError> {
    let contents = expand_vars(contents);
    Ok(toml::from_str(&contents)?)
}

fn expand_vars(raw_config: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(raw_config, |caps: &Captures| match env::var(&caps[1]) {
            Ok(val) => val,
            Err(_) => caps[0].to_string(),
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Section {
        name: String,
    }

    #[test]
    fn test_unknown_vars_are_left_untouched() {
        let raw = "name = \"${BUNDLE_RESCUE_SURELY_UNSET_VAR}\"";
        assert_eq!(expand_vars(raw), raw);
    }

    #[test]
    fn test_known_vars_are_substituted() {
        let Ok(path) = env::var("PATH") else {
            return;
        };
        let section: Section = parse_with_env("name = \"${PATH}\"").unwrap();
        assert_eq!(section.name, path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_from_file_sync::<Section>("/nonexistent/strategy.toml".to_string());
        assert!(matches!(result, Err(LoadConfigError::IoError(_))));
    }
}
