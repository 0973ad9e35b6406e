//! `[data]` section configuration.
//!
//! Controls how programmatic data modules are found and executed.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[data]` section in loom.toml.
///
/// # Example
/// ```toml
/// [data]
/// runner = ["python3"]      # Interpreter for data modules
/// suffix = "py"             # data/index.py, data/posts/__init__.py
/// ignore = ["__pycache__", "node_modules"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Command prefix used to execute a data module; the module path is appended.
    #[serde(default = "defaults::data::runner")]
    #[educe(Default = defaults::data::runner())]
    pub runner: Vec<String>,

    /// File suffix (without the dot) identifying programmatic data modules.
    #[serde(default = "defaults::data::suffix")]
    #[educe(Default = defaults::data::suffix())]
    pub suffix: String,

    /// Directory names never scanned for nested scopes.
    #[serde(default = "defaults::data::ignore")]
    #[educe(Default = defaults::data::ignore())]
    pub ignore: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_data_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.data.runner, vec!["sh".to_string()]);
        assert_eq!(config.data.suffix, "sh");
        assert_eq!(config.data.ignore, vec!["__pycache__".to_string()]);
    }

    #[test]
    fn test_data_config_custom_runner() {
        let config = r#"
            [data]
            runner = ["python3", "-B"]
            suffix = "py"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.data.runner, vec!["python3", "-B"]);
        assert_eq!(config.data.suffix, "py");
    }
}
