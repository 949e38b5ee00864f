//! User configuration, read from a TOML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::status::Canonical;
use crate::services::normalizer::{PriorityNormalizer, StatusNormalizer, Vocabulary};
use crate::services::scheduler::{DependencyScheduler, WORKDAY_HOURS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config from '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown value '{value}' in [{section}]")]
    UnknownValue { section: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub statuses: VocabularyConfig,
    #[serde(default)]
    pub priorities: VocabularyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Extra labels and keywords on top of the built-in tables. A non-empty
/// `order` replaces the enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordConfig {
    pub fragment: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    #[serde(default = "default_workday_hours")]
    pub workday_hours: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            workday_hours: default_workday_hours(),
        }
    }
}

fn default_workday_hours() -> f64 {
    WORKDAY_HOURS
}

fn canonical<T: Canonical>(section: &'static str, raw: &str) -> Result<T, ConfigError> {
    T::from_canonical(raw.trim()).ok_or_else(|| ConfigError::UnknownValue {
        section,
        value: raw.to_string(),
    })
}

impl VocabularyConfig {
    fn apply<T: Canonical>(&self, section: &'static str, mut base: Vocabulary<T>) -> Result<Vocabulary<T>, ConfigError> {
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|raw| canonical(section, raw))
                .collect::<Result<Vec<T>, _>>()?;
            base.set_order(order);
        }
        for (label, value) in &self.labels {
            base.insert_label(label, canonical(section, value)?);
        }
        for keyword in &self.keywords {
            base.insert_keyword(&keyword.fragment, canonical(section, &keyword.value)?);
        }
        Ok(base)
    }
}

impl Config {
    /// `dirs::config_dir()/wbs/config.toml`, or `./config.toml` on systems
    /// without a config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("wbs"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// A missing file means defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn statuses(&self) -> Result<StatusNormalizer, ConfigError> {
        self.statuses.apply("statuses", StatusNormalizer::default())
    }

    pub fn priorities(&self) -> Result<PriorityNormalizer, ConfigError> {
        self.priorities.apply("priorities", PriorityNormalizer::default())
    }

    pub fn scheduler(&self) -> DependencyScheduler {
        DependencyScheduler::new(self.schedule.workday_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::{Priority, Status};

    const SAMPLE: &str = r#"
[statuses]
order = ["BACKLOG", "in_progress", "REVIEW", "DONE"]

[statuses.labels]
"Em andamento" = "REVIEW"
"Aguardando cliente" = "IN_PROGRESS"

[[statuses.keywords]]
fragment = "cliente"
value = "REVIEW"

[priorities.labels]
"Imediata" = "CRITICAL"

[schedule]
workday_hours = 6
"#;

    #[test]
    fn test_parse_and_apply() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let statuses = config.statuses().unwrap();
        let priorities = config.priorities().unwrap();

        assert_eq!(
            statuses.order(),
            &[Status::Backlog, Status::InProgress, Status::Review, Status::Done]
        );
        assert_eq!(statuses.normalize(Some("Em andamento")), Some(Status::Review));
        assert_eq!(statuses.normalize(Some("aguardando cliente")), Some(Status::InProgress));
        assert_eq!(statuses.normalize(Some("fala com o cliente")), Some(Status::Review));
        // Built-in tables stay available.
        assert_eq!(statuses.normalize(Some("Finalizado")), Some(Status::Done));
        assert_eq!(priorities.normalize(Some("imediata")), Some(Priority::Critical));
        assert_eq!(config.scheduler().workday_hours(), 6.0);
    }

    #[test]
    fn test_unknown_value_rejected() {
        let config: Config = toml::from_str("[statuses]\norder = [\"SOMEDAY\"]\n").unwrap();
        assert!(matches!(
            config.statuses(),
            Err(ConfigError::UnknownValue { section: "statuses", .. })
        ));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing, Config::default());
        assert_eq!(missing.schedule.workday_hours, 8.0);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[statuses\norder = 3").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::ParseFailed { .. })));
    }
}
