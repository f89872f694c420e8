//! Check configuration files
//!
//! One YAML file per check (`conf.d/<check>.yaml`):
//!
//! ```yaml
//! init_config:
//! instances:
//!   - api_url: http://cm.example:7180/api/v48
//!     tags: ["env:prod"]
//! ```

use crate::error::{CheckError, CheckResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckFile {
    #[serde(default)]
    pub init_config: Option<serde_yaml::Value>,
    #[serde(default)]
    pub instances: Vec<serde_yaml::Value>,
}

impl CheckFile {
    pub fn from_yaml(text: &str) -> CheckResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Load a check file; the check name is the file stem
pub async fn load_check_file(path: &Path) -> CheckResult<(String, CheckFile)> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CheckError::Config(format!("invalid check file name: {}", path.display())))?
        .to_string();

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CheckError::Config(format!("cannot read {}: {}", path.display(), e)))?;

    let file = CheckFile::from_yaml(&text)
        .map_err(|e| CheckError::Config(format!("{}: {}", path.display(), e)))?;
    Ok((name, file))
}

/// Deserialize one `instances` entry into a check's config type
pub fn parse_instance<T: DeserializeOwned>(instance: &serde_yaml::Value) -> CheckResult<T> {
    Ok(serde_yaml::from_value(instance.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        url: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn test_load_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitlab.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "init_config:\ninstances:\n  - url: http://localhost\n    tags: [a:b]\n  - url: http://other").unwrap();

        let (name, file) = load_check_file(&path).await.unwrap();
        assert_eq!(name, "gitlab");
        assert!(file.init_config.as_ref().map_or(true, |v| v.is_null()));
        assert_eq!(file.instances.len(), 2);

        let first: Sample = parse_instance(&file.instances[0]).unwrap();
        assert_eq!(first.url, "http://localhost");
        assert_eq!(first.tags, vec!["a:b"]);
    }

    #[test]
    fn test_empty_and_invalid_files() {
        assert!(CheckFile::from_yaml("  \n").unwrap().instances.is_empty());
        assert!(matches!(CheckFile::from_yaml("instances: 3"), Err(CheckError::Config(_))));

        let missing_field = serde_yaml::from_str::<serde_yaml::Value>("tags: []").unwrap();
        assert!(parse_instance::<Sample>(&missing_field).is_err());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_check_file(Path::new("/nonexistent/cloudera.yaml")).await.unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
