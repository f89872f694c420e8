/*!
Fixture loading for check tests

Fixtures are recorded vendor responses stored as files under a test
directory, e.g. `tests/fixtures/cloudera/clusters.json`.
*/

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FixtureLoader {
    root: PathBuf,
}

impl FixtureLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Fixtures of the crate under test: `<CARGO_MANIFEST_DIR>/tests/fixtures`
    pub fn for_crate(manifest_dir: &str) -> Self {
        Self::new(Path::new(manifest_dir).join("tests").join("fixtures"))
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path(relative);
        std::fs::read_to_string(&path).with_context(|| format!("cannot read fixture {}", path.display()))
    }

    pub fn json(&self, relative: &str) -> Result<Value> {
        let text = self.read(relative)?;
        serde_json::from_str(&text).with_context(|| format!("fixture {} is not valid JSON", relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fixture_is_an_error() {
        let loader = FixtureLoader::new("/nonexistent");
        let err = loader.json("nope.json").unwrap_err();
        assert!(err.to_string().contains("cannot read fixture"));
    }
}
