use std::path::Path;

use serde::Deserialize;

use crate::fixtures::engine::{build_fixture, Fixture};
use crate::models::fixtures::{FixtureConfig, FixtureType};

/// The static fixture roster for a venue, one driver per configured fixture.
pub struct FixtureLibrary {
    fixtures: Vec<Box<dyn Fixture>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    List(Vec<FixtureConfig>),
    Wrapped { fixtures: Vec<FixtureConfig> },
}

impl FixtureLibrary {
    pub fn from_configs(configs: Vec<FixtureConfig>) -> Self {
        let mut fixtures: Vec<Box<dyn Fixture>> = Vec::with_capacity(configs.len());
        for config in configs {
            if fixtures.iter().any(|f| f.id() == config.id) {
                log::warn!("[fixtures] duplicate fixture id '{}' ignored", config.id);
                continue;
            }
            fixtures.push(build_fixture(config));
        }
        Self { fixtures }
    }

    /// Load a JSON capability table: either a bare array or `{ "fixtures": [...] }`.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read fixture table {}: {}", path.display(), e))?;
        let file: FixtureFile = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse fixture table {}: {}", path.display(), e))?;
        let configs = match file {
            FixtureFile::List(list) => list,
            FixtureFile::Wrapped { fixtures } => fixtures,
        };
        Ok(Self::from_configs(configs))
    }

    pub fn get(&self, id: &str) -> Option<&dyn Fixture> {
        self.fixtures
            .iter()
            .find(|f| f.id() == id)
            .map(|f| f.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Fixture> {
        self.fixtures.iter().map(|f| f.as_ref())
    }

    pub fn ids(&self) -> Vec<String> {
        self.fixtures.iter().map(|f| f.id().to_string()).collect()
    }

    pub fn by_type(&self, kind: FixtureType) -> Vec<String> {
        self.fixtures
            .iter()
            .filter(|f| f.kind() == kind)
            .map(|f| f.id().to_string())
            .collect()
    }

    pub fn configs(&self) -> Vec<FixtureConfig> {
        self.fixtures.iter().map(|f| f.config().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Every preset and action name across the roster, presets first, without
    /// duplicates. This is the candidate list for preset selection.
    pub fn all_presets(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        };
        for fixture in &self.fixtures {
            for preset in &fixture.config().presets {
                push(&preset.name);
            }
        }
        for fixture in &self.fixtures {
            for action in fixture.capabilities() {
                push(&action);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "fixtures": [
            {"id": "parcan_l", "name": "Par Left", "type": "rgb",
             "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4},
             "presets": [{"name": "red_wash", "channels": [{"address": 1, "value": 255}]}]},
            {"id": "spot_r", "type": "moving_head", "channels": {"pan": 10, "tilt": 11, "dim": 12}},
            {"id": "parcan_l", "type": "rgb"}
        ]
    }"#;

    #[test]
    fn loads_wrapped_table_and_skips_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fixtures.json");
        std::fs::write(&path, TABLE).expect("write");

        let library = FixtureLibrary::load(&path).expect("load");
        assert_eq!(library.len(), 2);
        assert_eq!(library.by_type(FixtureType::MovingHead), vec!["spot_r".to_string()]);
        assert!(library.get("parcan_l").is_some());
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn all_presets_lists_presets_before_actions() {
        let file: FixtureFile = serde_json::from_str(TABLE).expect("parse");
        let FixtureFile::Wrapped { fixtures } = file else {
            panic!("expected wrapped table");
        };
        let library = FixtureLibrary::from_configs(fixtures);
        let presets = library.all_presets();
        assert_eq!(presets[0], "red_wash");
        assert!(presets.contains(&"flash".to_string()));
        assert!(presets.contains(&"sweep".to_string()));
        assert_eq!(presets.iter().filter(|p| *p == "flash").count(), 1);
    }
}
