//! Configuration file loading.
//!
//! The on-disk format is a flat JSON object of string keys to string
//! values, matching what the synthesis-side dump scripts emit.

use crate::error::ConfigError;
use crate::types::PlacerConfig;
use std::collections::BTreeMap;
use std::path::Path;

/// Loads and validates a placer configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<PlacerConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let map: BTreeMap<String, String> =
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    PlacerConfig::from_map(&map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KEY_ITERATIONS, KEY_JOBS};
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_valid_file() {
        let file = write_config(
            r#"{
                "vivado extracted device information file": "device.zip",
                "special pin offset info file": "offsets.txt",
                "vivado extracted design information file": "design.zip",
                "cellType2fixedAmo file": "fixed.txt",
                "cellType2sharedCellType file": "shared.txt",
                "sharedCellType2BELtype file": "bel.txt",
                "GlobalPlacementIteration": "27",
                "jobs": "8"
            }"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.global_placement_iterations, 27);
        assert_eq!(cfg.jobs, 8);
    }

    #[test]
    fn load_missing_file() {
        let err = load_config(Path::new("/nonexistent/atoll.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn load_malformed_json() {
        let file = write_config("{ not json ");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_incomplete_map() {
        let file = write_config(&format!(
            r#"{{ "{KEY_ITERATIONS}": "10", "{KEY_JOBS}": "2" }}"#
        ));
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(_)));
    }
}
