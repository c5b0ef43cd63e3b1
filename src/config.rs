use crate::types::{DeviceClass, TrackingUniverse};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the config file read by [`TrackerConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "VRTRACK_CONFIG";

/// Static device naming and tracking options.
///
/// ```json
/// {
///   "universe": "standing",
///   "devices": [
///     {"serial": "LHR-F1A2B3C4", "name": "left_foot", "type": "Tracker"},
///     {"serial": "LHB-7D8E9F00", "name": "base_a", "type": "Tracking Reference"}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub universe: TrackingUniverse,
    pub devices: Vec<DeviceAssignment>,
}

/// Fixed name and class for the device with a given serial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub serial: String,
    pub name: String,
    #[serde(rename = "type")]
    pub class: DeviceClass,
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::info!(
            "Loaded {} device assignment(s) from {}",
            config.devices.len(),
            path.display()
        );
        Ok(config)
    }

    /// Load the file named by `VRTRACK_CONFIG`. `Ok(None)` when the variable
    /// is unset or blank.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()).map(Some),
            _ => Ok(None),
        }
    }

    pub fn assignment_for_serial(&self, serial: &str) -> Option<&DeviceAssignment> {
        self.devices.iter().find(|d| d.serial == serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackerError;

    const SAMPLE: &str = r#"{
        "devices": [
            {"serial": "LHR-1", "name": "left_foot", "type": "Tracker"},
            {"serial": "LHB-1", "name": "base_a", "type": "Tracking Reference"}
        ]
    }"#;

    #[test]
    fn test_parse_config() {
        let config = TrackerConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.universe, TrackingUniverse::Standing);
        assert_eq!(config.devices.len(), 2);
        let base = config.assignment_for_serial("LHB-1").unwrap();
        assert_eq!(base.name, "base_a");
        assert_eq!(base.class, DeviceClass::TrackingReference);
        assert!(config.assignment_for_serial("nope").is_none());
    }

    #[test]
    fn test_parse_universe() {
        let config =
            TrackerConfig::from_json_str(r#"{"universe": "seated", "devices": []}"#).unwrap();
        assert_eq!(config.universe, TrackingUniverse::Seated);
    }

    #[test]
    fn test_malformed_config() {
        let bad_type = r#"{"devices": [{"serial": "X", "name": "x", "type": "Lighthouse"}]}"#;
        assert!(matches!(
            TrackerConfig::from_json_str(bad_type),
            Err(TrackerError::ConfigParse(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json_str("{}"),
            Err(TrackerError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("vrtrack-config-{}.json", std::process::id()));
        std::fs::write(&path, SAMPLE).unwrap();
        let config = TrackerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.devices[0].name, "left_foot");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TrackerConfig::load("/nonexistent/vrtrack/config.json"),
            Err(TrackerError::ConfigRead(_))
        ));
    }

    #[test]
    fn test_from_env() {
        std::env::remove_var(CONFIG_ENV_VAR);
        assert!(TrackerConfig::from_env().unwrap().is_none());
        std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/vrtrack/config.json");
        let result = TrackerConfig::from_env();
        std::env::remove_var(CONFIG_ENV_VAR);
        assert!(matches!(result, Err(TrackerError::ConfigRead(_))));
    }
}
