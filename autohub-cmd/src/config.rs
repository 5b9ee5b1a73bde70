use std::collections::HashMap;

use serde::Deserialize;
use tokio::fs;

use autohub_core::config::ConfigValues;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to read file: {0}")]
    ReadFileError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseJsonError(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct Configuration {
    pub project: Project,
}

impl Configuration {
    pub async fn new(path: String) -> Result<Self, ConfigurationError> {
        let bytes = fs::read(path.as_str()).await?;
        let project = parse_project(bytes)?;
        Ok(Self { project })
    }
}

fn parse_project(mut bytes: Vec<u8>) -> Result<Project, ConfigurationError> {
    // strip UTF-8 BOM (EF BB BF)
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
    while matches!(bytes.first(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
        bytes.drain(..1);
    }
    Ok(serde_json::from_slice::<Project>(&bytes)?)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub plugin_id: String,
    pub display_name: String,
    pub version: String,
    #[serde(default)]
    pub prefs: ConfigValues,
    #[serde(default)]
    pub devices: HashMap<String, DeviceEntry>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub name: String,
    pub device_type_id: String,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub config: ConfigValues,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_project_with_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF, b'\n'];
        bytes.extend_from_slice(
            br#"{
                "pluginId": "com.example.autohub",
                "displayName": "Autohub",
                "version": "0.1.0",
                "prefs": {"showDebugInfo": "true", "updateFrequency": 30},
                "devices": {
                    "lamp-1": {
                        "name": "Desk Lamp",
                        "deviceTypeId": "dimmer",
                        "on": true,
                        "config": {"address": "192.168.1.20"}
                    }
                }
            }"#,
        );
        let project = parse_project(bytes).unwrap();
        assert_eq!(project.plugin_id, "com.example.autohub");
        assert_eq!(project.devices.len(), 1);
        let lamp = &project.devices["lamp-1"];
        assert_eq!(lamp.name, "Desk Lamp");
        assert!(lamp.on);
    }
}
