//! Snapshot manifest types.
//!
//! A manifest records everything needed to re-create one container: its
//! runtime configuration, port bindings and mount list. Configuration and
//! port bindings are carried as opaque JSON documents and round-trip
//! verbatim; only the image reference is ever read out of them.

pub mod builder;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::utils::Result;

/// File name of the manifest entry inside archives.
pub const ARCHIVE_MANIFEST_NAME: &str = "container.json";

/// Backup manifest, serialized as `<name>.backup.json` or as the
/// `container.json` entry of an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    /// Container name at snapshot time. Absent in older snapshots.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub config: Value,

    #[serde(default)]
    pub port_map: Value,

    #[serde(default, deserialize_with = "null_as_default")]
    pub mounts: Vec<MountPoint>,
}

/// A host path bound into the container.
///
/// `destination` identifies the mount across container re-creation;
/// `source` is assigned by the runtime and differs between hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountPoint {
    #[serde(rename = "Type", default)]
    pub kind: String,

    #[serde(rename = "Source", default)]
    pub source: String,

    #[serde(rename = "Destination", default)]
    pub destination: String,

    /// Remaining runtime fields (Name, Driver, Mode, RW, Propagation)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MountPoint {
    pub fn new(kind: &str, source: &str, destination: &str) -> Self {
        Self {
            kind: kind.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            extra: Map::new(),
        }
    }
}

impl Manifest {
    /// Image reference stored in the configuration, empty if missing.
    pub fn image(&self) -> &str {
        self.config
            .get("Image")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load a loose-mode `.backup.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| crate::BackupError::fs(path, e))?;
        Self::from_json(&bytes)
    }
}

/// Older snapshots serialize an empty mount list as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_manifest() -> Manifest {
        let mut volume = MountPoint::new("volume", "/var/lib/docker/volumes/abc/_data", "/data");
        volume.extra.insert("Name".to_string(), json!("abc"));
        volume.extra.insert("Driver".to_string(), json!("local"));
        volume.extra.insert("RW".to_string(), json!(true));

        Manifest {
            name: "/web".to_string(),
            config: json!({
                "Hostname": "4f2a9c",
                "Image": "nginx:1.25",
                "Env": ["PATH=/usr/bin", "MODE=prod"],
                "Cmd": ["nginx", "-g", "daemon off;"],
                "Labels": {"team": "web"}
            }),
            port_map: json!({"80/tcp": [{"HostIp": "", "HostPort": "8080"}]}),
            mounts: vec![volume, MountPoint::new("bind", "/srv/conf", "/etc/nginx/conf.d")],
        }
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let manifest = sample_manifest();
        let bytes = manifest.to_json_pretty()?;
        assert_eq!(Manifest::from_json(&bytes)?, manifest);
        Ok(())
    }

    #[test]
    fn test_round_trip_without_mounts() -> Result<()> {
        let manifest = Manifest {
            name: String::new(),
            config: json!({"Image": "alpine"}),
            port_map: json!({}),
            mounts: Vec::new(),
        };
        let bytes = manifest.to_json_pretty()?;
        assert_eq!(Manifest::from_json(&bytes)?, manifest);
        Ok(())
    }

    #[test]
    fn test_wire_field_names() -> Result<()> {
        let value = serde_json::to_value(sample_manifest())?;
        assert!(value.get("Name").is_some());
        assert!(value.get("Config").is_some());
        assert!(value.get("PortMap").is_some());
        let mount = &value["Mounts"][0];
        assert_eq!(mount["Type"], "volume");
        assert_eq!(mount["Destination"], "/data");
        assert_eq!(mount["Driver"], "local");
        Ok(())
    }

    #[test]
    fn test_legacy_manifest_without_name() -> Result<()> {
        let legacy = br#"{
            "Config": {"Image": "redis"},
            "PortMap": null,
            "Mounts": null
        }"#;
        let manifest = Manifest::from_json(legacy)?;
        assert_eq!(manifest.name, "");
        assert_eq!(manifest.image(), "redis");
        assert!(manifest.port_map.is_null());
        assert!(manifest.mounts.is_empty());
        Ok(())
    }

    #[test]
    fn test_malformed_manifest_is_serialization_error() {
        let err = Manifest::from_json(b"{\"Mounts\": 3}").unwrap_err();
        assert!(matches!(err, crate::BackupError::Serialization(_)));
    }
}
