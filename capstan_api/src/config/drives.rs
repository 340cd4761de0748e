use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{
        registry::{schema_violation, ConversionRegistry, SectionConverter},
        ConversionError, Section,
    },
    constants::SECTION_DRIVES,
    primitives::bytes::ByteCount,
    BlockDeviceId,
};

/// Per drive configuration. Only the drives that the installer should
/// operate on need to be captured; partitions declared here are created as
/// raw partitions, without a filesystem of their own.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Drive {
    /// The device path of the drive. It is recommended to use stable paths,
    /// such as the ones under `/dev/disk/by-path/`. When absent, the
    /// proposal picks any probed device with enough free space.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,

    /// Partitions to create on the drive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionConfig>,
}

/// Per partition configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartitionConfig {
    /// A unique identifier for the partition. Unique across all drives, and
    /// across all device types, not just partitions.
    pub id: BlockDeviceId,

    /// Size of the partition, as a byte count or human-readable size
    /// (`512M`, `2G`).
    pub size: ByteCount,

    /// The role of the partition.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub partition_type: Option<PartitionRole>,
}

/// Partition roles understood by the proposal.
#[derive(
    Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[strum(serialize_all = "kebab-case")]
pub enum PartitionRole {
    /// EFI System Partition.
    Esp,

    /// Swap partition.
    Swap,

    /// Generic Linux partition.
    #[default]
    LinuxGeneric,
}

pub(crate) struct DrivesConverter;

impl SectionConverter for DrivesConverter {
    fn kind(&self) -> &'static str {
        SECTION_DRIVES
    }

    fn to_wire(
        &self,
        _registry: &ConversionRegistry,
        section: &Section,
    ) -> Result<Value, ConversionError> {
        let Section::Drives(drives) = section else {
            return Err(ConversionError::MismatchedSection {
                kind: self.kind().into(),
            });
        };
        serde_json::to_value(drives).map_err(|e| ConversionError::EncodeSection {
            kind: self.kind().into(),
            detail: e.to_string(),
        })
    }

    fn from_wire(
        &self,
        _registry: &ConversionRegistry,
        value: &Value,
        path: &str,
    ) -> Result<Section, ConversionError> {
        let items = value
            .as_array()
            .ok_or_else(|| schema_violation(path, "expected an array of drives"))?;

        let mut drives = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let drive: Drive = serde_json::from_value(item.clone())
                .map_err(|e| schema_violation(&format!("{path}[{i}]"), e))?;
            drives.push(drive);
        }
        Ok(Section::Drives(drives))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn convert(value: Value) -> Result<Section, ConversionError> {
        let registry = ConversionRegistry::with_builtin_sections();
        registry.from_wire(SECTION_DRIVES, &value)
    }

    #[test]
    fn test_roundtrip() {
        let registry = ConversionRegistry::with_builtin_sections();
        let original = vec![Drive {
            device: Some(PathBuf::from("/dev/disk/by-path/pci-0000:00:1f.2-ata-2.0")),
            partitions: vec![
                PartitionConfig {
                    id: "esp".into(),
                    size: ByteCount(512 << 20),
                    partition_type: Some(PartitionRole::Esp),
                },
                PartitionConfig {
                    id: "swap".into(),
                    size: ByteCount(2 << 30),
                    partition_type: Some(PartitionRole::Swap),
                },
            ],
        }];

        let wire = registry.to_wire(&Section::Drives(original.clone())).unwrap();
        assert_eq!(
            wire,
            json!([{
                "device": "/dev/disk/by-path/pci-0000:00:1f.2-ata-2.0",
                "partitions": [
                    {"id": "esp", "size": "512M", "type": "esp"},
                    {"id": "swap", "size": "2G", "type": "swap"},
                ],
            }])
        );
        assert_eq!(
            registry.from_wire(SECTION_DRIVES, &wire).unwrap(),
            Section::Drives(original)
        );
    }

    #[test]
    fn test_not_an_array_rejected() {
        let err = convert(json!({"device": "/dev/sda"})).unwrap_err();
        let ConversionError::SchemaViolation { path, detail } = err else {
            panic!("expected schema violation, got {err:?}");
        };
        assert_eq!(path, "drives");
        assert!(detail.contains("array"), "{detail}");
    }

    #[test]
    fn test_unknown_field_rejected_with_index() {
        let err = convert(json!([
            {"partitions": []},
            {"partitions": [], "madeUp": true},
        ]))
        .unwrap_err();
        let ConversionError::SchemaViolation { path, detail } = err else {
            panic!("expected schema violation, got {err:?}");
        };
        assert_eq!(path, "drives[1]");
        assert!(detail.contains("madeUp"), "{detail}");
    }

    #[test]
    fn test_missing_partition_size_rejected() {
        let err = convert(json!([{"partitions": [{"id": "esp"}]}])).unwrap_err();
        assert!(matches!(err, ConversionError::SchemaViolation { .. }));
    }
}
