//! Typed in-memory model of one desired storage configuration and its
//! wire-format (JSON) boundary.
//!
//! The model is a tree: the root holds one entry per configuration section,
//! and composite sections hold further nested sections. Every section type
//! crossing the wire boundary does so through the conversion registry, in
//! both directions.

use serde_json::Value;

pub(crate) mod drives;
pub(crate) mod encryption;
pub(crate) mod error;
pub(crate) mod registry;
pub(crate) mod volumes;

pub use drives::{Drive, PartitionConfig, PartitionRole};
pub use encryption::{Encryption, PbkdFunction};
pub use error::{ConversionError, StorageConfigValidationError};
pub use registry::{ConversionRegistry, SectionConverter};
pub use volumes::{FilesystemType, Volume};

use registry::schema_violation;

/// One typed configuration section. Each variant corresponds to a wire key
/// claimed by a registered converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Encryption(Encryption),
    Drives(Vec<Drive>),
    Volumes(Vec<Volume>),
}

impl Section {
    /// Wire-format key of this section's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Section::Encryption(_) => crate::constants::SECTION_ENCRYPTION,
            Section::Drives(_) => crate::constants::SECTION_DRIVES,
            Section::Volumes(_) => crate::constants::SECTION_VOLUMES,
        }
    }
}

/// The desired storage layout of the host: an ordered collection of typed
/// sections. Immutable once handed to a proposal calculation; replacing the
/// configuration requires parsing a new document or building a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    sections: Vec<Section>,
}

impl StorageConfig {
    /// Build a configuration directly from sections, bypassing the wire
    /// boundary. Used by defaults and tests.
    pub fn from_sections(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Parse a wire-format document into a typed configuration.
    ///
    /// Every top-level key dispatches through the registry; nested sections
    /// dispatch recursively. Fails on the first offending path without
    /// constructing a partial model.
    pub fn parse(registry: &ConversionRegistry, document: &Value) -> Result<Self, ConversionError> {
        let map = document
            .as_object()
            .ok_or_else(|| schema_violation("$", "expected an object at the document root"))?;

        let mut sections = Vec::with_capacity(map.len());
        for (key, value) in map {
            sections.push(registry.from_wire(key, value)?);
        }
        Ok(Self { sections })
    }

    /// Produce the wire-format document for this configuration. The inverse
    /// of [`Self::parse`]; it only fails if a section's converter is no
    /// longer registered, which indicates an internal invariant violation
    /// rather than a user error.
    pub fn serialize(&self, registry: &ConversionRegistry) -> Result<Value, ConversionError> {
        let mut map = serde_json::Map::new();
        for section in &self.sections {
            map.insert(section.kind().to_owned(), registry.to_wire(section)?);
        }
        Ok(Value::Object(map))
    }

    /// Validate the configuration beyond its schema.
    pub fn validate(&self) -> Result<(), StorageConfigValidationError> {
        if let Some(encryption) = self.encryption() {
            encryption.validate()?;
        }

        let mut partition_ids = Vec::new();
        for drive in self.drives() {
            for partition in &drive.partitions {
                if partition.size.bytes() == 0 {
                    return Err(StorageConfigValidationError::PartitionSizeZero {
                        id: partition.id.clone(),
                    });
                }
                if partition_ids.contains(&&partition.id) {
                    return Err(StorageConfigValidationError::DuplicatePartitionId {
                        id: partition.id.clone(),
                    });
                }
                partition_ids.push(&partition.id);
            }
        }

        let mut mount_paths = Vec::new();
        for volume in self.volumes() {
            if !volume.mount_path.is_absolute() {
                return Err(StorageConfigValidationError::MountPathNotAbsolute {
                    path: volume.mount_path.to_string_lossy().to_string(),
                });
            }
            if volume.min_size.bytes() == 0 {
                return Err(StorageConfigValidationError::VolumeSizeZero {
                    path: volume.mount_path.to_string_lossy().to_string(),
                });
            }
            if mount_paths.contains(&&volume.mount_path) {
                return Err(StorageConfigValidationError::DuplicateMountPath {
                    path: volume.mount_path.to_string_lossy().to_string(),
                });
            }
            mount_paths.push(&volume.mount_path);

            if let Some(encryption) = &volume.encryption {
                encryption.validate()?;
            }
        }

        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The top-level encryption section, if any.
    pub fn encryption(&self) -> Option<&Encryption> {
        self.sections.iter().find_map(|s| match s {
            Section::Encryption(e) => Some(e),
            _ => None,
        })
    }

    pub fn drives(&self) -> &[Drive] {
        self.sections
            .iter()
            .find_map(|s| match s {
                Section::Drives(d) => Some(d.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn volumes(&self) -> &[Volume] {
        self.sections
            .iter()
            .find_map(|s| match s {
                Section::Volumes(v) => Some(v.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::primitives::bytes::ByteCount;

    fn registry() -> ConversionRegistry {
        ConversionRegistry::with_builtin_sections()
    }

    #[test]
    fn test_parse_full_document() {
        let document = json!({
            "drives": [{"device": "/dev/sda", "partitions": [{"id": "esp", "size": "512M", "type": "esp"}]}],
            "encryption": {"password": "x", "cipher": "aes-xts-plain64"},
            "volumes": [{"mountPath": "/", "fsType": "ext4", "minSize": "10G"}],
        });

        let config = StorageConfig::parse(&registry(), &document).unwrap();
        config.validate().unwrap();

        assert_eq!(config.sections().len(), 3);
        assert_eq!(
            config.encryption().unwrap().cipher.as_deref(),
            Some("aes-xts-plain64")
        );
        assert_eq!(config.drives().len(), 1);
        assert_eq!(config.volumes().len(), 1);
        assert_eq!(config.volumes()[0].min_size, ByteCount(10 << 30));
    }

    #[test]
    fn test_parse_document_from_text() {
        let document: serde_json::Value = serde_json::from_str(indoc::indoc! {r#"
            {
                "encryption": {"password": "x", "pbkdFunction": "argon2id"},
                "volumes": [{"mountPath": "/", "minSize": "10G"}]
            }
        "#})
        .unwrap();

        let config = StorageConfig::parse(&registry(), &document).unwrap();
        assert_eq!(
            config.encryption().unwrap().pbkd_function,
            Some(crate::config::PbkdFunction::Argon2id)
        );
    }

    #[test]
    fn test_parse_serialize_roundtrip() {
        let document = json!({
            "encryption": {"password": "x", "keySize": 512},
            "volumes": [
                {"mountPath": "/", "fsType": "btrfs", "minSize": "20G"},
                {
                    "mountPath": "/home",
                    "fsType": "ext4",
                    "minSize": "1G",
                    "encryption": {"label": "cr_home"},
                },
            ],
        });

        let config = StorageConfig::parse(&registry(), &document).unwrap();
        let serialized = config.serialize(&registry()).unwrap();
        let reparsed = StorageConfig::parse(&registry(), &serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_parse_rejects_unknown_section() {
        let document = json!({"volumes": [], "frobnicate": {}});
        assert_eq!(
            StorageConfig::parse(&registry(), &document).unwrap_err(),
            ConversionError::UnknownSectionType {
                kind: "frobnicate".into()
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_object_document() {
        let err = StorageConfig::parse(&registry(), &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ConversionError::SchemaViolation { .. }));
    }

    #[test]
    fn test_parse_never_constructs_partial_model() {
        // The volumes section is valid but the encryption section is not;
        // the whole parse must fail.
        let document = json!({
            "encryption": {"password": 42},
            "volumes": [{"mountPath": "/"}],
        });
        assert!(StorageConfig::parse(&registry(), &document).is_err());
    }

    #[test]
    fn test_serialize_unregistered_section_fails() {
        let config = StorageConfig::from_sections(vec![Section::Encryption(Encryption::default())]);
        assert_eq!(
            config.serialize(&ConversionRegistry::new()).unwrap_err(),
            ConversionError::UnknownSectionType {
                kind: "encryption".into()
            }
        );
    }

    #[test]
    fn test_validate_duplicate_mount_path() {
        let config = StorageConfig::from_sections(vec![Section::Volumes(vec![
            Volume {
                mount_path: PathBuf::from("/"),
                fs_type: FilesystemType::Ext4,
                min_size: ByteCount(1 << 30),
                encryption: None,
            },
            Volume {
                mount_path: PathBuf::from("/"),
                fs_type: FilesystemType::Xfs,
                min_size: ByteCount(1 << 30),
                encryption: None,
            },
        ])]);
        assert_eq!(
            config.validate().unwrap_err(),
            StorageConfigValidationError::DuplicateMountPath { path: "/".into() }
        );
    }

    #[test]
    fn test_validate_relative_mount_path() {
        let config = StorageConfig::from_sections(vec![Section::Volumes(vec![Volume {
            mount_path: PathBuf::from("home"),
            fs_type: FilesystemType::Ext4,
            min_size: ByteCount(1 << 30),
            encryption: None,
        }])]);
        assert_eq!(
            config.validate().unwrap_err(),
            StorageConfigValidationError::MountPathNotAbsolute {
                path: "home".into()
            }
        );
    }

    #[test]
    fn test_validate_duplicate_partition_id() {
        let config = StorageConfig::from_sections(vec![Section::Drives(vec![
            Drive {
                device: Some(PathBuf::from("/dev/sda")),
                partitions: vec![PartitionConfig {
                    id: "esp".into(),
                    size: ByteCount(512 << 20),
                    partition_type: Some(PartitionRole::Esp),
                }],
            },
            Drive {
                device: Some(PathBuf::from("/dev/sdb")),
                partitions: vec![PartitionConfig {
                    id: "esp".into(),
                    size: ByteCount(512 << 20),
                    partition_type: Some(PartitionRole::Esp),
                }],
            },
        ])]);
        assert_eq!(
            config.validate().unwrap_err(),
            StorageConfigValidationError::DuplicatePartitionId { id: "esp".into() }
        );
    }

    #[test]
    fn test_validate_nested_encryption_key_size() {
        let config = StorageConfig::from_sections(vec![Section::Volumes(vec![Volume {
            mount_path: PathBuf::from("/"),
            fs_type: FilesystemType::Ext4,
            min_size: ByteCount(1 << 30),
            encryption: Some(Encryption {
                key_size: Some(7),
                ..Default::default()
            }),
        }])]);
        assert_eq!(
            config.validate().unwrap_err(),
            StorageConfigValidationError::InvalidEncryptionKeySize { key_size: 7 }
        );
    }
}
