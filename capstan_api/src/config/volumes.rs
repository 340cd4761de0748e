use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{
        registry::{schema_violation, ConversionRegistry, SectionConverter},
        ConversionError, Encryption, Section,
    },
    constants::{
        DEFAULT_ROOT_VOLUME_SIZE, DEFAULT_VOLUME_SIZE, ROOT_MOUNT_POINT_PATH, SECTION_ENCRYPTION,
        SECTION_VOLUMES,
    },
    primitives::bytes::ByteCount,
};

/// One volume the proposal must produce: a partition carrying a filesystem,
/// optionally wrapped in an encryption layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Where the filesystem will be mounted. Must be absolute.
    pub mount_path: PathBuf,

    /// Filesystem to create on the volume.
    pub fs_type: FilesystemType,

    /// Smallest acceptable size for the volume.
    pub min_size: ByteCount,

    /// Per-volume encryption, overriding a top-level encryption section.
    pub encryption: Option<Encryption>,
}

impl Volume {
    /// The volume proposed when the configuration declares none.
    pub fn default_root() -> Self {
        Self {
            mount_path: PathBuf::from(ROOT_MOUNT_POINT_PATH),
            fs_type: FilesystemType::default(),
            min_size: DEFAULT_ROOT_VOLUME_SIZE,
            encryption: None,
        }
    }
}

/// Filesystem types understood by the proposal.
#[derive(
    Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display,
)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
#[strum(serialize_all = "lowercase")]
pub enum FilesystemType {
    #[default]
    Ext4,
    Xfs,
    Btrfs,
    Vfat,
    Swap,
}

/// Wire shape of one volume. The nested encryption section is carried as a
/// raw value so it dispatches through the conversion registry.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct VolumeWire {
    mount_path: PathBuf,
    #[serde(default)]
    fs_type: FilesystemType,
    #[serde(default = "default_volume_size")]
    min_size: ByteCount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encryption: Option<Value>,
}

fn default_volume_size() -> ByteCount {
    DEFAULT_VOLUME_SIZE
}

pub(crate) struct VolumesConverter;

impl SectionConverter for VolumesConverter {
    fn kind(&self) -> &'static str {
        SECTION_VOLUMES
    }

    fn to_wire(
        &self,
        registry: &ConversionRegistry,
        section: &Section,
    ) -> Result<Value, ConversionError> {
        let Section::Volumes(volumes) = section else {
            return Err(ConversionError::MismatchedSection {
                kind: self.kind().into(),
            });
        };

        let mut items = Vec::with_capacity(volumes.len());
        for volume in volumes {
            let encryption = volume
                .encryption
                .as_ref()
                .map(|e| registry.to_wire(&Section::Encryption(e.clone())))
                .transpose()?;
            let wire = VolumeWire {
                mount_path: volume.mount_path.clone(),
                fs_type: volume.fs_type,
                min_size: volume.min_size,
                encryption,
            };
            items.push(
                serde_json::to_value(wire).map_err(|e| ConversionError::EncodeSection {
                    kind: self.kind().into(),
                    detail: e.to_string(),
                })?,
            );
        }
        Ok(Value::Array(items))
    }

    fn from_wire(
        &self,
        registry: &ConversionRegistry,
        value: &Value,
        path: &str,
    ) -> Result<Section, ConversionError> {
        let items = value
            .as_array()
            .ok_or_else(|| schema_violation(path, "expected an array of volumes"))?;

        let mut volumes = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let wire: VolumeWire = serde_json::from_value(item.clone())
                .map_err(|e| schema_violation(&format!("{path}[{i}]"), e))?;

            let encryption = match wire.encryption {
                Some(nested) => {
                    let nested_path = format!("{path}[{i}].{SECTION_ENCRYPTION}");
                    match registry.from_wire_at(SECTION_ENCRYPTION, &nested, &nested_path)? {
                        Section::Encryption(encryption) => Some(encryption),
                        _ => {
                            return Err(ConversionError::MismatchedSection {
                                kind: SECTION_ENCRYPTION.into(),
                            })
                        }
                    }
                }
                None => None,
            };

            volumes.push(Volume {
                mount_path: wire.mount_path,
                fs_type: wire.fs_type,
                min_size: wire.min_size,
                encryption,
            });
        }
        Ok(Section::Volumes(volumes))
    }
}
