use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::{
        registry::{schema_violation, ConversionRegistry, SectionConverter},
        ConversionError, Section, StorageConfigValidationError,
    },
    constants::SECTION_ENCRYPTION,
};

/// Configure LUKS2 encryption of the volumes created by the proposal.
///
/// Declared at the top level it applies to every volume; declared inside a
/// volume it applies to that volume only and overrides the top-level
/// section.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Encryption {
    /// The passphrase used to unlock the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Key size in bits. Must be a non-zero multiple of 8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,

    /// Cipher specification, e.g. `aes-xts-plain64`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,

    /// LUKS2 label stored in the header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Password-based key derivation function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbkd_function: Option<PbkdFunction>,
}

impl Encryption {
    /// Validate the encryption configuration.
    pub fn validate(&self) -> Result<(), StorageConfigValidationError> {
        if let Some(key_size) = self.key_size {
            if key_size == 0 || key_size % 8 != 0 {
                return Err(StorageConfigValidationError::InvalidEncryptionKeySize {
                    key_size,
                });
            }
        }
        Ok(())
    }
}

/// Password-based key derivation function of a LUKS2 volume, serialized as
/// its lowercase tag.
#[derive(
    Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display,
)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
#[strum(serialize_all = "lowercase")]
pub enum PbkdFunction {
    Pbkdf2,
    Argon2i,
    Argon2id,
}

pub(crate) struct EncryptionConverter;

impl SectionConverter for EncryptionConverter {
    fn kind(&self) -> &'static str {
        SECTION_ENCRYPTION
    }

    fn to_wire(
        &self,
        _registry: &ConversionRegistry,
        section: &Section,
    ) -> Result<Value, ConversionError> {
        let Section::Encryption(encryption) = section else {
            return Err(ConversionError::MismatchedSection {
                kind: self.kind().into(),
            });
        };
        serde_json::to_value(encryption).map_err(|e| ConversionError::EncodeSection {
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
        let encryption: Encryption =
            serde_json::from_value(value.clone()).map_err(|e| schema_violation(path, e))?;
        Ok(Section::Encryption(encryption))
    }
}
