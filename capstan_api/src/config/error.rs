//! Conversion and validation errors for the storage configuration.

use serde::{Deserialize, Serialize};

/// Identifies errors crossing the wire-format boundary, in either direction.
#[derive(thiserror::Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionError {
    /// The document does not match the schema of a registered section. Always
    /// reported to the caller, never silently repaired.
    #[error("Document violates the storage schema at '{path}': {detail}")]
    SchemaViolation { path: String, detail: String },

    /// No converter is registered for the section type. On parse this means
    /// the document named a section nobody claims; on serialize it indicates
    /// a missing converter registration.
    #[error("No converter is registered for section type '{kind}'")]
    UnknownSectionType { kind: String },

    /// A converter was handed a section of a type it does not handle.
    #[error("Converter for section type '{kind}' received a section of a different type")]
    MismatchedSection { kind: String },

    /// A section could not be encoded to its wire representation.
    #[error("Failed to encode section '{kind}' to its wire representation: {detail}")]
    EncodeSection { kind: String, detail: String },
}

/// Identifies errors detected during static validation of the storage
/// configuration, i.e. errors that can be detected without probing any
/// hardware.
#[derive(thiserror::Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageConfigValidationError {
    #[error("Duplicate mount path '{path}', mount paths must be unique")]
    DuplicateMountPath { path: String },

    #[error("Duplicate partition id '{id}', ids must be unique across all drives")]
    DuplicatePartitionId { id: String },

    #[error("Encryption key size {key_size} is invalid, must be a non-zero multiple of 8")]
    InvalidEncryptionKeySize { key_size: u32 },

    #[error("Mount path '{path}' must be absolute")]
    MountPathNotAbsolute { path: String },

    #[error("Partition '{id}' requests size 0")]
    PartitionSizeZero { id: String },

    #[error("Volume at '{path}' requests size 0")]
    VolumeSizeZero { path: String },
}
