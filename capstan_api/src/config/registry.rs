use std::collections::BTreeMap;
use std::fmt::Display;

use serde_json::Value;

use crate::config::{
    drives::DrivesConverter, encryption::EncryptionConverter, volumes::VolumesConverter,
    ConversionError, Section,
};

/// One side of the wire-format boundary for a single section type.
///
/// Converters are stateless: they own no configuration, declare the wire key
/// they handle, and are total over every value a section of their type can
/// hold. Composite converters receive the registry so nested sections
/// dispatch through it rather than being parsed privately.
pub trait SectionConverter: Send + Sync {
    /// Wire-format key this converter handles.
    fn kind(&self) -> &'static str;

    /// Produce the JSON representation of a section.
    fn to_wire(
        &self,
        registry: &ConversionRegistry,
        section: &Section,
    ) -> Result<Value, ConversionError>;

    /// Parse a JSON value back into a typed section. `path` locates the
    /// value inside the enclosing document for error reporting.
    fn from_wire(
        &self,
        registry: &ConversionRegistry,
        value: &Value,
        path: &str,
    ) -> Result<Section, ConversionError>;
}

/// Maps each configuration-section type to its converter.
///
/// Registered once at construction; re-registering a kind replaces the
/// previous converter (last write wins), which tests use to override a
/// built-in converter.
pub struct ConversionRegistry {
    converters: BTreeMap<&'static str, Box<dyn SectionConverter>>,
}

impl ConversionRegistry {
    /// An empty registry, with no section types registered.
    pub fn new() -> Self {
        Self {
            converters: BTreeMap::new(),
        }
    }

    /// A registry with all built-in section converters registered.
    pub fn with_builtin_sections() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(EncryptionConverter));
        registry.register(Box::new(DrivesConverter));
        registry.register(Box::new(VolumesConverter));
        registry
    }

    /// Associates the converter with the section type it declares. A
    /// previously registered converter for the same type is replaced.
    pub fn register(&mut self, converter: Box<dyn SectionConverter>) {
        self.converters.insert(converter.kind(), converter);
    }

    /// Produce the JSON representation of a section, dispatching on the
    /// section's own type tag.
    pub fn to_wire(&self, section: &Section) -> Result<Value, ConversionError> {
        let kind = section.kind();
        let converter = self
            .converters
            .get(kind)
            .ok_or_else(|| ConversionError::UnknownSectionType { kind: kind.into() })?;
        converter.to_wire(self, section)
    }

    /// Parse a JSON value into a typed section of the given type.
    pub fn from_wire(&self, kind: &str, value: &Value) -> Result<Section, ConversionError> {
        self.from_wire_at(kind, value, kind)
    }

    /// Like [`Self::from_wire`], but reporting schema violations at `path`
    /// instead of at the section's own key. Used when parsing nested
    /// sections.
    pub fn from_wire_at(
        &self,
        kind: &str,
        value: &Value,
        path: &str,
    ) -> Result<Section, ConversionError> {
        let converter = self
            .converters
            .get(kind)
            .ok_or_else(|| ConversionError::UnknownSectionType { kind: kind.into() })?;
        converter.from_wire(self, value, path)
    }

    /// Wire keys of all registered section types.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.converters.keys().copied()
    }
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::with_builtin_sections()
    }
}

pub(crate) fn schema_violation(path: &str, detail: impl Display) -> ConversionError {
    ConversionError::SchemaViolation {
        path: path.into(),
        detail: detail.to_string(),
    }
}
