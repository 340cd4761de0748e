use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::{
    config::{ConversionError, StorageConfigValidationError},
    ActionId,
};

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to load storage configuration file from '{path}'")]
    LoadStorageConfig { path: String },
    #[error("Failed to parse storage configuration document")]
    ParseStorageConfig,
    #[error("Failed to load device listing from '{path}'")]
    LoadDeviceListing { path: String },
    #[error("Failed to parse device listing")]
    ParseDeviceListing,
    #[error("Failed to convert storage configuration: {0}")]
    ConvertStorageConfig(#[from] ConversionError),
    #[error("Invalid storage configuration: {0}")]
    InvalidStorageConfig(#[from] StorageConfigValidationError),
}

/// Some step while probing, proposing or installing failed. User
/// investigation is required to determine whether this is an issue with the
/// storage engine, the configuration, or the hardware.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ServicingError {
    #[error("Failed to probe storage devices")]
    ProbeDevices,
    #[error("Failed to calculate storage proposal")]
    CalculateProposal,
    #[error("No device snapshot is available, a probe must run first")]
    NoDeviceSnapshot,
    #[error("No feasible storage proposal is available")]
    NoFeasibleProposal,
    #[error("Failed to execute storage action '{action_id}'")]
    ExecuteAction { action_id: ActionId },
    #[error("Failed to write status file to '{path}'")]
    WriteStatus { path: String },
}

/// An uncategorized error occurred or a contract was violated. This indicates
/// a bug in the agent or in a caller, not bad user input.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Failed to serialize storage configuration: {0}")]
    SerializeStorageConfig(ConversionError),
    #[error("Invalid transition for action '{action_id}': {from} -> {to}")]
    InvalidTransition {
        action_id: ActionId,
        from: String,
        to: String,
    },
    #[error("Unknown action '{action_id}'")]
    UnknownAction { action_id: ActionId },
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories are intended to be user-meaningful and to be used for
/// routing issues to the proper team.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Capstan failed because it was provided invalid user input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// Capstan was unable to probe, propose or install on the current system.
    #[error(transparent)]
    Servicing(#[from] ServicingError),

    /// An uncategorized error occurred or a bug was encountered. This
    /// indicates a problem with Capstan.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct CapstanErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct CapstanError(Box<CapstanErrorInner>);
impl CapstanError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        CapstanError(Box::new(CapstanErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured CapstanError.
    fn structured(self, kind: K) -> Result<T, CapstanError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, CapstanError> {
        match self {
            Some(t) => Ok(t),
            None => Err(CapstanError(Box::new(CapstanErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, CapstanError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(CapstanError(Box::new(CapstanErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait CapstanResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, CapstanError>;
}
impl<T> CapstanResultExt<T> for Result<T, CapstanError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, CapstanError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for CapstanError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("capstan-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Servicing(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for CapstanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}
