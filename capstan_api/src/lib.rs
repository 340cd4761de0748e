pub mod config;
pub mod constants;
pub mod error;
pub mod primitives;
pub mod status;

/// Identifier of a block device request (disk partition, volume) inside a
/// storage configuration. User defined, unique across all device types.
pub type BlockDeviceId = String;

/// Identifier of one planned storage action. Derived deterministically from
/// the configuration so that recalculating a proposal for the same inputs
/// yields the same identifiers.
pub type ActionId = String;
