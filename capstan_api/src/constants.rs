use crate::primitives::bytes::ByteCount;

/// Path of the root mount point.
pub const ROOT_MOUNT_POINT_PATH: &str = "/";

/// Size given to the default root volume when the configuration does not
/// declare any volumes.
pub const DEFAULT_ROOT_VOLUME_SIZE: ByteCount = ByteCount(1 << 30);

/// Size given to a volume that does not declare one.
pub const DEFAULT_VOLUME_SIZE: ByteCount = ByteCount(512 << 20);

/// Wire keys of the built-in configuration sections.
pub const SECTION_ENCRYPTION: &str = "encryption";
pub const SECTION_DRIVES: &str = "drives";
pub const SECTION_VOLUMES: &str = "volumes";
