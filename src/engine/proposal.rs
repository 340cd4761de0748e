//! Calculates a storage proposal: the feasibility verdict and ordered
//! action list for one configuration against one device snapshot.

use log::{debug, info};

use capstan_api::{
    config::{Encryption, StorageConfig, Volume},
    error::{CapstanError, InternalError, ReportError, ServicingError},
    status::{Action, ActionKind, ActionState, Proposal},
};

use crate::platform::{
    DeviceSnapshot, Placement, PlacementRequest, PlanOutcome, StorageEngine,
};

pub struct ProposalCalculator<'a> {
    engine: &'a dyn StorageEngine,
}

impl<'a> ProposalCalculator<'a> {
    pub fn new(engine: &'a dyn StorageEngine) -> Self {
        Self { engine }
    }

    /// Calculate the proposal for `config` against `snapshot`.
    ///
    /// Deterministic: the same configuration and snapshot always yield the
    /// same feasibility verdict and the same action ordering, with ties
    /// broken by the order requests derive from the configuration. An
    /// engine rejection produces an infeasible proposal; only the engine
    /// itself breaking produces an error, and in that case no proposal is
    /// produced at all.
    pub fn calculate(
        &self,
        config: &StorageConfig,
        snapshot: &DeviceSnapshot,
    ) -> Result<Proposal, CapstanError> {
        debug!("Calculating storage proposal");

        let default_root = [Volume::default_root()];
        let volumes: &[Volume] = if config.volumes().is_empty() {
            debug!("No volumes configured, proposing a default root volume");
            &default_root
        } else {
            config.volumes()
        };

        // Partition requests from the drives section come first, then one
        // request per volume, in configuration order.
        let mut requests = Vec::new();
        for drive in config.drives() {
            for partition in &drive.partitions {
                requests.push(PlacementRequest {
                    id: partition.id.clone(),
                    size: partition.size,
                    device: drive.device.clone(),
                });
            }
        }
        let partition_request_count = requests.len();
        for (i, volume) in volumes.iter().enumerate() {
            requests.push(PlacementRequest {
                id: format!("{}:{}", i, volume.mount_path.display()),
                size: volume.min_size,
                device: None,
            });
        }

        let outcome = self
            .engine
            .plan(snapshot, &requests)
            .structured(ServicingError::CalculateProposal)?;
        let placements = match outcome {
            PlanOutcome::Rejected(reason) => {
                info!("Storage proposal is infeasible: {reason}");
                return Ok(Proposal::infeasible(reason));
            }
            PlanOutcome::Placements(placements) => placements,
        };
        if placements.len() != requests.len() {
            return Err(CapstanError::new(InternalError::Internal(
                "engine returned a placement count different from the request count",
            )));
        }

        let mut actions = Vec::new();
        let mut placements = placements.iter();

        // Raw partitions from the drives section.
        for drive in config.drives() {
            for partition in &drive.partitions {
                let placement = next_placement(&mut placements)?;
                actions.push(partition_action(
                    format!("create-partition:{}", partition.id),
                    format!(
                        "Create partition '{}' ({}) on '{}'",
                        partition.id,
                        partition.size,
                        placement.disk.display()
                    ),
                ));
            }
        }

        // One partition/encryption/filesystem chain per volume. The
        // encryption layer wraps the partition before the filesystem is
        // created on it, so each action requires its predecessor.
        let global_encryption = config.encryption();
        for (i, volume) in volumes.iter().enumerate() {
            let placement = next_placement(&mut placements)?;
            let mount = volume.mount_path.display();

            let partition_id = format!("create-partition:{i}:{mount}");
            actions.push(partition_action(
                partition_id.clone(),
                format!(
                    "Create partition for '{mount}' ({}) on '{}'",
                    volume.min_size,
                    placement.disk.display()
                ),
            ));

            let encryption = resolve_encryption(volume, global_encryption);
            let filesystem_requires = match encryption {
                Some(_) => {
                    let encryption_id = format!("create-encryption:{i}:{mount}");
                    actions.push(Action {
                        id: encryption_id.clone(),
                        kind: ActionKind::CreateEncryption,
                        description: format!("Set up LUKS2 encryption for '{mount}'"),
                        requires: Some(partition_id),
                        state: ActionState::Pending,
                    });
                    encryption_id
                }
                None => partition_id,
            };

            actions.push(Action {
                id: format!("create-filesystem:{i}:{mount}"),
                kind: ActionKind::CreateFilesystem,
                description: format!("Create {} filesystem for '{mount}'", volume.fs_type),
                requires: Some(filesystem_requires),
                state: ActionState::Pending,
            });
        }

        info!(
            "Storage proposal is feasible with {} actions ({} raw partitions, {} volumes)",
            actions.len(),
            partition_request_count,
            volumes.len()
        );
        Ok(Proposal::feasible(actions))
    }
}

/// A volume is encrypted by its own nested section, or by the model-wide
/// encryption section when it has none.
fn resolve_encryption<'a>(
    volume: &'a Volume,
    global: Option<&'a Encryption>,
) -> Option<&'a Encryption> {
    volume.encryption.as_ref().or(global)
}

fn next_placement<'a>(
    placements: &mut impl Iterator<Item = &'a Placement>,
) -> Result<&'a Placement, CapstanError> {
    placements.next().structured(InternalError::Internal(
        "ran out of placements while building actions",
    ))
}

fn partition_action(id: String, description: String) -> Action {
    Action {
        id,
        kind: ActionKind::CreatePartition,
        description,
        requires: None,
        state: ActionState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use capstan_api::{
        config::{ConversionRegistry, FilesystemType},
        primitives::bytes::ByteCount,
        status::{Feasibility, InfeasibleReason},
    };
    use serde_json::json;

    use crate::platform::{offline::OfflineEngine, ProbedDisk};

    use super::*;

    fn snapshot(free_bytes: u64) -> DeviceSnapshot {
        DeviceSnapshot {
            disks: vec![ProbedDisk {
                path: PathBuf::from("/dev/sda"),
                capacity: ByteCount(free_bytes),
                free: ByteCount(free_bytes),
            }],
        }
    }

    fn parse(document: serde_json::Value) -> StorageConfig {
        StorageConfig::parse(&ConversionRegistry::with_builtin_sections(), &document).unwrap()
    }

    fn calculate(config: &StorageConfig, snapshot: &DeviceSnapshot) -> Proposal {
        let engine = OfflineEngine::new(snapshot.clone());
        ProposalCalculator::new(&engine)
            .calculate(config, snapshot)
            .unwrap()
    }

    #[test]
    fn test_encrypted_root_action_chain() {
        // A document with only an encryption section still proposes a root
        // volume, wrapped in the encryption layer.
        let config = parse(json!({
            "encryption": {"cipher": "aes-xts-plain64", "keySize": 512, "password": "x"},
        }));
        assert_eq!(config.sections().len(), 1);

        let proposal = calculate(&config, &snapshot(100 << 30));
        assert!(proposal.is_feasible());

        let kinds: Vec<_> = proposal.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::CreatePartition,
                ActionKind::CreateEncryption,
                ActionKind::CreateFilesystem,
            ]
        );

        // Every action's prerequisite appears strictly earlier in the list.
        for (i, action) in proposal.actions.iter().enumerate() {
            if let Some(requires) = &action.requires {
                let position = proposal
                    .actions
                    .iter()
                    .position(|a| &a.id == requires)
                    .expect("prerequisite must be in the list");
                assert!(position < i, "{} depends on a later action", action.id);
            }
        }
    }

    #[test]
    fn test_determinism() {
        let config = parse(json!({
            "drives": [{"partitions": [{"id": "esp", "size": "512M", "type": "esp"}]}],
            "encryption": {"password": "x"},
            "volumes": [
                {"mountPath": "/", "minSize": "10G"},
                {"mountPath": "/home", "minSize": "20G", "fsType": "xfs"},
            ],
        }));
        let snapshot = snapshot(100 << 30);

        let first = calculate(&config, &snapshot);
        let second = calculate(&config, &snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn test_per_volume_encryption_overrides_global_absence() {
        let config = parse(json!({
            "volumes": [
                {"mountPath": "/", "minSize": "10G"},
                {"mountPath": "/home", "minSize": "10G", "encryption": {"password": "x"}},
            ],
        }));

        let proposal = calculate(&config, &snapshot(100 << 30));
        let kinds: Vec<_> = proposal.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::CreatePartition,
                ActionKind::CreateFilesystem,
                ActionKind::CreatePartition,
                ActionKind::CreateEncryption,
                ActionKind::CreateFilesystem,
            ]
        );
    }

    #[test]
    fn test_drive_partitions_precede_volumes() {
        let config = parse(json!({
            "drives": [{"partitions": [
                {"id": "esp", "size": "512M", "type": "esp"},
                {"id": "swap", "size": "2G", "type": "swap"},
            ]}],
            "volumes": [{"mountPath": "/", "minSize": "10G"}],
        }));

        let proposal = calculate(&config, &snapshot(100 << 30));
        let ids: Vec<_> = proposal.actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "create-partition:esp",
                "create-partition:swap",
                "create-partition:0:/",
                "create-filesystem:0:/",
            ]
        );
    }

    #[test]
    fn test_infeasible_carries_reason_and_no_actions() {
        let config = parse(json!({
            "volumes": [{"mountPath": "/", "minSize": "50G"}],
        }));

        let proposal = calculate(&config, &snapshot(10 << 30));
        assert_eq!(
            proposal.feasibility,
            Feasibility::Infeasible {
                reason: InfeasibleReason::InsufficientSpace {
                    id: "0:/".into(),
                    needed: ByteCount(50 << 30),
                    available: ByteCount(10 << 30),
                }
            }
        );
        assert!(proposal.actions.is_empty());
    }

    #[test]
    fn test_filesystem_type_in_description() {
        let config = parse(json!({
            "volumes": [{"mountPath": "/", "fsType": "btrfs", "minSize": "10G"}],
        }));
        let proposal = calculate(&config, &snapshot(100 << 30));
        let filesystem = proposal
            .actions
            .iter()
            .find(|a| a.kind == ActionKind::CreateFilesystem)
            .unwrap();
        assert_eq!(filesystem.description, "Create btrfs filesystem for '/'");
        assert_eq!(config.volumes()[0].fs_type, FilesystemType::Btrfs);
    }
}
