//! A storage engine that runs entirely from a device-listing file: probing
//! returns the listing, planning places requests first-fit by free space,
//! and execution logs each action without touching any hardware. Used for
//! dry runs and for exercising the orchestration without devices.

use std::{fs, path::Path};

use log::info;

use capstan_api::{
    error::{CapstanError, InvalidInputError, ReportError},
    status::{Action, InfeasibleReason},
};

use super::{
    DeviceSnapshot, Placement, PlacementRequest, PlanOutcome, ProbedDisk, StorageEngine,
};

pub struct OfflineEngine {
    snapshot: DeviceSnapshot,
}

impl OfflineEngine {
    pub fn new(snapshot: DeviceSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load the device listing from a YAML or JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CapstanError> {
        info!("Reading device listing from {:?}", path);
        let contents = fs::read_to_string(path).structured(InvalidInputError::LoadDeviceListing {
            path: path.display().to_string(),
        })?;
        let snapshot: DeviceSnapshot =
            serde_yaml::from_str(&contents).structured(InvalidInputError::ParseDeviceListing)?;
        Ok(Self::new(snapshot))
    }
}

impl StorageEngine for OfflineEngine {
    fn probe(&self) -> Result<DeviceSnapshot, anyhow::Error> {
        Ok(self.snapshot.clone())
    }

    fn plan(
        &self,
        snapshot: &DeviceSnapshot,
        requests: &[PlacementRequest],
    ) -> Result<PlanOutcome, anyhow::Error> {
        if snapshot.disks.is_empty() {
            return Ok(PlanOutcome::Rejected(InfeasibleReason::NoDevices));
        }

        // First fit: each request consumes free space on the first disk that
        // still has room, so later requests see the remaining capacity.
        let mut remaining: Vec<(&ProbedDisk, u64)> = snapshot
            .disks
            .iter()
            .map(|disk| (disk, disk.free.bytes()))
            .collect();

        let mut placements = Vec::with_capacity(requests.len());
        for request in requests {
            let needed = request.size.bytes();
            let slot = match &request.device {
                Some(device) => {
                    let Some(slot) = remaining.iter_mut().find(|(disk, _)| &disk.path == device)
                    else {
                        return Ok(PlanOutcome::Rejected(InfeasibleReason::MissingDevice {
                            device: device.display().to_string(),
                        }));
                    };
                    if slot.1 < needed {
                        return Ok(PlanOutcome::Rejected(InfeasibleReason::InsufficientSpace {
                            id: request.id.clone(),
                            needed: request.size,
                            available: slot.1.into(),
                        }));
                    }
                    slot
                }
                None => {
                    let largest = remaining.iter().map(|(_, free)| *free).max().unwrap_or(0);
                    match remaining.iter_mut().find(|(_, free)| *free >= needed) {
                        Some(slot) => slot,
                        None => {
                            return Ok(PlanOutcome::Rejected(
                                InfeasibleReason::InsufficientSpace {
                                    id: request.id.clone(),
                                    needed: request.size,
                                    available: largest.into(),
                                },
                            ));
                        }
                    }
                }
            };

            slot.1 -= needed;
            placements.push(Placement {
                disk: slot.0.path.clone(),
            });
        }

        Ok(PlanOutcome::Placements(placements))
    }

    fn execute(&self, action: &Action) -> Result<(), anyhow::Error> {
        info!("[dry-run] {}", action.description);
        Ok(())
    }
}
