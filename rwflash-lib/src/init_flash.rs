//! FlexSPI NOR initialization through the ROM bootloader.
//!
//! The ROM needs a flash configuration block (FCB) in RAM before it can talk
//! to the external QSPI part. We place a marker word at a scratch address,
//! overwrite it with the FCB blob for the chosen size, then point
//! `configure-memory` at it.

use crate::registry::{DeviceDescriptor, FlashGeometry};
use crate::progress::Phase;
use crate::runner::BlhostCommand;
use crate::{Error, FlashToolTrait, Result, Session};
use std::path::PathBuf;

/// RAM scratch area the FCB is staged in.
pub const SCRATCH_ADDRESS: u32 = 0x2000_F000;
/// Option word telling the ROM a FlexSPI NOR config block follows.
pub const FCB_MARKER: u32 = 0xC010_0002;
/// Memory id of the FlexSPI NOR controller.
pub const FLEXSPI_NOR_MEMORY_ID: u32 = 9;

pub struct FlashInitializer;

impl FlashInitializer {
    /// Named geometry if given, else the device default. Operations go
    /// through [`FlashInitializer::session_geometry`], which also honours a
    /// size pinned on the session.
    pub fn select_geometry<'a>(
        device: &'a DeviceDescriptor,
        requested: Option<&str>,
    ) -> Result<&'a FlashGeometry> {
        match requested {
            Some(name) => device
                .geometry(name)
                .ok_or_else(|| Error::UnknownGeometry {
                    device: device.id.clone(),
                    geometry: name.to_string(),
                }),
            None => {
                let geometry = device.default_geometry()?;
                tracing::info!("Using default flash size: {}", geometry.name);
                Ok(geometry)
            }
        }
    }

    /// Like [`FlashInitializer::select_geometry`], falling back to the
    /// session's geometry before the device default.
    pub fn session_geometry(session: &Session, requested: Option<&str>) -> Result<FlashGeometry> {
        match (requested, &session.geometry) {
            (None, Some(geometry)) => {
                tracing::info!("Using flash size: {}", geometry.name);
                Ok(geometry.clone())
            }
            _ => Self::select_geometry(session.descriptor(), requested).cloned(),
        }
    }

    /// Location of the FCB blob for `geometry`; it must exist on disk.
    pub fn blob_path(session: &Session, geometry: &FlashGeometry) -> Result<PathBuf> {
        let file = session.descriptor().blob_for(geometry)?;
        let path = session.blob_dir.join(file);
        if !path.is_file() {
            return Err(Error::MissingBlob(path));
        }
        Ok(path)
    }

    /// The three init commands, in issue order.
    pub fn sequence(blob: PathBuf) -> [BlhostCommand; 3] {
        [
            BlhostCommand::FillMemory {
                address: SCRATCH_ADDRESS,
                count: 4,
                pattern: FCB_MARKER,
            },
            BlhostCommand::WriteMemory {
                address: SCRATCH_ADDRESS,
                file: blob,
            },
            BlhostCommand::ConfigureMemory {
                memory_id: FLEXSPI_NOR_MEMORY_ID,
                address: SCRATCH_ADDRESS,
            },
        ]
    }

    /// Stages the FCB and configures the controller. Stops at the first
    /// failing step; nothing is retried.
    pub fn initialize<T>(tool: &mut T, requested: Option<&str>) -> Result<FlashGeometry>
    where
        T: FlashToolTrait,
    {
        let (geometry, blob) = {
            let session = tool.session();
            let geometry = Self::session_geometry(session, requested)?;
            let blob = Self::blob_path(session, &geometry)?;
            (geometry, blob)
        };
        tracing::info!("Initializing flash {} with {}", geometry.name, blob.display());

        let spinner = tool
            .progress()
            .create_spinner(Phase::Init, format!("Initializing {} flash...", geometry.name));

        for command in Self::sequence(blob) {
            let step = command.to_string();
            let output = match tool.execute(command, false) {
                Ok(output) => output,
                Err(e) => {
                    spinner.finish_with_message("Aborted");
                    return Err(e);
                }
            };
            if !output.success() {
                spinner.finish_with_message("Flash initialization failed");
                return Err(Error::Initialization {
                    step,
                    detail: output.failure_detail(),
                });
            }
        }

        spinner.finish_with_message("Flash initialized");
        Ok(geometry)
    }
}
