pub mod choice;
pub mod connection;
pub mod connectivity;
pub mod erase_flash;
pub mod error;
pub mod init_flash;
pub mod layout;
pub mod progress;
pub mod read_flash;
pub mod registry;
pub mod runner;
pub mod utils;
pub mod write_flash;

pub use crate::choice::{Choice, ChoiceProvider, DefaultChoices};
pub use crate::connection::{ConnectionDescriptor, ConnectionRequest, Interface};
pub use crate::connectivity::ConnectionStatus;
pub use crate::erase_flash::{EraseOutcome, EraseParams};
pub use crate::error::{Error, Result};
pub use crate::read_flash::{ReadOutcome, ReadParams};
pub use crate::registry::{DeviceDescriptor, DeviceRegistry, FlashGeometry, ResolvedDevice};
pub use crate::runner::{BlhostCommand, BlhostRunner, CommandOutput, CommandRequest, CommandRunner};
pub use crate::write_flash::{WriteOutcome, WriteParams};

use crate::progress::{ProgressCallbackArc, ProgressHelper};
use std::path::{Path, PathBuf};

pub const DEFAULT_BLOB_DIR: &str = "fcb";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Everything fixed for one invocation: which part, which flash size, how to
/// reach it, and where its files live. Built once by [`Session::resolve`] and
/// never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub device: ResolvedDevice,
    /// Geometry used when an operation does not name one. Starts as the
    /// device default; `None` for parts without flash sizes.
    pub geometry: Option<FlashGeometry>,
    pub connection: ConnectionDescriptor,
    pub debug: bool,
    pub blob_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Session {
    /// Looks up `identifier` and resolves its connection. Nothing is built
    /// unless both steps succeed.
    pub fn resolve(
        registry: &DeviceRegistry,
        identifier: &str,
        request: &ConnectionRequest,
        chooser: Option<&mut dyn ChoiceProvider>,
    ) -> Result<Self> {
        let device = registry.resolve(identifier, chooser)?;
        let connection = connection::resolve_connection(&device.device, request)?;

        tracing::info!(
            "Device: {} / {} via {} ({})",
            device.family,
            device.device.id,
            connection.interface(),
            connection
        );

        let geometry = device.device.default_geometry().ok().cloned();

        Ok(Self {
            device,
            geometry,
            connection,
            debug: false,
            blob_dir: PathBuf::from(DEFAULT_BLOB_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        })
    }

    /// Pins the flash size by name instead of the device default.
    pub fn with_geometry(mut self, name: &str) -> Result<Self> {
        let geometry = self
            .descriptor()
            .geometry(name)
            .cloned()
            .ok_or_else(|| Error::UnknownGeometry {
                device: self.descriptor().id.clone(),
                geometry: name.to_string(),
            })?;
        self.geometry = Some(geometry);
        Ok(self)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_blob_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.blob_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// The concrete part being programmed.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.device.device
    }
}

/// Seam shared by the flash operations, so they can be driven by any
/// session/runner pairing.
pub trait FlashToolTrait {
    fn session(&self) -> &Session;

    fn progress(&self) -> &ProgressHelper;

    /// Runs one blhost subcommand against the session's connection.
    fn execute(&mut self, command: BlhostCommand, json: bool) -> Result<CommandOutput>;
}

/// A resolved session bound to a programmer runner.
pub struct FlashTool<R: CommandRunner> {
    session: Session,
    runner: R,
    progress: ProgressHelper,
}

impl<R: CommandRunner> FlashTool<R> {
    pub fn new(session: Session, runner: R) -> Self {
        Self {
            session,
            runner,
            progress: ProgressHelper::default(),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallbackArc) -> Self {
        self.progress = ProgressHelper::new(callback);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    pub fn test_connection(&mut self) -> Result<ConnectionStatus> {
        connectivity::ConnectionProbe::check(self)
    }

    pub fn initialize_flash(&mut self, geometry: Option<&str>) -> Result<FlashGeometry> {
        init_flash::FlashInitializer::initialize(self, geometry)
    }

    pub fn erase_flash(
        &mut self,
        params: &EraseParams,
        chooser: &mut dyn ChoiceProvider,
    ) -> Result<EraseOutcome> {
        erase_flash::FlashEraser::erase(self, params, chooser)
    }

    pub fn write_flash(&mut self, params: &WriteParams) -> Result<WriteOutcome> {
        write_flash::FlashWriter::write(self, params)
    }

    pub fn read_flash(&mut self, params: &ReadParams) -> Result<ReadOutcome> {
        read_flash::FlashReader::read(self, params)
    }
}

impl<R: CommandRunner> FlashToolTrait for FlashTool<R> {
    fn session(&self) -> &Session {
        &self.session
    }

    fn progress(&self) -> &ProgressHelper {
        &self.progress
    }

    fn execute(&mut self, command: BlhostCommand, json: bool) -> Result<CommandOutput> {
        let request = CommandRequest {
            connection: self.session.connection.clone(),
            command,
            json,
        };
        let output = self.runner.run(&request)?;
        if self.session.debug {
            tracing::debug!(
                "`{}` -> {} (stdout {} bytes, stderr {} bytes)",
                request.command,
                output.returncode,
                output.stdout.len(),
                output.stderr.len()
            );
        }
        Ok(output)
    }
}
