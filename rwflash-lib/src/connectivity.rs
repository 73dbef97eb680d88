use crate::progress::Phase;
use crate::runner::{BlhostCommand, NO_DEVICE_MARKER};
use crate::{Error, FlashToolTrait, Result};

/// `get-property` tag of the bootloader's current version.
pub const PROPERTY_CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Bootloader version word, when the device reported one.
    pub version: Option<u32>,
    /// False when blhost exited cleanly but printed no JSON.
    pub structured: bool,
}

pub struct ConnectionProbe;

impl ConnectionProbe {
    /// Asks the ROM bootloader for its version.
    pub fn check<T>(tool: &mut T) -> Result<ConnectionStatus>
    where
        T: FlashToolTrait,
    {
        let spinner = tool.progress().create_spinner(Phase::Connect, "Testing device connection...");
        let result = Self::query(tool);
        spinner.finish_with_message(match &result {
            Ok(_) => "Device connection successful",
            Err(_) => "Device connection failed",
        });
        result
    }

    fn query<T>(tool: &mut T) -> Result<ConnectionStatus>
    where
        T: FlashToolTrait,
    {
        let output = tool.execute(
            BlhostCommand::GetProperty {
                tag: PROPERTY_CURRENT_VERSION,
                memory_id: 0,
            },
            true,
        )?;

        if let Some(structured) = &output.structured
            && let Some(status) = &structured.status
        {
            if status.value != 0 {
                return Err(Error::Connection(format!(
                    "device responded with status {}{}",
                    status.value,
                    status
                        .description
                        .as_deref()
                        .map(|d| format!(" ({})", d))
                        .unwrap_or_default()
                )));
            }
            let version = structured.response.first().and_then(|word| {
                u32::try_from(*word)
                    .inspect_err(|_| tracing::warn!("Version word {} exceeds 32 bits", word))
                    .ok()
            });
            if let Some(version) = version {
                tracing::info!("Device version: 0x{:08X}", version);
            }
            return Ok(ConnectionStatus {
                version,
                structured: true,
            });
        }

        if output.success() {
            tracing::info!("Device answered without JSON output");
            return Ok(ConnectionStatus {
                version: None,
                structured: false,
            });
        }

        if output.stderr.contains(NO_DEVICE_MARKER) {
            return Err(Error::DeviceNotFound);
        }
        Err(Error::Connection(output.failure_detail()))
    }
}
