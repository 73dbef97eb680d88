//! Turns a resolved device plus user overrides into the connection arguments
//! blhost expects.

use crate::registry::DeviceDescriptor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use strum::Display;

/// NXP ROM bootloader USB identifiers.
pub const USB_VID: u16 = 0x1FC9;
pub const USB_PID: u16 = 0x0020;

pub const DEFAULT_BAUDRATE: u32 = 2_000_000;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Interface {
    Usb,
    Uart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    Usb { vid: u16, pid: u16 },
    Uart { port: String, baud: u32 },
}

impl ConnectionDescriptor {
    pub fn interface(&self) -> Interface {
        match self {
            Self::Usb { .. } => Interface::Usb,
            Self::Uart { .. } => Interface::Uart,
        }
    }

    /// Connection arguments placed before `--` on the blhost command line.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Usb { vid, pid } => vec!["-u".to_string(), format!("0x{vid:04X},0x{pid:04X}")],
            Self::Uart { port, baud } => vec!["-p".to_string(), format!("{port},{baud}")],
        }
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args().join(" "))
    }
}

/// User supplied connection overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub interface: Option<Interface>,
    pub port: Option<String>,
    pub baud: Option<u32>,
}

/// Picks the interface for `device` and builds its connection descriptor.
///
/// An explicit interface must be supported by the device. Without one the
/// configured default wins, then a lone supported interface; anything else
/// needs the caller to choose.
pub fn resolve_connection(
    device: &DeviceDescriptor,
    request: &ConnectionRequest,
) -> Result<ConnectionDescriptor> {
    let supported =
        || -> Vec<String> { device.interfaces.iter().map(ToString::to_string).collect() };

    let interface = match request.interface {
        Some(interface) => {
            if !device.interfaces.contains(&interface) {
                return Err(Error::UnsupportedInterface {
                    device: device.id.clone(),
                    interface: interface.to_string(),
                    supported: supported(),
                });
            }
            interface
        }
        None => match (device.default_interface, device.interfaces.as_slice()) {
            (Some(interface), _) => {
                tracing::info!("Using default interface: {}", interface);
                interface
            }
            (None, [only]) => {
                tracing::info!("Auto-selected interface: {}", only);
                *only
            }
            (None, _) => {
                return Err(Error::InterfaceRequired {
                    device: device.id.clone(),
                    supported: supported(),
                });
            }
        },
    };

    match interface {
        Interface::Usb => Ok(ConnectionDescriptor::Usb {
            vid: USB_VID,
            pid: USB_PID,
        }),
        Interface::Uart => {
            let port = request
                .port
                .as_deref()
                .map(str::trim)
                .filter(|port| !port.is_empty())
                .ok_or(Error::MissingPort)?;
            Ok(ConnectionDescriptor::Uart {
                port: port.to_string(),
                baud: request.baud.unwrap_or(DEFAULT_BAUDRATE),
            })
        }
    }
}
