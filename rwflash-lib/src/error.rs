use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenient result type for `rwflash-lib`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot load device configuration: {0}")]
    ConfigLoad(String),

    #[error("unsupported device model: {device} (supported: {})", known.join(", "))]
    UnknownDevice { device: String, known: Vec<String> },

    #[error("device {family} has multiple variants ({}), select one explicitly", variants.join(", "))]
    AmbiguousDevice { family: String, variants: Vec<String> },

    #[error("device {device} does not support the {interface} interface (supported: {})", supported.join(", "))]
    UnsupportedInterface {
        device: String,
        interface: String,
        supported: Vec<String>,
    },

    #[error("multiple interfaces available for {device} ({}), specify one", supported.join(", "))]
    InterfaceRequired {
        device: String,
        supported: Vec<String>,
    },

    #[error("UART interface requires a serial port (e.g. COM3 or /dev/ttyUSB0)")]
    MissingPort,

    #[error("no flash size configured for device {0}")]
    NoGeometry(String),

    #[error("flash size {geometry} is not configured for device {device}")]
    UnknownGeometry { device: String, geometry: String },

    #[error("no FCB file configured for flash size {0}")]
    NoBlobConfigured(String),

    #[error("FCB file does not exist: {}", .0.display())]
    MissingBlob(PathBuf),

    #[error("flash initialization failed at `{step}`: {detail}")]
    Initialization { step: String, detail: String },

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("erase failed at 0x{address:08X}: {detail}")]
    EraseChunk { address: u32, detail: String },

    #[error("firmware file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("firmware file is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("firmware write to 0x{address:08X} failed: {detail}")]
    Write { address: u32, detail: String },

    #[error("flash read at 0x{address:08X} failed: {detail}")]
    Read { address: u32, detail: String },

    #[error("no valid hex data found in programmer output")]
    NoDataDecoded,

    #[error("device not found, check the connection and that the chip is in ISP boot mode")]
    DeviceNotFound,

    #[error("device connection failed: {0}")]
    Connection(String),

    #[error("`{command}` did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigLoad(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_size(msg: impl Into<String>) -> Self {
        Self::InvalidSize(msg.into())
    }

    /// Whether the error came from the user backing out of a prompt.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
