use crate::init_flash::FlashInitializer;
use crate::layout::{self, DEFAULT_READ_SIZE};
use crate::progress::Phase;
use crate::runner::BlhostCommand;
use crate::{Error, FlashToolTrait, Result, Session};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadParams {
    /// Start address; the non-secure probe address when absent.
    pub address: Option<u32>,
    /// Byte count; [`DEFAULT_READ_SIZE`] when absent.
    pub size: Option<u32>,
    /// Destination file; auto-named under the output directory when absent.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub address: u32,
    pub requested: u32,
    pub path: PathBuf,
    /// Bytes actually recovered from the dump.
    pub bytes: usize,
}

/// Recovers bytes from blhost's `read-memory` hex dump.
///
/// Parsing stops at the first empty line or at the `{` that opens a JSON
/// trailer. Lines made of anything other than hex digits and spaces are
/// skipped, and inside a data line only two-digit tokens count.
pub fn decode_hex_dump(text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    for line in text.trim().lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('{') {
            break;
        }
        if !line.chars().all(|c| c.is_ascii_hexdigit() || c == ' ') {
            continue;
        }
        data.extend(
            line.split_whitespace()
                .filter(|token| token.len() == 2)
                .filter_map(|token| u8::from_str_radix(token, 16).ok()),
        );
    }
    data
}

pub struct FlashReader;

impl FlashReader {
    /// `<device>_0x<ADDR>_<timestamp>.bin` under the session output directory.
    pub fn default_output_path(session: &Session, address: u32) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        session.output_dir.join(format!(
            "{}_0x{:08X}_{}.bin",
            session.descriptor().id,
            address,
            timestamp
        ))
    }

    pub fn read<T>(tool: &mut T, params: &ReadParams) -> Result<ReadOutcome>
    where
        T: FlashToolTrait,
    {
        let address = params
            .address
            .unwrap_or_else(|| layout::default_region().read_addr);
        let size = params.size.unwrap_or(DEFAULT_READ_SIZE);
        if size == 0 {
            return Err(Error::invalid_size("read size must be greater than zero"));
        }
        FlashInitializer::initialize(tool, None)?;

        let path = match &params.output {
            Some(path) => path.clone(),
            None => Self::default_output_path(tool.session(), address),
        };

        tracing::info!("Reading FLASH: 0x{:08X}, size: 0x{:X}", address, size);
        tracing::info!("Output file: {}", path.display());
        let spinner = tool
            .progress()
            .create_spinner(Phase::Read, format!("Reading 0x{:X} bytes from 0x{:08X}...", size, address));

        let output = match tool.execute(BlhostCommand::ReadMemory { address, len: size }, false) {
            Ok(output) => output,
            Err(e) => {
                spinner.finish_with_message("Aborted");
                return Err(e);
            }
        };
        if !output.success() {
            spinner.finish_with_message("FLASH read failed");
            return Err(Error::Read {
                address,
                detail: output.failure_detail(),
            });
        }

        let data = decode_hex_dump(&output.stdout);
        if data.is_empty() {
            spinner.finish_with_message("Hex data parsing failed");
            return Err(Error::NoDataDecoded);
        }
        if data.len() != size as usize {
            tracing::warn!(
                "Requested 0x{:X} bytes but decoded 0x{:X}",
                size,
                data.len()
            );
        }

        Self::persist(&path, &data)?;
        spinner.finish_with_message(format!("Saved {} bytes", data.len()));
        tracing::info!("Saved {} bytes to {}", data.len(), path.display());

        Ok(ReadOutcome {
            address,
            requested: size,
            path,
            bytes: data.len(),
        })
    }

    /// Writes through a temp file in the target directory so a failed write
    /// never leaves a truncated dump behind.
    fn persist(path: &Path, data: &[u8]) -> Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(data)?;
        temp.flush()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
