use crate::erase_flash::FlashEraser;
use crate::layout;
use crate::progress::Phase;
use crate::runner::BlhostCommand;
use crate::{Error, FlashToolTrait, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteParams {
    pub file: PathBuf,
    /// Target address; the non-secure region base when absent.
    pub address: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub address: u32,
    pub size: u32,
    pub erase_chunks: usize,
}

pub struct FlashWriter;

impl FlashWriter {
    /// Erases exactly the image's footprint, then programs the image with a
    /// single `write-memory`. There is no read-back verification and no retry.
    pub fn write<T>(tool: &mut T, params: &WriteParams) -> Result<WriteOutcome>
    where
        T: FlashToolTrait,
    {
        let file = &params.file;
        if !file.is_file() {
            return Err(Error::FileNotFound(file.clone()));
        }
        let file_size = std::fs::metadata(file)?.len();
        if file_size == 0 {
            return Err(Error::EmptyFile(file.clone()));
        }
        let size = u32::try_from(file_size).map_err(|_| {
            Error::invalid_size(format!("{} bytes does not fit the flash", file_size))
        })?;

        let address = params
            .address
            .unwrap_or_else(|| layout::default_region().start_addr);
        tracing::info!("Firmware file: {} ({} bytes)", file.display(), size);

        let geometry = FlashEraser::geometry_hint(tool.session().descriptor(), size);
        let erased = FlashEraser::erase_range(tool, address, size, geometry.as_deref())?;

        tracing::info!("Starting firmware write to 0x{:08X}...", address);
        let spinner = tool
            .progress()
            .create_spinner(Phase::Write, format!("Writing {} bytes to 0x{:08X}...", size, address));

        let output = match tool.execute(
            BlhostCommand::WriteMemory {
                address,
                file: file.clone(),
            },
            false,
        ) {
            Ok(output) => output,
            Err(e) => {
                spinner.finish_with_message("Aborted");
                return Err(e);
            }
        };
        if !output.success() {
            spinner.finish_with_message("Firmware write failed");
            return Err(Error::Write {
                address,
                detail: output.failure_detail(),
            });
        }

        spinner.finish_with_message("Firmware written");
        Ok(WriteOutcome {
            address,
            size,
            erase_chunks: erased.chunks,
        })
    }
}
