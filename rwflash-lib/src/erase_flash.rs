use crate::choice::{Choice, ChoiceProvider};
use crate::init_flash::FlashInitializer;
use crate::layout::{self, FlashRegion, MAX_ERASE_BLOCK};
use crate::registry::DeviceDescriptor;
use crate::progress::Phase;
use crate::runner::BlhostCommand;
use crate::utils::Utils;
use crate::{Error, FlashToolTrait, Result};

/// Trailing argument of `flash-erase-region`.
pub const ERASE_MEMORY_ID: u32 = 0;

/// One `flash-erase-region` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EraseChunk {
    pub address: u32,
    pub len: u32,
    /// Share of the request already erased when this chunk starts, in percent.
    pub percent: f64,
}

/// Splits `[start, start + size)` into contiguous chunks of at most
/// `max_block` bytes.
pub fn plan_erase(start: u32, size: u32, max_block: u32) -> Result<Vec<EraseChunk>> {
    if size == 0 {
        return Err(Error::invalid_size("erase size must be greater than zero"));
    }
    if max_block == 0 {
        return Err(Error::invalid_input("erase block size must be greater than zero"));
    }
    if u64::from(start) + u64::from(size) > 1u64 << 32 {
        return Err(Error::invalid_size(format!(
            "0x{:08X} + 0x{:X} runs past the 32-bit address space",
            start, size
        )));
    }

    let mut chunks = Vec::with_capacity(size.div_ceil(max_block) as usize);
    let mut address = start;
    let mut remaining = size;
    while remaining > 0 {
        let len = remaining.min(max_block);
        chunks.push(EraseChunk {
            address,
            len,
            percent: f64::from(size - remaining) / f64::from(size) * 100.0,
        });
        // The last chunk may end exactly at 2^32.
        address = address.wrapping_add(len);
        remaining -= len;
    }
    Ok(chunks)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EraseParams {
    /// Start address; prompts for a region when absent.
    pub address: Option<u32>,
    /// Byte count; prompts for a flash size when absent.
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseOutcome {
    pub address: u32,
    pub size: u32,
    pub chunks: usize,
    /// Geometry whose FCB was used for initialization.
    pub geometry: String,
}

pub struct FlashEraser;

impl FlashEraser {
    /// Erases the requested window, asking `chooser` for whatever is missing.
    pub fn erase<T>(
        tool: &mut T,
        params: &EraseParams,
        chooser: &mut dyn ChoiceProvider,
    ) -> Result<EraseOutcome>
    where
        T: FlashToolTrait,
    {
        let address = match params.address {
            Some(address) => address,
            None => {
                let region = Self::choose_region(chooser)?;
                tracing::info!(
                    "Selected flash region: {} (0x{:08X})",
                    region.name,
                    region.start_addr
                );
                region.start_addr
            }
        };

        let (size, geometry) = match params.size {
            Some(size) => (size, Self::geometry_hint(tool.session().descriptor(), size)),
            None => {
                let (size, name) = Self::choose_size(tool.session().descriptor(), chooser)?;
                (size, Some(name))
            }
        };

        Self::erase_range(tool, address, size, geometry.as_deref())
    }

    /// Geometry whose byte count equals `size`. Only used to pick the FCB
    /// blob; `None` falls back to the device default.
    pub fn geometry_hint(device: &DeviceDescriptor, size: u32) -> Option<String> {
        if let Some(geometry) = device.geometry_for_size(size) {
            return Some(geometry.name.clone());
        }
        match layout::bytes_to_size(size) {
            Some(name) => tracing::info!(
                "Device {} has no {} flash configuration, using its default FCB",
                device.id,
                name
            ),
            None => tracing::debug!(
                "0x{:X} bytes is not a whole flash size, using the default FCB",
                size
            ),
        }
        None
    }

    pub fn choose_region(chooser: &mut dyn ChoiceProvider) -> Result<&'static FlashRegion> {
        let regions: Vec<&'static FlashRegion> = layout::regions().collect();
        let choice = Choice::new(
            "Please select FLASH region",
            regions
                .iter()
                .map(|r| format!("{} (0x{:08X})", r.name, r.start_addr))
                .collect(),
        )
        .with_default(0);
        let index = choice.check(chooser.choose(&choice)?)?;
        Ok(regions[index])
    }

    /// Picks a full-geometry erase size. A single geometry is taken without
    /// asking; otherwise the last option ("full erase") maps to the default
    /// geometry.
    pub fn choose_size(
        device: &DeviceDescriptor,
        chooser: &mut dyn ChoiceProvider,
    ) -> Result<(u32, String)> {
        match device.geometries.as_slice() {
            [] => Err(Error::NoGeometry(device.id.clone())),
            [only] => {
                tracing::info!(
                    "Auto-selected FLASH size: {} ({} bytes) - full erase",
                    only.name,
                    Utils::group_thousands(u64::from(only.bytes))
                );
                Ok((only.bytes, only.name.clone()))
            }
            geometries => {
                let mut options: Vec<String> = geometries
                    .iter()
                    .map(|g| {
                        format!(
                            "{} ({} bytes, 0x{:X})",
                            g.name,
                            Utils::group_thousands(u64::from(g.bytes)),
                            g.bytes
                        )
                    })
                    .collect();
                options.push("Full erase (entire FLASH)".to_string());
                let full = options.len() - 1;
                let choice = Choice::new(
                    format!("Supported FLASH sizes for device {}", device.id),
                    options,
                )
                .with_default(full);

                let index = choice.check(chooser.choose(&choice)?)?;
                let geometry = if index == full {
                    device.default_geometry()?
                } else {
                    &geometries[index]
                };
                Ok((geometry.bytes, geometry.name.clone()))
            }
        }
    }

    /// Initializes the flash for `geometry` and erases `size` bytes from
    /// `start` in blocks of at most [`MAX_ERASE_BLOCK`]. A failed block aborts
    /// the operation; blocks already erased stay erased.
    pub fn erase_range<T>(
        tool: &mut T,
        start: u32,
        size: u32,
        geometry: Option<&str>,
    ) -> Result<EraseOutcome>
    where
        T: FlashToolTrait,
    {
        let chunks = plan_erase(start, size, MAX_ERASE_BLOCK)?;
        let geometry = FlashInitializer::initialize(tool, geometry)?;

        tracing::info!(
            "Starting FLASH erase: 0x{:08X}, size: {} bytes",
            start,
            Utils::group_thousands(u64::from(size))
        );
        let bar = tool.progress().create_bar(
            Phase::Erase,
            u64::from(size),
            format!("Erasing 0x{:08X}...", start),
        );

        for chunk in &chunks {
            tracing::info!(
                "Erase progress: {:.1}% - 0x{:08X} (0x{:X})",
                chunk.percent,
                chunk.address,
                chunk.len
            );
            bar.set_message(format!(
                "Erasing 0x{:08X} ({:.1}%)",
                chunk.address, chunk.percent
            ));

            let failure = match tool.execute(
                BlhostCommand::FlashEraseRegion {
                    address: chunk.address,
                    len: chunk.len,
                    memory_id: ERASE_MEMORY_ID,
                },
                false,
            ) {
                Ok(output) if output.success() => None,
                Ok(output) => Some(output.failure_detail()),
                Err(e) => {
                    bar.finish_with_message("Aborted");
                    return Err(e);
                }
            };
            if let Some(detail) = failure {
                bar.finish_with_message("Aborted");
                return Err(Error::EraseChunk {
                    address: chunk.address,
                    detail,
                });
            }
            bar.inc(u64::from(chunk.len));
        }

        bar.finish_with_message("Erase complete");
        Ok(EraseOutcome {
            address: start,
            size,
            chunks: chunks.len(),
            geometry: geometry.name,
        })
    }
}
