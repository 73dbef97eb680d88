use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rwflash_lib::layout::{self, FlashRegion};
use rwflash_lib::utils::Utils;
use rwflash_lib::{ConnectionRequest, Interface};
use std::path::PathBuf;

use crate::config::RwFlashConfig;

/// CLI arguments merged with the optional config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub device: Option<String>,
    pub flash_size: Option<String>,
    pub connection: ConnectionRequest,
    pub programmer: String,
    pub device_config: Option<PathBuf>,
    pub blob_dir: PathBuf,
    pub output_dir: PathBuf,
    pub debug: bool,
    pub quiet: bool,
}

fn parse_number(s: &str) -> std::result::Result<u32, String> {
    Utils::str_to_u32(s).map_err(|e| e.to_string())
}

fn parse_address(s: &str) -> std::result::Result<u32, String> {
    Utils::parse_address(s).map_err(|e| e.to_string())
}

fn parse_region(s: &str) -> std::result::Result<&'static FlashRegion, String> {
    layout::region(s).ok_or_else(|| {
        let keys: Vec<&str> = layout::regions().map(|r| r.key).collect();
        format!("unknown region '{}', expected one of: {}", s, keys.join(", "))
    })
}

#[derive(Parser, Debug)]
#[command(author, version, about = "rwflash CLI", long_about = None)]
pub struct Cli {
    /// JSON configuration file path
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<String>,

    /// Device or variant identifier, e.g. FCM363X or FCM363XAB
    #[arg(short = 'd', long = "device", global = true)]
    pub device: Option<String>,

    /// Flash size class to initialize with, e.g. 8M (default: the device's default size)
    #[arg(long = "flash-size", global = true)]
    pub flash_size: Option<String>,

    /// Connection interface (default: the device's default interface)
    #[arg(short = 'i', long = "interface", value_enum, global = true)]
    pub interface: Option<Interface>,

    /// Serial port device, required for uart
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<String>,

    /// Serial port baud rate (default: 2000000)
    #[arg(short = 'b', long = "baud", global = true)]
    pub baud: Option<u32>,

    /// blhost executable (default: blhost)
    #[arg(long = "programmer", global = true)]
    pub programmer: Option<String>,

    /// Device configuration document (default: ./device_config.json, then the bundled one)
    #[arg(long = "device-config", global = true)]
    pub device_config: Option<String>,

    /// Directory holding the FCB blobs (default: fcb)
    #[arg(long = "fcb-dir", global = true)]
    pub blob_dir: Option<String>,

    /// Directory for read dumps (default: output)
    #[arg(long = "output-dir", global = true)]
    pub output_dir: Option<String>,

    /// Log every blhost invocation and its full output
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Never prompt; take the default answer everywhere
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Suppress progress bar output (default: false)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Check that the ROM bootloader answers
    #[command(name = "test")]
    Test,

    /// Read a block of flash into a file
    #[command(name = "read")]
    Read(ReadArgs),

    /// Erase the image footprint and program a binary file
    #[command(name = "write")]
    Write(WriteArgs),

    /// Erase a flash window
    #[command(name = "erase")]
    Erase(EraseArgs),

    /// List supported devices
    #[command(name = "list")]
    List,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct ReadArgs {
    /// Start address in hex, `0x` optional (default: 0x08000400)
    #[arg(short = 'a', long = "address", value_parser = parse_address)]
    pub address: Option<u32>,

    /// Read from the probe address of a region (NS or S) instead of --address
    #[arg(short = 'r', long = "region", value_parser = parse_region, conflicts_with = "address")]
    pub region: Option<&'static FlashRegion>,

    /// Number of bytes (default: 0x200)
    #[arg(short = 's', long = "size", value_parser = parse_number)]
    pub size: Option<u32>,

    /// Output file (default: <device>_0x<ADDR>_<timestamp>.bin in the output directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct WriteArgs {
    /// Binary file to program
    #[arg(short = 'f', long = "file", required = true)]
    pub file: PathBuf,

    /// Target address in hex, `0x` optional (default: 0x08000000)
    #[arg(short = 'a', long = "address", value_parser = parse_address)]
    pub address: Option<u32>,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct EraseArgs {
    /// Start address in hex, `0x` optional (prompts for a region when omitted)
    #[arg(short = 'a', long = "address", value_parser = parse_address)]
    pub address: Option<u32>,

    /// Erase from the base of a region (NS or S) instead of --address
    #[arg(short = 'r', long = "region", value_parser = parse_region, conflicts_with = "address")]
    pub region: Option<&'static FlashRegion>,

    /// Number of bytes, e.g. 0x10000, 64k or 8M (prompts when omitted)
    #[arg(short = 's', long = "size", value_parser = parse_number)]
    pub size: Option<u32>,
}

/// Merge CLI arguments with configuration file, CLI args take precedence
pub fn merge_config(args: &Cli, config: Option<RwFlashConfig>) -> Result<MergedConfig> {
    let base_config = config.unwrap_or_else(RwFlashConfig::with_defaults);

    let device = args
        .device
        .clone()
        .or(base_config.device)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let port = args.port.clone().or(base_config.port);
    let baud = args.baud.unwrap_or(base_config.baud);
    if baud == 0 {
        bail!("Baud rate must be greater than zero");
    }

    let programmer = args
        .programmer
        .clone()
        .unwrap_or(base_config.programmer);
    if programmer.trim().is_empty() {
        bail!("Programmer executable must not be empty");
    }

    Ok(MergedConfig {
        device,
        flash_size: args.flash_size.clone().or(base_config.flash_size),
        connection: ConnectionRequest {
            interface: args.interface.or(base_config.interface),
            port,
            baud: Some(baud),
        },
        programmer,
        device_config: args
            .device_config
            .clone()
            .or(base_config.device_config)
            .map(PathBuf::from),
        blob_dir: PathBuf::from(args.blob_dir.clone().unwrap_or(base_config.blob_dir)),
        output_dir: PathBuf::from(args.output_dir.clone().unwrap_or(base_config.output_dir)),
        debug: args.debug || base_config.debug,
        quiet: args.quiet || base_config.quiet,
    })
}
