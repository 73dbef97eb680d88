mod cli;
mod config;
mod interrupt;
mod list;
mod progress;
mod prompt;
mod serial;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, MergedConfig, merge_config};
use config::RwFlashConfig;
use rwflash_lib::progress::no_op_progress_callback;
use rwflash_lib::{
    BlhostRunner, ChoiceProvider, ConnectionDescriptor, DefaultChoices, DeviceRegistry,
    EraseParams, FlashTool, ReadParams, Session, WriteParams,
};
use std::process;

fn init_tracing(debug: bool) {
    // Log level can be controlled by setting the RUST_LOG environment variable, e.g.:
    // RUST_LOG=debug, RUST_LOG=rwflash_lib=trace, RUST_LOG=info
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Cli::parse();

    if let Err(e) = interrupt::install() {
        eprintln!("Warning: Ctrl-C handler not installed: {:#}", e);
    }

    if let Err(e) = run(args) {
        let cancelled = e
            .downcast_ref::<rwflash_lib::Error>()
            .is_some_and(rwflash_lib::Error::is_cancelled);
        if cancelled {
            eprintln!("Operation cancelled");
        } else {
            eprintln!("Error: {:#}", e);
        }
        process::exit(1);
    }
}

fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => Some(RwFlashConfig::from_file(path)?),
        None => None,
    };
    let merged = merge_config(&args, config)?;
    init_tracing(merged.debug);
    tracing::debug!("Effective configuration: {:?}", merged);

    let registry = DeviceRegistry::load(merged.device_config.as_deref())
        .context("Failed to load device configuration")?;

    let command = match args.command.clone() {
        Some(Commands::List) => {
            print!("{}", list::render_devices(&registry));
            return Ok(());
        }
        Some(command) => command,
        None if merged.device.is_none() => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        None => Commands::Test,
    };
    let Some(device) = merged.device.clone() else {
        bail!("No device specified. Use --device or set \"device\" in the config file.");
    };

    let mut chooser: Box<dyn ChoiceProvider> = if args.yes {
        Box::new(DefaultChoices)
    } else {
        Box::new(prompt::StdinChoices)
    };
    let mut tool = open_tool(&registry, &device, &merged, args.yes, chooser.as_mut())?;

    match command {
        Commands::Test => {
            let status = tool.test_connection().context("Connection test failed")?;
            match status.version {
                Some(version) => {
                    println!("Device connected, bootloader version 0x{:08X}", version)
                }
                None => println!("Device connected"),
            }
        }
        Commands::Read(params) => {
            let outcome = tool
                .read_flash(&ReadParams {
                    address: params.address.or(params.region.map(|r| r.read_addr)),
                    size: params.size,
                    output: params.output,
                })
                .context("FLASH read failed")?;
            println!(
                "Read {} bytes from 0x{:08X} into {}",
                outcome.bytes,
                outcome.address,
                outcome.path.display()
            );
        }
        Commands::Write(params) => {
            let outcome = tool
                .write_flash(&WriteParams {
                    file: params.file,
                    address: params.address,
                })
                .context("Firmware write failed")?;
            println!(
                "Wrote {} bytes to 0x{:08X} ({} erase blocks)",
                outcome.size, outcome.address, outcome.erase_chunks
            );
        }
        Commands::Erase(params) => {
            let outcome = tool
                .erase_flash(
                    &EraseParams {
                        address: params.address.or(params.region.map(|r| r.start_addr)),
                        size: params.size,
                    },
                    chooser.as_mut(),
                )
                .context("FLASH erase failed")?;
            println!(
                "Erased 0x{:X} bytes from 0x{:08X} ({} blocks, {} FCB)",
                outcome.size, outcome.address, outcome.chunks, outcome.geometry
            );
        }
        Commands::List => unreachable!("list is handled before device resolution"),
    }

    Ok(())
}

/// Resolves the session and binds it to a blhost runner.
fn open_tool(
    registry: &DeviceRegistry,
    device: &str,
    merged: &MergedConfig,
    unattended: bool,
    chooser: &mut dyn ChoiceProvider,
) -> Result<FlashTool<BlhostRunner>> {
    let mut request = merged.connection.clone();
    request.port = request.port.map(|p| serial::normalize_port_name(&p));

    // Unattended runs refuse ambiguous families instead of guessing a variant
    let variant_chooser = if unattended { None } else { Some(chooser) };
    let mut session = Session::resolve(registry, device, &request, variant_chooser)?;
    if let Some(size) = &merged.flash_size {
        session = session.with_geometry(size)?;
    }
    let session = session
        .with_debug(merged.debug)
        .with_blob_dir(&merged.blob_dir)
        .with_output_dir(&merged.output_dir);

    if let ConnectionDescriptor::Uart { port, .. } = &session.connection {
        serial::check_port_available(port)?;
    }

    let runner = BlhostRunner::new(merged.programmer.as_str()).with_echo(merged.debug);
    let progress = if merged.quiet {
        no_op_progress_callback()
    } else {
        progress::create_progress_callback()
    };
    Ok(FlashTool::new(session, runner).with_progress(progress))
}
