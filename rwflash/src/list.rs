use rwflash_lib::{DeviceDescriptor, DeviceRegistry};
use std::fmt::Write;

fn interfaces(device: &DeviceDescriptor) -> String {
    device
        .interfaces
        .iter()
        .map(|i| {
            if device.default_interface == Some(*i) {
                format!("{} (default)", i)
            } else {
                i.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human readable overview of every configured family and variant.
pub fn render_devices(registry: &DeviceRegistry) -> String {
    let mut out = String::from("Supported devices:\n");
    for device in registry.devices() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} - {}",
            device.id,
            device.description.as_deref().unwrap_or("(no description)")
        );
        let _ = writeln!(out, "  Interfaces: {}", interfaces(device));
        if device.is_family() {
            let _ = writeln!(out, "  Variants:");
            for variant in &device.variants {
                let _ = writeln!(
                    out,
                    "    {:15} - {} (Flash: {})",
                    variant.id,
                    variant.description.as_deref().unwrap_or(&variant.id),
                    variant.flash_summary()
                );
            }
        } else {
            let _ = writeln!(out, "  Flash: {}", device.flash_summary());
        }
    }
    out
}
