use anyhow::{Context, Result, bail};

/// Rewrites `/dev/tty.*` to the `/dev/cu.*` callout device on macOS; other
/// platforms keep the name as given.
pub fn normalize_port_name(port_name: &str) -> String {
    let port_name = port_name.trim();
    #[cfg(target_os = "macos")]
    {
        if let Some(rest) = port_name.strip_prefix("/dev/tty.") {
            return format!("/dev/cu.{}", rest);
        }
    }
    port_name.to_string()
}

/// Fails unless `port_name` is one of the serial ports the OS reports.
pub fn check_port_available(port_name: &str) -> Result<()> {
    let ports = serialport::available_ports().context("Failed to get available ports list")?;
    let names: Vec<String> = ports
        .into_iter()
        .map(|p| p.port_name)
        // On macOS, only use /dev/cu.* ports, not /dev/tty.* ports
        .filter(|name| !cfg!(target_os = "macos") || !name.starts_with("/dev/tty."))
        .collect();
    ensure_listed(port_name, &names)
}

fn ensure_listed(port_name: &str, available: &[String]) -> Result<()> {
    if available.iter().any(|p| p == port_name) {
        return Ok(());
    }
    bail!(
        "The specified port '{}' does not exist. Available ports: {}",
        port_name,
        if available.is_empty() {
            "No available ports".to_string()
        } else {
            available.join(", ")
        }
    )
}
