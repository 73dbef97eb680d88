//! Device registry loaded from `device_config.json`.
//!
//! A device entry either carries `variants` (a family) or describes a single
//! part directly. Both shapes become the same [`DeviceDescriptor`]; a family is
//! simply a descriptor with children. Variants inherit the family's interface
//! settings and fixed FCB file unless they override them.

use crate::choice::{Choice, ChoiceProvider};
use crate::connection::Interface;
use crate::layout;
use crate::{Error, Result};
use rust_embed::Embed;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "device_config.json";

#[derive(Embed)]
#[folder = "assets/"]
struct BundledConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Size class such as `8M`.
    pub name: String,
    pub bytes: u32,
    /// FCB blob for this size, relative to the blob directory.
    pub fcb_file: Option<String>,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub description: Option<String>,
    pub interfaces: Vec<Interface>,
    pub default_interface: Option<Interface>,
    /// Blob shared by every geometry that does not name its own.
    pub fcb_file: Option<String>,
    pub geometries: Vec<FlashGeometry>,
    pub variants: Vec<DeviceDescriptor>,
}

impl DeviceDescriptor {
    pub fn is_family(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn geometry(&self, name: &str) -> Option<&FlashGeometry> {
        self.geometries
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    /// The flagged default geometry, else the first declared one.
    pub fn default_geometry(&self) -> Result<&FlashGeometry> {
        self.geometries
            .iter()
            .find(|g| g.default)
            .or_else(|| self.geometries.first())
            .ok_or_else(|| Error::NoGeometry(self.id.clone()))
    }

    /// Geometry whose byte count is exactly `bytes`, if this device has one.
    pub fn geometry_for_size(&self, bytes: u32) -> Option<&FlashGeometry> {
        self.geometries.iter().find(|g| g.bytes == bytes)
    }

    pub fn blob_for<'a>(&'a self, geometry: &'a FlashGeometry) -> Result<&'a str> {
        geometry
            .fcb_file
            .as_deref()
            .or(self.fcb_file.as_deref())
            .ok_or_else(|| Error::NoBlobConfigured(geometry.name.clone()))
    }

    /// Comma separated size list, default marked.
    pub fn flash_summary(&self) -> String {
        if self.geometries.is_empty() {
            return "N/A".to_string();
        }
        self.geometries
            .iter()
            .map(|g| {
                if g.default {
                    format!("{} (default)", g.name)
                } else {
                    g.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of looking up an identifier: the family it belongs to and the
/// concrete part that will be driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub family: String,
    pub device: DeviceDescriptor,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    devices: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    description: Option<String>,
    #[serde(default)]
    interfaces: Vec<Interface>,
    default_interface: Option<Interface>,
    fcb_file: Option<String>,
    #[serde(default)]
    flash_configs: Map<String, Value>,
    #[serde(default)]
    variants: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    fcb_file: Option<String>,
    #[serde(default)]
    default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Loads the registry from `path`, falling back to `./device_config.json`
    /// and finally to the bundled document.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::from_file(local);
        }
        Self::bundled()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading device configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), config_detail(e))))
    }

    pub fn bundled() -> Result<Self> {
        let file = BundledConfig::get(CONFIG_FILE_NAME)
            .ok_or_else(|| Error::config(format!("bundled {} is missing", CONFIG_FILE_NAME)))?;
        let content = std::str::from_utf8(&file.data)
            .map_err(|e| Error::config(format!("bundled {}: {}", CONFIG_FILE_NAME, e)))?;
        Self::from_json_str(content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: RawDocument =
            serde_json::from_str(content).map_err(|e| Error::config(e.to_string()))?;

        let mut devices = Vec::with_capacity(document.devices.len());
        for (id, value) in document.devices {
            let raw: RawDevice = serde_json::from_value(value)
                .map_err(|e| Error::config(format!("device {}: {}", id, e)))?;
            devices.push(build_descriptor(id, raw, None)?);
        }

        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Every identifier accepted by [`DeviceRegistry::resolve`].
    pub fn known_identifiers(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for device in &self.devices {
            ids.push(device.id.clone());
            for variant in &device.variants {
                if variant.id != device.id {
                    ids.push(variant.id.clone());
                }
            }
        }
        ids
    }

    /// Resolves `identifier` to a single drivable part.
    ///
    /// Top level names win over variant names. A family with several variants
    /// is only resolved when a `chooser` is available to pick one.
    pub fn resolve(
        &self,
        identifier: &str,
        chooser: Option<&mut dyn ChoiceProvider>,
    ) -> Result<ResolvedDevice> {
        if let Some(top) = self.devices.iter().find(|d| d.id == identifier) {
            return match top.variants.as_slice() {
                [] => Ok(ResolvedDevice {
                    family: top.id.clone(),
                    device: top.clone(),
                }),
                [only] => {
                    tracing::info!("Auto-selected variant: {}", only.id);
                    Ok(ResolvedDevice {
                        family: top.id.clone(),
                        device: only.clone(),
                    })
                }
                variants => {
                    let Some(chooser) = chooser else {
                        return Err(Error::AmbiguousDevice {
                            family: top.id.clone(),
                            variants: variants.iter().map(|v| v.id.clone()).collect(),
                        });
                    };
                    let choice = Choice::new(
                        format!("Device {} has multiple variants, please select", top.id),
                        variants
                            .iter()
                            .map(|v| {
                                format!(
                                    "{:15} - {} (Flash: {})",
                                    v.id,
                                    v.description.as_deref().unwrap_or(&v.id),
                                    v.flash_summary()
                                )
                            })
                            .collect(),
                    );
                    let index = choice.check(chooser.choose(&choice)?)?;
                    Ok(ResolvedDevice {
                        family: top.id.clone(),
                        device: variants[index].clone(),
                    })
                }
            };
        }

        self.devices
            .iter()
            .find_map(|family| {
                family
                    .variants
                    .iter()
                    .find(|v| v.id == identifier)
                    .map(|variant| ResolvedDevice {
                        family: family.id.clone(),
                        device: variant.clone(),
                    })
            })
            .ok_or_else(|| Error::UnknownDevice {
                device: identifier.to_string(),
                known: self.known_identifiers(),
            })
    }
}

fn config_detail(error: Error) -> String {
    match error {
        Error::ConfigLoad(detail) => detail,
        other => other.to_string(),
    }
}

fn build_descriptor(
    id: String,
    raw: RawDevice,
    parent: Option<&DeviceDescriptor>,
) -> Result<DeviceDescriptor> {
    // Variants without their own interface list take the family's.
    let (interfaces, default_interface) = match parent {
        Some(parent) if raw.interfaces.is_empty() => (
            parent.interfaces.clone(),
            raw.default_interface.or(parent.default_interface),
        ),
        _ => (raw.interfaces, raw.default_interface),
    };
    let fcb_file = raw
        .fcb_file
        .or_else(|| parent.and_then(|p| p.fcb_file.clone()));

    if interfaces.is_empty() {
        return Err(Error::config(format!("device {} has no interfaces", id)));
    }
    if let Some(default) = default_interface
        && !interfaces.contains(&default)
    {
        return Err(Error::config(format!(
            "device {}: default interface {} is not in its interface list",
            id, default
        )));
    }

    let mut geometries = Vec::with_capacity(raw.flash_configs.len());
    for (name, value) in raw.flash_configs {
        let bytes = layout::size_to_bytes(&name)
            .ok_or_else(|| Error::config(format!("device {}: unknown flash size {}", id, name)))?;
        let geometry: RawGeometry = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("device {} flash {}: {}", id, name, e)))?;
        geometries.push(FlashGeometry {
            name,
            bytes,
            fcb_file: geometry.fcb_file,
            default: geometry.default,
        });
    }
    if geometries.iter().filter(|g| g.default).count() > 1 {
        return Err(Error::config(format!(
            "device {} marks more than one flash size as default",
            id
        )));
    }

    let mut descriptor = DeviceDescriptor {
        id,
        description: raw.description,
        interfaces,
        default_interface,
        fcb_file,
        geometries,
        variants: Vec::new(),
    };

    let mut variants = Vec::with_capacity(raw.variants.len());
    for (variant_id, value) in raw.variants {
        let raw_variant: RawDevice = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("variant {}: {}", variant_id, e)))?;
        variants.push(build_descriptor(variant_id, raw_variant, Some(&descriptor))?);
    }
    descriptor.variants = variants;

    Ok(descriptor)
}
