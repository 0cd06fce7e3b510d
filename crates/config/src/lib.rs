// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

/// Address bits 27-24 select one of sixteen regions.
pub const REGION_SHIFT: u32 = 24;
pub const REGION_GRANULE: u64 = 1 << REGION_SHIFT;
/// End of the decoded address range; bits 31-28 are not decoded.
pub const ADDRESS_LIMIT: u64 = 16 * REGION_GRANULE;

/// Cache page size used when a region does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 0x200;

#[derive(Debug, thiserror::Error)]
pub enum MemoryMapError {
    #[error("Region '{id}': size {size:#x} is not a power of two (use KiB/MiB units)")]
    SizeNotPowerOfTwo { id: String, size: u64 },
    #[error("Region '{id}': base {base:#x} is not aligned to a 16 MiB region")]
    MisalignedBase { id: String, base: u32 },
    #[error("Region '{id}': page size {page:#x} must be a power of two between 4 bytes and the region size")]
    BadPageSize { id: String, page: u64 },
    #[error("Region '{id}': base {base:#x} with size {size:#x} extends past the decoded range (0x10000000)")]
    OutOfRange { id: String, base: u32, size: u64 },
    #[error("Region '{id}' overlaps region '{other}'")]
    Overlap { id: String, other: String },
    #[error("Duplicate region id '{0}'")]
    DuplicateId(String),
    #[error("Region '{id}' mirrors unknown region '{target}'")]
    UnknownMirror { id: String, target: String },
}

/// Extra cycles for each kind of access to a region.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitStates {
    #[serde(default)]
    pub nonseq16: u32,
    #[serde(default)]
    pub seq16: u32,
    #[serde(default)]
    pub nonseq32: u32,
    #[serde(default)]
    pub seq32: u32,
}

impl WaitStates {
    pub const fn new(nonseq16: u32, seq16: u32, nonseq32: u32, seq32: u32) -> Self {
        Self {
            nonseq16,
            seq16,
            nonseq32,
            seq32,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegionConfig {
    pub id: String,
    pub base: u32,
    pub size: String, // e.g. "256KiB"
    #[serde(default)]
    pub page_size: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Id of another region whose storage this one shares.
    #[serde(default)]
    pub mirror: Option<String>,
    #[serde(default)]
    pub wait: WaitStates,
}

impl RegionConfig {
    fn new(id: &str, base: u32, size: &str, wait: WaitStates) -> Self {
        Self {
            id: id.to_string(),
            base,
            size: size.to_string(),
            page_size: None,
            read_only: false,
            mirror: None,
            wait,
        }
    }

    pub fn size_bytes(&self) -> Result<u64> {
        parse_size(&self.size).with_context(|| format!("Region '{}'", self.id))
    }

    pub fn page_size_bytes(&self) -> Result<u64> {
        match &self.page_size {
            Some(s) => parse_size(s).with_context(|| format!("Region '{}' page_size", self.id)),
            None => Ok(DEFAULT_PAGE_SIZE as u64),
        }
    }

    /// log2 of the cache page size.
    pub fn page_bits(&self) -> Result<u32> {
        Ok(self.page_size_bytes()?.trailing_zeros())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryMapConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub regions: Vec<RegionConfig>,
}

impl MemoryMapConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read memory map at {:?}", path))?;
        let map = Self::from_yaml(&content)?;
        tracing::debug!(
            "Loaded memory map '{}' ({} regions) from {:?}",
            map.name,
            map.regions.len(),
            path
        );
        Ok(map)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse Memory Map YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        let mut ids = HashSet::new();
        for region in &self.regions {
            if !ids.insert(region.id.as_str()) {
                return Err(MemoryMapError::DuplicateId(region.id.clone()).into());
            }
        }

        let mut spans: Vec<(u64, u64, &str)> = Vec::new();
        for region in &self.regions {
            let declared = spans.iter().any(|(_, _, id)| Some(*id) == region.mirror.as_deref());
            let size = region.size_bytes()?;
            if size == 0 || !size.is_power_of_two() {
                return Err(MemoryMapError::SizeNotPowerOfTwo {
                    id: region.id.clone(),
                    size,
                }
                .into());
            }
            if region.base as u64 % REGION_GRANULE != 0 {
                return Err(MemoryMapError::MisalignedBase {
                    id: region.id.clone(),
                    base: region.base,
                }
                .into());
            }
            let page = region.page_size_bytes()?;
            if !page.is_power_of_two() || page < 4 || page > size.min(REGION_GRANULE) {
                return Err(MemoryMapError::BadPageSize {
                    id: region.id.clone(),
                    page,
                }
                .into());
            }
            if let Some(target) = &region.mirror {
                // Mirror targets must be declared earlier.
                if !declared {
                    return Err(MemoryMapError::UnknownMirror {
                        id: region.id.clone(),
                        target: target.clone(),
                    }
                    .into());
                }
            }

            // Each region claims whole 16 MiB slots.
            let start = region.base as u64;
            let end = start + size.max(REGION_GRANULE);
            if end > ADDRESS_LIMIT {
                return Err(MemoryMapError::OutOfRange {
                    id: region.id.clone(),
                    base: region.base,
                    size,
                }
                .into());
            }
            if let Some((_, _, other)) = spans.iter().find(|(s, e, _)| start < *e && *s < end) {
                return Err(MemoryMapError::Overlap {
                    id: region.id.clone(),
                    other: other.to_string(),
                }
                .into());
            }
            spans.push((start, end, region.id.as_str()));
        }

        Ok(())
    }

    /// The handheld console memory map.
    pub fn gba() -> Self {
        let rom_ws0 = WaitStates::new(4, 2, 7, 5);
        let rom_ws1 = WaitStates::new(4, 4, 9, 9);
        let rom_ws2 = WaitStates::new(4, 8, 13, 17);

        let mut bios = RegionConfig::new("bios", 0x0000_0000, "16KiB", WaitStates::default());
        bios.read_only = true;
        let mut rom0 = RegionConfig::new("rom0", 0x0800_0000, "32MiB", rom_ws0);
        rom0.read_only = true;
        rom0.page_size = Some("4KiB".to_string());
        let mut rom1 = RegionConfig::new("rom1", 0x0A00_0000, "32MiB", rom_ws1);
        rom1.read_only = true;
        rom1.page_size = Some("4KiB".to_string());
        rom1.mirror = Some("rom0".to_string());
        let mut rom2 = RegionConfig::new("rom2", 0x0C00_0000, "32MiB", rom_ws2);
        rom2.read_only = true;
        rom2.page_size = Some("4KiB".to_string());
        rom2.mirror = Some("rom0".to_string());

        Self {
            schema_version: default_schema_version(),
            name: "gba".to_string(),
            regions: vec![
                bios,
                RegionConfig::new("ewram", 0x0200_0000, "256KiB", WaitStates::new(2, 2, 5, 5)),
                RegionConfig::new("iwram", 0x0300_0000, "32KiB", WaitStates::default()),
                RegionConfig::new("io", 0x0400_0000, "1KiB", WaitStates::default()),
                RegionConfig::new("palette", 0x0500_0000, "1KiB", WaitStates::new(0, 0, 1, 1)),
                RegionConfig::new("vram", 0x0600_0000, "128KiB", WaitStates::new(0, 0, 1, 1)),
                RegionConfig::new("oam", 0x0700_0000, "1KiB", WaitStates::default()),
                rom0,
                rom1,
                rom2,
                RegionConfig::new("sram", 0x0E00_0000, "64KiB", WaitStates::new(4, 4, 4, 4)),
            ],
        }
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
