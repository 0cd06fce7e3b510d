// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_arm7_config::{MemoryMapConfig, RegionConfig, WaitStates, DEFAULT_PAGE_SIZE};

#[test]
fn test_minimal_region_uses_defaults() {
    let yaml = r#"
id: "ram"
base: 0x02000000
size: "256KiB"
"#;
    let region: RegionConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(region.page_size, None);
    assert!(!region.read_only);
    assert_eq!(region.mirror, None);
    assert_eq!(region.wait, WaitStates::default());
    assert_eq!(region.page_size_bytes().unwrap(), DEFAULT_PAGE_SIZE as u64);
}

#[test]
fn test_partial_wait_states_parse() {
    let yaml = r#"
id: "cart"
base: 0x08000000
size: "16MiB"
read_only: true
page_size: "4KiB"
wait: { nonseq32: 7, seq32: 5 }
"#;
    let region: RegionConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(region.read_only);
    assert_eq!(region.wait, WaitStates::new(0, 0, 7, 5));
    assert_eq!(region.page_bits().unwrap(), 12);
}

#[test]
fn test_map_with_mirror() {
    let yaml = r#"
name: "cart-only"
regions:
  - id: "rom"
    base: 0x08000000
    size: "16MiB"
    read_only: true
  - id: "rom_mirror"
    base: 0x0A000000
    size: "16MiB"
    read_only: true
    mirror: "rom"
"#;
    let map = MemoryMapConfig::from_yaml(yaml).unwrap();
    assert_eq!(map.schema_version, "1.0");
    assert_eq!(map.regions.len(), 2);
    assert_eq!(map.regions[1].mirror.as_deref(), Some("rom"));
}

#[test]
fn test_mirror_must_follow_its_target() {
    let yaml = r#"
name: "bad-order"
regions:
  - id: "rom_mirror"
    base: 0x0A000000
    size: "16MiB"
    mirror: "rom"
  - id: "rom"
    base: 0x08000000
    size: "16MiB"
"#;
    assert!(MemoryMapConfig::from_yaml(yaml).is_err());
}

#[test]
fn test_duplicate_ids_rejected() {
    let yaml = r#"
name: "dup"
regions:
  - id: "ram"
    base: 0x02000000
    size: "4KiB"
  - id: "ram"
    base: 0x03000000
    size: "4KiB"
"#;
    let err = MemoryMapConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("Duplicate region id"));
}

#[test]
fn test_page_larger_than_region_rejected() {
    let yaml = r#"
name: "bad-page"
regions:
  - id: "io"
    base: 0x04000000
    size: "1KiB"
    page_size: "4KiB"
"#;
    let err = MemoryMapConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("page size"));
}

#[test]
fn test_region_past_decoded_range_rejected() {
    let yaml = r#"
name: "high"
regions:
  - id: "ext"
    base: 0x10000000
    size: "64KiB"
"#;
    let err = MemoryMapConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("decoded range"));

    let yaml = r#"
name: "spill"
regions:
  - id: "big"
    base: 0x0F000000
    size: "32MiB"
"#;
    assert!(MemoryMapConfig::from_yaml(yaml).is_err());

    let yaml = r#"
name: "top"
regions:
  - id: "last"
    base: 0x0F000000
    size: "16MiB"
"#;
    assert!(MemoryMapConfig::from_yaml(yaml).is_ok());
}

#[test]
fn test_default_map_survives_yaml() {
    let yaml = serde_yaml::to_string(&MemoryMapConfig::gba()).unwrap();
    let map = MemoryMapConfig::from_yaml(&yaml).unwrap();
    assert_eq!(map.name, "gba");
    let ids: Vec<_> = map.regions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids[..3], ["bios", "ewram", "iwram"]);
    assert!(map.regions[0].read_only);
}
