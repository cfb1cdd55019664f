use flamebridge_core::{BridgeConfig, ConfigError, OutputMode};
use std::io::Write;

const DUAL_CONTROLLER: &str = r#"
[input]
port = "/dev/ttyUSB1"

[layout]
total_pixels = 1380
pixel_spacing = 2
gap = { start = 680, len = 20 }
banks = [
    { start = 0, end = 340 },
    { start = 340, end = 680 },
    { start = 700, end = 1040 },
    { start = 1040, end = 1380, channel = 20 },
]

[output]
mode = "unicast"
source_name = "Stage Fire"
priority = 150

[[output.endpoints]]
name = "left"
address = "192.168.4.74"
universe_start = 1
pixels = { start = 0, end = 680 }

[[output.endpoints]]
name = "right"
address = "192.168.4.75"
universe_start = 5
pixels = { start = 700, end = 1380 }

[logging]
level = "debug"
"#;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_dual_controller() {
    let file = write_config(DUAL_CONTROLLER);
    let config = BridgeConfig::load(file.path()).unwrap();

    assert_eq!(config.input.port, "/dev/ttyUSB1");
    assert_eq!(config.layout.banks.len(), 4);
    assert_eq!(config.layout.banks[3].channel, Some(20));
    assert_eq!(config.layout.addressable_pixels(), 1360);
    assert_eq!(config.output.mode, OutputMode::Unicast);
    assert_eq!(config.output.priority, 150);
    assert_eq!(config.logging.level, "debug");

    let summary = config.summary();
    assert!(summary.contains("left: 192.168.4.74 -> universes 1-4 (680 pixels)"));
    assert!(summary.contains("right: 192.168.4.75 -> universes 5-8 (680 pixels)"));
    assert!(summary.contains("Bank 3: pixels 1040..1380 (170 flames) on channel 20"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = BridgeConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[layout\ntotal_pixels = ");
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_overlapping_universes_fail_load() {
    let text = DUAL_CONTROLLER.replace("universe_start = 5", "universe_start = 4");
    let file = write_config(&text);
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(ConfigError::OverlappingUniverses { .. })
    ));
}

#[test]
fn test_bank_channel_out_of_range_fails_load() {
    let text = DUAL_CONTROLLER.replace("channel = 20", "channel = 600");
    let file = write_config(&text);
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(ConfigError::ChannelOutOfRange { channel: 600, .. })
    ));
}

#[test]
fn test_unrouted_pixel_fails_load() {
    let text = DUAL_CONTROLLER.replace("pixels = { start = 700, end = 1380 }", "pixels = { start = 720, end = 1380 }");
    let file = write_config(&text);
    assert!(matches!(
        BridgeConfig::load(file.path()),
        Err(ConfigError::UnroutedPixel { pixel: 700 })
    ));
}

#[test]
fn test_saved_config_reloads() {
    let file = write_config(DUAL_CONTROLLER);
    let config = BridgeConfig::load(file.path()).unwrap();

    let saved = write_config(&config.to_toml().unwrap());
    let reloaded = BridgeConfig::load(saved.path()).unwrap();
    assert_eq!(config, reloaded);
}

#[test]
fn test_shipped_example_is_valid() {
    let text = include_str!("../../../config/flamebridge.example.toml");
    let config = BridgeConfig::from_toml(text).unwrap();
    assert_eq!(config.output.endpoints.len(), 2);
    assert_eq!(config.layout.addressable_pixels(), 1360);
}
