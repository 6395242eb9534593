use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "pio" or "jtag_uart"
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl PeripheralConfig {
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(|v| v.as_u64())
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Bytes of address space the peripheral decodes. Without an explicit
    /// `size`, a PIO spans its six registers and a JTAG UART its two.
    pub fn window_size(&self) -> Result<u64> {
        match &self.size {
            Some(s) => parse_size(s).with_context(|| format!("Peripheral '{}'", self.id)),
            None if self.r#type == "jtag_uart" => Ok(0x08),
            None => Ok(0x10),
        }
    }
}

/// Soft-core system as laid out in the FPGA design.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardDescriptor {
    pub name: String,
    #[serde(default)]
    pub arch: Option<String>, // e.g. "nios-v"
    pub peripherals: Vec<PeripheralConfig>,
    /// Peripheral id of the switch PIO.
    pub switches: String,
    /// Peripheral id of the LED PIO.
    pub leds: String,
    /// Peripheral id of the JTAG UART, if the design has one.
    #[serde(default)]
    pub console: Option<String>,
}

impl BoardDescriptor {
    /// Terasic DE10-Lite reference design: 8 switches, 8 LEDs, JTAG UART.
    /// Addresses match the firmware's `system.h` constants.
    pub fn de10_lite() -> Self {
        let pio = |id: &str, base: u64, direction: &str| PeripheralConfig {
            id: id.to_string(),
            r#type: "pio".to_string(),
            base_address: base,
            size: Some("16B".to_string()),
            config: HashMap::from([
                ("width".to_string(), serde_yaml::Value::from(8u64)),
                ("direction".to_string(), serde_yaml::Value::from(direction)),
            ]),
        };
        Self {
            name: "de10-lite".to_string(),
            arch: Some("nios-v".to_string()),
            peripherals: vec![
                pio("switches", 0x0008_1010, "input"),
                pio("leds", 0x0008_1020, "output"),
                PeripheralConfig {
                    id: "jtag_uart".to_string(),
                    r#type: "jtag_uart".to_string(),
                    base_address: 0x0008_1030,
                    size: Some("8B".to_string()),
                    config: HashMap::new(),
                },
            ],
            switches: "switches".to_string(),
            leds: "leds".to_string(),
            console: Some("jtag_uart".to_string()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path.as_ref()))?;
        let board: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Descriptor")?;
        board.validate()?;
        Ok(board)
    }

    pub fn peripheral(&self, id: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.id == id)
    }

    pub fn validate(&self) -> Result<()> {
        for role in [&self.switches, &self.leds] {
            match self.peripheral(role) {
                Some(p) if p.r#type == "pio" => {}
                Some(p) => anyhow::bail!(
                    "Peripheral '{}' must be of type 'pio', found '{}'",
                    role,
                    p.r#type
                ),
                None => anyhow::bail!("Board references unknown peripheral '{}'", role),
            }
        }

        // The loop reads the switch pins and drives the LED pins; a PIO
        // wired the other way round never shows the switch level.
        let wrong_way: [(&String, &[&str]); 2] = [
            (&self.switches, &["output", "out"]),
            (&self.leds, &["input", "in"]),
        ];
        for (role, forbidden) in wrong_way {
            // A PIO without a direction is an input.
            let direction = self
                .peripheral(role)
                .and_then(|p| p.config_str("direction"))
                .unwrap_or("input")
                .trim()
                .to_ascii_lowercase();
            if forbidden.contains(&direction.as_str()) {
                anyhow::bail!(
                    "Peripheral '{}' cannot have direction '{}' in this role",
                    role,
                    direction
                );
            }
        }

        if let Some(console) = &self.console {
            match self.peripheral(console) {
                Some(p) if p.r#type == "jtag_uart" => {}
                Some(p) => anyhow::bail!(
                    "Console '{}' must be of type 'jtag_uart', found '{}'",
                    console,
                    p.r#type
                ),
                None => anyhow::bail!("Board references unknown console '{}'", console),
            }
        }

        for p in &self.peripherals {
            if let Some(width) = p.config.get("width") {
                match width.as_u64() {
                    Some(w) if (1..=32).contains(&w) => {}
                    _ => anyhow::bail!("Peripheral '{}': width must be between 1 and 32", p.id),
                }
            }
            let size = p.window_size()?;
            if p.base_address.checked_add(size).is_none() {
                anyhow::bail!(
                    "Peripheral '{}': window {:#x} + {:#x} runs past the end of the address space",
                    p.id,
                    p.base_address,
                    size
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInputs {
    /// Board descriptor path, relative to the script. Defaults to the
    /// built-in DE10-Lite layout.
    #[serde(default)]
    pub board: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    pub max_iterations: u64,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    WallTime,
    BusFault,
}

/// Switch position held for `hold` consecutive loop iterations.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Stimulus {
    pub switches: u64,
    #[serde(default = "default_hold")]
    pub hold: u64,
}

fn default_hold() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConsoleContainsAssertion {
    pub console_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FinalLedsAssertion {
    pub final_leds: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MirrorHoldsAssertion {
    pub mirror_holds: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    ConsoleContains(ConsoleContainsAssertion),
    FinalLeds(FinalLedsAssertion),
    MirrorHolds(MirrorHoldsAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    pub schema_version: String,
    #[serde(default)]
    pub inputs: ScenarioInputs,
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub stimulus: Vec<Stimulus>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl ScenarioScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Scenario Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_iterations == 0 {
            anyhow::bail!("Limit 'max_iterations' must be greater than zero");
        }

        if self.limits.wall_time_ms == Some(0) {
            anyhow::bail!("Limit 'wall_time_ms' must be greater than zero when set");
        }

        for (i, s) in self.stimulus.iter().enumerate() {
            if s.switches > u32::MAX as u64 {
                anyhow::bail!(
                    "Stimulus #{}: switches value {:#x} does not fit a 32-bit port",
                    i,
                    s.switches
                );
            }
            if s.hold == 0 {
                anyhow::bail!("Stimulus #{}: 'hold' must be greater than zero", i);
            }
        }

        Ok(())
    }

    /// Switch value to present on iteration `n`. The last stimulus stays in
    /// place once the list runs out; with no stimulus the switches read 0.
    pub fn switches_at(&self, n: u64) -> u32 {
        let mut start = 0u64;
        for s in &self.stimulus {
            let end = start.saturating_add(s.hold);
            if n < end {
                return s.switches as u32;
            }
            start = end;
        }
        self.stimulus.last().map(|s| s.switches as u32).unwrap_or(0)
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

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"
name: "de10-lite"
arch: "nios-v"
switches: "switches"
leds: "leds"
console: "jtag_uart"
peripherals:
  - id: "switches"
    type: "pio"
    base_address: 0x81010
    size: "16B"
    config:
      width: 10
      direction: "input"
  - id: "leds"
    type: "pio"
    base_address: 0x81020
    config:
      width: 8
      direction: "output"
  - id: "jtag_uart"
    type: "jtag_uart"
    base_address: 0x81030
    size: "8B"
"#;

    #[test]
    fn test_valid_board() {
        let board: BoardDescriptor = serde_yaml::from_str(BOARD).unwrap();
        assert!(board.validate().is_ok());
        let sw = board.peripheral("switches").unwrap();
        assert_eq!(sw.base_address, 0x81010);
        assert_eq!(sw.config_u64("width"), Some(10));
        assert_eq!(sw.config_str("direction"), Some("input"));
        assert_eq!(parse_size(sw.size.as_deref().unwrap()).unwrap(), 16);
    }

    #[test]
    fn test_default_board_is_valid() {
        let board = BoardDescriptor::de10_lite();
        assert!(board.validate().is_ok());
        assert_eq!(board.peripheral("leds").unwrap().config_u64("width"), Some(8));
    }

    #[test]
    fn test_board_unknown_role() {
        let yaml = BOARD.replace("leds: \"leds\"", "leds: \"ledz\"");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("ledz"));
    }

    #[test]
    fn test_board_console_must_be_uart() {
        let yaml = BOARD.replace("console: \"jtag_uart\"", "console: \"leds\"");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("jtag_uart"));
    }

    #[test]
    fn test_board_rejects_wide_pio() {
        let yaml = BOARD.replace("width: 10", "width: 40");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn test_board_switches_must_not_be_output() {
        let yaml = BOARD.replace("direction: \"input\"", "direction: \"output\"");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("switches"));

        let mut board = BoardDescriptor::de10_lite();
        for p in &mut board.peripherals {
            if p.id == "switches" {
                p.config
                    .insert("direction".to_string(), serde_yaml::Value::from("Out"));
            }
        }
        assert!(board.validate().is_err());
    }

    #[test]
    fn test_board_leds_must_not_be_input() {
        let yaml = BOARD.replace("direction: \"output\"", "direction: \"input\"");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("leds"));

        let mut board = BoardDescriptor::de10_lite();
        for p in &mut board.peripherals {
            if p.id == "leds" {
                p.config.remove("direction");
            }
        }
        assert!(board.validate().is_err());
    }

    #[test]
    fn test_board_bidir_roles_are_accepted() {
        let yaml = BOARD
            .replace("direction: \"input\"", "direction: \"bidir\"")
            .replace("direction: \"output\"", "direction: \"inout\"");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_board_window_past_end_of_address_space() {
        let yaml = BOARD.replace("base_address: 0x81010", "base_address: 0xFFFFFFFFFFFFFFF8");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        let err = board.validate().unwrap_err();
        assert!(err.to_string().contains("address space"));

        // The default window counts too when no size is given.
        let yaml = BOARD.replace("base_address: 0x81020", "base_address: 0xFFFFFFFFFFFFFFF8");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert!(board.validate().is_err());

        // A window whose last byte sits just below the top still fits.
        let yaml = BOARD.replace("base_address: 0x81010", "base_address: 0xFFFFFFFFFFFFFFEF");
        let board: BoardDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_window_size_defaults() {
        let board: BoardDescriptor = serde_yaml::from_str(BOARD).unwrap();
        assert_eq!(board.peripheral("leds").unwrap().window_size().unwrap(), 0x10);
        assert_eq!(board.peripheral("jtag_uart").unwrap().window_size().unwrap(), 8);
    }

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  board: "board.yaml"
limits:
  max_iterations: 4
  wall_time_ms: 5000
stimulus:
  - switches: 0xFF
  - switches: 0x01
    hold: 3
assertions:
  - console_contains: "Starting"
  - final_leds: 0x01
  - mirror_holds: true
  - expected_stop_reason: max_iterations
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.inputs.board.as_deref(), Some("board.yaml"));
        assert_eq!(script.limits.max_iterations, 4);
        assert_eq!(script.stimulus[0].hold, 1);
        assert_eq!(script.assertions.len(), 4);
        assert!(matches!(
            script.assertions[2],
            ScenarioAssertion::MirrorHolds(MirrorHoldsAssertion { mirror_holds: true })
        ));
    }

    #[test]
    fn test_switches_at_follows_holds() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 10
stimulus:
  - switches: 0xFF
    hold: 2
  - switches: 0x2A
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.switches_at(0), 0xFF);
        assert_eq!(script.switches_at(1), 0xFF);
        assert_eq!(script.switches_at(2), 0x2A);
        // Last position stays put.
        assert_eq!(script.switches_at(9), 0x2A);
    }

    #[test]
    fn test_switches_at_without_stimulus() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 1
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.switches_at(0), 0);
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
limits:
  max_iterations: 100
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_invalid_max_iterations() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 0
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn test_zero_hold() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 1
stimulus:
  - switches: 1
    hold: 0
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("hold"));
    }

    #[test]
    fn test_oversized_stimulus() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 1
stimulus:
  - switches: 0x100000000
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("32-bit"));
    }
}
