use std::env::var_os;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use flukebeep_meter::buzzer::DEFAULT_FREQUENCY_HZ;
use flukebeep_meter::keypad::{KeyTable, MeterKey};
use flukebeep_meter::pins::{LinePolarity, PinMap};
use flukebeep_meter::reading::DEFAULT_THRESHOLD;
use flukebeep_meter::sampler::DEFAULT_SETTLE;

const DEFAULT_CONFIG_PATH: &str = "flukebeep.json";

/// Gets the config file path, from `FLUKEBEEP_CONFIG` or the default.
pub fn config_path() -> PathBuf {
    var_os("FLUKEBEEP_CONFIG")
        .unwrap_or_else(|| OsString::from(DEFAULT_CONFIG_PATH))
        .into()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BuzzerConfig {
    /// Index of the sysfs PWM chip, overridden by `FLUKEBEEP_PWM_CHIP`.
    pub chip: usize,
    /// Channels driving the piezo; every second one is inverted.
    pub channels: Vec<usize>,
    pub frequency_hz: u32,
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        BuzzerConfig {
            chip: 0,
            channels: vec![0, 1],
            frequency_hz: DEFAULT_FREQUENCY_HZ,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pins: PinMap,
    pub polarity: LinePolarity,
    pub settle_us: u64,
    /// Gives up on a missing strobe after this long; waits forever when unset.
    pub timeout_ms: Option<u64>,
    /// Continuity threshold in ohms.
    pub threshold: f64,
    pub key_table: KeyTable,
    pub buzzer: BuzzerConfig,
    /// Keys pressed once at startup, in order.
    pub startup_keys: Vec<MeterKey>,
    /// Number of keypad scans each emulated key press is held for.
    pub hold_cycles: u32,
}

impl Config {
    /// Loads the config from [config_path].
    ///
    /// A missing file gives `Ok(None)`; a file that exists but doesn't parse is an error.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> eyre::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn save(&self) -> eyre::Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> eyre::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pins: PinMap::default(),
            polarity: LinePolarity::default(),
            settle_us: DEFAULT_SETTLE.as_micros() as u64,
            timeout_ms: Some(1000),
            threshold: DEFAULT_THRESHOLD,
            key_table: KeyTable::default(),
            buzzer: BuzzerConfig::default(),
            startup_keys: vec![MeterKey::Ohms2Wire],
            hold_cycles: 4,
        }
    }
}
