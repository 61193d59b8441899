//! The module for the measurement loop.

use std::fmt::{Display, Formatter};
use std::sync::atomic::AtomicBool;
use log::{debug, info, warn};
use flukebeep_gpio::{GpioError, GpioPort};
use flukebeep_meter::buzzer::Buzzer;
use flukebeep_meter::keypad::{
    KeyEvent, KeyTable, KeypadDriver, KeypadScanner, MeterKey, Transition,
};
use flukebeep_meter::pins::{ConfigError, LineMasks};
use flukebeep_meter::reading::{ContinuityEvaluator, FrameFault, Reading, ReadingAssembler};
use flukebeep_meter::sampler::{DisplaySampler, SampleError};
use crate::config::Config;

/// What one pass over the display produced.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleResult {
    Reading { reading: Reading, continuity: bool },
    /// The frame could not be decoded consistently.
    Fault(FrameFault),
    /// A strobe never came; the meter is off or unplugged.
    NoSignal,
}

impl CycleResult {
    pub fn continuity(&self) -> bool {
        matches!(self, CycleResult::Reading { continuity: true, .. })
    }

    pub fn reading(&self) -> Option<&Reading> {
        match self {
            CycleResult::Reading { reading, .. } => Some(reading),
            _ => None,
        }
    }
}

impl Display for CycleResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleResult::Reading { reading, continuity } => {
                write!(f, "{}", reading)?;
                if *continuity {
                    write!(f, " *")?;
                }
                Ok(())
            }
            CycleResult::Fault(fault) => write!(f, "FAULT {}", fault),
            CycleResult::NoSignal => write!(f, "NO SIGNAL"),
        }
    }
}

/// The main app state struct.
pub struct App<'a> {
    masks: LineMasks,
    sampler: DisplaySampler<'a>,
    assembler: ReadingAssembler,
    evaluator: ContinuityEvaluator,
    scanner: KeypadScanner,
    driver: KeypadDriver<'a>,
    buzzer: &'a mut dyn Buzzer,
    startup_keys: Vec<MeterKey>,
    hold_cycles: u32,
    last_result: Option<CycleResult>,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(
        config: &Config,
        port: &'a dyn GpioPort,
        buzzer: &'a mut dyn Buzzer,
    ) -> Result<App<'a>, ConfigError> {
        let masks = config.pins.masks()?;
        Ok(App {
            masks,
            sampler: DisplaySampler::new(port, &masks)
                .with_settle(config.settle())
                .with_timeout(config.timeout()),
            assembler: ReadingAssembler::new(masks, config.polarity),
            evaluator: ContinuityEvaluator::new(config.threshold),
            scanner: KeypadScanner::new(&masks, config.key_table),
            driver: KeypadDriver::new(port, &masks),
            buzzer,
            startup_keys: config.startup_keys.clone(),
            hold_cycles: config.hold_cycles.max(1),
            last_result: None,
        })
    }

    pub fn key_table(&self) -> KeyTable {
        self.scanner.table()
    }

    /// Prepares the keypad bus and presses the configured startup keys.
    pub fn start(&mut self, stop: &AtomicBool) -> Result<(), SampleError> {
        self.driver.init()?;
        for key in self.startup_keys.clone() {
            info!("Pressing {} at startup", key);
            match self.press_key(key, stop) {
                Err(SampleError::NoSignal { .. }) => {
                    warn!("Could not press {}, the keypad is not being scanned", key)
                }
                result => {
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Runs one acquisition cycle and updates the buzzer.
    ///
    /// Signal loss and inconsistent frames are reported as a [CycleResult]; only a stop
    /// request or a port failure ends with an error.
    pub fn update(&mut self, stop: &AtomicBool) -> Result<CycleResult, SampleError> {
        let result = match self.sampler.acquire_frame(stop) {
            Ok(frame) => {
                let events = self.scanner.update(frame.keypad_snapshots());
                self.log_key_events(&events);

                match self.assembler.assemble(&frame) {
                    Ok(reading) => {
                        let continuity = self.evaluator.has_continuity(&reading);
                        CycleResult::Reading { reading, continuity }
                    }
                    Err(fault) => {
                        warn!("Dropping frame: {}", fault);
                        CycleResult::Fault(fault)
                    }
                }
            }
            Err(SampleError::NoSignal { digit, timeout }) => {
                warn!("No strobe on G{} for {:?}", digit, timeout);
                CycleResult::NoSignal
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.buzzer.set_buzzer(result.continuity()) {
            warn!("Failed to update buzzer: {}", e);
        }

        debug!("Cycle: {}", result);
        if self.last_result.as_ref() != Some(&result) {
            info!("{}", result);
        }
        self.last_result = Some(result.clone());
        Ok(result)
    }

    fn log_key_events(&self, events: &[KeyEvent]) {
        for event in events {
            let action = match event.transition {
                Transition::Pressed => "pressed",
                Transition::Released => "released",
            };
            match self.scanner.key_of(event) {
                Some(key) => info!("Key {} {}", key, action),
                None => debug!(
                    "Unmapped key at group {} column {} {}",
                    event.position.group, event.position.column, action
                ),
            }
        }
        if !events.is_empty() {
            debug!("Keys down: {:?}", self.scanner.pressed_keys());
        }
    }

    /// Presses `key` on the meter's keypad for the configured number of scans.
    ///
    /// The return line is only driven while the key's group is strobed and released
    /// as soon as the strobe drops. Returns `false` if the key is not on this model.
    pub fn press_key(&mut self, key: MeterKey, stop: &AtomicBool) -> Result<bool, SampleError> {
        let Some(position) = self.scanner.table().position_of(key) else {
            warn!("{} is not on the {:?} keypad", key, self.scanner.table());
            return Ok(false);
        };
        let group = position.group as usize;
        let strobe = self.masks.digits[group];

        let mut held = 0;
        while held < self.hold_cycles {
            self.sampler.wait_for_strobe(strobe, group, stop)?;
            if !self.driver.drive(position.group, 1 << position.column)? {
                // sit out this strobe; a bus stuck high times out here
                self.sampler.wait_for_strobe_end(strobe, group, stop)?;
                continue;
            }
            let waited = self.sampler.wait_for_strobe_end(strobe, group, stop);
            self.driver.release()?;
            waited?;
            held += 1;
        }
        debug!("Held {} for {} scans", key, held);
        Ok(true)
    }

    /// Runs until stopped, or until a replayed recording runs out.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), SampleError> {
        self.start(stop)?;
        let outcome = loop {
            match self.update(stop) {
                Ok(_) => {}
                Err(SampleError::Stopped) => break Ok(()),
                Err(SampleError::Gpio(GpioError::EndOfData)) => {
                    info!("End of recording.");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        if let Err(e) = self.buzzer.set_buzzer(false) {
            warn!("Failed to silence buzzer: {}", e);
        }
        outcome
    }
}
