mod app;
mod config;

use std::env::{var, var_os};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;
use flukebeep_gpio::{GpioPort, GpioResult};
use flukebeep_gpio::pwm::{PwmPin, SysfsPwmDriver};
use flukebeep_gpio::raw::RawGpioPort;
use flukebeep_gpio::replay::ReplayPort;
use flukebeep_meter::buzzer::{Buzzer, PwmBuzzer, SilentBuzzer};
use crate::app::App;
use crate::config::{BuzzerConfig, Config};

fn open_buzzer(driver: &SysfsPwmDriver, config: &BuzzerConfig) -> GpioResult<PwmBuzzer> {
    let pins = config
        .channels
        .iter()
        .map(|&channel| driver.get_pin(channel).map(|pin| Box::new(pin) as Box<dyn PwmPin>))
        .collect::<GpioResult<Vec<_>>>()?;
    PwmBuzzer::new(pins, config.frequency_hz)
}

/// Raises the returned flag on SIGINT or SIGTERM, so the loop can silence the buzzer
/// and release the port before exiting.
fn stop_on_signal() -> eyre::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("Stop requested.");
        handler_stop.store(true, Ordering::Relaxed);
    })?;
    Ok(stop)
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("FlukeBeep v.{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "System ver {} kernel ver {} on {} ({})",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    let stop = stop_on_signal()?;

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let replay = var_os("FLUKEBEEP_REPLAY");

    debug!("Initializing GPIO port...");
    let port: Box<dyn GpioPort> = match &replay {
        Some(path) => {
            info!("Replaying {:?} instead of reading the meter", path);
            Box::new(ReplayPort::load(path)?)
        }
        None => Box::new(RawGpioPort::new_gpiomem()?),
    };
    debug!("{:?} initialized.", port);

    let pwm_chip = match var("FLUKEBEEP_PWM_CHIP") {
        Ok(chip) => chip.parse()?,
        Err(_) => config.buzzer.chip,
    };
    let pwm = if replay.is_some() {
        None
    } else {
        SysfsPwmDriver::get_chip(pwm_chip)
            .inspect_err(|e| warn!("PWM chip {} unavailable: {}", pwm_chip, e))
            .ok()
    };
    let mut pwm_buzzer = pwm.as_ref().and_then(|driver| {
        open_buzzer(driver, &config.buzzer)
            .inspect_err(|e| warn!("Buzzer setup failed, continuing silently: {}", e))
            .ok()
    });
    let mut silent_buzzer = SilentBuzzer::default();
    let buzzer: &mut dyn Buzzer = match pwm_buzzer.as_mut() {
        Some(buzzer) => buzzer,
        None => &mut silent_buzzer,
    };
    debug!("{:?} initialized.", buzzer);

    let mut app = App::new(&config, &*port, buzzer)?;
    info!("Using the {:?} keypad layout.", app.key_table());

    info!("Starting main loop...");
    app.run(&stop)?;

    info!("FlukeBeep stopped.");
    Ok(())
}
