//! AutoCompost Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Dht22 · Ds18b20 · Hcsr04 LidMonitor   ButtonPanel             │
//! │  (SensorPort)             (Lid edges)  (ManualOn / ManualOff)  │
//! │  NvsAdapter               WifiAdapter  EspHttpTransport        │
//! │  (Config + credentials)   (Connectivity) (HttpTransport)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   ComposterCore: ParameterStore · EventBus · Timers    │    │
//! │  │   Lock · Crusher · Mixer · Fan · CloudLink             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Classifier threads (App core) · Cloud task (Pro core)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyOutputPin, InputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use autocompost::actuators::Actuator;
use autocompost::adapters::http::EspHttpTransport;
use autocompost::adapters::nvs::NvsAdapter;
use autocompost::adapters::wifi::{ConnectivityMonitor, ConnectivityPort, WifiAdapter};
use autocompost::app::ports::ConfigPort;
use autocompost::app::{ComposterCore, OutputPins};
use autocompost::cloud::tasks::{self, SyncSchedule};
use autocompost::cloud::{CloudClient, CloudSync};
use autocompost::config::{CloudConfig, ComposterConfig, ms};
use autocompost::drivers::button::ButtonPanel;
use autocompost::drivers::dht22::Dht22;
use autocompost::drivers::ds18b20::Ds18b20;
use autocompost::drivers::ultrasonic::Hcsr04;
use autocompost::params::ParameterStore;
use autocompost::pins;
use autocompost::sensors::{CapacityClassifier, LidMonitor, Quantity, StabilityClassifier};

type Relay = PinDriver<'static, AnyOutputPin, Output>;

/// Request timeout for every cloud call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const BUTTON_POLL: Duration = Duration::from_millis(10);
const WIFI_POLL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AutoCompost v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    for (what, gpio) in pins::ASSIGNMENTS {
        debug!("Pin map: {:<15} GPIO{}", what, gpio);
    }

    let peripherals = Peripherals::take()?;
    let io = peripherals.pins;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Config + credentials from NVS ──────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ComposterConfig::default()
        }
    };
    let credentials = nvs.load_wifi_credentials().unwrap_or_else(|e| {
        warn!("WiFi credentials unreadable ({})", e);
        None
    });

    // ── 3. Core: store, bus, timers, controllers ──────────────
    let store = Arc::new(ParameterStore::new());
    let relay = |pin: AnyOutputPin| -> Result<Relay> { Ok(PinDriver::output(pin)?) };
    let outputs = OutputPins {
        mixer: relay(io.gpio25.downgrade_output())?,
        crusher: relay(io.gpio33.downgrade_output())?,
        fan: relay(io.gpio14.downgrade_output())?,
        lock: relay(io.gpio12.downgrade_output())?,
    };
    let core = ComposterCore::new(outputs, store.clone(), &config)?;
    let bus = core.bus().clone();
    core.timers().spawn(ms(config.timer_tick_ms))?;
    core.start();

    // ── 4. Sensors ────────────────────────────────────────────
    let hygrometer = Dht22::new(PinDriver::input_output_od(io.gpio27)?, Ets);
    StabilityClassifier::new(Quantity::Humidity, hygrometer, store.clone(), &config).spawn(bus.clone(), "humidity\0")?;
    let thermometer = Ds18b20::new(PinDriver::input_output_od(io.gpio5)?, Ets);
    StabilityClassifier::new(Quantity::Temperature, thermometer, store.clone(), &config)
        .spawn(bus.clone(), "temperature\0")?;

    let ranger = Hcsr04::new(PinDriver::output(io.gpio19)?, PinDriver::input(io.gpio18)?, Ets);
    CapacityClassifier::new(ranger, store.clone(), &bus, core.timers(), &config)?.spawn(bus.clone())?;

    LidMonitor::new(PinDriver::input(io.gpio26)?, true, store.clone()).spawn(bus.clone(), ms(config.lid_poll_ms))?;

    // ── 5. Front panel ────────────────────────────────────────
    ButtonPanel::new()
        .with(PinDriver::input(io.gpio34.downgrade_input())?, Actuator::Mixer)
        .with(PinDriver::input(io.gpio35.downgrade_input())?, Actuator::Crusher)
        .with(PinDriver::input(io.gpio32.downgrade_input())?, Actuator::Fan)
        .spawn(bus.clone(), BUTTON_POLL)?;

    // ── 6. Cloud sync ─────────────────────────────────────────
    let client = CloudClient::new(EspHttpTransport::new(HTTP_TIMEOUT), CloudConfig::default());
    let sync = CloudSync::new(client, store.clone(), ms(config.reauth_interval_ms));
    tasks::spawn(
        sync,
        bus.clone(),
        core.cloud_link().commands(),
        SyncSchedule::from_config(&config),
    )?;

    // ── 7. Connectivity ───────────────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?);
    match credentials {
        Some(creds) => wifi.set_credentials(&creds),
        None => warn!("No WiFi credentials stored, running offline"),
    }
    ConnectivityMonitor::new(wifi).spawn(bus, WIFI_POLL)?;

    info!("AutoCompost running ({} timers armed)", core.timers().active_count());

    // Worker threads own everything else; keep the core (and its timer
    // handles) alive.
    loop {
        std::thread::sleep(Duration::from_secs(60));
        let p = store.snapshot();
        info!(
            "Status: complete={:.0}% days={} humidity={:.1} temperature={:.1} locked={}",
            p.completion, p.days, p.humidity, p.temperature, p.locked
        );
    }
}
