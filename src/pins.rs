//! GPIO / peripheral pin assignments for the composter main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Actuator outputs (relay drivers, active HIGH)
// ---------------------------------------------------------------------------

pub const MIXER_RELAY_GPIO: i32 = 25;
pub const CRUSHER_RELAY_GPIO: i32 = 33;
pub const FAN_RELAY_GPIO: i32 = 14;
/// Solenoid lock on the lid latch. HIGH = locked.
pub const LOCK_SOLENOID_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Single-wire humidity transducer.
pub const HUMIDITY_SENSOR_GPIO: i32 = 27;
/// One-wire temperature probe.
pub const TEMPERATURE_SENSOR_GPIO: i32 = 5;

/// HC-SR04 ultrasonic ranger above the pile.
pub const HC_SR04_TRIG_GPIO: i32 = 19;
pub const HC_SR04_ECHO_GPIO: i32 = 18;

/// Lid reed switch. HIGH = lid open.
pub const LID_SENSOR_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Front-panel buttons (active-low with external pull-ups)
// ---------------------------------------------------------------------------

pub const CRUSHER_BUTTON_GPIO: i32 = 35;
pub const MIXER_BUTTON_GPIO: i32 = 34;
pub const FAN_BUTTON_GPIO: i32 = 32;

/// Every assignment above, for the boot log and conflict checks.
pub const ASSIGNMENTS: [(&str, i32); 12] = [
    ("mixer relay", MIXER_RELAY_GPIO),
    ("crusher relay", CRUSHER_RELAY_GPIO),
    ("fan relay", FAN_RELAY_GPIO),
    ("lid lock", LOCK_SOLENOID_GPIO),
    ("humidity", HUMIDITY_SENSOR_GPIO),
    ("temperature", TEMPERATURE_SENSOR_GPIO),
    ("ranger trig", HC_SR04_TRIG_GPIO),
    ("ranger echo", HC_SR04_ECHO_GPIO),
    ("lid switch", LID_SENSOR_GPIO),
    ("mixer button", MIXER_BUTTON_GPIO),
    ("crusher button", CRUSHER_BUTTON_GPIO),
    ("fan button", FAN_BUTTON_GPIO),
];

/// GPIO 34-39 have no output driver on the ESP32.
pub const fn is_input_only(gpio: i32) -> bool {
    gpio >= 34 && gpio <= 39
}
