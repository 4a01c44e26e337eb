//! System configuration parameters
//!
//! All tunable parameters for the composter.  The control configuration
//! is persisted in NVS as a postcard blob (see
//! [`NvsAdapter`](crate::adapters::nvs::NvsAdapter)); cloud account
//! settings are baked in at build time.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// How many fill levels the capacity classifier distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityLevels {
    /// `NotFull` / `Full`.
    Two,
    /// `Empty` / `Partial` / `Full`.
    Three,
}

/// Core control configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposterConfig {
    // --- Humidity / temperature ---
    /// Relative humidity (%) above which the pile is unstable
    pub max_humidity_percent: f32,
    /// Temperature (Celsius) above which the pile is unstable
    pub max_temperature_c: f32,
    /// Poll period while the reading is stable (milliseconds)
    pub stable_poll_ms: u32,
    /// Poll period while the reading is unstable (milliseconds)
    pub unstable_poll_ms: u32,
    /// Retry delay after a single failed read (milliseconds)
    pub sensor_retry_ms: u32,
    /// Consecutive read failures before the driver is reset
    pub sensor_failure_threshold: u8,
    /// Poll period right after a driver reset (milliseconds)
    pub sensor_backoff_ms: u32,

    // --- Capacity ---
    /// Echo distance (cm) at or below which the bin is full
    pub full_distance_cm: f32,
    /// Echo distance (cm) at or above which the bin is empty
    pub empty_distance_cm: f32,
    /// Two- or three-level classification
    pub capacity_levels: CapacityLevels,
    /// Completion (%) at or above which the lid stays locked
    pub full_threshold_percent: f32,
    /// Capacity sample period (milliseconds)
    pub capacity_poll_ms: u32,
    /// Re-assert period while full (milliseconds)
    pub full_reassert_ms: u32,

    // --- Actuators ---
    /// Routine mixing period (milliseconds)
    pub mixer_routine_ms: u32,
    /// Mixer stability-check period (milliseconds)
    pub mixer_check_ms: u32,
    /// Longest a single mixer run may last (milliseconds)
    pub mixer_max_run_ms: u32,
    /// Fan stability-check period (milliseconds)
    pub fan_check_ms: u32,
    /// Longest a single fan run may last (milliseconds)
    pub fan_max_run_ms: u32,
    /// Crusher safety stop period (milliseconds)
    pub crusher_safety_ms: u32,

    // --- Timing ---
    /// Lid switch poll period (milliseconds)
    pub lid_poll_ms: u32,
    /// Timer service resolution (milliseconds)
    pub timer_tick_ms: u32,
    /// Cloud document push period (milliseconds)
    pub cloud_push_ms: u32,
    /// Manual-override poll period (milliseconds)
    pub override_poll_ms: u32,
    /// Minimum gap between sign-in attempts while degraded (milliseconds)
    pub reauth_interval_ms: u32,
}

impl ComposterConfig {
    pub fn stable_poll(&self) -> Duration {
        ms(self.stable_poll_ms)
    }

    pub fn unstable_poll(&self) -> Duration {
        ms(self.unstable_poll_ms)
    }

    pub fn sensor_retry(&self) -> Duration {
        ms(self.sensor_retry_ms)
    }

    pub fn sensor_backoff(&self) -> Duration {
        ms(self.sensor_backoff_ms)
    }
}

/// Millisecond config field to [`Duration`].
pub const fn ms(value: u32) -> Duration {
    Duration::from_millis(value as u64)
}

const HOUR_MS: u32 = 60 * 60 * 1000;
const MINUTE_MS: u32 = 60 * 1000;

impl Default for ComposterConfig {
    fn default() -> Self {
        Self {
            // Humidity / temperature
            max_humidity_percent: 60.0,
            max_temperature_c: 30.0,
            stable_poll_ms: 10 * MINUTE_MS,
            unstable_poll_ms: 2 * MINUTE_MS,
            sensor_retry_ms: 2_000,
            sensor_failure_threshold: 5,
            sensor_backoff_ms: 5 * MINUTE_MS,

            // Capacity
            full_distance_cm: 10.0,
            empty_distance_cm: 30.0,
            capacity_levels: CapacityLevels::Two,
            full_threshold_percent: 90.0,
            capacity_poll_ms: 2_000,
            full_reassert_ms: 30 * MINUTE_MS,

            // Actuators
            mixer_routine_ms: 6 * HOUR_MS,
            mixer_check_ms: 2 * MINUTE_MS,
            mixer_max_run_ms: 30 * MINUTE_MS,
            fan_check_ms: 2 * MINUTE_MS,
            fan_max_run_ms: 60 * MINUTE_MS,
            crusher_safety_ms: 2 * MINUTE_MS,

            // Timing
            lid_poll_ms: 100,
            timer_tick_ms: 100,
            cloud_push_ms: 6 * HOUR_MS,
            override_poll_ms: 1_000,
            reauth_interval_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Cloud account settings
// ---------------------------------------------------------------------------

/// Realtime-database account settings.
///
/// Defaults come from the build environment so secrets never live in the
/// source tree:
///
/// ```text
/// COMPOSTER_API_KEY, COMPOSTER_DATABASE_URL, COMPOSTER_ID,
/// COMPOSTER_USER_EMAIL, COMPOSTER_USER_PASSWORD
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub api_key: String,
    /// Base URL of the realtime database, with or without trailing slash.
    pub database_url: String,
    /// Composter identifier; the document lives at `/composters/{id}`.
    pub composter_id: String,
    pub sign_in_url: String,
    pub token_url: String,
    pub user_email: String,
    pub user_password: String,
}

const SIGN_IN_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";
const TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

impl CloudConfig {
    /// Path of the composter document, relative to the database root.
    pub fn document_path(&self) -> String {
        format!("/composters/{}", self.composter_id)
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: option_env!("COMPOSTER_API_KEY").unwrap_or("API_KEY").into(),
            database_url: option_env!("COMPOSTER_DATABASE_URL")
                .unwrap_or("https://autocompost-default-rtdb.firebaseio.com")
                .into(),
            composter_id: option_env!("COMPOSTER_ID").unwrap_or("000002").into(),
            sign_in_url: SIGN_IN_URL.into(),
            token_url: TOKEN_URL.into(),
            user_email: option_env!("COMPOSTER_USER_EMAIL")
                .unwrap_or("composter@example.com")
                .into(),
            user_password: option_env!("COMPOSTER_USER_PASSWORD")
                .unwrap_or("PASSWORD")
                .into(),
        }
    }
}
