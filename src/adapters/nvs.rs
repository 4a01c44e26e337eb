//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`].  Every value is a
//! blob under `namespace/key`; structured values are postcard-encoded.
//!
//! | Namespace   | Key      | Contents                      |
//! |-------------|----------|-------------------------------|
//! | `composter` | `config` | [`ComposterConfig`]           |
//! | `wifi`      | `creds`  | [`WifiCredentials`]           |
//!
//! # Security
//!
//! - Config validation: all fields are range-checked before persistence.
//! - On ESP32 the `wifi` namespace lives on the encrypted NVS partition
//!   when `CONFIG_NVS_ENCRYPTION` is set.  The simulation backend is
//!   plaintext (dev/test only).
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{info, warn};

use super::wifi::WifiCredentials;
use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::ComposterConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "composter";
const CONFIG_KEY: &str = "config";
const WIFI_NAMESPACE: &str = "wifi";
const WIFI_KEY: &str = "creds";

/// Largest blob this adapter reads back.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                // SAFETY: as above.
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NVS names are C strings of at most 15 bytes.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let len = name.len().min(15);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(namespace: &str, write: bool, f: impl FnOnce(nvs_handle_t) -> Result<T, i32>) -> Result<T, i32> {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: `handle` was opened above and is not used after this.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t) -> Result<(), i32> {
        // SAFETY: `handle` is open for writing.
        let ret = unsafe { nvs_commit(handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        Ok(())
    }

    fn load_blob<T: serde::de::DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>, StorageError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(namespace, key, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len])
                .map(Some)
                .map_err(|_| StorageError::IoError),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── WiFi credentials ──────────────────────────────────────

    /// Read the stored station credentials, if any.  A blob that no longer
    /// passes [`WifiCredentials::new`] is reported as an I/O error.
    pub fn load_wifi_credentials(&self) -> Result<Option<WifiCredentials>, StorageError> {
        let Some(stored) = self.load_blob::<WifiCredentials>(WIFI_NAMESPACE, WIFI_KEY)? else {
            return Ok(None);
        };
        WifiCredentials::new(&stored.ssid, &stored.password).map(Some).map_err(|e| {
            warn!("NvsAdapter: stored WiFi credentials invalid ({})", e);
            StorageError::IoError
        })
    }

    pub fn save_wifi_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(credentials).map_err(|_| StorageError::IoError)?;
        self.write(WIFI_NAMESPACE, WIFI_KEY, &bytes)?;
        info!("NvsAdapter: WiFi credentials saved (SSID='{}')", credentials.ssid);
        Ok(())
    }

    pub fn forget_wifi_credentials(&mut self) -> Result<(), StorageError> {
        self.delete(WIFI_NAMESPACE, WIFI_KEY)
    }
}

/// Range checks applied before a config is persisted.
pub fn validate_config(cfg: &ComposterConfig) -> Result<(), ConfigError> {
    if !(20.0..=100.0).contains(&cfg.max_humidity_percent) {
        return Err(ConfigError::ValidationFailed("max_humidity_percent must be 20–100"));
    }
    if !(10.0..=70.0).contains(&cfg.max_temperature_c) {
        return Err(ConfigError::ValidationFailed("max_temperature_c must be 10–70"));
    }
    if cfg.unstable_poll_ms == 0 || cfg.unstable_poll_ms > cfg.stable_poll_ms {
        return Err(ConfigError::ValidationFailed(
            "unstable_poll_ms must be non-zero and <= stable_poll_ms",
        ));
    }
    if cfg.sensor_failure_threshold == 0 {
        return Err(ConfigError::ValidationFailed("sensor_failure_threshold must be >= 1"));
    }
    if !(cfg.full_distance_cm > 0.0 && cfg.full_distance_cm < cfg.empty_distance_cm) {
        return Err(ConfigError::ValidationFailed(
            "full_distance_cm must be > 0 and < empty_distance_cm",
        ));
    }
    if !(50.0..=100.0).contains(&cfg.full_threshold_percent) {
        return Err(ConfigError::ValidationFailed("full_threshold_percent must be 50–100"));
    }
    if cfg.mixer_check_ms == 0 || cfg.mixer_max_run_ms < cfg.mixer_check_ms {
        return Err(ConfigError::ValidationFailed(
            "mixer_max_run_ms must cover at least one mixer check",
        ));
    }
    if cfg.fan_check_ms == 0 || cfg.fan_max_run_ms < cfg.fan_check_ms {
        return Err(ConfigError::ValidationFailed(
            "fan_max_run_ms must cover at least one fan check",
        ));
    }
    if !(10_000..=10 * 60_000).contains(&cfg.crusher_safety_ms) {
        return Err(ConfigError::ValidationFailed("crusher_safety_ms must be 10 s – 10 min"));
    }
    if !(10..=1000).contains(&cfg.timer_tick_ms) {
        return Err(ConfigError::ValidationFailed("timer_tick_ms must be 10–1000"));
    }
    if cfg.override_poll_ms < 500 || cfg.cloud_push_ms < 60_000 {
        return Err(ConfigError::ValidationFailed(
            "override_poll_ms must be >= 500 and cloud_push_ms >= 60000",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ComposterConfig, ConfigError> {
        match self.load_blob::<ComposterConfig>(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(Some(cfg)) => {
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(ComposterConfig::default())
            }
            Err(StorageError::IoError) => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(ComposterConfig::default())
            }
        }
    }

    fn save(&self, config: &ComposterConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| match e {
            StorageError::Full => ConfigError::StorageFull,
            _ => ConfigError::IoError,
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl NvsAdapter {
    /// Shared write path; `&self` because the config port is read-mostly.
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_handle(namespace, true, |handle| {
                // SAFETY: `k` is NUL-terminated; `data` is valid for its length.
                let ret = unsafe { nvs_set_blob(handle, k.as_ptr() as *const _, data.as_ptr() as *const _, data.len()) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Self::commit(handle)
            })
            .map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let data = store
                .get(&Self::composite_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_handle(namespace, false, |handle| {
                let mut size = buf.len();
                // SAFETY: `buf` is valid for `size` bytes; `k` is NUL-terminated.
                let ret = unsafe { nvs_get_blob(handle, k.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            })
            .map_err(|e| {
                if e == ESP_ERR_NVS_NOT_FOUND {
                    StorageError::NotFound
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_handle(namespace, true, |handle| {
                // SAFETY: `k` is NUL-terminated.
                let ret = unsafe { nvs_erase_key(handle, k.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                Self::commit(handle)
            })
            .map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let k = Self::c_name(key);
            Self::with_handle(namespace, false, |handle| {
                // SAFETY: `k` is NUL-terminated; a null type pointer is allowed.
                let ret = unsafe { nvs_find_key(handle, k.as_ptr() as *const _, core::ptr::null_mut()) };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}
