//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements                | Connects to                 |
//! |-------------|---------------------------|-----------------------------|
//! | `http`      | HttpTransport             | ESP-IDF HTTPS client        |
//! | `log_sink`  | EventHandler              | Serial log output           |
//! | `nvs`       | ConfigPort, StoragePort   | NVS / in-memory store       |
//! | `wifi`      | ConnectivityPort          | ESP-IDF WiFi STA            |

#[cfg(target_os = "espidf")]
pub mod http;
pub mod log_sink;
pub mod nvs;
pub mod wifi;
