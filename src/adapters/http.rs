//! ESP-IDF HTTPS transport.
//!
//! One [`EspHttpConnection`] is kept open between requests (keep-alive)
//! and rebuilt after any transport error.  Server certificates are checked
//! against the IDF certificate bundle.

use core::time::Duration;

use esp_idf_svc::http::Method as EspMethod;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::{debug, warn};

use crate::app::ports::{HttpResponse, HttpTransport, Method};
use crate::error::TransportError;

/// Largest response body kept; the composter document is well under this.
const MAX_BODY: usize = 4096;

pub struct EspHttpTransport {
    timeout: Duration,
    conn: Option<EspHttpConnection>,
}

impl EspHttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, conn: None }
    }

    fn connection(&mut self) -> Result<&mut EspHttpConnection, TransportError> {
        if self.conn.is_none() {
            let conn = EspHttpConnection::new(&Configuration {
                timeout: Some(self.timeout),
                crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
                ..Default::default()
            })
            .map_err(|e| {
                warn!("HTTP: connection setup failed: {:?}", e);
                TransportError::Connect
            })?;
            self.conn = Some(conn);
        }
        self.conn.as_mut().ok_or(TransportError::Connect)
    }

    fn exchange(&mut self, method: Method, url: &str, body: Option<&[u8]>) -> Result<HttpResponse, TransportError> {
        let conn = self.connection()?;
        let len = body.map_or(0, <[u8]>::len).to_string();
        let headers = [("content-type", "application/json"), ("content-length", len.as_str())];
        let method = match method {
            Method::Get => EspMethod::Get,
            Method::Put => EspMethod::Put,
            Method::Patch => EspMethod::Patch,
            Method::Post => EspMethod::Post,
        };

        conn.initiate_request(method, url, &headers)
            .map_err(|_| TransportError::Connect)?;
        let mut rest = body.unwrap_or_default();
        while !rest.is_empty() {
            let n = conn.write(rest).map_err(|_| TransportError::Io)?;
            if n == 0 {
                return Err(TransportError::Io);
            }
            rest = &rest[n..];
        }
        conn.initiate_response().map_err(|_| TransportError::Timeout)?;

        let status = conn.status();
        let mut out = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let n = conn.read(&mut buf).map_err(|_| TransportError::Io)?;
            if n == 0 {
                break;
            }
            if out.len() + n > MAX_BODY {
                warn!("HTTP: response body truncated at {} bytes", MAX_BODY);
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        debug!("HTTP: {} -> {} ({} bytes)", url.split('?').next().unwrap_or(url), status, out.len());
        Ok(HttpResponse { status, body: out })
    }
}

impl HttpTransport for EspHttpTransport {
    fn request(&mut self, method: Method, url: &str, body: Option<&[u8]>) -> Result<HttpResponse, TransportError> {
        let result = self.exchange(method, url, body);
        if result.is_err() {
            // Half-finished exchanges leave the connection unusable.
            self.conn = None;
        }
        result
    }
}
