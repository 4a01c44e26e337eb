//! REST client for the realtime database.
//!
//! ## Authentication
//!
//! ```text
//!  login()            POST {sign_in_url}?key=…  {email, password, returnSecureToken}
//!                       → refreshToken
//!  refresh_access_token()
//!                     POST {token_url}?key=…    {grant_type, refresh_token}
//!                       → access_token
//! ```
//!
//! Data requests go to `{database_url}/composters/{id}.json?auth={access_token}`.
//! Any request that fails (transport error or non-200) gets exactly one
//! token refresh and one retry before the failure is returned.  Callers
//! retry on their next scheduled tick; there is no retry loop here.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::document::{ComposterDocument, DocumentPatch};
use crate::app::ports::{HttpResponse, HttpTransport, Method};
use crate::config::CloudConfig;
use crate::error::CloudError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    refresh_token: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// The token endpoint may rotate the refresh token.
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct CloudClient<T> {
    transport: T,
    config: CloudConfig,
    refresh_token: Option<String>,
    access_token: Option<String>,
}

impl<T: HttpTransport> CloudClient<T> {
    pub fn new(transport: T, config: CloudConfig) -> Self {
        Self {
            transport,
            config,
            refresh_token: None,
            access_token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign in with the configured account and obtain a first access token.
    pub fn login(&mut self) -> Result<(), CloudError> {
        let url = format!("{}?key={}", self.config.sign_in_url, self.config.api_key);
        let body = encode(&SignInRequest {
            email: &self.config.user_email,
            password: &self.config.user_password,
            return_secure_token: true,
        })?;
        let resp = self.transport.request(Method::Post, &url, Some(&body))?;
        if !resp.is_ok() {
            warn!("Cloud: sign-in rejected ({})", resp.status);
            return Err(CloudError::AuthFailed);
        }
        let signed_in: SignInResponse = decode(&resp)?;
        self.refresh_token = Some(signed_in.refresh_token);
        info!("Cloud: signed in as {}", self.config.user_email);
        self.refresh_access_token()
    }

    /// Exchange the refresh token for a new access token.
    pub fn refresh_access_token(&mut self) -> Result<(), CloudError> {
        let refresh = self.refresh_token.as_deref().ok_or(CloudError::NotAuthenticated)?;
        let url = format!("{}?key={}", self.config.token_url, self.config.api_key);
        let body = encode(&TokenRequest {
            grant_type: "refresh_token",
            refresh_token: refresh,
        })?;
        let resp = self.transport.request(Method::Post, &url, Some(&body))?;
        if !resp.is_ok() {
            warn!("Cloud: token refresh rejected ({})", resp.status);
            self.access_token = None;
            return Err(CloudError::AuthFailed);
        }
        let token: TokenResponse = decode(&resp)?;
        self.access_token = Some(token.access_token);
        if let Some(rotated) = token.refresh_token {
            self.refresh_token = Some(rotated);
        }
        debug!("Cloud: access token refreshed");
        Ok(())
    }

    /// Drop the session.
    pub fn logout(&mut self) {
        self.refresh_token = None;
        self.access_token = None;
    }

    fn document_url(&self, token: &str) -> String {
        format!(
            "{}{}.json?auth={}",
            self.config.database_url.trim_end_matches('/'),
            self.config.document_path(),
            token
        )
    }

    /// Send a document request, refreshing the token and retrying once
    /// on failure.
    fn authorized(&mut self, method: Method, body: Option<&[u8]>) -> Result<HttpResponse, CloudError> {
        let token = self.access_token.as_deref().ok_or(CloudError::NotAuthenticated)?;
        let url = self.document_url(token);
        match self.transport.request(method, &url, body) {
            Ok(resp) if resp.is_ok() => return Ok(resp),
            Ok(resp) => warn!("Cloud: {} returned {}, refreshing token", method.as_str(), resp.status),
            Err(e) => warn!("Cloud: {} failed ({}), refreshing token", method.as_str(), e),
        }

        self.refresh_access_token()?;
        let token = self.access_token.as_deref().ok_or(CloudError::NotAuthenticated)?;
        let url = self.document_url(token);
        let resp = self.transport.request(method, &url, body)?;
        if !resp.is_ok() {
            return Err(CloudError::HttpStatus(resp.status));
        }
        Ok(resp)
    }

    /// Fetch the document; `None` when it does not exist yet.
    pub fn get(&mut self) -> Result<Option<ComposterDocument>, CloudError> {
        let resp = self.authorized(Method::Get, None)?;
        decode(&resp)
    }

    pub fn put(&mut self, doc: &ComposterDocument) -> Result<(), CloudError> {
        let body = encode(doc)?;
        self.authorized(Method::Put, Some(&body)).map(drop)
    }

    pub fn patch(&mut self, patch: &DocumentPatch) -> Result<(), CloudError> {
        let body = encode(patch)?;
        self.authorized(Method::Patch, Some(&body)).map(drop)
    }

    /// Fetch the document, creating a default one if it is absent.
    pub fn read_or_create(&mut self) -> Result<ComposterDocument, CloudError> {
        if let Some(doc) = self.get()? {
            return Ok(doc);
        }
        let doc = ComposterDocument::default();
        self.put(&doc)?;
        info!("Cloud: created document {}", self.config.document_path());
        Ok(doc)
    }
}

fn encode<S: Serialize>(value: &S) -> Result<Vec<u8>, CloudError> {
    serde_json::to_vec(value).map_err(|_| CloudError::Encode)
}

fn decode<D: serde::de::DeserializeOwned>(resp: &HttpResponse) -> Result<D, CloudError> {
    serde_json::from_slice(&resp.body).map_err(|_| CloudError::Decode)
}
