//! API client for the PBX administrative HTTP API.
//!
//! This module provides the `ApiClient` struct, which logs in, triggers
//! backups, polls the backup list, downloads artifacts and deletes them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::{Stream, StreamExt};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::auth::{AuthenticatedSession, Credentials};
use crate::models::{
    default_backup_filename, BackupContents, BackupReadiness, BackupRecord, BackupTrigger,
    PollPolicy,
};

use super::endpoint::ServerEndpoint;
use super::observer::{HttpExchange, HttpObserver, TracingObserver};
use super::user_agent::firefox_user_agent;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/webclient/api/Login/GetAccessToken";
const TOKEN_PATH: &str = "/connect/token";
const BACKUPS_PATH: &str = "/xapi/v1/Backups";
const BACKUP_TRIGGER_PATH: &str = "/xapi/v1/Backups/Pbx.Backup";

/// Client identifier the web client uses for the token exchange.
const TOKEN_CLIENT_ID: &str = "Webclient";

const AUTH_SUCCESS_STATUS: &str = "AuthSuccess";
const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Error detail the server returns when a backup with the same name exists.
const DUPLICATE_MARKER: &str = "WARNINGS.XAPI.DUPLICATE";

/// Page size for the backup list. Later pages are not fetched.
const BACKUP_LIST_LIMIT: u32 = 50;

/// Fields requested from the backup list. Ordering is left to the server:
/// `$orderby=CreationTime desc` is mangled by the server's decoding of `+`.
const BACKUP_LIST_FIELDS: &str = "CreationTime,Size,FileName,DownloadLink";

/// HTTP request timeout in seconds for API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for a whole artifact download. Backups with voicemail can be large.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Write buffer size for downloads.
const DOWNLOAD_CHUNK_SIZE: usize = 8192;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginRequest<'a> {
    re_captcha_response: Option<&'a str>,
    security_code: &'a str,
    password: &'a str,
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Token", default)]
    token: Option<LoginToken>,
}

#[derive(Debug, Deserialize)]
struct LoginToken {
    token_type: String,
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
struct BackupRequest<'a> {
    description: BackupDescription<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BackupDescription<'a> {
    name: &'a str,
    contents: BackupContents,
}

#[derive(Debug, Deserialize)]
struct BackupListResponse {
    #[serde(default)]
    value: Vec<BackupRecord>,
}

#[derive(Debug, Deserialize)]
struct ODataErrorResponse {
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    #[serde(default)]
    details: Vec<ODataErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ODataErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Status and body of a buffered response.
struct Reply {
    status: StatusCode,
    body: String,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

/// API client for one PBX server.
/// Clone is cheap - clones share the connection pool and cookie jar.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: ServerEndpoint,
    options: ClientOptions,
    user_agent: String,
    observer: Arc<dyn HttpObserver>,
}

impl ApiClient {
    /// Create a new API client with default timeouts
    pub fn new(endpoint: ServerEndpoint) -> Result<Self, ApiError> {
        Self::with_options(endpoint, ClientOptions::default())
    }

    pub fn with_options(endpoint: ServerEndpoint, options: ClientOptions) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            options,
            user_agent: firefox_user_agent(),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the sink that receives request/response debug records.
    pub fn with_observer(mut self, observer: Arc<dyn HttpObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    // ------------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------------

    /// Log in and exchange the refresh token for the bearer token used by
    /// every other call. Both steps must succeed.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthenticatedSession, ApiError> {
        let body = LoginRequest {
            re_captcha_response: None,
            security_code: "",
            password: credentials.password(),
            username: credentials.username(),
        };

        let reply = self
            .execute(
                self.request(Method::POST, &self.endpoint.url(LOGIN_PATH), None)
                    .json(&body),
            )
            .await?;

        if reply.status != StatusCode::OK {
            return Err(ApiError::auth(
                format!("login returned HTTP {}", reply.status.as_u16()),
                Some(reply.status.as_u16()),
            ));
        }

        let login: LoginResponse = serde_json::from_str(&reply.body).map_err(|e| {
            ApiError::auth(format!("unreadable login response: {}", e), Some(200))
        })?;

        if login.status != AUTH_SUCCESS_STATUS {
            return Err(ApiError::auth(
                format!("server reported login status {}", login.status),
                Some(200),
            ));
        }

        let token = login
            .token
            .ok_or_else(|| ApiError::auth("login response carried no token", Some(200)))?;

        if token.token_type != BEARER_TOKEN_TYPE {
            return Err(ApiError::auth(
                format!("unexpected token type {}", token.token_type),
                Some(200),
            ));
        }

        let exchange = self.exchange_refresh_token(&token.refresh_token).await?;

        info!(username = credentials.username(), "Logged in");

        Ok(AuthenticatedSession::new(
            credentials.username().to_string(),
            token.access_token,
            token.refresh_token,
            exchange.access_token,
            exchange.expires_in,
        ))
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenExchangeResponse, ApiError> {
        let form = [
            ("client_id", TOKEN_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let reply = self
            .execute(
                self.request(Method::POST, &self.endpoint.url(TOKEN_PATH), None)
                    .form(&form),
            )
            .await?;

        if reply.status != StatusCode::OK {
            return Err(ApiError::auth(
                format!("token exchange returned HTTP {}", reply.status.as_u16()),
                Some(reply.status.as_u16()),
            ));
        }

        let exchange: TokenExchangeResponse = serde_json::from_str(&reply.body).map_err(|e| {
            ApiError::auth(format!("unreadable token exchange response: {}", e), Some(200))
        })?;

        if exchange.access_token.is_empty() {
            return Err(ApiError::auth("token exchange returned an empty token", Some(200)));
        }

        Ok(exchange)
    }

    // ------------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------------

    /// Ask the server to produce a backup. Without a filename one is derived
    /// from today's date. A name the server already knows is not an error.
    pub async fn trigger_backup(
        &self,
        session: &AuthenticatedSession,
        filename: Option<&str>,
    ) -> Result<BackupTrigger, ApiError> {
        let filename = match filename {
            Some(name) => name.to_string(),
            None => default_backup_filename(Local::now().date_naive()),
        };
        Self::validate_filename(&filename)?;

        let body = BackupRequest {
            description: BackupDescription {
                name: &filename,
                contents: BackupContents::default(),
            },
        };

        let reply = self
            .execute(
                self.request(Method::POST, &self.endpoint.url(BACKUP_TRIGGER_PATH), Some(session))
                    .json(&body),
            )
            .await?;

        match reply.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                info!(filename = %filename, "Backup requested");
                Ok(BackupTrigger::Created(filename))
            }
            StatusCode::BAD_REQUEST if Self::is_duplicate(&reply.body) => {
                warn!(filename = %filename, "Duplicate backup detected");
                Ok(BackupTrigger::AlreadyExists(filename))
            }
            status => Err(ApiError::backup("trigger", status.as_u16(), &reply.body)),
        }
    }

    fn is_duplicate(body: &str) -> bool {
        serde_json::from_str::<ODataErrorResponse>(body)
            .ok()
            .and_then(|resp| resp.error.details.into_iter().next())
            .and_then(|detail| detail.message)
            .map(|message| message == DUPLICATE_MARKER)
            .unwrap_or(false)
    }

    /// Fetch the first page of backups, optionally narrowed to one exact name.
    pub async fn list_backups(
        &self,
        session: &AuthenticatedSession,
        filename: Option<&str>,
    ) -> Result<Vec<BackupRecord>, ApiError> {
        let top = BACKUP_LIST_LIMIT.to_string();
        let query = [
            ("$top", top.as_str()),
            ("$skip", "0"),
            ("$select", BACKUP_LIST_FIELDS),
        ];

        let reply = self
            .execute(
                self.request(Method::GET, &self.endpoint.url(BACKUPS_PATH), Some(session))
                    .query(&query),
            )
            .await?;

        if reply.status != StatusCode::OK {
            return Err(ApiError::backup("list", reply.status.as_u16(), &reply.body));
        }

        let list: BackupListResponse = serde_json::from_str(&reply.body).map_err(|e| {
            ApiError::InvalidResponse(format!("backup list: {}", e))
        })?;

        let records = match filename {
            Some(name) => list
                .value
                .into_iter()
                .filter(|record| record.file_name == name)
                .collect(),
            None => list.value,
        };

        debug!(count = records.len(), filter = ?filename, "Fetched backup list");
        Ok(records)
    }

    /// Poll the backup list until `filename` shows up or the policy runs out.
    pub async fn await_ready(
        &self,
        session: &AuthenticatedSession,
        filename: &str,
        policy: PollPolicy,
    ) -> Result<BackupReadiness, ApiError> {
        // The list is always checked at least once
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let records = self.list_backups(session, Some(filename)).await?;
            if let Some(record) = records.into_iter().next() {
                info!(filename, attempt, "Backup ready");
                return Ok(BackupReadiness::Ready(record));
            }

            debug!(filename, attempt, max_attempts, "Backup pending");
            if attempt < max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        warn!(filename, attempts = max_attempts, "Gave up waiting for backup");
        Ok(BackupReadiness::TimedOut {
            attempts: max_attempts,
        })
    }

    /// Stream a backup artifact to `output`, returning the bytes written.
    /// The bearer token is only sent when the link points at this server.
    pub async fn download_backup(
        &self,
        session: &AuthenticatedSession,
        download_link: &str,
        output: &Path,
    ) -> Result<u64, ApiError> {
        let url = self.endpoint.resolve(download_link);
        let auth = self.endpoint.owns(&url).then_some(session);

        let request = self
            .request(Method::GET, &url, auth)
            .timeout(self.options.download_timeout)
            .build()?;

        let mut exchange = Self::describe(&request);
        let response = self.client.execute(request).await?;
        exchange.status = response.status();
        exchange.response_headers = response.headers().clone();

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            exchange.response_body = Some(body.clone());
            self.observer.on_exchange(&exchange);
            return Err(ApiError::backup("download", status, &body));
        }
        self.observer.on_exchange(&exchange);

        let file = tokio::fs::File::create(output).await?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);

        // Flush whatever arrived even when the stream fails part way.
        let streamed = Self::stream_to(response.bytes_stream(), &mut writer).await;
        let flushed = writer.flush().await;
        let written = streamed?;
        flushed?;

        info!(url = %url, output = %output.display(), bytes = written, "Backup downloaded");
        Ok(written)
    }

    async fn stream_to<S, B, E, W>(stream: S, writer: &mut W) -> Result<u64, ApiError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        ApiError: From<E>,
        W: AsyncWrite + Unpin,
    {
        futures::pin_mut!(stream);
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let chunk = chunk.as_ref();
            // Keep-alive frames
            if chunk.is_empty() {
                continue;
            }
            writer.write_all(chunk).await?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }

    /// Remove a backup from the server. Only 204 counts as success.
    pub async fn delete_backup(&self, session: &AuthenticatedSession, filename: &str) -> Result<(), ApiError> {
        Self::validate_filename(filename)?;

        let url = self.endpoint.url(&format!("{}('{}')", BACKUPS_PATH, filename));
        let reply = self
            .execute(self.request(Method::DELETE, &url, Some(session)))
            .await?;

        if reply.status != StatusCode::NO_CONTENT {
            return Err(ApiError::backup("delete", reply.status.as_u16(), &reply.body));
        }

        info!(filename, "Backup deleted");
        Ok(())
    }

    /// Backup names end up inside an OData key literal in the URL path,
    /// `Backups('<name>')`, and as a local file name. Quotes, path separators
    /// and URL delimiters are refused so trigger and delete name the same backup.
    fn validate_filename(name: &str) -> Result<(), ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidFilename("name is empty".to_string()));
        }
        if let Some(c) = name
            .chars()
            .find(|c| matches!(c, '\'' | '"' | '/' | '\\' | '#' | '?' | '%') || c.is_control())
        {
            return Err(ApiError::InvalidFilename(format!(
                "{:?} contains forbidden character {:?}",
                name, c
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------------

    fn request(&self, method: Method, url: &str, session: Option<&AuthenticatedSession>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, self.user_agent.as_str());

        match session {
            Some(session) => builder.bearer_auth(session.auth_token()),
            None => builder,
        }
    }

    /// Request half of an exchange record; the response half is filled in later.
    fn describe(request: &reqwest::Request) -> HttpExchange {
        HttpExchange {
            method: request.method().clone(),
            url: request.url().to_string(),
            request_headers: request.headers().clone(),
            request_body: request
                .body()
                .and_then(|body| body.as_bytes())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            status: StatusCode::OK,
            response_headers: header::HeaderMap::new(),
            response_body: None,
        }
    }

    /// Send a request, buffer the body and report the exchange.
    async fn execute(&self, builder: RequestBuilder) -> Result<Reply, ApiError> {
        let request = builder.build()?;
        let mut exchange = Self::describe(&request);

        let response = self.client.execute(request).await?;
        let status = response.status();
        exchange.status = status;
        exchange.response_headers = response.headers().clone();

        let body = response.text().await?;
        exchange.response_body = Some(body.clone());
        self.observer.on_exchange(&exchange);

        Ok(Reply { status, body })
    }
}
