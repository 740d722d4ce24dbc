//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pbxbackup_core::{ApiClient, AuthenticatedSession, Credentials, HttpExchange, HttpObserver, ServerEndpoint};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PATH: &str = "/webclient/api/Login/GetAccessToken";
pub const TOKEN_PATH: &str = "/connect/token";
pub const BACKUPS_PATH: &str = "/xapi/v1/Backups";
pub const TRIGGER_PATH: &str = "/xapi/v1/Backups/Pbx.Backup";

pub const LOGIN_ACCESS_TOKEN: &str = "login-access-token";
pub const LOGIN_REFRESH_TOKEN: &str = "login-refresh-token";
pub const BEARER_TOKEN: &str = "exchanged-bearer-token";

pub fn client_for(server: &MockServer) -> ApiClient {
    let endpoint = ServerEndpoint::new(&server.address().to_string(), false).expect("endpoint");
    ApiClient::new(endpoint).expect("client")
}

pub fn credentials() -> Credentials {
    Credentials::new("admin", "s3cret")
}

pub fn login_success_body() -> serde_json::Value {
    json!({
        "Status": "AuthSuccess",
        "Token": {
            "token_type": "Bearer",
            "expires_in": 60,
            "access_token": LOGIN_ACCESS_TOKEN,
            "refresh_token": LOGIN_REFRESH_TOKEN,
        }
    })
}

pub fn token_exchange_body() -> serde_json::Value {
    json!({
        "access_token": BEARER_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600,
    })
}

/// Mount both login endpoints answering with success.
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_success_body()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_exchange_body()))
        .mount(server)
        .await;
}

pub async fn logged_in(server: &MockServer) -> (ApiClient, AuthenticatedSession) {
    mount_login(server).await;
    let client = client_for(server);
    let session = client.login(&credentials()).await.expect("login");
    (client, session)
}

pub fn backup_record(name: &str) -> serde_json::Value {
    json!({
        "CreationTime": "2026-01-19T10:15:00Z",
        "Size": 2048,
        "FileName": name,
        "DownloadLink": format!("/xapi/v1/Backups/Pbx.DownloadBackup(file='{}')", name),
    })
}

pub fn backup_list(names: &[&str]) -> serde_json::Value {
    json!({
        "@odata.context": "/xapi/v1/$metadata#Backups(CreationTime,Size,FileName,DownloadLink)",
        "value": names.iter().map(|n| backup_record(n)).collect::<Vec<_>>(),
    })
}

pub fn duplicate_body() -> serde_json::Value {
    json!({
        "error": {
            "code": "",
            "message": "Name:\nWARNINGS.XAPI.DUPLICATE",
            "details": [
                { "code": "", "message": "WARNINGS.XAPI.DUPLICATE", "target": "Name" }
            ]
        }
    })
}

/// Observer that keeps every exchange for later inspection.
#[derive(Default)]
pub struct RecordingObserver {
    pub exchanges: Mutex<Vec<HttpExchange>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<HttpExchange> {
        self.exchanges.lock().unwrap().clone()
    }
}

impl HttpObserver for RecordingObserver {
    fn on_exchange(&self, exchange: &HttpExchange) {
        self.exchanges.lock().unwrap().push(exchange.clone());
    }
}
