// API client module: a small blocking HTTP client for the two Jenkins
// endpoints the validator uses. One client is built per operation.

use crate::config::Credentials;
use crate::error::{Result, ValidatorError};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::Read;
use url::form_urlencoded;

/// Path of the declarative-pipeline linter endpoint.
pub const VALIDATE_PATH: &str = "/pipeline-model-converter/validateJenkinsfile";
/// Path of the server status endpoint used by the connectivity test.
pub const STATUS_PATH: &str = "/api/json";
/// Default number of body bytes kept when a validation request fails.
pub const DEFAULT_ERROR_BODY_LIMIT: usize = 1024;

/// Tunables for [`JenkinsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bytes of a non-200 response body quoted in [`ValidatorError::Request`].
    pub error_body_limit: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            error_body_limit: DEFAULT_ERROR_BODY_LIMIT,
        }
    }
}

/// Fields read from `/api/json`. Both are optional: older servers and
/// restricted accounts may omit them.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    #[serde(rename = "nodeName")]
    pub node_name: Option<String>,
    pub mode: Option<String>,
}

/// Envelope returned by the validation endpoint. `data` stays untyped until
/// `status` has been checked, since error replies carry arbitrary payloads.
#[derive(Deserialize, Debug)]
pub struct ValidationResponse {
    pub status: Option<serde_json::Value>,
    pub data: Option<serde_json::Value>,
}

/// `data` of an `ok` reply. `errors` is only read for a failure verdict and
/// never rejects the reply on its own.
#[derive(Deserialize, Debug)]
pub struct ValidationData {
    pub result: Option<String>,
    pub errors: Option<serde_json::Value>,
}

/// One item of `data.errors`. Jenkins reports either a single message or a
/// list of messages per entry; anything else is kept but yields no text.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ErrorEntry {
    Message { error: String },
    Messages { error: Vec<String> },
    Other(serde_json::Value),
}

impl ErrorEntry {
    fn messages(self) -> Vec<String> {
        match self {
            ErrorEntry::Message { error } => vec![error],
            ErrorEntry::Messages { error } => error,
            ErrorEntry::Other(_) => Vec::new(),
        }
    }
}

/// Messages extractable from `data.errors`. A missing or non-list value
/// yields none.
fn error_messages(errors: Option<serde_json::Value>) -> Vec<String> {
    match errors {
        Some(serde_json::Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<ErrorEntry>(entry).ok())
            .flat_map(ErrorEntry::messages)
            .collect(),
        _ => Vec::new(),
    }
}

/// Outcome of a validation that the server answered with `status: ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Messages that could be extracted from `data.errors`; may be empty.
    Invalid(Vec<String>),
}

impl ValidationResponse {
    /// Interpret the envelope: `status` must be `ok`, `data.result` must be
    /// `success` or `failure`.
    pub fn into_verdict(self) -> Result<Verdict> {
        let status = match self.status {
            Some(serde_json::Value::String(status)) => status,
            _ => {
                return Err(ValidatorError::MalformedResponse(
                    "missing status field".into(),
                ))
            }
        };

        if status != "ok" {
            let message = self
                .data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            return Err(ValidatorError::Api { status, message });
        }

        let data = self
            .data
            .and_then(|d| serde_json::from_value::<ValidationData>(d).ok())
            .ok_or_else(|| {
                ValidatorError::MalformedResponse("missing or invalid data field".into())
            })?;

        match data.result.as_deref() {
            Some("success") => Ok(Verdict::Valid),
            Some("failure") => Ok(Verdict::Invalid(error_messages(data.errors))),
            Some(other) => Err(ValidatorError::MalformedResponse(format!(
                "unexpected result '{other}'"
            ))),
            None => Err(ValidatorError::MalformedResponse(
                "missing or invalid data field".into(),
            )),
        }
    }
}

/// Blocking client holding the reqwest client, the server base URL and the
/// basic-auth pair.
pub struct JenkinsClient {
    client: Client,
    base_url: String,
    username: String,
    token: String,
    options: ClientOptions,
}

impl JenkinsClient {
    /// Build a client from stored credentials. Fails with
    /// [`ValidatorError::ConfigMissing`] before anything touches the network
    /// when a field is empty.
    pub fn new(creds: &Credentials, options: ClientOptions) -> Result<Self> {
        if !creds.is_complete() {
            return Err(ValidatorError::ConfigMissing);
        }
        let client = Client::builder()
            .build()
            .map_err(|e| ValidatorError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(JenkinsClient {
            client,
            base_url: creds.base_url().to_string(),
            username: creds.username.clone(),
            token: creds.token.clone(),
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `/api/json` with basic auth and report what the server said
    /// about itself.
    pub fn test_connection(&self) -> Result<ServerInfo> {
        let url = self.endpoint(STATUS_PATH);
        tracing::debug!(%url, "testing connection");

        let res = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .map_err(|e| ValidatorError::Connection(e.to_string()))?;

        let status = res.status();
        tracing::debug!(%status, "status endpoint answered");
        match status {
            StatusCode::OK => {
                let info = res.json::<ServerInfo>().unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "status body is not the expected JSON");
                    ServerInfo::default()
                });
                Ok(info)
            }
            StatusCode::UNAUTHORIZED => Err(ValidatorError::Auth),
            StatusCode::FORBIDDEN => Err(ValidatorError::Permission),
            other => Err(ValidatorError::Connection(format!(
                "connection failed with status: {other}"
            ))),
        }
    }

    /// POST the pipeline file as the `jenkinsfile` form field and interpret
    /// the linter's verdict. The bytes are percent-encoded as they are, so
    /// the server sees exactly what is on disk.
    pub fn validate(&self, jenkinsfile: &[u8]) -> Result<Verdict> {
        let url = self.endpoint(VALIDATE_PATH);
        tracing::debug!(%url, bytes = jenkinsfile.len(), "submitting Jenkinsfile");

        let body = format!(
            "jenkinsfile={}",
            form_urlencoded::byte_serialize(jenkinsfile).collect::<String>()
        );
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.token))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(|e| ValidatorError::Connection(e.to_string()))?;

        let status = res.status();
        tracing::debug!(%status, "validation endpoint answered");
        if status != StatusCode::OK {
            let body = read_prefix(res, self.options.error_body_limit);
            return Err(ValidatorError::Request { status, body });
        }

        let envelope: ValidationResponse = res
            .json()
            .map_err(|e| ValidatorError::MalformedResponse(format!("error parsing response: {e}")))?;
        tracing::trace!(?envelope, "decoded validation response");
        envelope.into_verdict()
    }
}

/// Best-effort read of at most `limit` body bytes for diagnostics.
fn read_prefix(res: Response, limit: usize) -> String {
    let mut buf = Vec::new();
    if let Err(e) = res.take(limit as u64).read_to_end(&mut buf) {
        tracing::debug!(error = %e, "could not read error body");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{basic_auth, body_string, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds_for(server: &MockServer) -> Credentials {
        Credentials {
            server_url: server.uri(),
            username: "test_user".to_string(),
            token: "test_token".to_string(),
        }
    }

    /// Start a mock server on its own runtime so the blocking client can be
    /// driven from the test thread.
    fn start_server(rt: &Runtime, mock: Mock) -> MockServer {
        rt.block_on(async {
            let server = MockServer::start().await;
            mock.mount(&server).await;
            server
        })
    }

    fn verdict_of(body: serde_json::Value) -> Result<Verdict> {
        serde_json::from_value::<ValidationResponse>(body)
            .unwrap()
            .into_verdict()
    }

    #[test]
    fn incomplete_credentials_are_rejected_before_any_request() {
        let creds = Credentials {
            server_url: "http://127.0.0.1:9".into(),
            username: "user".into(),
            token: String::new(),
        };
        let err = JenkinsClient::new(&creds, ClientOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ValidatorError::ConfigMissing));
    }

    #[test]
    fn success_result_is_valid() {
        let v = verdict_of(json!({"status": "ok", "data": {"result": "success"}})).unwrap();
        assert_eq!(v, Verdict::Valid);
    }

    #[test]
    fn failure_result_collects_messages() {
        let v = verdict_of(json!({
            "status": "ok",
            "data": {
                "result": "failure",
                "errors": [
                    {"error": "line 3: bad syntax"},
                    {"error": ["WorkflowScript: 5: unknown stage", "WorkflowScript: 9: missing agent"]},
                    "not an object",
                    {"location": 4}
                ]
            }
        }))
        .unwrap();
        assert_eq!(
            v,
            Verdict::Invalid(vec![
                "line 3: bad syntax".to_string(),
                "WorkflowScript: 5: unknown stage".to_string(),
                "WorkflowScript: 9: missing agent".to_string(),
            ])
        );
    }

    #[test]
    fn failure_without_errors_is_still_invalid() {
        let v = verdict_of(json!({"status": "ok", "data": {"result": "failure"}})).unwrap();
        assert_eq!(v, Verdict::Invalid(Vec::new()));
    }

    #[test]
    fn failure_with_unusable_errors_field_is_still_invalid() {
        for errors in [json!("boom"), json!({"error": "x"}), json!(null), json!(42)] {
            let v = verdict_of(json!({
                "status": "ok",
                "data": {"result": "failure", "errors": errors}
            }))
            .unwrap();
            assert_eq!(v, Verdict::Invalid(Vec::new()));
        }
    }

    #[test]
    fn success_ignores_malformed_errors_field() {
        let v = verdict_of(json!({
            "status": "ok",
            "data": {"result": "success", "errors": "boom"}
        }))
        .unwrap();
        assert_eq!(v, Verdict::Valid);
    }

    #[test]
    fn non_ok_status_with_odd_data_is_still_api_error() {
        for data in [json!("Not allowed"), json!({"message": ["a"]}), json!([1, 2])] {
            let err = verdict_of(json!({"status": "error", "data": data})).unwrap_err();
            match err {
                ValidatorError::Api { status, message } => {
                    assert_eq!(status, "error");
                    assert_eq!(message, None);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let err = verdict_of(json!({"status": "error"})).unwrap_err();
        assert!(matches!(err, ValidatorError::Api { message: None, .. }));
    }

    #[test]
    fn non_string_result_is_malformed() {
        let err = verdict_of(json!({"status": "ok", "data": {"result": 1}})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));

        let err = verdict_of(json!({"status": "ok", "data": "success"})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));
    }

    #[test]
    fn missing_status_is_malformed() {
        let err = verdict_of(json!({"data": {"result": "success"}})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));
    }

    #[test]
    fn non_ok_status_is_api_error() {
        let err = verdict_of(json!({"status": "error", "data": {"message": "boom"}})).unwrap_err();
        match err {
            ValidatorError::Api { status, message } => {
                assert_eq!(status, "error");
                assert_eq!(message.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_data_or_unknown_result_is_malformed() {
        let err = verdict_of(json!({"status": "ok"})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));

        let err = verdict_of(json!({"status": "ok", "data": {}})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));

        let err = verdict_of(json!({"status": "ok", "data": {"result": "maybe"}})).unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));
    }

    #[test]
    fn test_connection_reads_node_info() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("GET"))
                .and(path("/api/json"))
                .and(basic_auth("test_user", "test_token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "nodeName": "built-in",
                    "mode": "NORMAL",
                    "numExecutors": 2
                }))),
        );

        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        let info = client.test_connection().unwrap();
        assert_eq!(info.node_name.as_deref(), Some("built-in"));
        assert_eq!(info.mode.as_deref(), Some("NORMAL"));
    }

    #[test]
    fn test_connection_tolerates_non_json_body() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("GET"))
                .and(path("/api/json"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>")),
        );

        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        assert_eq!(client.test_connection().unwrap(), ServerInfo::default());
    }

    fn connection_error_for(rt: &Runtime, code: u16) -> ValidatorError {
        let server = start_server(
            rt,
            Mock::given(method("GET"))
                .and(path("/api/json"))
                .respond_with(ResponseTemplate::new(code)),
        );
        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        client.test_connection().unwrap_err()
    }

    #[test]
    fn test_connection_maps_status_codes() {
        let rt = Runtime::new().unwrap();

        assert!(matches!(connection_error_for(&rt, 401), ValidatorError::Auth));
        assert!(matches!(connection_error_for(&rt, 403), ValidatorError::Permission));
        match connection_error_for(&rt, 502) {
            ValidatorError::Connection(msg) => assert!(msg.contains("502"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unreachable_server_is_connection_error() {
        let creds = Credentials {
            // Port 9 (discard) is closed on test machines.
            server_url: "http://127.0.0.1:9".into(),
            username: "user".into(),
            token: "token".into(),
        };
        let client = JenkinsClient::new(&creds, ClientOptions::default()).unwrap();
        let err = client.test_connection().unwrap_err();
        assert!(matches!(err, ValidatorError::Connection(_)));
    }

    #[test]
    fn validate_posts_form_encoded_file() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("POST"))
                .and(path(VALIDATE_PATH))
                .and(basic_auth("test_user", "test_token"))
                .and(header("content-type", "application/x-www-form-urlencoded"))
                .and(body_string_contains("jenkinsfile=pipeline+%7B+agent+any+%7D"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "status": "ok",
                    "data": {"result": "success"}
                }))),
        );

        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        assert_eq!(client.validate(b"pipeline { agent any }").unwrap(), Verdict::Valid);
    }

    #[test]
    fn validate_sends_non_utf8_bytes_unchanged() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("POST"))
                .and(path(VALIDATE_PATH))
                .and(body_string("jenkinsfile=pipeline+%FF%0A"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "status": "ok",
                    "data": {"result": "success"}
                }))),
        );

        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        assert_eq!(client.validate(b"pipeline \xff\n").unwrap(), Verdict::Valid);
    }

    #[test]
    fn trailing_slash_in_server_url_is_ignored() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("POST"))
                .and(path(VALIDATE_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "status": "ok",
                    "data": {"result": "success"}
                }))),
        );

        let mut creds = creds_for(&server);
        creds.server_url.push('/');
        let client = JenkinsClient::new(&creds, ClientOptions::default()).unwrap();
        assert_eq!(client.validate(b"pipeline {}").unwrap(), Verdict::Valid);
    }

    #[test]
    fn validate_non_200_truncates_body_to_limit() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("POST"))
                .and(path(VALIDATE_PATH))
                .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(4096))),
        );

        let client = JenkinsClient::new(
            &creds_for(&server),
            ClientOptions {
                error_body_limit: 16,
            },
        )
        .unwrap();
        match client.validate(b"pipeline {}").unwrap_err() {
            ValidatorError::Request { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "x".repeat(16));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_undecodable_body() {
        let rt = Runtime::new().unwrap();
        let server = start_server(
            &rt,
            Mock::given(method("POST"))
                .and(path(VALIDATE_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_string("not json")),
        );

        let client = JenkinsClient::new(&creds_for(&server), ClientOptions::default()).unwrap();
        let err = client.validate(b"pipeline {}").unwrap_err();
        assert!(matches!(err, ValidatorError::MalformedResponse(_)));
    }
}
