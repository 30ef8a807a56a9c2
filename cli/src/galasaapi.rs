//! Typed access to the Galasa REST API.
//!
//! Each endpoint gets a small request builder whose `execute` performs one
//! HTTP round trip. Non-success statuses and transport failures both come back
//! as [`ApiCallError`], carrying the status code when a response arrived.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::run_types::{RunResults, UserData};

/// API level this client was written against.
pub const CLIENT_API_VERSION: &str = "0.41.0";

const CLIENT_API_VERSION_HEADER: &str = "ClientApiVersion";

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiCallError {
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<String>,
}

impl ApiCallError {
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(0)
    }

    fn transport(err: &reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: error_chain(err),
            body: None,
        }
    }
}

impl ApiClient {
    pub fn new(base_url: &str, bearer_token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("galasactl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// `GET /ras/runs`
    pub fn ras_search_runs(&self) -> RasSearchRunsRequest {
        RasSearchRunsRequest {
            client: self.clone(),
            api_version: None,
            params: Vec::new(),
        }
    }

    /// `GET /users`
    pub fn get_users(&self) -> GetUsersRequest {
        GetUsersRequest {
            client: self.clone(),
            login_id: None,
        }
    }

    /// `POST /resources/`. The response body is not interpreted on success.
    pub async fn post_resources(
        &self,
        payload: &serde_json::Value,
    ) -> std::result::Result<u16, ApiCallError> {
        let response = self
            .request(Method::POST, "/resources/")
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiCallError::transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), body))
    }

    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

/// Builder for a single page of the run search.
#[derive(Debug)]
pub struct RasSearchRunsRequest {
    client: ApiClient,
    api_version: Option<String>,
    params: Vec<(&'static str, String)>,
}

impl RasSearchRunsRequest {
    pub fn client_api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.to_string());
        self
    }

    pub fn include_cursor(self, include: bool) -> Self {
        self.param("includeCursor", include.to_string())
    }

    pub fn from(self, t: DateTime<Utc>) -> Self {
        self.param("from", format_instant(t))
    }

    pub fn to(self, t: DateTime<Utc>) -> Self {
        self.param("to", format_instant(t))
    }

    pub fn runname(self, v: &str) -> Self {
        self.param("runname", v)
    }

    pub fn requestor(self, v: &str) -> Self {
        self.param("requestor", v)
    }

    pub fn result(self, v: &str) -> Self {
        self.param("result", v)
    }

    pub fn status(self, names: &[&str]) -> Self {
        self.param("status", names.join(","))
    }

    pub fn cursor(self, v: &str) -> Self {
        self.param("cursor", v)
    }

    pub fn group(self, v: &str) -> Self {
        self.param("group", v)
    }

    pub fn detail(self, v: &str) -> Self {
        self.param("detail", v)
    }

    pub fn tags(self, v: &str) -> Self {
        self.param("tags", v)
    }

    pub fn sort(self, v: &str) -> Self {
        self.param("sort", v)
    }

    pub fn query_pairs(&self) -> &[(&'static str, String)] {
        &self.params
    }

    #[cfg(test)]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub fn path_and_query(&self) -> String {
        with_query("/ras/runs", self.query_pairs())
    }

    pub async fn execute(self) -> std::result::Result<ApiResponse<RunResults>, ApiCallError> {
        let mut builder = self.client.request(Method::GET, &self.path_and_query());
        if let Some(v) = &self.api_version {
            builder = builder.header(CLIENT_API_VERSION_HEADER, v);
        }
        execute_json(builder).await
    }

    fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.retain(|(k, _)| *k != name);
        self.params.push((name, value.into()));
        self
    }
}

#[derive(Debug)]
pub struct GetUsersRequest {
    client: ApiClient,
    login_id: Option<String>,
}

impl GetUsersRequest {
    pub fn login_id(mut self, v: &str) -> Self {
        self.login_id = Some(v.to_string());
        self
    }

    pub async fn execute(self) -> std::result::Result<ApiResponse<Vec<UserData>>, ApiCallError> {
        let params: Vec<(&'static str, String)> = self
            .login_id
            .iter()
            .map(|v| ("loginId", v.clone()))
            .collect();
        let builder = self
            .client
            .request(Method::GET, &with_query("/users", &params));
        execute_json(builder).await
    }
}

async fn execute_json<T: DeserializeOwned>(
    builder: RequestBuilder,
) -> std::result::Result<ApiResponse<T>, ApiCallError> {
    let response = builder
        .send()
        .await
        .map_err(|e| ApiCallError::transport(&e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status.as_u16(), body));
    }
    let body = response.json::<T>().await.map_err(|e| ApiCallError {
        status: Some(status.as_u16()),
        message: format!("failed to decode response body: {}", error_chain(&e)),
        body: None,
    })?;
    Ok(ApiResponse {
        status: status.as_u16(),
        body,
    })
}

fn status_error(status: u16, body: String) -> ApiCallError {
    ApiCallError {
        status: Some(status),
        message: format!("http response status code: {}", status),
        body: if body.is_empty() { None } else { Some(body) },
    }
}

fn with_query(path: &str, params: &[(&'static str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode_query(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

fn encode_query(value: &str) -> String {
    percent_encode(value.as_bytes(), NON_ALPHANUMERIC).to_string()
}

fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
