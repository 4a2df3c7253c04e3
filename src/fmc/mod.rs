//! FMC REST implementation of [`RemoteClient`]
//!
//! One client serves one object endpoint under
//! `/api/fmc_config/v1/domain/{domain}/object/`. Requests are blocking and
//! authenticated with the `X-auth-access-token` header.

pub mod objects;

use anyhow::{Context, Result, bail};
use reconcile::{Payload, RemoteClient, RemoteError, RemoteObject, ResourceKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::Config;
use objects::Endpoint;

const TOKEN_HEADER: &str = "X-auth-access-token";

pub struct FmcClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    kind: ResourceKind,
    endpoint: &'static Endpoint,
    page_limit: usize,
}

impl FmcClient {
    /// Build a client for `kind` from configuration
    pub fn new(config: &Config, kind: &ResourceKind) -> Result<Self> {
        if config.fmc.url.is_empty() {
            bail!("No FMC url configured: set [fmc] url in config.toml");
        }
        let token = config.token()?;
        Self::with_token(config, kind, token)
    }

    pub fn with_token(config: &Config, kind: &ResourceKind, token: String) -> Result<Self> {
        let endpoint = Endpoint::for_kind(kind)
            .with_context(|| format!("No FMC endpoint for kind {}", kind.name))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.fmc.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base_url: format!(
                "{}/api/fmc_config/v1/domain/{}/object/{}",
                config.fmc.url.trim_end_matches('/'),
                config.fmc.domain_uuid,
                endpoint.path
            ),
            token,
            kind: *kind,
            endpoint,
            page_limit: config.fmc.page_limit.max(1),
        })
    }

    fn collection_url(&self) -> &str {
        &self.base_url
    }

    fn item_url(&self, remote_id: &str) -> String {
        format!("{}/{remote_id}", self.base_url)
    }

    fn page_url(&self, offset: usize) -> String {
        format!(
            "{}?expanded=true&offset={offset}&limit={}",
            self.base_url, self.page_limit
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<Map<String, Value>>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    #[serde(default)]
    count: usize,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Which endpoint a request went to; decides what a 404 means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Collection,
    Item,
}

/// Map a non-success HTTP status to a [`RemoteError`]
fn status_error(status: u16, body: &str, target: Target) -> RemoteError {
    let message = objects::error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        404 if target == Target::Collection => RemoteError::unsupported_version(message),
        404 => RemoteError::not_found(message),
        400 | 422 => RemoteError::validation(message),
        409 => RemoteError::conflict(message),
        429 | 500..=599 => RemoteError::transient(message),
        _ => RemoteError::Other(format!("HTTP {status}: {message}")),
    }
}

/// Transport failures (connect, TLS, timeout, I/O) are all worth retrying
fn transport_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::StatusCode(code) => status_error(code, "", Target::Item),
        other => RemoteError::transient(other.to_string()),
    }
}

fn read_body(
    mut response: ureq::http::Response<ureq::Body>,
    target: Target,
) -> Result<String, RemoteError> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(transport_error)?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(status_error(status, &body, target))
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Other(format!("unexpected response: {e}")))
}

impl RemoteClient for FmcClient {
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError> {
        let mut objects = Vec::new();
        let mut offset = 0;

        loop {
            let response = self
                .agent
                .get(&self.page_url(offset))
                .header(TOKEN_HEADER, &self.token)
                .header("Accept", "application/json")
                .call()
                .map_err(transport_error)?;
            let page: ListPage = parse(&read_body(response, Target::Collection)?)?;

            let fetched = page.items.len();
            objects.extend(
                page.items
                    .into_iter()
                    .filter_map(|raw| objects::decode(self.endpoint, &self.kind, raw)),
            );
            offset += fetched;
            log::debug!(
                "{}: listed {offset}/{} object(s)",
                self.kind.name,
                page.paging.count
            );

            if fetched == 0 || offset >= page.paging.count {
                break;
            }
        }

        Ok(objects)
    }

    fn create(&self, payload: &Payload) -> Result<String, RemoteError> {
        let body = objects::encode(self.endpoint, payload, None);
        let response = self
            .agent
            .post(self.collection_url())
            .header(TOKEN_HEADER, &self.token)
            .send_json(&body)
            .map_err(transport_error)?;
        let created: Created = parse(&read_body(response, Target::Collection)?)?;
        Ok(created.id)
    }

    fn update(&self, remote_id: &str, payload: &Payload) -> Result<(), RemoteError> {
        let body = objects::encode(self.endpoint, payload, Some(remote_id));
        let response = self
            .agent
            .put(&self.item_url(remote_id))
            .header(TOKEN_HEADER, &self.token)
            .send_json(&body)
            .map_err(transport_error)?;
        read_body(response, Target::Item).map(|_| ())
    }

    fn delete(&self, remote_id: &str) -> Result<(), RemoteError> {
        let response = self
            .agent
            .delete(&self.item_url(remote_id))
            .header(TOKEN_HEADER, &self.token)
            .call()
            .map_err(transport_error)?;
        read_body(response, Target::Item).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ErrorCategory;
    use reconcile::kind::{HOSTS, NETWORK_GROUPS};

    fn config() -> Config {
        let mut config = Config::default();
        config.fmc.url = "https://fmc.lab/".into();
        config.fmc.domain_uuid = "dom".into();
        config.fmc.page_limit = 25;
        config
    }

    #[test]
    fn test_urls() {
        let client = FmcClient::with_token(&config(), &NETWORK_GROUPS, "t".into()).unwrap();
        assert_eq!(
            client.collection_url(),
            "https://fmc.lab/api/fmc_config/v1/domain/dom/object/networkgroups"
        );
        assert_eq!(
            client.item_url("abc"),
            "https://fmc.lab/api/fmc_config/v1/domain/dom/object/networkgroups/abc"
        );
        assert!(client.page_url(50).ends_with("?expanded=true&offset=50&limit=25"));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        assert!(FmcClient::new(&Config::default(), &HOSTS).is_err());
    }

    #[test]
    fn test_status_mapping() {
        let category = |status, target| status_error(status, "", target).category();
        assert_eq!(category(429, Target::Item), ErrorCategory::Transient);
        assert_eq!(category(503, Target::Item), ErrorCategory::Transient);
        assert_eq!(category(400, Target::Item), ErrorCategory::Validation);
        assert_eq!(category(422, Target::Collection), ErrorCategory::Validation);
        assert_eq!(category(409, Target::Item), ErrorCategory::Conflict);
        assert_eq!(category(404, Target::Item), ErrorCategory::NotFound);
        assert_eq!(
            category(404, Target::Collection),
            ErrorCategory::UnsupportedVersion
        );
        assert_eq!(category(401, Target::Item), ErrorCategory::Other);
    }

    #[test]
    fn test_status_error_uses_fmc_message() {
        let body = r#"{"error":{"messages":[{"description":"Duplicate name"}]}}"#;
        let err = status_error(409, body, Target::Collection);
        assert_eq!(err.to_string(), "conflict: Duplicate name");
    }
}
