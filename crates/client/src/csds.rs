use std::collections::HashMap;

use {
    async_trait::async_trait,
    serde::Deserialize,
    tracing::debug,
};

use crate::error::{Error, Result};

/// Service discovery: maps the account to its regional service domains.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Every service domain known for the account, keyed by service name.
    async fn service_domains(&self) -> Result<HashMap<String, String>>;

    /// Domain of a single service.
    async fn service_domain(&self, service: &'static str) -> Result<String> {
        self.service_domains()
            .await?
            .remove(service)
            .ok_or(Error::MissingService(service))
    }
}

#[derive(Debug, Deserialize)]
struct BaseUris {
    #[serde(rename = "baseURIs", default)]
    base_uris: Vec<BaseUri>,
}

#[derive(Debug, Deserialize)]
struct BaseUri {
    service: String,
    #[serde(rename = "baseURI")]
    base_uri: String,
}

/// HTTP client for the CSDS directory.
#[derive(Clone)]
pub struct CsdsClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
}

impl CsdsClient {
    pub fn new(http: reqwest::Client, base_url: &str, account_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
        }
    }

    fn lookup_url(&self) -> String {
        format!(
            "{}/api/account/{}/service/baseURI.json?version=1.0",
            self.base_url, self.account_id
        )
    }
}

#[async_trait]
impl Directory for CsdsClient {
    async fn service_domains(&self) -> Result<HashMap<String, String>> {
        let response = self.http.get(self.lookup_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Directory(format!("HTTP {status}")));
        }
        let body: BaseUris = response.json().await?;
        debug!(
            account_id = %self.account_id,
            count = body.base_uris.len(),
            "resolved service domains"
        );
        Ok(body
            .base_uris
            .into_iter()
            .map(|entry| (entry.service, entry.base_uri))
            .collect())
    }
}
