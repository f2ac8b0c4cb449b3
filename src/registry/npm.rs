use crate::error::{DepshiftError, Result};
use crate::plan::version::{Version, VersionComparator};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";
const MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;
const ABBREVIATED_METADATA: &str = "application/vnd.npm.install-v1+json";

/// Source of published versions for a package.
pub trait PackageRegistryClient {
    fn fetch_latest_version(&self, name: &str, stable_only: bool) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct PackageDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
}

/// Client for the npm registry HTTP API.
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl NpmRegistry {
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::validate_registry_url(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("depshift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DepshiftError::Registry(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn document_url(&self, name: &str) -> String {
        // Scoped packages keep the leading '@' but escape the separator.
        format!("{}/{}", self.base_url, name.replace('/', "%2f"))
    }

    fn fetch_document(&self, name: &str) -> Result<Option<PackageDocument>> {
        let url = self.document_url(name);
        debug!(%url, "fetching package document");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, ABBREVIATED_METADATA)
            .send()
            .map_err(|e| DepshiftError::Registry(format!("Request to {url} failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DepshiftError::Registry(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let text = response
            .text()
            .map_err(|e| DepshiftError::Registry(format!("Failed to read {url}: {e}")))?;
        if text.len() > MAX_DOCUMENT_BYTES {
            return Err(DepshiftError::Registry(format!(
                "Package document for '{name}' exceeded {} bytes",
                MAX_DOCUMENT_BYTES
            )));
        }

        Ok(Some(serde_json::from_str(&text)?))
    }

    fn validate_registry_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|_| DepshiftError::Config(format!("Invalid registry URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => Ok(()),
            scheme => Err(DepshiftError::Config(format!(
                "Unsupported registry scheme: {scheme}"
            ))),
        }
    }
}

fn latest_from_document(document: &PackageDocument, stable_only: bool) -> Option<String> {
    if let Some(tagged) = document.dist_tags.get("latest") {
        if !stable_only || !Version::parse(tagged).is_prerelease() {
            return Some(tagged.clone());
        }
    }

    let versions: Vec<String> = document.versions.keys().cloned().collect();
    VersionComparator::get_latest(&versions, stable_only)
}

impl PackageRegistryClient for NpmRegistry {
    fn fetch_latest_version(&self, name: &str, stable_only: bool) -> Result<Option<String>> {
        Ok(self
            .fetch_document(name)?
            .and_then(|document| latest_from_document(&document, stable_only)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> PackageDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prefers_latest_dist_tag() {
        let doc = document(
            r#"{"dist-tags":{"latest":"4.17.21","next":"5.0.0-rc.1"},
                "versions":{"4.17.20":{},"4.17.21":{},"5.0.0-rc.1":{}}}"#,
        );
        assert_eq!(latest_from_document(&doc, true), Some("4.17.21".to_string()));
    }

    #[test]
    fn prerelease_latest_tag_is_skipped_when_stable_only() {
        let doc = document(
            r#"{"dist-tags":{"latest":"3.0.0-beta.2"},
                "versions":{"2.9.1":{},"3.0.0-beta.2":{}}}"#,
        );
        assert_eq!(latest_from_document(&doc, true), Some("2.9.1".to_string()));
        assert_eq!(
            latest_from_document(&doc, false),
            Some("3.0.0-beta.2".to_string())
        );
    }

    #[test]
    fn empty_document_has_no_latest() {
        let doc = document("{}");
        assert_eq!(latest_from_document(&doc, true), None);
    }

    #[test]
    fn scoped_names_are_escaped() {
        let registry = NpmRegistry::with_base_url("https://registry.example.com/").unwrap();
        assert_eq!(
            registry.document_url("@babel/core"),
            "https://registry.example.com/@babel%2fcore"
        );
    }

    #[test]
    fn rejects_invalid_registry_scheme() {
        let err = NpmRegistry::validate_registry_url("ftp://example.com").unwrap_err();
        assert!(matches!(err, DepshiftError::Config(_)));
    }
}
