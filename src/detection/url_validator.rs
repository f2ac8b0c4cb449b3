use crate::error::{DepshiftError, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Liveness of a URL-like dependency reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCheck {
    pub is_valid: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

pub trait UrlValidator {
    fn validate(&self, url: &str) -> UrlCheck;
}

/// Turn a URL-like package reference into an HTTP(S) URL that can be probed.
///
/// Accepts `http(s)://`, `git+http(s)://` and `git://` references.
pub fn url_reference(name: &str) -> Option<Url> {
    let candidate = name.trim();
    let candidate = candidate.strip_prefix("git+").unwrap_or(candidate);
    let candidate = match candidate.strip_prefix("git://") {
        Some(rest) => format!("https://{rest}"),
        None => candidate.to_string(),
    };

    let parsed = Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

/// Bounded, time-limited memo of URL checks.
///
/// Owned by whoever constructs the validator; nothing is shared process-wide.
#[derive(Debug)]
pub struct UrlCache {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, (Instant, UrlCheck)>,
}

impl UrlCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, url: &str) -> Option<UrlCheck> {
        let expired = match self.entries.get(url) {
            Some((stored_at, check)) if stored_at.elapsed() < self.ttl => {
                return Some(check.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(url);
        }
        None
    }

    pub fn insert(&mut self, url: &str, check: UrlCheck) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains_key(url) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries
            .insert(url.to_string(), (Instant::now(), check));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Probes URLs with a HEAD request, retrying as GET when HEAD is not allowed.
pub struct HttpUrlValidator {
    client: Client,
    cache: Mutex<UrlCache>,
}

impl HttpUrlValidator {
    pub fn new(timeout: Duration, cache: UrlCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("depshift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DepshiftError::Registry(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache: Mutex::new(cache),
        })
    }

    fn probe(&self, url: &str) -> UrlCheck {
        let response = self.client.head(url).send().and_then(|resp| {
            if matches!(
                resp.status(),
                StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
            ) {
                self.client.get(url).send()
            } else {
                Ok(resp)
            }
        });

        match response {
            Ok(resp) => {
                let status = resp.status();
                UrlCheck {
                    is_valid: status.is_success(),
                    status_code: Some(status.as_u16()),
                    error: (!status.is_success()).then(|| format!("HTTP {status}")),
                }
            }
            Err(e) => UrlCheck {
                is_valid: false,
                status_code: e.status().map(|s| s.as_u16()),
                error: Some(e.to_string()),
            },
        }
    }
}

impl UrlValidator for HttpUrlValidator {
    fn validate(&self, url: &str) -> UrlCheck {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(url) {
                debug!(url, "url check served from cache");
                return hit;
            }
        }

        let check = self.probe(url);
        debug!(url, valid = check.is_valid, status = ?check.status_code, "url probed");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url, check.clone());
        }
        check
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alive() -> UrlCheck {
        UrlCheck {
            is_valid: true,
            status_code: Some(200),
            error: None,
        }
    }

    #[test]
    fn recognises_url_like_references() {
        assert!(url_reference("https://github.com/user/repo/tarball/main").is_some());
        assert_eq!(
            url_reference("git+https://github.com/user/repo.git")
                .unwrap()
                .as_str(),
            "https://github.com/user/repo.git"
        );
        assert_eq!(
            url_reference("git://github.com/user/repo.git")
                .unwrap()
                .scheme(),
            "https"
        );
    }

    #[test]
    fn plain_package_names_are_not_urls() {
        assert!(url_reference("react").is_none());
        assert!(url_reference("@babel/core").is_none());
        assert!(url_reference("file:../local-lib").is_none());
    }

    #[test]
    fn cache_returns_fresh_entries() {
        let mut cache = UrlCache::new(Duration::from_secs(60), 4);
        cache.insert("https://a.example", alive());
        assert_eq!(cache.get("https://a.example"), Some(alive()));
        assert_eq!(cache.get("https://b.example"), None);
    }

    #[test]
    fn cache_drops_expired_entries() {
        let mut cache = UrlCache::new(Duration::ZERO, 4);
        cache.insert("https://a.example", alive());
        assert_eq!(cache.get("https://a.example"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn cache_evicts_oldest_when_full() {
        let mut cache = UrlCache::new(Duration::from_secs(60), 2);
        cache.insert("https://a.example", alive());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("https://b.example", alive());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("https://c.example", alive());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("https://a.example"), None);
        assert!(cache.get("https://c.example").is_some());
    }

    #[test]
    fn zero_capacity_cache_stores_nothing() {
        let mut cache = UrlCache::new(Duration::from_secs(60), 0);
        cache.insert("https://a.example", alive());
        assert_eq!(cache.len(), 0);
    }
}
