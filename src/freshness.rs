//! Freshness Module
//!
//! Derives expiry and storage policy from cache-control style headers.
//!
//! A [`Freshness`] is computed once per write and stored with the entry's
//! metadata; later reads ask it whether the entry is still fresh.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::cache::current_timestamp_ms;

// == Cache Headers ==
/// Raw response headers that drive freshness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHeaders {
    /// `Cache-Control` header value
    #[serde(default)]
    pub cache_control: Option<String>,
    /// `ETag` header value
    #[serde(default)]
    pub etag: Option<String>,
    /// `Expires` header value (HTTP date)
    #[serde(default)]
    pub expires: Option<String>,
}

impl CacheHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds headers carrying only a `Cache-Control` value.
    pub fn with_cache_control(value: impl Into<String>) -> Self {
        Self {
            cache_control: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn expires(mut self, expires: impl Into<String>) -> Self {
        self.expires = Some(expires.into());
        self
    }
}

// == Cache Control ==
/// Parsed `Cache-Control` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub proxy_revalidate: bool,
    pub private: bool,
    pub public: bool,
}

impl CacheControl {
    /// Parses a `Cache-Control` header value.
    ///
    /// Directive names are case-insensitive; unknown directives and
    /// malformed ages are ignored.
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();

        for directive in header.split(',') {
            let directive = directive.trim();
            if directive.is_empty() {
                continue;
            }

            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (directive, None),
            };

            match name.to_ascii_lowercase().as_str() {
                "max-age" => control.max_age = value.and_then(|v| v.parse().ok()),
                "s-maxage" => control.s_maxage = value.and_then(|v| v.parse().ok()),
                "no-cache" => control.no_cache = true,
                "no-store" => control.no_store = true,
                "must-revalidate" => control.must_revalidate = true,
                "proxy-revalidate" => control.proxy_revalidate = true,
                "private" => control.private = true,
                "public" => control.public = true,
                _ => {}
            }
        }

        control
    }
}

// == Freshness ==
/// Freshness record attached to every cached entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub cache_control: CacheControl,
    pub etag: Option<String>,
    /// Expiry as Unix milliseconds, None = never expires
    pub ttl: Option<u64>,
}

impl Freshness {
    /// Derives freshness from headers at the current instant.
    ///
    /// TTL precedence: `no-store`/`no-cache` (stale immediately), then
    /// `s-maxage`, then `max-age`, then `Expires`. An unparseable `Expires`
    /// counts as already expired.
    pub fn parse(headers: &CacheHeaders) -> Self {
        let cache_control = headers
            .cache_control
            .as_deref()
            .map(CacheControl::parse)
            .unwrap_or_default();

        let now = current_timestamp_ms();
        let ttl = if cache_control.no_store || cache_control.no_cache {
            Some(now)
        } else if let Some(age) = cache_control.s_maxage.or(cache_control.max_age) {
            Some(now.saturating_add(age.saturating_mul(1000)))
        } else {
            headers
                .expires
                .as_deref()
                .map(|expires| parse_http_date(expires).unwrap_or(now))
        };

        Self {
            cache_control,
            etag: headers.etag.clone(),
            ttl,
        }
    }

    /// Returns true while the entry is still fresh.
    pub fn check_ttl(&self) -> bool {
        match self.ttl {
            Some(expires) => expires > current_timestamp_ms(),
            None => true,
        }
    }

    /// Remaining lifetime in milliseconds, or None if it never expires.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.ttl
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}

fn parse_http_date(value: &str) -> Option<u64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.timestamp_millis().max(0) as u64)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_parse_cache_control_directives() {
        let control = CacheControl::parse("public, max-age=60, s-maxage=\"120\", Must-Revalidate");
        assert!(control.public);
        assert!(!control.private);
        assert_eq!(control.max_age, Some(60));
        assert_eq!(control.s_maxage, Some(120));
        assert!(control.must_revalidate);
    }

    #[test]
    fn test_parse_ignores_garbage() {
        let control = CacheControl::parse(" , max-age=abc, x-custom=1, no-store");
        assert_eq!(control.max_age, None);
        assert!(control.no_store);
    }

    #[test]
    fn test_freshness_without_headers_never_expires() {
        let freshness = Freshness::parse(&CacheHeaders::new());
        assert_eq!(freshness.ttl, None);
        assert!(freshness.check_ttl());
        assert_eq!(freshness.ttl_remaining_ms(), None);
    }

    #[test]
    fn test_freshness_max_age_expires() {
        let freshness = Freshness::parse(&CacheHeaders::with_cache_control("public, max-age=1"));
        assert!(freshness.cache_control.public);
        assert_eq!(freshness.cache_control.max_age, Some(1));
        assert!(freshness.check_ttl());

        sleep(Duration::from_millis(1100));

        assert!(!freshness.check_ttl());
        assert_eq!(freshness.ttl_remaining_ms(), Some(0));
    }

    #[test]
    fn test_s_maxage_takes_precedence() {
        let freshness = Freshness::parse(&CacheHeaders::with_cache_control("max-age=1, s-maxage=100"));
        let remaining = freshness.ttl_remaining_ms().unwrap();
        assert!(remaining > 90_000);
    }

    #[test]
    fn test_no_store_is_stale_immediately() {
        let freshness = Freshness::parse(&CacheHeaders::with_cache_control("no-store"));
        assert!(freshness.cache_control.no_store);
        assert!(!freshness.check_ttl());
    }

    #[test]
    fn test_expires_header() {
        let past = CacheHeaders::new().expires("Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(!Freshness::parse(&past).check_ttl());

        let invalid = CacheHeaders::new().expires("not a date");
        assert!(!Freshness::parse(&invalid).check_ttl());

        let future = CacheHeaders::new().expires("Fri, 01 Jan 2100 00:00:00 GMT");
        assert!(Freshness::parse(&future).check_ttl());
    }

    #[test]
    fn test_etag_is_retained() {
        let freshness = Freshness::parse(&CacheHeaders::with_cache_control("max-age=5").etag("\"v1\""));
        assert_eq!(freshness.etag.as_deref(), Some("\"v1\""));
    }
}
