//! Reverse lookup of a digest through an external word-lookup service.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::LookupConfig;
use crate::digest::AlgorithmKind;
use crate::error::{Error, Result};

/// Which lookup endpoint a digest is sent to, derived from its length alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Md5,
    Sha1,
}

impl LookupKind {
    /// 32 hex characters look like MD5, 40 like SHA1; anything else is unknown.
    ///
    /// A 40 character RIPEMD-160 digest is indistinguishable from SHA1 here and
    /// is sent down the SHA1 path.
    pub fn classify(digest: &str) -> Result<Self> {
        match digest.len() {
            32 => Ok(LookupKind::Md5),
            40 => Ok(LookupKind::Sha1),
            len => Err(Error::UnknownAlgorithm { digest: digest.to_string(), len }),
        }
    }

    /// Algorithm recorded for a plaintext found through this path.
    pub fn algorithm(self) -> AlgorithmKind {
        match self {
            LookupKind::Md5 => AlgorithmKind::Md5,
            LookupKind::Sha1 => AlgorithmKind::Sha1,
        }
    }

    /// Query parameter name carrying the digest.
    pub fn param(self) -> &'static str {
        match self {
            LookupKind::Md5 => "md5",
            LookupKind::Sha1 => "sha1",
        }
    }
}

/// Best-effort digest to plaintext lookup.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Provenance tag stored with plaintexts this resolver finds.
    fn name(&self) -> &str;

    /// `Ok(None)` when the service answered but knows no plaintext.
    async fn resolve(&self, digest: &str, kind: LookupKind) -> Result<Option<String>>;
}

/// Resolver that scrapes a plaintext out of an HTML lookup page.
///
/// One GET per call to `{base}?{param}={digest}` with the digest
/// query-encoded; no retries.
pub struct HttpResolver {
    client: reqwest::Client,
    md5_url: String,
    sha1_url: String,
    selector: Selector,
}

impl HttpResolver {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let selector = parse_selector(&config.selector)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            client,
            md5_url: config.md5_url.clone(),
            sha1_url: config.sha1_url.clone(),
            selector,
        })
    }

    /// Classifies `digest` and resolves it in one step.
    pub async fn resolve_digest(&self, digest: &str) -> Result<Option<String>> {
        let kind = LookupKind::classify(digest)?;
        self.resolve(digest, kind).await
    }

    fn base_url(&self, kind: LookupKind) -> &str {
        match kind {
            LookupKind::Md5 => &self.md5_url,
            LookupKind::Sha1 => &self.sha1_url,
        }
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    fn name(&self) -> &str {
        "web-lookup"
    }

    async fn resolve(&self, digest: &str, kind: LookupKind) -> Result<Option<String>> {
        let base = self.base_url(kind);
        debug!(%base, %digest, "querying lookup service");

        let response = self
            .client
            .get(base)
            .query(&[(kind.param(), digest)])
            .send()
            .await
            .map_err(|e| Error::Transport { digest: digest.to_string(), source: e })?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                digest: digest.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport { digest: digest.to_string(), source: e })?;
        let body = std::str::from_utf8(&body).map_err(|e| Error::Parse {
            digest: digest.to_string(),
            reason: e.to_string(),
        })?;

        Ok(extract_text(body, &self.selector))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Trimmed text of the first element matching `selector`, if non-empty.
pub fn extract_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let text: String = document.select(selector).next()?.text().collect();
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}
