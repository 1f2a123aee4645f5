use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::runner::EngineError;

/// How a candidate word is combined with the base URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    Directory,
    Subdomain,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Directory => write!(f, "directory"),
            ProbeMode::Subdomain => write!(f, "subdomain"),
        }
    }
}

impl FromStr for ProbeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directory" | "dir" => Ok(ProbeMode::Directory),
            "subdomain" | "sub" => Ok(ProbeMode::Subdomain),
            other => Err(format!(
                "invalid mode '{other}', expected 'directory' or 'subdomain'"
            )),
        }
    }
}

fn word_filter() -> &'static Regex {
    static FILTER: OnceLock<Regex> = OnceLock::new();
    FILTER.get_or_init(|| Regex::new(r"^[\w.-]+$").expect("static word filter pattern"))
}

/// Turns a base URL plus a wordlist into candidate target URLs.
///
/// The base URL is normalized exactly once at construction: surrounding
/// whitespace and trailing slashes are stripped and a missing scheme defaults
/// to https. A base URL that is unparsable, has a non-http(s) scheme, or has
/// no host is rejected here, before any probing starts.
#[derive(Clone, Debug)]
pub struct TargetGenerator {
    base: String,
    scheme: String,
    host: String,
    port: Option<u16>,
    mode: ProbeMode,
}

impl TargetGenerator {
    pub fn new(base_url: &str, mode: ProbeMode) -> Result<Self, EngineError> {
        let trimmed = base_url.trim();
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let parsed = reqwest::Url::parse(&candidate).map_err(|_| EngineError::InvalidUrl {
            url: base_url.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(EngineError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                })
            }
        }
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => {
                return Err(EngineError::MissingHost {
                    url: base_url.to_string(),
                })
            }
        };

        // The parsed URL's serialization is the canonical form; targets are
        // built from it, never from the raw input.
        let mut normalized = parsed.to_string();
        while normalized.ends_with('/') {
            normalized.pop();
        }

        Ok(Self {
            base: normalized,
            scheme: parsed.scheme().to_string(),
            host,
            port: parsed.port(),
            mode,
        })
    }

    /// The normalized base URL, without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    /// Lazy, restartable sequence of target URLs. Words failing the
    /// `^[\w.-]+$` filter are skipped without producing an error.
    pub fn targets<'a>(&'a self, words: &'a [String]) -> impl Iterator<Item = String> + 'a {
        words
            .iter()
            .map(|w| w.trim())
            .filter(|w| word_filter().is_match(w))
            .map(move |w| self.target_for(w))
    }

    fn target_for(&self, word: &str) -> String {
        match self.mode {
            ProbeMode::Directory => format!("{}/{}", self.base, word),
            ProbeMode::Subdomain => match self.port {
                Some(port) => format!("{}://{}.{}:{}", self.scheme, word, self.host, port),
                None => format!("{}://{}.{}", self.scheme, word, self.host),
            },
        }
    }
}
