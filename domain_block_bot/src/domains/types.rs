use std::{fmt::Display, sync::LazyLock};

use regex::Regex;

/// Verdict of the reputation service on a single domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Blocked,
    NotBlocked,
}

impl Verdict {
    pub fn is_blocked(self) -> bool {
        self == Verdict::Blocked
    }
}

impl From<bool> for Verdict {
    fn from(blocked: bool) -> Self {
        match blocked {
            true => Verdict::Blocked,
            false => Verdict::NotBlocked,
        }
    }
}

/// A single monitored domain name, as the operator typed it.
///
/// Casing is kept for display, but comparisons go through [`Domain::key`],
/// so `Example.COM` and `example.com` are the same domain.
#[derive(Debug, Clone)]
pub struct Domain(String);

impl Domain {
    /// Wrap a domain name without any validation, trimming whitespace around it.
    /// Returns [`None`] if nothing is left.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    /// Parse a domain name typed in by someone, checking that it looks like one:
    /// dot-separated labels of letters, digits and hyphens, with the last label
    /// being at least 2 letters.
    pub fn parse_strict(name: &str) -> Option<Self> {
        static DOMAIN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^([A-Za-z0-9-]+\.)+[A-Za-z]{2,}$").expect("Regex will always be valid")
        });

        let name = name.trim();
        if DOMAIN_SHAPE.is_match(name) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    /// Lowercased form used for comparisons and for the alerted set.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Case-insensitive comparison against a plain string.
    pub fn is_same(&self, other: &str) -> bool {
        self.key() == other.trim().to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(&other.0)
    }
}

impl Eq for Domain {}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
