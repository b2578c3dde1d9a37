//! String `format` checks, passed explicitly into each compile run.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

pub type FormatCheck = fn(&str) -> bool;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static HOST_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());
static URI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S*$").unwrap());
static URI_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S*$").unwrap());
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:urn:uuid:)?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});
static JSON_POINTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(/([^~/]|~[01])*)*$").unwrap());
static RELATIVE_JSON_POINTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|[1-9][0-9]*)(#|(/([^~/]|~[01])*)*)$").unwrap());

#[derive(Clone)]
pub struct FormatRegistry {
    formats: IndexMap<String, FormatCheck>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.formats.keys()).finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self { formats: IndexMap::new() }
    }

    pub fn standard() -> Self {
        Self::empty()
            .register("date-time", is_date_time)
            .register("date", |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .register("time", is_time)
            .register("email", |s| EMAIL.is_match(s))
            .register("hostname", is_hostname)
            .register("ipv4", |s| s.parse::<Ipv4Addr>().is_ok())
            .register("ipv6", |s| s.parse::<Ipv6Addr>().is_ok())
            .register("uri", |s| URI.is_match(s))
            .register("uri-reference", |s| URI_REFERENCE.is_match(s))
            .register("uuid", |s| UUID.is_match(s))
            .register("json-pointer", |s| JSON_POINTER.is_match(s))
            .register("relative-json-pointer", |s| RELATIVE_JSON_POINTER.is_match(s))
            .register("regex", |s| Regex::new(s).is_ok())
    }

    pub fn register(mut self, name: impl Into<String>, check: FormatCheck) -> Self {
        self.formats.insert(name.into(), check);
        self
    }

    pub fn get(&self, name: &str) -> Option<FormatCheck> {
        self.formats.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

// RFC 3339 full-time, offset required.
fn is_time(s: &str) -> bool {
    is_date_time(&format!("1970-01-01T{s}"))
}

fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty() && s.len() <= 253 && s.split('.').all(|label| HOST_LABEL.is_match(label))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, s: &str) -> bool {
        FormatRegistry::standard().get(name).unwrap()(s)
    }

    #[test]
    fn standard_formats() {
        assert!(check("date-time", "2024-03-01T12:30:00Z"));
        assert!(check("date-time", "2024-03-01T12:30:00.5+02:00"));
        assert!(!check("date-time", "2024-03-01 12:30"));
        assert!(check("date", "2024-02-29"));
        assert!(!check("date", "2023-02-29"));
        assert!(check("time", "08:15:00Z"));
        assert!(!check("time", "8am"));
        assert!(check("email", "dev@example.com"));
        assert!(!check("email", "dev@localhost"));
        assert!(check("hostname", "api.example.com"));
        assert!(!check("hostname", "-bad-.com"));
        assert!(check("ipv4", "192.168.0.1"));
        assert!(!check("ipv4", "256.0.0.1"));
        assert!(check("ipv6", "::1"));
        assert!(check("uri", "https://example.com/a?b=c"));
        assert!(!check("uri", "not a uri"));
        assert!(check("uuid", "123e4567-e89b-12d3-a456-426614174000"));
        assert!(check("json-pointer", "/a/b~1c"));
        assert!(!check("json-pointer", "a/b"));
        assert!(check("relative-json-pointer", "1/a"));
        assert!(check("regex", "^(const version = ).*;"));
        assert!(!check("regex", "(unclosed"));
    }

    #[test]
    fn custom_formats_can_be_registered() {
        let reg = FormatRegistry::empty().register("even-length", |s| s.len() % 2 == 0);
        assert!(reg.get("even-length").unwrap()("ab"));
        assert!(reg.get("date").is_none());
    }
}
