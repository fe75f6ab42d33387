//! Domain and namespace filters.
//!
//! Both filters are cheap string predicates. Stores use
//! [`namespace_matches`] to scope candidate fetches; retrieval applies
//! [`DomainFilter`] to fetched candidates before scoring.

use crate::models::NamespaceMode;

/// Allow/deny substring filter over item URLs.
///
/// Matching is case-insensitive. A URL passes when no `deny` pattern
/// occurs in it and either `allow` is empty or some `allow` pattern does.
/// Items without a URL pass only when `allow` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, J, S, T>(allow: I, deny: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            allow: normalize_patterns(allow),
            deny: normalize_patterns(deny),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    pub fn permits(&self, url: Option<&str>) -> bool {
        let url = match url {
            Some(u) => u.to_lowercase(),
            None => return self.allow.is_empty(),
        };
        if self.deny.iter().any(|d| url.contains(d.as_str())) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|a| url.contains(a.as_str()))
    }
}

fn normalize_patterns<I, S>(patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether a stored `namespace` is visible to a query for `requested`.
///
/// In prefix mode a namespace matches when it equals `requested` or lies
/// beneath it on a `/` boundary: `team` matches `team/topic` but not
/// `teamwork`.
pub fn namespace_matches(namespace: &str, requested: &str, mode: NamespaceMode) -> bool {
    let requested = requested.trim_end_matches('/');
    match mode {
        NamespaceMode::Strict => namespace == requested,
        NamespaceMode::Prefix => {
            namespace == requested
                || (namespace.starts_with(requested)
                    && namespace[requested.len()..].starts_with('/'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_permits_everything() {
        let f = DomainFilter::default();
        assert!(f.is_empty());
        assert!(f.permits(Some("https://a.com")));
        assert!(f.permits(None));
    }

    #[test]
    fn test_allow_list() {
        let f = DomainFilter::new(["docs.rs"], Vec::<String>::new());
        assert!(f.permits(Some("https://DOCS.rs/serde")));
        assert!(!f.permits(Some("https://crates.io/serde")));
        assert!(!f.permits(None));
    }

    #[test]
    fn test_deny_beats_allow() {
        let f = DomainFilter::new(["example.com"], ["blog.example.com"]);
        assert!(f.permits(Some("https://www.example.com/a")));
        assert!(!f.permits(Some("https://blog.example.com/a")));
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let f = DomainFilter::new(["  ", ""], [" "]);
        assert!(f.is_empty());
    }

    #[test]
    fn test_namespace_strict() {
        assert!(namespace_matches("team/topic", "team/topic", NamespaceMode::Strict));
        assert!(!namespace_matches("team/topic", "team", NamespaceMode::Strict));
    }

    #[test]
    fn test_namespace_prefix() {
        assert!(namespace_matches("team", "team", NamespaceMode::Prefix));
        assert!(namespace_matches("team/topic", "team", NamespaceMode::Prefix));
        assert!(namespace_matches("team/topic", "team/", NamespaceMode::Prefix));
        assert!(!namespace_matches("teamwork", "team", NamespaceMode::Prefix));
        assert!(!namespace_matches("team", "team/topic", NamespaceMode::Prefix));
    }
}
