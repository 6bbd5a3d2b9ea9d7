use glob::Pattern;
use url::Url;

/// Host pattern for limiting which requests are captured
#[derive(Debug, Clone)]
pub enum HostPattern {
    /// Exact hostname match (case-insensitive)
    Exact(String),
    /// Glob pattern match (e.g., *.example.com)
    Glob(Pattern),
}

impl HostPattern {
    /// Parse a host pattern string
    ///
    /// Patterns containing '*' or '?' are globs, everything else is an exact match.
    pub fn parse(pattern: &str) -> crate::Result<Self> {
        let pattern_lower = pattern.trim().to_lowercase();
        if pattern_lower.contains('*') || pattern_lower.contains('?') {
            let glob_pattern = Pattern::new(&pattern_lower).map_err(|e| {
                crate::Error::InvalidPattern(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
            Ok(HostPattern::Glob(glob_pattern))
        } else {
            Ok(HostPattern::Exact(pattern_lower))
        }
    }

    pub fn matches(&self, hostname: &str) -> bool {
        let hostname_lower = hostname.to_lowercase();
        match self {
            HostPattern::Exact(pattern) => &hostname_lower == pattern,
            HostPattern::Glob(pattern) => pattern.matches(&hostname_lower),
        }
    }
}

/// Set of host patterns; an empty filter lets everything through
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    patterns: Vec<HostPattern>,
}

impl HostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from pattern strings, splitting comma-separated values
    pub fn from_patterns<I, S>(patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for raw in patterns {
            for part in raw.as_ref().split(',').map(str::trim).filter(|p| !p.is_empty()) {
                filter.patterns.push(HostPattern::parse(part)?);
            }
        }
        Ok(filter)
    }

    /// Check a request URL against the filter
    pub fn allows(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        match Url::parse(url).ok().as_ref().and_then(Url::host_str) {
            Some(host) => self.patterns.iter().any(|p| p.matches(host)),
            None => false,
        }
    }
}
