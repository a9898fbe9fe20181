//! Cookie lookup seam used for CSRF header injection.

use std::collections::HashMap;

/// Get-by-name cookie lookup consumed by the managed transport.
pub trait CookieSource: Send + Sync {
    /// Returns the cookie value for `name`, if present.
    fn get(&self, name: &str) -> Option<String>;
}

/// Cookie source that never yields a value (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn get(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Fixed in-memory cookie map.
#[derive(Debug, Clone, Default)]
pub struct StaticCookies {
    entries: HashMap<String, String>,
}

impl StaticCookies {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cookie, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }
}

impl CookieSource for StaticCookies {
    fn get(&self, name: &str) -> Option<String> {
        self.entries.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_cookies_look_up_by_name() {
        let cookies = StaticCookies::new().with("CSRF-TOKEN", "abc123");

        assert_eq!(cookies.get("CSRF-TOKEN").as_deref(), Some("abc123"));
        assert_eq!(cookies.get("missing"), None);
        assert_eq!(NoCookies.get("CSRF-TOKEN"), None);
    }
}
