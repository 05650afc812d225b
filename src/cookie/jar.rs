use chrono::Utc;
use parking_lot::RwLock;
use url::Url;

use super::{Cookie, CookieError, CookieStore};

/// Client-lifetime cookie store shared by concurrent requests.
///
/// Each read or write takes the lock once, so concurrent `Set-Cookie`
/// values for the same name resolve last-write-wins.
#[derive(Debug, Default)]
pub struct CookieJar {
    store: RwLock<CookieStore>,
}

impl CookieJar {
    /// Empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores one `Set-Cookie` value received from `url`.
    pub fn set_cookie(&self, set_cookie: &str, url: &Url) -> Result<(), CookieError> {
        let now = Utc::now();
        let cookie = Cookie::parse(set_cookie, url, now)?;
        self.store.write().insert(cookie, now);
        Ok(())
    }

    /// Live cookies applicable to `url`.
    pub fn cookies(&self, url: &Url) -> Vec<Cookie> {
        self.store
            .read()
            .matching(url, Utc::now())
            .into_iter()
            .cloned()
            .collect()
    }

    /// `Cookie` header value for `url`, if any stored cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.store.read().cookie_header(url)
    }

    /// Drops every cookie whose expiry has passed.
    pub fn purge_expired(&self) {
        self.store.write().purge_expired(Utc::now());
    }

    /// Removes every cookie.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Number of stored cookies, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Whether the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}
