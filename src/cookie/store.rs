use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use url::Url;

use super::{Cookie, CookieError};

#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
struct Scope {
    domain: String,
    path: String,
}

#[derive(Clone, Debug)]
struct Entry {
    cookie: Cookie,
    created: u64,
}

/// Cookies keyed by domain and path, one record per name.
///
/// Not synchronized; see [`super::CookieJar`] for the shared variant.
#[derive(Clone, Debug, Default)]
pub struct CookieStore {
    scopes: BTreeMap<Scope, BTreeMap<String, Entry>>,
    next_created: u64,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores one `Set-Cookie` value received from `url`.
    pub fn set_cookie(&mut self, set_cookie: &str, url: &Url) -> Result<(), CookieError> {
        let now = Utc::now();
        let cookie = Cookie::parse(set_cookie, url, now)?;
        self.insert(cookie, now);
        Ok(())
    }

    /// Stores `cookie`, replacing a same-named one in the same scope.
    ///
    /// An already expired cookie deletes its stored counterpart instead.
    /// Returns whether the cookie was kept.
    pub fn insert(&mut self, cookie: Cookie, now: DateTime<Utc>) -> bool {
        let scope = Scope {
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
        };

        if cookie.is_expired(now) {
            if let Some(names) = self.scopes.get_mut(&scope) {
                names.remove(&cookie.key);
                if names.is_empty() {
                    self.scopes.remove(&scope);
                }
            }
            return false;
        }

        let names = self.scopes.entry(scope).or_default();
        let created = match names.get(&cookie.key) {
            Some(existing) => existing.created,
            None => {
                self.next_created += 1;
                self.next_created
            }
        };
        names.insert(cookie.key.clone(), Entry { cookie, created });
        true
    }

    /// Live cookies applicable to `url`, longest path first, then oldest first.
    pub fn matching(&self, url: &Url, now: DateTime<Utc>) -> Vec<&Cookie> {
        let mut entries: Vec<&Entry> = self
            .entries()
            .filter(|entry| !entry.cookie.is_expired(now) && entry.cookie.matches(url))
            .collect();
        entries.sort_by(|a, b| {
            b.cookie
                .path
                .len()
                .cmp(&a.cookie.path.len())
                .then(a.created.cmp(&b.created))
        });
        entries.into_iter().map(|entry| &entry.cookie).collect()
    }

    /// `Cookie` header value for `url`, if any cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .matching(url, Utc::now())
            .into_iter()
            .map(Cookie::pair)
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    pub fn get(&self, domain: &str, path: &str, key: &str) -> Option<&Cookie> {
        let scope = Scope {
            domain: domain.to_ascii_lowercase(),
            path: path.to_owned(),
        };
        self.scopes
            .get(&scope)
            .and_then(|names| names.get(key))
            .map(|entry| &entry.cookie)
    }

    /// All stored cookies in creation order, expired ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        let mut entries: Vec<&Entry> = self.entries().collect();
        entries.sort_by_key(|entry| entry.created);
        entries.into_iter().map(|entry| &entry.cookie)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.scopes.retain(|_, names| {
            names.retain(|_, entry| !entry.cookie.is_expired(now));
            !names.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.scopes.values().flat_map(BTreeMap::values)
    }
}
