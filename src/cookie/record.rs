use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use url::Url;

/// `SameSite` attribute; stored but not enforced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// When a cookie stops being sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Expiry {
    /// Lives until the jar is dropped or cleared.
    Session,
    At(DateTime<Utc>),
}

/// Reasons a `Set-Cookie` value is rejected.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CookieError {
    #[error("missing name=value pair")]
    MissingPair,
    #[error("empty cookie name")]
    EmptyName,
    #[error("url `{0}` has no host")]
    MissingHost(String),
    #[error("domain `{domain}` does not cover host `{host}`")]
    DomainMismatch { domain: String, host: String },
}

/// A single stored cookie.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cookie {
    pub key: String,
    pub value: String,
    /// Normalized (lowercase, no leading dot) domain.
    pub domain: String,
    /// Set when no `Domain` attribute was given; only the exact host matches.
    pub host_only: bool,
    pub path: String,
    pub expires: Expiry,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// Parses one `Set-Cookie` value received from `url`.
    pub fn parse(set_cookie: &str, url: &Url, now: DateTime<Utc>) -> Result<Self, CookieError> {
        let mut parts = set_cookie.split(';');
        let (key, value) = parts
            .next()
            .and_then(|pair| pair.split_once('='))
            .ok_or(CookieError::MissingPair)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CookieError::EmptyName);
        }
        let host = url
            .host_str()
            .ok_or_else(|| CookieError::MissingHost(url.to_string()))?
            .to_ascii_lowercase();

        let mut domain = None;
        let mut path = None;
        let mut expires = None;
        let mut max_age = None;
        let mut secure = false;
        let mut http_only = false;
        let mut same_site = None;

        for attribute in parts {
            let (name, attr_value) = attribute.split_once('=').unwrap_or((attribute, ""));
            let attr_value = attr_value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "expires" => expires = parse_cookie_date(attr_value).or(expires),
                "max-age" => max_age = attr_value.parse::<i64>().ok().or(max_age),
                "domain" => {
                    let normalized = attr_value.trim_start_matches('.').to_ascii_lowercase();
                    if !normalized.is_empty() {
                        domain = Some(normalized);
                    }
                }
                "path" if attr_value.starts_with('/') => path = Some(attr_value.to_owned()),
                "secure" => secure = true,
                "httponly" => http_only = true,
                "samesite" => {
                    same_site = match attr_value.to_ascii_lowercase().as_str() {
                        "strict" => Some(SameSite::Strict),
                        "lax" => Some(SameSite::Lax),
                        "none" => Some(SameSite::None),
                        _ => same_site,
                    }
                }
                _ => {}
            }
        }

        let (domain, host_only) = match domain {
            Some(domain) if domain_matches(&host, &domain) => (domain, false),
            Some(domain) => return Err(CookieError::DomainMismatch { domain, host }),
            None => (host, true),
        };

        let expires = match max_age {
            Some(seconds) if seconds <= 0 => Expiry::At(DateTime::<Utc>::MIN_UTC),
            Some(seconds) => Expiry::At(
                TimeDelta::try_seconds(seconds)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            None => expires.map_or(Expiry::Session, Expiry::At),
        };

        Ok(Self {
            key: key.to_owned(),
            value: value.trim().to_owned(),
            domain,
            host_only,
            path: path.unwrap_or_else(|| default_path(url.path())),
            expires,
            secure,
            http_only,
            same_site,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Expiry::Session => false,
            Expiry::At(at) => at <= now,
        }
    }

    /// Domain, path and `Secure` checks against a request URL.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };
        domain_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    /// `name=value` as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// `host` equals `domain` or ends with `.domain`.
pub(crate) fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Prefix match on `/` boundaries.
pub(crate) fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

/// Directory of the request path, used when `Path` is absent.
fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_owned();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(index) => request_path[..index].to_owned(),
    }
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 4] = [
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
