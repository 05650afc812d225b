use std::collections::HashSet;

use url::Url;

use crate::{RequestOptions, RequestState, ResubmitError, Result, TransportResponse};

use super::{Cookie, CookieJar};

/// Cookie handling for one logical request.
///
/// Keeps the request's own `Cookie` header as written and a handle to the
/// client-lifetime jar.
#[derive(Debug)]
pub struct CookieSession<'a> {
    jar: &'a CookieJar,
    explicit: Option<String>,
    explicit_names: HashSet<String>,
}

impl<'a> CookieSession<'a> {
    /// Captures `request`'s own `Cookie` header; fails if its URL does not parse.
    pub fn new(jar: &'a CookieJar, request: &RequestOptions) -> Result<Self> {
        parse_url(&request.url)?;
        let explicit = request
            .headers
            .get("cookie")
            .map(|header| header.trim().trim_end_matches(';').trim_end())
            .filter(|header| !header.is_empty())
            .map(str::to_owned);
        let explicit_names = explicit
            .as_deref()
            .map(cookie_names)
            .unwrap_or_default();
        Ok(Self {
            jar,
            explicit,
            explicit_names,
        })
    }

    /// The request's own header verbatim, then jar cookies whose name it
    /// does not mention.
    pub fn outgoing_header(&self, url: &Url) -> Option<String> {
        let stored: Vec<String> = self
            .jar
            .cookies(url)
            .iter()
            .filter(|cookie| !self.explicit_names.contains(&cookie.key))
            .map(Cookie::pair)
            .collect();
        match (&self.explicit, stored.is_empty()) {
            (Some(explicit), true) => Some(explicit.clone()),
            (Some(explicit), false) => Some(format!("{explicit}; {}", stored.join("; "))),
            (None, false) => Some(stored.join("; ")),
            (None, true) => None,
        }
    }

    /// Rebuilds the `Cookie` header of the next attempt.
    ///
    /// The header is dropped when nothing applies, so a cookie deleted by an
    /// earlier attempt is not resent.
    pub fn attach(&self, state: &mut RequestState) -> Result<()> {
        let url = parse_url(state.url())?;
        match self.outgoing_header(&url) {
            Some(header) => state.request_mut().headers.insert("cookie", header),
            None => {
                state.request_mut().headers.remove("cookie");
            }
        }
        Ok(())
    }

    /// Stores every `Set-Cookie` value of `response` in the jar.
    ///
    /// Values are matched against the response's effective URL. Rejected
    /// values are logged and skipped.
    pub fn collect(&self, state: &RequestState, response: &TransportResponse, set_cookies: Vec<String>) {
        if set_cookies.is_empty() {
            return;
        }
        let origin = if response.url.is_empty() {
            state.url()
        } else {
            response.url.as_str()
        };
        let url = match Url::parse(origin) {
            Ok(url) => url,
            Err(err) => {
                state.warn(format_args!("cannot store cookies for `{origin}`: {err}"));
                return;
            }
        };

        let mut stored = 0usize;
        for value in &set_cookies {
            match self.jar.set_cookie(value, &url) {
                Ok(()) => stored += 1,
                Err(err) => state.warn(format_args!("ignoring Set-Cookie: {err}")),
            }
        }
        state.debug(format_args!("stored {stored} of {} cookie(s)", set_cookies.len()));
    }
}

/// Names in a request `Cookie` header; a token without `=` counts as a name.
fn cookie_names(header: &str) -> HashSet<String> {
    header
        .split(';')
        .map(|pair| pair.split_once('=').map_or(pair, |(name, _)| name).trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| ResubmitError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })
}
