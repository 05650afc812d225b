//! Cookie session bridge.
//!
//! [`CookieStore`] matches and stores cookies by domain, path and expiry.
//! [`CookieJar`] wraps one for the lifetime of a client, and
//! [`CookieSession`] merges it with a request's own `Cookie` header.

mod jar;
mod record;
mod session;
mod split;
mod store;

pub use jar::CookieJar;
pub use record::{Cookie, CookieError, Expiry, SameSite};
pub use session::CookieSession;
pub use split::split_set_cookie;
pub use store::CookieStore;
