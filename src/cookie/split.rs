/// Splits a `Set-Cookie` value that a transport folded into one string.
///
/// Splits on `", "`; a segment only starts a new cookie when it begins with
/// `token=`, otherwise it is glued back onto the previous cookie. This keeps
/// dates such as `Expires=Wed, 21 Oct 2037 07:28:00 GMT` intact.
pub fn split_set_cookie(header: &str) -> Vec<String> {
    if header.trim().is_empty() {
        return Vec::new();
    }

    let mut cookies: Vec<String> = Vec::new();
    for segment in header.split(", ") {
        match cookies.last_mut() {
            Some(current) if !starts_new_cookie(segment) => {
                current.push_str(", ");
                current.push_str(segment);
            }
            _ => cookies.push(segment.to_owned()),
        }
    }
    cookies
}

fn starts_new_cookie(segment: &str) -> bool {
    segment
        .split_once('=')
        .is_some_and(|(name, _)| !name.is_empty() && name.bytes().all(is_token_byte))
}

// RFC 7230 tchar
fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}
