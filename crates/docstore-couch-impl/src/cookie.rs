/// The cookie carrying the store's session token.
pub(crate) const SESSION_COOKIE: &str = "AuthSession";

/// Extracts the session token from a set of `Set-Cookie` header values.
pub(crate) fn session_token<'a>(
  set_cookie: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
  set_cookie.into_iter().find_map(|header| {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    if name.trim() != SESSION_COOKIE {
      return None;
    }
    let value = value.trim();
    Some(
      urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_owned()),
    )
  })
}

/// Renders the `Cookie` header for a session token.
pub(crate) fn session_cookie(token: &str) -> String {
  format!("{SESSION_COOKIE}={}", urlencoding::encode(token))
}
