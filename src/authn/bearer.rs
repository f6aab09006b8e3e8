use super::TokenError;

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, TokenError> {
    let header = match header {
        Some(header) => header.trim(),
        None => return Err(TokenError::Missing),
    };
    if header.is_empty() {
        return Err(TokenError::Missing);
    }

    let mut iter = header.split_whitespace();
    let scheme = iter.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Malformed(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }

    let token = match iter.next() {
        Some(token) => token,
        None => return Err(TokenError::Missing),
    };
    if iter.next().is_some() {
        return Err(TokenError::Malformed(
            "unexpected data after bearer token".to_string(),
        ));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(Some("  bearer   abc ")), Ok("abc"));

        assert_eq!(extract_bearer(None), Err(TokenError::Missing));
        assert_eq!(extract_bearer(Some("")), Err(TokenError::Missing));
        assert_eq!(extract_bearer(Some("Bearer")), Err(TokenError::Missing));

        assert!(matches!(
            extract_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            extract_bearer(Some("Bearer a b")),
            Err(TokenError::Malformed(_))
        ));
    }
}
