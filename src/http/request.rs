//! Inbound fetch request extracted from the query string.

/// Name of the query parameter carrying the target URL.
pub const RES_PARAM: &str = "res";

/// The URL a caller asked the relay to fetch.
///
/// An empty `url` means the parameter was absent or blank; that is a valid
/// request which is answered without any outbound fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target URL, already percent-decoded.
    pub url: String,
}

impl FetchRequest {
    /// Create a request for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Extract the request from a raw (still encoded) query string.
    ///
    /// Decoding follows `application/x-www-form-urlencoded`, so both `%XX`
    /// escapes and `+` are decoded. A pair holding a malformed escape is
    /// skipped. When `res` appears more than once the first decodable
    /// occurrence wins.
    pub fn from_query(query: Option<&str>) -> Self {
        let url = query
            .and_then(|q| {
                q.split('&')
                    .filter(|pair| has_valid_escapes(pair))
                    .flat_map(|pair| url::form_urlencoded::parse(pair.as_bytes()))
                    .find(|(key, _)| key == RES_PARAM)
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default();

        Self { url }
    }

    /// Whether the caller left out the target URL.
    pub fn is_missing(&self) -> bool {
        self.url.is_empty()
    }
}

/// Every `%` must be followed by two hex digits.
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1..i + 3) {
            Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_absent() {
        assert!(FetchRequest::from_query(None).is_missing());
        assert!(FetchRequest::from_query(Some("")).is_missing());
        assert!(FetchRequest::from_query(Some("other=1")).is_missing());
    }

    #[test]
    fn test_from_query_empty_value() {
        assert!(FetchRequest::from_query(Some("res=")).is_missing());
        assert!(FetchRequest::from_query(Some("res")).is_missing());
    }

    #[test]
    fn test_from_query_decodes_value() {
        let request = FetchRequest::from_query(Some(
            "res=http%3A%2F%2Fexample.com%2Fa%3Fb%3D1%26c%3D2",
        ));
        assert_eq!(request.url, "http://example.com/a?b=1&c=2");

        let request = FetchRequest::from_query(Some("res=http://example.com/a+b%20c"));
        assert_eq!(request.url, "http://example.com/a b c");
    }

    #[test]
    fn test_from_query_malformed_escape_is_missing() {
        assert!(FetchRequest::from_query(Some("res=%zz")).is_missing());
        assert!(FetchRequest::from_query(Some("res=%4")).is_missing());
        assert!(FetchRequest::from_query(Some("res=http://a/%")).is_missing());
        assert!(FetchRequest::from_query(Some("r%zs=http://a/&x=1")).is_missing());
    }

    #[test]
    fn test_from_query_skips_only_malformed_pair() {
        let request = FetchRequest::from_query(Some("res=%zz&res=http://a/%41"));
        assert_eq!(request.url, "http://a/A");

        let request = FetchRequest::from_query(Some("x=%g&res=http://a/"));
        assert_eq!(request.url, "http://a/");
    }

    #[test]
    fn test_has_valid_escapes() {
        assert!(has_valid_escapes("res=a%2Fb%2f"));
        assert!(has_valid_escapes(""));
        assert!(!has_valid_escapes("res=%2"));
        assert!(!has_valid_escapes("res=%%41"));
    }

    #[test]
    fn test_from_query_first_value_wins() {
        let request = FetchRequest::from_query(Some("x=1&res=http://a/&res=http://b/"));
        assert_eq!(request.url, "http://a/");
        assert!(!request.is_missing());
    }
}
