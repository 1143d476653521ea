//! Endpoint URL model and parser
//!
//! Decodes `scheme://host[:port][/path][?query]` server endpoints into an
//! [`Endpoint`] record. Path and query segments are validated against the
//! RFC 3986 `pchar` grammar and percent-decoded into owned strings.
//! Credentials embedded in the host part are rejected outright.

use std::fmt;

use crate::error::{Error, Result};

/// Maximum accepted scheme length, in bytes.
pub const SCHEME_MAX: usize = 16;

/// Maximum accepted host length, in bytes.
pub const HOST_MAX: usize = 255;

/// Maximum number of digits in the port part.
pub const PORT_MAX_DIGITS: usize = 5;

/// A parsed server endpoint URL
///
/// Built once by [`Endpoint::parse`] and immutable thereafter. Path and
/// query segments are stored percent-decoded, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: Option<String>,
    path: Vec<String>,
    query: Vec<String>,
}

fn parse_error(reason: &str) -> Error {
    log::error!("{}", reason);
    Error::InvalidUrl(reason.to_string())
}

/// RFC 3986 `pchar`: unreserved | sub-delims | ':' | '@'
fn is_pchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&byte)
}

/// Query characters additionally allow '/' and '?'
fn is_query_char(byte: u8) -> bool {
    is_pchar(byte) || byte == b'/' || byte == b'?'
}

/// Bytes a re-encoded query segment may carry unescaped. A literal '&'
/// would read back as a segment separator, so it is always escaped.
fn is_unambiguous_query_char(byte: u8) -> bool {
    is_query_char(byte) && byte != b'&'
}

fn hex_digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Validate a raw (still escaped) segment against the given character class.
///
/// Every byte must either belong to the class or start a well-formed `%HH`
/// escape.
fn validate_segment(raw: &str, is_valid_byte: fn(u8) -> bool) -> Result<()> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if is_valid_byte(bytes[i]) {
            i += 1;
        } else if bytes[i] == b'%' {
            if i + 2 < bytes.len()
                && hex_digit_value(bytes[i + 1]).is_some()
                && hex_digit_value(bytes[i + 2]).is_some()
            {
                i += 3;
            } else {
                return Err(parse_error("bad escape format (%XX)"));
            }
        } else {
            return Err(parse_error("invalid character in URL segment"));
        }
    }
    Ok(())
}

/// Percent-decode a validated segment into an owned string.
fn percent_decode(raw: &str) -> Result<String> {
    if !raw.contains('%') {
        // nothing to unescape
        return Ok(raw.to_string());
    }

    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let high = bytes
                .get(i + 1)
                .copied()
                .and_then(hex_digit_value)
                .ok_or_else(|| parse_error("bad escape format (%XX)"))?;
            let low = bytes
                .get(i + 2)
                .copied()
                .and_then(hex_digit_value)
                .ok_or_else(|| parse_error("bad escape format (%XX)"))?;
            decoded.push(high << 4 | low);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded)
        .map_err(|_| parse_error("percent-decoded segment is not valid UTF-8"))
}

fn parse_scheme(input: &str) -> Result<(String, &str)> {
    let separator = input
        .find("://")
        .ok_or_else(|| parse_error("could not parse scheme"))?;
    if separator >= SCHEME_MAX {
        return Err(parse_error("scheme name too long"));
    }
    Ok((input[..separator].to_string(), &input[separator + 3..]))
}

fn parse_host(input: &str) -> Result<(String, &str)> {
    let (host, rest) = if let Some(bracketed) = input.strip_prefix('[') {
        // IPv6 literal, consume until the matching bracket
        let end = bracketed
            .find(']')
            .ok_or_else(|| parse_error("expected ] at the end of host address"))?;
        (&bracketed[..end], &bracketed[end + 1..])
    } else {
        let end = input
            .find(|c| c == '/' || c == ':')
            .unwrap_or(input.len());
        let host = &input[..end];
        if host.contains('@') {
            return Err(parse_error("credentials in URLs are not supported"));
        }
        (host, &input[end..])
    };

    if host.len() > HOST_MAX {
        return Err(parse_error("host address too long"));
    }
    if host.is_empty() {
        return Err(parse_error("host part cannot be empty"));
    }
    Ok((host.to_string(), rest))
}

fn parse_port(input: &str) -> Result<(Option<String>, &str)> {
    let rest = match input.strip_prefix(':') {
        Some(rest) => rest,
        None => return Ok((None, input)),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    let after = &rest[digits_end..];

    if digits.len() > PORT_MAX_DIGITS {
        return Err(parse_error("port number too long"));
    }
    if !after.is_empty() && !after.starts_with('/') {
        return Err(parse_error("port should have a numeric value"));
    }
    if digits.is_empty() {
        return Err(parse_error("expected at least one digit for port number"));
    }
    Ok((Some(digits.to_string()), after))
}

/// Split a path or query section into decoded segments.
///
/// `section` is the text after the leading separator. A single trailing
/// delimiter produces no empty tail segment when `skip_trailing_empty` is
/// set; empty segments in the middle are preserved.
fn parse_segments(
    section: &str,
    delimiter: char,
    skip_trailing_empty: bool,
    is_valid_byte: fn(u8) -> bool,
) -> Result<Vec<String>> {
    let mut raw_segments: Vec<&str> = section.split(delimiter).collect();
    if skip_trailing_empty && raw_segments.last() == Some(&"") {
        raw_segments.pop();
    }

    let mut segments = Vec::with_capacity(raw_segments.len());
    for raw in raw_segments {
        validate_segment(raw, is_valid_byte)?;
        segments.push(percent_decode(raw)?);
    }
    Ok(segments)
}

impl Endpoint {
    /// Parse a textual `scheme://host[:port][/path][?query]` endpoint.
    ///
    /// # Errors
    /// Returns [`Error::InvalidUrl`] with the failure reason on any grammar
    /// violation: missing scheme, oversize scheme/host/port, empty host,
    /// credentials in the host, malformed port, unterminated IPv6 literal,
    /// invalid escapes or characters, or trailing garbage.
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, rest) = parse_scheme(raw)?;
        let (host, rest) = parse_host(rest)?;
        let (port, mut rest) = parse_port(rest)?;

        let mut path = Vec::new();
        if let Some(after_slash) = rest.strip_prefix('/') {
            let end = after_slash.find('?').unwrap_or(after_slash.len());
            path = parse_segments(&after_slash[..end], '/', true, is_pchar)?;
            rest = &after_slash[end..];
        }

        let mut query = Vec::new();
        if let Some(after_mark) = rest.strip_prefix('?') {
            query = parse_segments(after_mark, '&', false, is_query_char)?;
            rest = "";
        }

        if !rest.is_empty() {
            return Err(parse_error("unexpected characters after URL"));
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query,
        })
    }

    /// URL scheme, e.g. `coap` or `coaps`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host part: hostname, IPv4 literal, or unbracketed IPv6 literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part as it appeared in the URL, if present
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Percent-decoded path segments, in order
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Percent-decoded query segments, in order
    pub fn query(&self) -> &[String] {
        &self.query
    }

    /// Default port for well-known schemes: `coap` 5683, `coaps` 5684
    pub fn default_port(&self) -> Option<u16> {
        match self.scheme.as_str() {
            "coap" => Some(5683),
            "coaps" => Some(5684),
            _ => None,
        }
    }
}

fn write_escaped(
    f: &mut fmt::Formatter<'_>,
    segment: &str,
    is_valid_byte: fn(u8) -> bool,
) -> fmt::Result {
    for &byte in segment.as_bytes() {
        if is_valid_byte(byte) {
            write!(f, "{}", byte as char)?;
        } else {
            write!(f, "%{:02X}", byte)?;
        }
    }
    Ok(())
}

impl fmt::Display for Endpoint {
    /// Re-encodes the endpoint, percent-escaping segment bytes outside the
    /// `pchar` grammar. The output parses back to an equal `Endpoint`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        if let Some(port) = &self.port {
            write!(f, ":{}", port)?;
        }
        for segment in &self.path {
            write!(f, "/")?;
            write_escaped(f, segment, is_pchar)?;
        }
        for (i, segment) in self.query.iter().enumerate() {
            write!(f, "{}", if i == 0 { '?' } else { '&' })?;
            write_escaped(f, segment, is_unambiguous_query_char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand32::Lcg32;

    fn reason(result: Result<Endpoint>) -> String {
        match result {
            Err(Error::InvalidUrl(reason)) => reason,
            other => panic!("expected InvalidUrl, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_full_coaps_url() {
        let endpoint = Endpoint::parse("coaps://[::1]:5684/rd?ep=dev1&lt=86400").unwrap();
        assert_eq!(endpoint.scheme(), "coaps");
        assert_eq!(endpoint.host(), "::1");
        assert_eq!(endpoint.port(), Some("5684"));
        assert_eq!(endpoint.path(), ["rd"]);
        assert_eq!(endpoint.query(), ["ep=dev1", "lt=86400"]);
    }

    #[test]
    fn test_parse_minimal_url() {
        let endpoint = Endpoint::parse("coap://example.com").unwrap();
        assert_eq!(endpoint.scheme(), "coap");
        assert_eq!(endpoint.host(), "example.com");
        assert_eq!(endpoint.port(), None);
        assert!(endpoint.path().is_empty());
        assert!(endpoint.query().is_empty());
    }

    #[test]
    fn test_credentials_rejected() {
        let result = Endpoint::parse("coap://user@example.com");
        assert_eq!(reason(result), "credentials in URLs are not supported");
    }

    #[test]
    fn test_bad_escape_rejected() {
        let result = Endpoint::parse("coap://example.com/%2Fa/%zz");
        assert_eq!(reason(result), "bad escape format (%XX)");
    }

    #[test]
    fn test_escape_decoding() {
        let endpoint = Endpoint::parse("coap://example.com/%2Fa/b%20c").unwrap();
        assert_eq!(endpoint.path(), ["/a", "b c"]);
    }

    #[test]
    fn test_missing_scheme() {
        let result = Endpoint::parse("example.com/rd");
        assert_eq!(reason(result), "could not parse scheme");
    }

    #[test]
    fn test_scheme_length_bound() {
        let at_limit = format!("{}://h", "s".repeat(SCHEME_MAX - 1));
        assert!(Endpoint::parse(&at_limit).is_ok());

        let over_limit = format!("{}://h", "s".repeat(SCHEME_MAX));
        assert_eq!(reason(Endpoint::parse(&over_limit)), "scheme name too long");
    }

    #[test]
    fn test_empty_host() {
        let result = Endpoint::parse("coap://:5683");
        assert_eq!(reason(result), "host part cannot be empty");

        let result = Endpoint::parse("coap:///rd");
        assert_eq!(reason(result), "host part cannot be empty");
    }

    #[test]
    fn test_host_length_bound() {
        let at_limit = format!("coap://{}", "h".repeat(HOST_MAX));
        assert!(Endpoint::parse(&at_limit).is_ok());

        let over_limit = format!("coap://{}", "h".repeat(HOST_MAX + 1));
        assert_eq!(reason(Endpoint::parse(&over_limit)), "host address too long");
    }

    #[test]
    fn test_ipv6_literal_bounds() {
        let at_limit = format!("coap://[{}]:1", "a".repeat(HOST_MAX));
        assert!(Endpoint::parse(&at_limit).is_ok());

        let over_limit = format!("coap://[{}]", "a".repeat(HOST_MAX + 1));
        assert_eq!(reason(Endpoint::parse(&over_limit)), "host address too long");
    }

    #[test]
    fn test_unterminated_ipv6_literal() {
        let result = Endpoint::parse("coap://[::1");
        assert_eq!(reason(result), "expected ] at the end of host address");
    }

    #[test]
    fn test_port_five_digits() {
        let endpoint = Endpoint::parse("coap://h:65535").unwrap();
        assert_eq!(endpoint.port(), Some("65535"));
    }

    #[test]
    fn test_port_too_long() {
        let result = Endpoint::parse("coap://h:123456");
        assert_eq!(reason(result), "port number too long");
    }

    #[test]
    fn test_port_empty() {
        let result = Endpoint::parse("coap://h:");
        assert_eq!(
            reason(result),
            "expected at least one digit for port number"
        );

        let result = Endpoint::parse("coap://h:/rd");
        assert_eq!(
            reason(result),
            "expected at least one digit for port number"
        );
    }

    #[test]
    fn test_port_non_numeric() {
        let result = Endpoint::parse("coap://h:56x83");
        assert_eq!(reason(result), "port should have a numeric value");
    }

    #[test]
    fn test_trailing_slash_produces_no_empty_segment() {
        let endpoint = Endpoint::parse("coap://h/rd/").unwrap();
        assert_eq!(endpoint.path(), ["rd"]);

        let endpoint = Endpoint::parse("coap://h/").unwrap();
        assert!(endpoint.path().is_empty());
    }

    #[test]
    fn test_inner_empty_segments_preserved() {
        let endpoint = Endpoint::parse("coap://h/a//b").unwrap();
        assert_eq!(endpoint.path(), ["a", "", "b"]);
    }

    #[test]
    fn test_query_allows_slash_and_question_mark() {
        let endpoint = Endpoint::parse("coap://h/rd?next=/a?b").unwrap();
        assert_eq!(endpoint.query(), ["next=/a?b"]);
    }

    #[test]
    fn test_invalid_path_character() {
        let result = Endpoint::parse("coap://h/a b");
        assert_eq!(reason(result), "invalid character in URL segment");
    }

    #[test]
    fn test_trailing_garbage() {
        let result = Endpoint::parse("coap://[::1]x");
        assert_eq!(reason(result), "unexpected characters after URL");
    }

    #[test]
    fn test_display_reencodes() {
        let urls = [
            "coaps://[::1]:5684/rd?ep=dev1&lt=86400",
            "coap://example.com",
            "coap://h:65535/a//b",
            "coap://h/rd?b=U",
        ];
        for url in urls {
            let endpoint = Endpoint::parse(url).unwrap();
            assert_eq!(endpoint.to_string(), url);
        }
    }

    #[test]
    fn test_display_parse_roundtrip_with_escapes() {
        let endpoint = Endpoint::parse("coap://h/a%20b%2Fc?q=%26x").unwrap();
        assert_eq!(endpoint.path(), ["a b/c"]);
        assert_eq!(endpoint.query(), ["q=&x"]);

        let reparsed = Endpoint::parse(&endpoint.to_string()).unwrap();
        assert_eq!(reparsed, endpoint);
    }

    #[test]
    fn test_roundtrip_random_segments() {
        // Deterministic sweep over arbitrary segment bytes; everything the
        // encoder emits must parse back to the same endpoint.
        let mut rng = Lcg32::new(0x1eaf);
        for _ in 0..64 {
            let mut path = Vec::new();
            for _ in 0..(rng.next_u32() % 4) {
                let segment: String = (0..(rng.next_u32() % 7 + 1))
                    .map(|_| char::from((rng.next_u32() % 0x5e + 0x20) as u8))
                    .collect();
                path.push(segment);
            }
            let endpoint = Endpoint {
                scheme: "coap".to_string(),
                host: "example.com".to_string(),
                port: Some("5683".to_string()),
                path,
                query: vec!["ep=dev1".to_string()],
            };
            let reparsed = Endpoint::parse(&endpoint.to_string()).unwrap();
            assert_eq!(reparsed, endpoint);
        }
    }
}
