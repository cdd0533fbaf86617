//! Query-string parsing for thumbnail requests

use crate::error::RequestError;
use serde::Deserialize;
use std::path::{Component, Path};
use thumb_geometry::Constraints;

/// Largest width or height a client may ask for
pub const MAX_DIMENSION: u32 = 4096;

/// Raw query parameters of `GET /thumb`.
///
/// Numbers are kept as strings so a malformed value falls back to its default
/// instead of rejecting the whole request.
#[derive(Debug, Default, Deserialize)]
pub struct ThumbQuery {
    pub file: Option<String>,
    pub quality: Option<String>,
    pub max_width: Option<String>,
    pub max_height: Option<String>,
    pub square: Option<String>,
    pub no_cache: Option<String>,
}

/// A validated thumbnail request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbRequest {
    pub filename: String,
    pub quality: u8,
    pub constraints: Constraints,
    /// `no_cache=true`: drop any cached variant and skip the cache lookup
    pub invalidate_cache: bool,
    /// Store the rendered thumbnail. Only an absent or `"false"` `no_cache` allows it.
    pub write_cache: bool,
}

impl ThumbRequest {
    pub fn from_query(query: ThumbQuery, default_quality: u8) -> Result<Self, RequestError> {
        let filename = query
            .file
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(RequestError::MissingFile)?
            .to_string();

        let quality = query
            .quality
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|q| *q > 0)
            .map(|q| q.min(100) as u8)
            .unwrap_or(default_quality);

        let constraints = Constraints {
            max_width: parse_dimension(query.max_width.as_deref()),
            max_height: parse_dimension(query.max_height.as_deref()),
            square: query.square.is_some(),
        };

        let no_cache = query.no_cache.as_deref();

        Ok(Self {
            filename,
            quality,
            constraints,
            invalidate_cache: no_cache == Some("true"),
            write_cache: matches!(no_cache, None | Some("false")),
        })
    }
}

/// Parse an optional dimension. Missing, malformed and negative values mean unconstrained.
fn parse_dimension(value: Option<&str>) -> u32 {
    value
        .and_then(parse_leading_int)
        .map(|v| v.clamp(0, i64::from(MAX_DIMENSION)) as u32)
        .unwrap_or(0)
}

/// Lenient integer parsing: `"120px"` is 120, `"abc"` is nothing.
/// Digit runs too long for an `i64` saturate.
fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let parsed = digits[..end].parse::<i64>().unwrap_or(i64::MAX);

    Some(if negative { -parsed } else { parsed })
}

/// Reject filenames that could resolve outside the uploads directory
pub fn validate_filename(filename: &str) -> Result<(), RequestError> {
    let disallowed = filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
        || Path::new(filename)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

    if disallowed {
        return Err(RequestError::DisallowedName(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(file: &str) -> ThumbQuery {
        ThumbQuery {
            file: Some(file.to_string()),
            ..ThumbQuery::default()
        }
    }

    #[test]
    fn test_defaults() {
        let request = ThumbRequest::from_query(query("cat.jpg"), 80).unwrap();
        assert_eq!(request.filename, "cat.jpg");
        assert_eq!(request.quality, 80);
        assert_eq!(request.constraints, Constraints::default());
        assert!(!request.invalidate_cache);
        assert!(request.write_cache);
    }

    #[test]
    fn test_missing_file() {
        let err = ThumbRequest::from_query(ThumbQuery::default(), 80).unwrap_err();
        assert_eq!(err, RequestError::MissingFile);

        let err = ThumbRequest::from_query(query("   "), 80).unwrap_err();
        assert_eq!(err, RequestError::MissingFile);
    }

    #[test]
    fn test_filename_is_trimmed() {
        let request = ThumbRequest::from_query(query("  cat.jpg \n"), 80).unwrap();
        assert_eq!(request.filename, "cat.jpg");
    }

    #[test]
    fn test_full_query() {
        let q = ThumbQuery {
            file: Some("cat.jpg".to_string()),
            quality: Some("65".to_string()),
            max_width: Some("200".to_string()),
            max_height: Some("150".to_string()),
            square: Some(String::new()),
            no_cache: Some("true".to_string()),
        };
        let request = ThumbRequest::from_query(q, 80).unwrap();
        assert_eq!(request.quality, 65);
        assert_eq!(request.constraints.max_width, 200);
        assert_eq!(request.constraints.max_height, 150);
        assert!(request.constraints.square);
        assert!(request.invalidate_cache);
        assert!(!request.write_cache);
    }

    #[test]
    fn test_quality_bounds() {
        let mut q = query("cat.jpg");
        q.quality = Some("0".to_string());
        assert_eq!(ThumbRequest::from_query(q, 80).unwrap().quality, 80);

        let mut q = query("cat.jpg");
        q.quality = Some("250".to_string());
        assert_eq!(ThumbRequest::from_query(q, 80).unwrap().quality, 100);

        let mut q = query("cat.jpg");
        q.quality = Some("high".to_string());
        assert_eq!(ThumbRequest::from_query(q, 80).unwrap().quality, 80);
    }

    #[test]
    fn test_lenient_dimensions() {
        assert_eq!(parse_dimension(Some("120px")), 120);
        assert_eq!(parse_dimension(Some("-50")), 0);
        assert_eq!(parse_dimension(Some("wide")), 0);
        assert_eq!(parse_dimension(Some("99999")), MAX_DIMENSION);
        assert_eq!(parse_dimension(None), 0);
    }

    #[test]
    fn test_overflowing_dimensions_saturate() {
        assert_eq!(parse_dimension(Some("99999999999999999999")), MAX_DIMENSION);
        assert_eq!(parse_dimension(Some("-99999999999999999999")), 0);
        assert_eq!(parse_leading_int("99999999999999999999px"), Some(i64::MAX));
        assert_eq!(parse_leading_int("-"), None);
    }

    fn with_no_cache(value: &str) -> ThumbRequest {
        let mut q = query("cat.jpg");
        q.no_cache = Some(value.to_string());
        ThumbRequest::from_query(q, 80).unwrap()
    }

    #[test]
    fn test_no_cache_modes() {
        let request = with_no_cache("false");
        assert!(!request.invalidate_cache);
        assert!(request.write_cache);

        let request = with_no_cache("true");
        assert!(request.invalidate_cache);
        assert!(!request.write_cache);

        // Any other value reads the cache but never writes it
        let request = with_no_cache("yes");
        assert!(!request.invalidate_cache);
        assert!(!request.write_cache);

        let request = with_no_cache("");
        assert!(!request.invalidate_cache);
        assert!(!request.write_cache);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("cat.jpg").is_ok());
        assert!(validate_filename("my cat.final.png").is_ok());

        assert!(validate_filename("../secret.jpg").is_err());
        assert!(validate_filename("sub/cat.jpg").is_err());
        assert!(validate_filename("sub\\cat.jpg").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename(".").is_err());
        assert!(validate_filename("cat\0.jpg").is_err());
    }
}
