//! Parsing of the `filters` query parameter.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Parse `factor1:value1;factor2:value2` into a factor → value map.
///
/// Segments are split on `;`, then on the first `:`; whitespace around both
/// tokens is trimmed. Empty segments (e.g. a trailing `;`) are skipped. A
/// repeated factor keeps its last value.
pub fn parse_filter_str(s: &str) -> Result<BTreeMap<String, String>> {
  let mut out = BTreeMap::new();

  for segment in s.split(';') {
    if segment.trim().is_empty() {
      continue;
    }
    let Some((key, value)) = segment.split_once(':') else {
      return Err(Error::MalformedFilter(segment.trim().to_owned()));
    };
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
      return Err(Error::MalformedFilter(segment.trim().to_owned()));
    }
    out.insert(key.to_owned(), value.to_owned());
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn parses_pairs() {
    assert_eq!(
      parse_filter_str("RE:White;Sex:Female").unwrap(),
      map(&[("RE", "White"), ("Sex", "Female")])
    );
  }

  #[test]
  fn trims_whitespace() {
    assert_eq!(
      parse_filter_str("RE:  White NH  ; Sex: Female  ").unwrap(),
      map(&[("RE", "White NH"), ("Sex", "Female")])
    );
  }

  #[test]
  fn first_colon_wins() {
    assert_eq!(
      parse_filter_str("age:Ages <50: early").unwrap(),
      map(&[("age", "Ages <50: early")])
    );
  }

  #[test]
  fn skips_empty_segments() {
    assert_eq!(
      parse_filter_str(" ;sex:Male;").unwrap(),
      map(&[("sex", "Male")])
    );
    assert!(parse_filter_str("").unwrap().is_empty());
  }

  #[test]
  fn rejects_segment_without_colon() {
    let err = parse_filter_str("sex=Male").unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(ref s) if s == "sex=Male"));
  }

  #[test]
  fn rejects_empty_key_or_value() {
    assert!(parse_filter_str(":Male").is_err());
    assert!(parse_filter_str("sex:  ").is_err());
  }

  #[test]
  fn last_duplicate_wins() {
    assert_eq!(
      parse_filter_str("sex:Male;sex:Female").unwrap(),
      map(&[("sex", "Female")])
    );
  }
}
