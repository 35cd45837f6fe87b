//! Filename helpers.

/// Lowercase, drop everything but word characters, spaces and hyphens, then
/// collapse runs of spaces and hyphens into a single hyphen.
pub fn slugify(value: &str) -> String {
  let kept: String = value
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-') || c.is_whitespace())
    .collect();

  let mut out = String::with_capacity(kept.len());
  let mut pending_sep = false;
  for c in kept.trim().chars() {
    if c == '-' || c.is_whitespace() {
      pending_sep = true;
      continue;
    }
    if pending_sep && !out.is_empty() {
      out.push('-');
    }
    pending_sep = false;
    out.push(c.to_ascii_lowercase());
  }
  out
}

/// Make one archive path segment safe: path separators become hyphens,
/// characters reserved on common filesystems and control characters are
/// dropped, surrounding whitespace and trailing dots are trimmed.
pub fn sanitize_path_segment(value: &str) -> String {
  let cleaned: String = value
    .chars()
    .filter_map(|c| match c {
      '/' | '\\' => Some('-'),
      ':' | '*' | '?' | '"' | '<' | '>' | '|' => None,
      c if c.is_control() => None,
      c => Some(c),
    })
    .collect();

  let trimmed = cleaned.trim().trim_end_matches('.').trim_end();
  if trimmed.is_empty() {
    "_".to_owned()
  } else {
    trimmed.to_owned()
  }
}
