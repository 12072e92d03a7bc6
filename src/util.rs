//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
///
/// Substitution happens in a single left-to-right pass over the template, so a
/// value that itself contains `{key}` text is inserted verbatim and never
/// expanded again. Unknown placeholders are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;

  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let replaced = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| (*v, close))
    });

    match replaced {
      Some((value, close)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_known_placeholders() {
    let out = fill_template("Topic: {topic}, count {n}", &[("topic", "Rust"), ("n", "3")]);
    assert_eq!(out, "Topic: Rust, count 3");
  }

  #[test]
  fn leaves_unknown_placeholders_and_json_braces_alone() {
    let out = fill_template("{\"a\": {x}} {unknown}", &[("x", "1")]);
    assert_eq!(out, "{\"a\": 1} {unknown}");
  }

  #[test]
  fn does_not_expand_placeholders_inside_values() {
    let out = fill_template(
      "Q: {question}\nA: {user_answer}",
      &[("question", "What is {user_answer}?"), ("user_answer", "42")],
    );
    assert_eq!(out, "Q: What is {user_answer}?\nA: 42");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('é'));
    assert!(t.contains("10 bytes total"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
