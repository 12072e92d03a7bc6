//! Markdown-subset to HTML for analysis and solution text.
//!
//! Covers only what the analysis prompt asks the model to use: `**bold**`,
//! `-`/`*` bullets at line start, and line breaks. Input is HTML-escaped first.

use std::sync::OnceLock;

use regex::Regex;

fn bold_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("static regex"))
}

fn bullet_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\n[ \t]*[-*][ \t]").expect("static regex"))
}

pub fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(ch),
    }
  }
  out
}

pub fn format_analysis(text: &str) -> String {
  let text = escape_html(&text.replace("\r\n", "\n"));
  let text = bold_re().replace_all(&text, "<strong>$1</strong>");
  let text = bullet_re().replace_all(&text, "<br>&bull; ");
  text.replace('\n', "<br />")
}

pub fn format_solution(text: &str) -> String {
  escape_html(&text.replace("\r\n", "\n")).replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_bold_bullets_and_breaks() {
    let md = "**Key Strengths:**\n- Knows recursion\n  * Uses base case\nGood overall.";
    assert_eq!(
      format_analysis(md),
      "<strong>Key Strengths:</strong><br>&bull; Knows recursion<br>&bull; Uses base case<br />Good overall."
    );
  }

  #[test]
  fn bold_is_non_greedy() {
    assert_eq!(format_analysis("**a** and **b**"), "<strong>a</strong> and <strong>b</strong>");
  }

  #[test]
  fn model_html_is_escaped() {
    let out = format_analysis("<script>alert('x')</script>\n- ok");
    assert!(out.starts_with("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    assert!(out.ends_with("<br>&bull; ok"));
  }

  #[test]
  fn solution_only_converts_newlines() {
    assert_eq!(format_solution("a **b**\r\nc"), "a **b**<br />c");
  }
}
