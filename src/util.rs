//! Small helpers shared across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// No nesting or conditionals; unknown placeholders stay untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Trimmed `s`, or `default` when `s` is blank.
pub fn non_blank_or<'a>(s: &'a str, default: &'a str) -> &'a str {
  let t = s.trim();
  if t.is_empty() { default } else { t }
}
