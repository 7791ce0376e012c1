//! String substitution and name matching against a context.

use super::Context;
use crate::value::Value;

fn variable_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::StringVector(v) => v.join(" "),
        Value::IntVector(v) => v.iter().map(i64::to_string).collect::<Vec<_>>().join(" "),
        Value::FloatVector(v) => v.iter().map(f64::to_string).collect::<Vec<_>>().join(" "),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

pub(super) fn substitute(text: &str, context: &Context) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    if chars.first() == Some(&'~') {
        if let Ok(home) = std::env::var("HOME") {
            out.push_str(&home);
            i = 1;
        }
    }

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if let Some(c) = chars.get(i + 1) {
                    out.push(*c);
                }
                i += 2;
            }
            '#' => {
                let start = i;
                while i < chars.len() && chars[i] == '#' {
                    i += 1;
                }
                let width = i - start;
                let frame = context.frame().round() as i64;
                if frame < 0 {
                    out.push_str(&format!("-{:0width$}", frame.unsigned_abs(), width = width));
                } else {
                    out.push_str(&format!("{:0width$}", frame, width = width));
                }
            }
            '$' => {
                i += 1;
                let name: String = if chars.get(i) == Some(&'{') {
                    let end = chars[i..].iter().position(|c| *c == '}').map(|p| i + p);
                    match end {
                        Some(end) => {
                            let name = chars[i + 1..end].iter().collect();
                            i = end + 1;
                            name
                        }
                        None => {
                            // Unterminated brace; keep the text as written.
                            out.push('$');
                            continue;
                        }
                    }
                } else {
                    let start = i;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    chars[start..i].iter().collect()
                };
                if let Some(value) = context.get(&name) {
                    out.push_str(&variable_text(value));
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Glob match supporting `*`, `?` and space-separated alternatives.
pub(super) fn match_pattern(pattern: &str, name: &str) -> bool {
    pattern
        .split(' ')
        .filter(|p| !p.is_empty())
        .any(|p| glob(p.as_bytes(), name.as_bytes()))
}

/// Wildcard match, backtracking only to the most recent `*`.
fn glob(pattern: &[u8], name: &[u8]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(c) if *c == b'?' || *c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    p = sp + 1;
                    n = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables() {
        let c = Context::new()
            .with_variable("shot", "s010")
            .with_variable("version", 3);
        assert_eq!(c.substitute("/show/$shot/v${version}.exr"), "/show/s010/v3.exr");
        assert_eq!(c.substitute("$missing-x"), "-x");
    }

    #[test]
    fn frame_padding() {
        let c = Context::new().with_variable("frame", 12.0);
        assert_eq!(c.substitute("img.####.exr"), "img.0012.exr");
        assert_eq!(c.substitute("#"), "12");
        let n = Context::new().with_variable("frame", -3.0);
        assert_eq!(n.substitute("##"), "-03");
        let huge = Context::new().with_variable("frame", -1e300);
        assert_eq!(huge.substitute("#"), "-9223372036854775808");
    }

    #[test]
    fn escapes() {
        let c = Context::new().with_variable("a", "x");
        assert_eq!(c.substitute("\\$a \\#"), "$a #");
    }

    #[test]
    fn patterns() {
        assert!(match_pattern("ui:*", "ui:foo"));
        assert!(match_pattern("a?c", "abc"));
        assert!(!match_pattern("a?c", "ac"));
        assert!(match_pattern("x y", "y"));
        assert!(!match_pattern("x y", "z"));
        assert!(match_pattern("*", ""));
        assert!(match_pattern("a*b*c", "aXXbYYc"));
        assert!(!match_pattern("a*b*c", "aXXbYY"));
    }

    #[test]
    fn many_stars_do_not_backtrack_exponentially() {
        let name = "a".repeat(64);
        assert!(!match_pattern("*a*a*a*a*a*a*a*a*b", &name));
        assert!(match_pattern("*a*a*a*a*a*a*a*a*", &name));
    }
}
