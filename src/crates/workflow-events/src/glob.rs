//! Shared glob-to-regex translation for `pattern_subscribe`, used by both
//! the in-process and Redis backends so a pattern behaves identically
//! regardless of which one is configured.

use regex::Regex;

/// Translate a simple `*`/`?` glob into an anchored regex.
pub fn to_regex(glob: &str) -> std::result::Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c if "\\.+()|[]{}^$".contains(c) => {
                pattern.push('\\');
                pattern.push(c);
            }
            c => pattern.push(c),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        let re = to_regex("workflow:*:events").unwrap();
        assert!(re.is_match("workflow:g1:events"));
        assert!(!re.is_match("workflow:g1:other"));
    }
}
