//! Glob helpers shared by store implementations and callers.
//!
//! The supported syntax is the subset of Redis `KEYS`/`SCAN` patterns the
//! cache needs: `*` matches any run of characters, `?` matches exactly one,
//! and `\` makes the next character literal.

/// Characters with special meaning in Redis glob patterns.
const GLOB_SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Escapes glob metacharacters so `input` matches only itself.
pub fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if GLOB_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Returns `true` if `candidate` matches `pattern`.
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    matches_from(&pattern, &candidate)
}

fn matches_from(pattern: &[char], candidate: &[char]) -> bool {
    // Iterative matcher with single-star backtracking.
    let (mut p, mut c) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, c));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                c += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == candidate[c] {
                    p += 2;
                    c += 1;
                    continue;
                }
            }
            Some(&literal) => {
                if literal == candidate[c] {
                    p += 1;
                    c += 1;
                    continue;
                }
            }
            None => {}
        }

        match star {
            Some((star_p, star_c)) => {
                p = star_p + 1;
                c = star_c + 1;
                star = Some((star_p, star_c + 1));
            }
            None => return false,
        }
    }

    while pattern.get(p) == Some(&'*') {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_prefixes() {
        assert!(glob_matches("cache:*", "cache:faction:stats"));
        assert!(glob_matches("cache:*", "cache:"));
        assert!(!glob_matches("cache:*", "stats:cache:hits"));
        assert!(glob_matches("*", ""));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(glob_matches("k?y", "key"));
        assert!(!glob_matches("k?y", "ky"));
        assert!(!glob_matches("k?y", "keey"));
    }

    #[test]
    fn test_star_in_the_middle_backtracks() {
        assert!(glob_matches("cache:*:meta", "cache:forum:thread:1:meta"));
        assert!(!glob_matches("cache:*:meta", "cache:forum:thread:1"));
    }

    #[test]
    fn test_escaped_metacharacters_are_literal() {
        let pattern = format!("{}*", escape_glob("cache:odd*key?"));
        assert!(glob_matches(&pattern, "cache:odd*key?"));
        assert!(glob_matches(&pattern, "cache:odd*key?:meta"));
        assert!(!glob_matches(&pattern, "cache:oddXkeyY"));
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("plain:key"), "plain:key");
        assert_eq!(escape_glob("a*b?c[d]e\\"), "a\\*b\\?c\\[d\\]e\\\\");
    }
}
