//! Shell-style brace expansion.
//!
//! `a/{x,y}/b` expands to `a/x/b` and `a/y/b` before any other pattern
//! handling, so users can write `./cmds/{core,exp}/...` the way they would
//! in a shell. Expansion nests; unmatched braces are left literal.

/// Expand all brace groups in `pattern`, left to right.
pub fn expand(pattern: &str) -> Vec<String> {
    let Some((prefix, body, suffix)) = split_first_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let mut out = Vec::new();
    for alt in split_alternatives(body) {
        let rebuilt = format!("{prefix}{alt}{suffix}");
        // The alternative itself and the suffix may contain further groups.
        out.extend(expand(&rebuilt));
    }
    out
}

/// Find the first balanced `{...}` group; returns (prefix, body, suffix).
fn split_first_group(s: &str) -> Option<(&str, &str, &str)> {
    let open = s.find('{')?;
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    return Some((&s[..open], &s[open + 1..close], &s[close + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a group body on top-level commas.
fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_braces() {
        assert_eq!(expand("./cmds/core/ls"), vec!["./cmds/core/ls"]);
    }

    #[test]
    fn test_simple_group() {
        assert_eq!(
            expand("./cmds/{core,exp}/ls"),
            vec!["./cmds/core/ls", "./cmds/exp/ls"]
        );
    }

    #[test]
    fn test_nested_groups() {
        assert_eq!(
            expand("a/{x,{y,z}}/b"),
            vec!["a/x/b", "a/y/b", "a/z/b"]
        );
    }

    #[test]
    fn test_multiple_groups() {
        assert_eq!(
            expand("{a,b}/{c,d}"),
            vec!["a/c", "a/d", "b/c", "b/d"]
        );
    }

    #[test]
    fn test_unmatched_brace_is_literal() {
        assert_eq!(expand("a{b"), vec!["a{b"]);
    }

    #[test]
    fn test_empty_alternative() {
        assert_eq!(expand("cmd{,s}"), vec!["cmd", "cmds"]);
    }
}
