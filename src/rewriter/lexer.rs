//! A Go token scanner.
//!
//! The rewriter works on byte-range edits over original source text, so the
//! scanner's job is to deliver tokens with exact byte spans; it never
//! rewrites or normalizes anything. Comments and whitespace are skipped.
//! Go's automatic semicolon insertion matters for finding the end of a
//! top-level declaration, so every token records whether a newline (or an
//! explicit `;`) may terminate the statement after it.

use anyhow::{bail, Result};

/// Token kind. Keywords are delivered as `Ident`; the declaration scanner
/// matches on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    Ident,
    /// Integer, float, or imaginary literal.
    Number,
    /// Interpreted or raw string literal.
    Str,
    /// Rune literal.
    Rune,
    /// Operator or punctuation.
    Op,
}

/// One token with its byte span in the source.
#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub start: usize,
    pub end: usize,
    /// 1-based line of the token's first byte.
    pub line: usize,
}

impl Tok {
    pub fn text<'s>(&self, src: &'s str) -> &'s str {
        &src[self.start..self.end]
    }

    /// Whether a newline after this token inserts an implicit semicolon.
    pub fn ends_statement(&self, src: &str) -> bool {
        match self.kind {
            TokKind::Ident => !matches!(
                self.text(src),
                // Keywords after which a newline does not terminate.
                "func" | "var" | "const" | "type" | "import" | "package" | "chan" | "map"
                    | "struct" | "interface" | "if" | "else" | "for" | "switch" | "select"
                    | "go" | "defer" | "case" | "default" | "range"
            ),
            TokKind::Number | TokKind::Str | TokKind::Rune => true,
            TokKind::Op => matches!(self.text(src), ")" | "]" | "}" | "++" | "--"),
        }
    }
}

// Longest-match operator table. Order within a length group is irrelevant;
// groups are tried longest first.
const OPS3: &[&str] = &["<<=", ">>=", "&^=", "..."];
const OPS2: &[&str] = &[
    "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "<<", ">>", "&^",
];
const OPS1: &str = "+-*/%&|^<>=!()[]{},;.:~";

/// Scan `src` into tokens.
pub fn scan(src: &str) -> Result<Vec<Tok>> {
    let bytes = src.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comment.
        if bytes[i..].starts_with(b"//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        // Block comment.
        if bytes[i..].starts_with(b"/*") {
            let Some(rel) = find_sub(&bytes[i + 2..], b"*/") else {
                bail!("unterminated block comment at byte {}", i);
            };
            line += bytes[i..i + 2 + rel + 2].iter().filter(|&&b| b == b'\n').count();
            i += 2 + rel + 2;
            continue;
        }

        let start = i;

        // Interpreted string.
        if c == '"' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        i += 1;
                        break;
                    }
                    b'\n' => bail!("newline in string literal at byte {}", i),
                    _ => i += 1,
                }
            }
            if i > bytes.len() {
                bail!("unterminated string literal at byte {}", start);
            }
            toks.push(Tok { kind: TokKind::Str, start, end: i, line });
            continue;
        }
        // Raw string; may span lines, no escapes.
        if c == '`' {
            let Some(rel) = find_sub(&bytes[i + 1..], b"`") else {
                bail!("unterminated raw string literal at byte {}", start);
            };
            let end = i + 1 + rel + 1;
            line += bytes[start..end].iter().filter(|&&b| b == b'\n').count();
            toks.push(Tok { kind: TokKind::Str, start, end, line });
            i = end;
            continue;
        }
        // Rune literal.
        if c == '\'' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'\'' => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            if i > bytes.len() {
                bail!("unterminated rune literal at byte {}", start);
            }
            toks.push(Tok { kind: TokKind::Rune, start, end: i, line });
            continue;
        }

        // Identifier or keyword; Go identifiers are Unicode.
        if c == '_' || c.is_alphabetic() || !c.is_ascii() {
            let mut end = i;
            for (off, ch) in src[i..].char_indices() {
                if ch == '_' || ch.is_alphanumeric() {
                    end = i + off + ch.len_utf8();
                } else {
                    break;
                }
            }
            toks.push(Tok { kind: TokKind::Ident, start, end, line });
            i = end;
            continue;
        }

        // Number literal. A leading `.` only counts with a digit after it.
        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i);
            toks.push(Tok { kind: TokKind::Number, start, end: i, line });
            continue;
        }

        // Operators, longest first. `...` before `.`, `<<=` before `<<`.
        if let Some(len) = match_op(&src[i..]) {
            i += len;
            toks.push(Tok { kind: TokKind::Op, start, end: i, line });
            continue;
        }

        bail!("unexpected character {:?} at byte {}", c, i);
    }
    Ok(toks)
}

/// Byte length of the operator at the start of `rest`, if any.
fn match_op(rest: &str) -> Option<usize> {
    for &op in OPS3 {
        if rest.starts_with(op) {
            return Some(op.len());
        }
    }
    for &op in OPS2 {
        if rest.starts_with(op) {
            return Some(op.len());
        }
    }
    let first = rest.chars().next()?;
    if OPS1.contains(first) {
        Some(first.len_utf8())
    } else {
        None
    }
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    // Hex/octal/binary prefixes, digit separators, exponents, and the
    // imaginary suffix are all runs of [0-9a-zA-Z_.] with sign characters
    // allowed right after an exponent marker.
    let mut prev = 0u8;
    while i < bytes.len() {
        let b = bytes[i];
        let continues = b.is_ascii_alphanumeric()
            || b == b'_'
            || b == b'.'
            || ((b == b'+' || b == b'-') && (prev == b'e' || prev == b'E' || prev == b'p' || prev == b'P'));
        if !continues {
            break;
        }
        prev = b;
        i += 1;
    }
    i
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
