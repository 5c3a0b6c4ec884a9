//! Top-level declaration scanning.
//!
//! The rewrite only touches top-level declarations: the package clause,
//! imports, `func` names, and `var` specs with initialisers. This scanner
//! finds exactly those, with byte spans, and skips everything else using
//! Go's statement-termination rules (balanced brackets plus automatic
//! semicolon insertion). Function bodies are never entered, so nothing
//! inside them can be mistaken for a global.

use anyhow::{bail, Context, Result};

use crate::rewriter::lexer::{scan, Tok, TokKind};

/// A byte range in the scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One import: `import [alias] "path"`. The alias may be `_` or `.`.
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
    pub span: Span,
}

/// A top-level function declaration.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    pub has_receiver: bool,
}

/// One `var` spec, possibly inside a `var ( ... )` block.
#[derive(Debug, Clone)]
pub struct VarSpec {
    pub names: Vec<(String, Span)>,
    pub type_span: Option<Span>,
    pub values: Vec<Span>,
    /// From the first name to the end of the last value (or type).
    pub span: Span,
    pub in_block: bool,
}

/// Everything the rewriter needs to know about one source file.
#[derive(Debug)]
pub struct FileScan {
    pub package_name: String,
    pub package_name_span: Span,
    pub imports: Vec<ImportSpec>,
    /// Where to insert additional `import` declarations: after the last
    /// import declaration, or after the package clause.
    pub import_insert_offset: usize,
    pub funcs: Vec<FuncDecl>,
    pub var_specs: Vec<VarSpec>,
    /// Declarations appear in source order; interleaving matters for
    /// numbered helper naming.
    pub decl_order: Vec<DeclRef>,
}

/// Source-order reference into `funcs` / `var_specs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef {
    Func(usize),
    Var(usize),
}

struct Scanner<'s> {
    src: &'s str,
    toks: Vec<Tok>,
    i: usize,
}

/// Scan one Go source file.
pub fn scan_file(src: &str) -> Result<FileScan> {
    let toks = scan(src)?;
    let mut s = Scanner { src, toks, i: 0 };
    s.scan_top_level()
}

impl<'s> Scanner<'s> {
    fn cur(&self) -> Option<&Tok> {
        self.toks.get(self.i)
    }

    fn text(&self, tok: &Tok) -> &'s str {
        tok.text(self.src)
    }

    fn cur_is(&self, text: &str) -> bool {
        self.cur().is_some_and(|t| self.text(t) == text)
    }

    /// Whether a statement may end between `toks[at]` and `toks[at + 1]`.
    fn boundary_after(&self, at: usize) -> bool {
        let Some(tok) = self.toks.get(at) else {
            return true;
        };
        match self.toks.get(at + 1) {
            None => true,
            Some(next) => {
                self.text(next) == ";" || (next.line > tok.line && tok.ends_statement(self.src))
            }
        }
    }

    fn scan_top_level(mut self) -> Result<FileScan> {
        let mut package_name = None;
        let mut package_name_span = Span { start: 0, end: 0 };
        let mut import_insert_offset = None;
        let mut imports = Vec::new();
        let mut funcs = Vec::new();
        let mut var_specs = Vec::new();
        let mut decl_order = Vec::new();

        while let Some(tok) = self.cur() {
            let text = self.text(tok);
            match (tok.kind, text) {
                (TokKind::Ident, "package") => {
                    self.i += 1;
                    let name = self.expect_ident().context("malformed package clause")?;
                    package_name = Some(self.text(&name).to_string());
                    package_name_span = Span {
                        start: name.start,
                        end: name.end,
                    };
                    if import_insert_offset.is_none() {
                        import_insert_offset = Some(name.end);
                    }
                }
                (TokKind::Ident, "import") => {
                    self.i += 1;
                    let end = self.scan_import_decl(&mut imports)?;
                    import_insert_offset = Some(end);
                }
                (TokKind::Ident, "func") => {
                    self.i += 1;
                    let func = self.scan_func_decl()?;
                    decl_order.push(DeclRef::Func(funcs.len()));
                    funcs.push(func);
                }
                (TokKind::Ident, "var") => {
                    self.i += 1;
                    let first = var_specs.len();
                    self.scan_var_decl(&mut var_specs)?;
                    for idx in first..var_specs.len() {
                        decl_order.push(DeclRef::Var(idx));
                    }
                }
                (TokKind::Ident, "const" | "type") => {
                    self.i += 1;
                    self.skip_decl_tail()?;
                }
                _ => {
                    // Stray token (e.g. a build directive artifact); skip.
                    self.i += 1;
                }
            }
        }

        Ok(FileScan {
            package_name: package_name.context("no package clause found")?,
            package_name_span,
            import_insert_offset: import_insert_offset.unwrap_or(package_name_span.end),
            imports,
            funcs,
            var_specs,
            decl_order,
        })
    }

    fn expect_ident(&mut self) -> Result<Tok> {
        match self.cur() {
            Some(t) if t.kind == TokKind::Ident => {
                let t = t.clone();
                self.i += 1;
                Ok(t)
            }
            Some(t) => bail!(
                "expected identifier, found {:?} at byte {}",
                self.text(&t.clone()),
                t.start
            ),
            None => bail!("expected identifier, found end of file"),
        }
    }

    /// Scan an import declaration body; returns the byte offset just after
    /// the declaration.
    fn scan_import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> Result<usize> {
        if self.cur_is("(") {
            self.i += 1;
            loop {
                match self.cur() {
                    None => bail!("unterminated import block"),
                    Some(t) if self.text(t) == ")" => {
                        let end = t.end;
                        self.i += 1;
                        return Ok(end);
                    }
                    Some(t) if self.text(t) == ";" => {
                        self.i += 1;
                    }
                    _ => {
                        let spec = self.scan_import_spec()?;
                        imports.push(spec);
                    }
                }
            }
        }
        let spec = self.scan_import_spec()?;
        let end = spec.span.end;
        imports.push(spec);
        Ok(end)
    }

    fn scan_import_spec(&mut self) -> Result<ImportSpec> {
        let start_tok = self.cur().context("unterminated import")?.clone();
        let mut alias = None;
        let path_tok = if start_tok.kind == TokKind::Str {
            self.i += 1;
            start_tok.clone()
        } else {
            // Alias: an identifier, `_`, or `.`.
            alias = Some(self.text(&start_tok).to_string());
            self.i += 1;
            let t = self.cur().context("import alias without path")?.clone();
            if t.kind != TokKind::Str {
                bail!("expected import path string at byte {}", t.start);
            }
            self.i += 1;
            t
        };
        let path = unquote(self.text(&path_tok));
        Ok(ImportSpec {
            alias,
            path,
            span: Span {
                start: start_tok.start,
                end: path_tok.end,
            },
        })
    }

    fn scan_func_decl(&mut self) -> Result<FuncDecl> {
        let mut has_receiver = false;
        if self.cur_is("(") {
            has_receiver = true;
            self.skip_balanced("(", ")")?;
        }
        let name = self.expect_ident().context("func declaration without name")?;
        let decl = FuncDecl {
            name: self.text(&name).to_string(),
            name_span: Span {
                start: name.start,
                end: name.end,
            },
            has_receiver,
        };
        self.skip_decl_tail()?;
        Ok(decl)
    }

    /// Skip to the end of the current declaration: balanced brackets, then
    /// an (implicit) semicolon at depth zero.
    fn skip_decl_tail(&mut self) -> Result<()> {
        let mut depth = 0usize;
        while let Some(tok) = self.cur() {
            match self.text(tok) {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                ";" if depth == 0 => {
                    self.i += 1;
                    return Ok(());
                }
                _ => {}
            }
            let at = self.i;
            self.i += 1;
            if depth == 0 && self.boundary_after(at) {
                return Ok(());
            }
        }
        Ok(())
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<()> {
        if !self.cur_is(open) {
            bail!("expected `{}`", open);
        }
        let mut depth = 0usize;
        while let Some(tok) = self.cur() {
            let text = self.text(tok);
            if text == open {
                depth += 1;
            } else if text == close {
                depth -= 1;
                if depth == 0 {
                    self.i += 1;
                    return Ok(());
                }
            }
            self.i += 1;
        }
        bail!("unterminated `{}`", open)
    }

    fn scan_var_decl(&mut self, specs: &mut Vec<VarSpec>) -> Result<()> {
        if self.cur_is("(") {
            self.i += 1;
            loop {
                match self.cur() {
                    None => bail!("unterminated var block"),
                    Some(t) if self.text(t) == ")" => {
                        self.i += 1;
                        return Ok(());
                    }
                    Some(t) if self.text(t) == ";" => {
                        self.i += 1;
                    }
                    _ => {
                        let spec = self.scan_var_spec(true)?;
                        specs.push(spec);
                    }
                }
            }
        }
        let spec = self.scan_var_spec(false)?;
        specs.push(spec);
        Ok(())
    }

    fn scan_var_spec(&mut self, in_block: bool) -> Result<VarSpec> {
        let mut names = Vec::new();
        loop {
            let name = self.expect_ident().context("malformed var spec")?;
            names.push((
                self.text(&name).to_string(),
                Span {
                    start: name.start,
                    end: name.end,
                },
            ));
            if self.cur_is(",") {
                self.i += 1;
            } else {
                break;
            }
        }

        let mut type_span = None;
        let mut end = names.last().expect("at least one name").1.end;

        let at_spec_end = |s: &Self| -> bool {
            match s.cur() {
                None => true,
                Some(t) => {
                    let text = t.text(s.src);
                    text == ";" || (in_block && text == ")") || s.boundary_after(s.i.wrapping_sub(1))
                }
            }
        };

        if !self.cur_is("=") && !at_spec_end(self) {
            let span = self.scan_type()?;
            end = span.end;
            type_span = Some(span);
        }

        let mut values = Vec::new();
        if self.cur_is("=") {
            self.i += 1;
            loop {
                let span = self.scan_expr(in_block)?;
                end = span.end;
                values.push(span);
                if self.cur_is(",") {
                    self.i += 1;
                } else {
                    break;
                }
            }
        }

        Ok(VarSpec {
            span: Span {
                start: names[0].1.start,
                end,
            },
            names,
            type_span,
            values,
            in_block,
        })
    }

    /// Scan one type expression, leaving the cursor after it.
    fn scan_type(&mut self) -> Result<Span> {
        let start = self.cur().context("expected type")?.start;
        let end = self.scan_type_inner()?;
        Ok(Span { start, end })
    }

    fn scan_type_inner(&mut self) -> Result<usize> {
        let tok = self.cur().context("expected type")?.clone();
        let text = self.text(&tok).to_string();
        match (tok.kind, text.as_str()) {
            (TokKind::Op, "*") => {
                self.i += 1;
                self.scan_type_inner()
            }
            (TokKind::Op, "[") => {
                // Array or slice: the brackets may contain a length
                // expression; skip them balanced, then the element type.
                self.skip_balanced("[", "]")?;
                self.scan_type_inner()
            }
            (TokKind::Op, "(") => {
                let end_tok = self.peek_balanced_end("(", ")")?;
                self.skip_balanced("(", ")")?;
                Ok(end_tok)
            }
            (TokKind::Op, "<-") => {
                self.i += 1;
                if !self.cur_is("chan") {
                    bail!("expected `chan` after `<-` at byte {}", tok.start);
                }
                self.i += 1;
                self.scan_type_inner()
            }
            (TokKind::Ident, "map") => {
                self.i += 1;
                self.skip_balanced("[", "]")?;
                self.scan_type_inner()
            }
            (TokKind::Ident, "chan") => {
                self.i += 1;
                if self.cur_is("<-") {
                    self.i += 1;
                }
                self.scan_type_inner()
            }
            (TokKind::Ident, "struct" | "interface") => {
                self.i += 1;
                let end = self.peek_balanced_end("{", "}")?;
                self.skip_balanced("{", "}")?;
                Ok(end)
            }
            (TokKind::Ident, "func") => {
                self.i += 1;
                let mut end = self.peek_balanced_end("(", ")")?;
                self.skip_balanced("(", ")")?;
                // Optional results: a parenthesized list or a single type,
                // but a `{` here belongs to an enclosing declaration.
                if self.cur_is("(") {
                    end = self.peek_balanced_end("(", ")")?;
                    self.skip_balanced("(", ")")?;
                } else if self.starts_type() {
                    end = self.scan_type_inner()?;
                }
                Ok(end)
            }
            (TokKind::Ident, _) => {
                // Possibly qualified, possibly generic: `pkg.Name[Args]`.
                self.i += 1;
                let mut end = tok.end;
                while self.cur_is(".") {
                    self.i += 1;
                    let name = self.expect_ident()?;
                    end = name.end;
                }
                if self.cur_is("[") {
                    end = self.peek_balanced_end("[", "]")?;
                    self.skip_balanced("[", "]")?;
                }
                Ok(end)
            }
            _ => bail!("expected type at byte {}", tok.start),
        }
    }

    /// Whether the cursor could start a type expression.
    fn starts_type(&self) -> bool {
        let Some(tok) = self.cur() else {
            return false;
        };
        match tok.kind {
            TokKind::Ident => true,
            TokKind::Op => matches!(self.text(tok), "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    /// Byte offset after the closing bracket, without moving the cursor.
    fn peek_balanced_end(&self, open: &str, close: &str) -> Result<usize> {
        let mut depth = 0usize;
        for tok in &self.toks[self.i..] {
            let text = tok.text(self.src);
            if text == open {
                depth += 1;
            } else if text == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(tok.end);
                }
            }
        }
        bail!("unterminated `{}`", open)
    }

    /// Scan one expression, stopping before a top-level `,`, before the
    /// block's closing `)`, or at a statement boundary.
    fn scan_expr(&mut self, in_block: bool) -> Result<Span> {
        let start_tok = self.cur().context("expected expression")?.clone();
        let start = start_tok.start;
        let mut end = start;
        let mut depth = 0usize;

        while let Some(tok) = self.cur() {
            let text = self.text(tok);
            match text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    if depth == 0 {
                        // Closing bracket of an enclosing construct.
                        if !(in_block && text == ")") {
                            bail!("unbalanced `{}` in expression at byte {}", text, tok.start);
                        }
                        break;
                    }
                    depth -= 1;
                }
                "," | ";" if depth == 0 => break,
                _ => {}
            }
            end = tok.end;
            let at = self.i;
            self.i += 1;
            if depth == 0 && self.boundary_after(at) {
                break;
            }
        }
        if end == start {
            bail!("empty expression at byte {}", start);
        }
        Ok(Span { start, end })
    }
}

/// Strip the quotes from a string-literal token. Import paths never need
/// escape processing beyond this.
fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"package main

import (
	"flag"
	"fmt"
	u "os/user"
	_ "embed"
)

var verbose = flag.Bool("v", false, "verbose")

var (
	count, total = 1, 2
	name         string
	tagged       int = 7
)

const answer = 42

type greeter struct {
	prefix string
}

func (g greeter) greet() string { return g.prefix }

func init() {
	fmt.Println("init")
}

func main() {
	var local = "not a global"
	fmt.Println(local, *verbose, count, total, name, tagged)
}
"#;

    #[test]
    fn test_package_and_imports() {
        let scan = scan_file(SAMPLE).unwrap();
        assert_eq!(scan.package_name, "main");
        assert_eq!(scan.imports.len(), 4);
        assert_eq!(scan.imports[0].path, "flag");
        assert_eq!(scan.imports[2].alias.as_deref(), Some("u"));
        assert_eq!(scan.imports[2].path, "os/user");
        assert_eq!(scan.imports[3].alias.as_deref(), Some("_"));
    }

    #[test]
    fn test_funcs_found_with_receiver_flag() {
        let scan = scan_file(SAMPLE).unwrap();
        let names: Vec<(&str, bool)> = scan
            .funcs
            .iter()
            .map(|f| (f.name.as_str(), f.has_receiver))
            .collect();
        assert_eq!(
            names,
            vec![("greet", true), ("init", false), ("main", false)]
        );
    }

    #[test]
    fn test_var_specs() {
        let scan = scan_file(SAMPLE).unwrap();
        assert_eq!(scan.var_specs.len(), 4);

        let verbose = &scan.var_specs[0];
        assert_eq!(verbose.names[0].0, "verbose");
        assert!(verbose.type_span.is_none());
        assert_eq!(verbose.values.len(), 1);
        let value = &SAMPLE[verbose.values[0].start..verbose.values[0].end];
        assert_eq!(value, r#"flag.Bool("v", false, "verbose")"#);

        let pair = &scan.var_specs[1];
        assert_eq!(pair.names.len(), 2);
        assert_eq!(pair.values.len(), 2);
        assert!(pair.in_block);

        let name = &scan.var_specs[2];
        assert!(name.values.is_empty());
        assert!(name.type_span.is_some());

        let tagged = &scan.var_specs[3];
        assert!(tagged.type_span.is_some());
        assert_eq!(tagged.values.len(), 1);
        assert_eq!(&SAMPLE[tagged.values[0].start..tagged.values[0].end], "7");
    }

    #[test]
    fn test_locals_not_scanned() {
        // `local` is declared inside main's body and must not appear.
        let scan = scan_file(SAMPLE).unwrap();
        assert!(scan
            .var_specs
            .iter()
            .all(|s| s.names.iter().all(|(n, _)| n != "local")));
    }

    #[test]
    fn test_multiline_value_expression() {
        let src = "package main\n\nvar x = foo(\n\t1,\n\t2,\n)\n\nvar y = 1 +\n\t2\n";
        let scan = scan_file(src).unwrap();
        assert_eq!(scan.var_specs.len(), 2);
        let x = &src[scan.var_specs[0].values[0].start..scan.var_specs[0].values[0].end];
        assert_eq!(x, "foo(\n\t1,\n\t2,\n)");
        let y = &src[scan.var_specs[1].values[0].start..scan.var_specs[1].values[0].end];
        assert_eq!(y, "1 +\n\t2");
    }

    #[test]
    fn test_tuple_assignment() {
        let src = "package main\n\nvar a, b = pair()\n";
        let scan = scan_file(src).unwrap();
        let spec = &scan.var_specs[0];
        assert_eq!(spec.names.len(), 2);
        assert_eq!(spec.values.len(), 1);
    }

    #[test]
    fn test_func_returning_struct_literal_type() {
        // The struct braces belong to the signature, the second pair to the
        // body; the `var` inside must not leak out.
        let src = "package main\n\nfunc f() struct{ x int } {\n\tvar y = 1\n\t_ = y\n\treturn struct{ x int }{y}\n}\n";
        let scan = scan_file(src).unwrap();
        assert_eq!(scan.funcs.len(), 1);
        assert!(scan.var_specs.is_empty());
    }

    #[test]
    fn test_import_insert_offset_no_imports() {
        let src = "package main\n\nfunc main() {}\n";
        let scan = scan_file(src).unwrap();
        assert_eq!(scan.import_insert_offset, "package main".len());
    }

    #[test]
    fn test_composite_literal_value() {
        let src = "package main\n\nvar t = T{a: 1, b: 2}\n";
        let scan = scan_file(src).unwrap();
        let spec = &scan.var_specs[0];
        assert_eq!(spec.values.len(), 1);
        assert_eq!(
            &src[spec.values[0].start..spec.values[0].end],
            "T{a: 1, b: 2}"
        );
    }
}
