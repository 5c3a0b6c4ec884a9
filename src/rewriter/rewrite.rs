//! The source-to-source transformation for one program.
//!
//! Each command package is rewritten into an importable library package:
//!
//! - the package clause becomes the command's (sanitised) short name,
//! - `main` is renamed to a fresh `registeredMain*`,
//! - every `init` is renamed to a numbered `busyboxInit*`,
//! - every global initialiser expression moves into its own numbered
//!   helper, with the declaration keeping (or gaining) its textual type,
//! - a synthesised aggregate initialiser replays all of the above in the
//!   package's original initialisation order, and
//! - a new `init` registers the command with the dispatcher's registry.
//!
//! Invoking the aggregate initialiser once and then the renamed entry point
//! reproduces the standalone program's observable startup behaviour.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::{ExprRef, Program};
use crate::loader::graph::PackageGraph;
use crate::rewriter::decls::{self, DeclRef, VarSpec};
use crate::rewriter::edit::EditSet;
use crate::rewriter::names::NameArbiter;
use crate::rewriter::qualify::Qualifier;
use crate::util::fs as futil;

/// Default prefix for the renamed entry point.
pub const MAIN_PREFIX: &str = "registeredMain";

/// Default prefix for the aggregate initialiser.
pub const INIT_PREFIX: &str = "registeredInit";

/// One rewritten source file, ready for the emitter.
#[derive(Debug, Clone)]
pub struct RewrittenFile {
    pub file_name: String,
    pub content: String,
}

/// Rewrite a program by reading its sources from disk.
pub fn rewrite_program(
    program: &Program,
    graph: &PackageGraph,
    registry_import: &str,
) -> Result<Vec<RewrittenFile>> {
    let mut sources = Vec::new();
    for path in &program.go_files {
        sources.push((path.clone(), futil::read_to_string(path)?));
    }
    rewrite_sources(program, graph, registry_import, &sources)
}

/// Rewrite a program from in-memory sources. `sources` must be the
/// program's Go files in lexicographic order.
pub fn rewrite_sources(
    program: &Program,
    graph: &PackageGraph,
    registry_import: &str,
    sources: &[(PathBuf, String)],
) -> Result<Vec<RewrittenFile>> {
    let mut arbiter = NameArbiter::new(&program.analysis);
    let main_name = arbiter.propose_func_name(MAIN_PREFIX);
    let agg_init_name = arbiter.propose_func_name(INIT_PREFIX);
    // The first numbered helper collects the variable initialisers; Go runs
    // all of those before any `init`.
    let var_agg_name = arbiter.next_init();

    // Canonical target types per initialisation step, keyed by the
    // right-hand expression's identity.
    let mut entry_types: BTreeMap<&ExprRef, &[String]> = BTreeMap::new();
    for entry in &program.analysis.init_order {
        entry_types.insert(&entry.rhs, &entry.types);
    }

    let mut files = Vec::new();
    let mut init_calls: Vec<String> = Vec::new();
    let mut init_assigns: BTreeMap<ExprRef, String> = BTreeMap::new();
    let mut main_file: Option<usize> = None;

    for (index, (path, src)) in sources.iter().enumerate() {
        let scan = decls::scan_file(src)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let mut work = FileWork {
            path: path.clone(),
            edits: EditSet::new(),
            appends: Vec::new(),
            new_imports: Vec::new(),
            insert_offset: scan.import_insert_offset,
        };

        // Package rename.
        work.edits.replace(
            scan.package_name_span.start,
            scan.package_name_span.end,
            program.package_ident(),
        );

        let mut qualifier = Qualifier::new(&program.import_path, graph, path, &scan.imports);

        for decl in &scan.decl_order {
            match *decl {
                DeclRef::Func(i) => {
                    let func = &scan.funcs[i];
                    if func.has_receiver {
                        continue;
                    }
                    if func.name == "main" {
                        if main_file.is_some() {
                            bail!(
                                "multiple main functions found in package {}",
                                program.import_path
                            );
                        }
                        main_file = Some(index);
                        work.edits.replace(
                            func.name_span.start,
                            func.name_span.end,
                            main_name.clone(),
                        );
                    } else if func.name == "init" {
                        let renamed = arbiter.next_init();
                        work.edits.replace(
                            func.name_span.start,
                            func.name_span.end,
                            renamed.clone(),
                        );
                        init_calls.push(renamed);
                    }
                }
                DeclRef::Var(i) => {
                    let spec = &scan.var_specs[i];
                    if spec.values.is_empty() {
                        continue;
                    }
                    hoist_var_spec(
                        program,
                        &mut arbiter,
                        &mut qualifier,
                        &mut work,
                        &mut init_assigns,
                        &entry_types,
                        src,
                        path,
                        spec,
                    )?;
                }
            }
        }

        for (alias, import_path) in qualifier.added_imports() {
            work.new_imports
                .push((alias.clone(), import_path.clone()));
        }
        files.push((work, src));
    }

    let Some(main_index) = main_file else {
        bail!("no main function found in package {}", program.import_path);
    };

    // Aggregate variable initialiser, in the type checker's order.
    let mut var_agg_body = Vec::new();
    for entry in &program.analysis.init_order {
        let Some(call) = init_assigns.get(&entry.rhs) else {
            bail!(
                "internal error: initialisation order of {} names {} at {}:{} \
                 but no hoisted initialiser matches it",
                program.import_path,
                entry.targets.join(", "),
                entry.rhs.file.display(),
                entry.rhs.offset
            );
        };
        var_agg_body.push(call.clone());
    }

    {
        let (work, _) = &mut files[main_index];
        let bb_alias = arbiter.propose_import_alias("bbmain", &work.path);
        work.new_imports
            .push((bb_alias.clone(), registry_import.to_string()));

        work.appends.push(make_func(&var_agg_name, &var_agg_body));

        let mut agg_body = vec![format!("{var_agg_name}()")];
        agg_body.extend(init_calls.iter().map(|name| format!("{name}()")));
        work.appends.push(make_func(&agg_init_name, &agg_body));

        work.appends.push(format!(
            "func init() {{\n\t{}.Register({:?}, {}, {})\n}}",
            bb_alias, program.name, agg_init_name, main_name
        ));
    }

    let mut rewritten = Vec::new();
    for (mut work, src) in files {
        if !work.new_imports.is_empty() {
            let mut text = String::new();
            for (alias, import_path) in &work.new_imports {
                text.push_str(&format!("\nimport {} {:?}", alias, import_path));
            }
            work.edits.insert(work.insert_offset, text);
        }

        let mut content = work.edits.apply(src)?;
        for append in &work.appends {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
            content.push_str(append);
            content.push('\n');
        }

        let file_name = work
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("source path has no file name: {}", work.path.display()))?;
        rewritten.push(RewrittenFile { file_name, content });
    }
    Ok(rewritten)
}

struct FileWork {
    path: PathBuf,
    edits: EditSet,
    appends: Vec<String>,
    /// (alias, import path) to insert into this file's imports.
    new_imports: Vec<(String, String)>,
    insert_offset: usize,
}

/// Split one `var` spec with initialisers: the declaration keeps the names
/// and a textual type; each initialiser expression moves into a fresh
/// numbered helper whose call is recorded under the expression's identity.
#[allow(clippy::too_many_arguments)]
fn hoist_var_spec(
    program: &Program,
    arbiter: &mut NameArbiter,
    qualifier: &mut Qualifier<'_>,
    work: &mut FileWork,
    init_assigns: &mut BTreeMap<ExprRef, String>,
    entry_types: &BTreeMap<&ExprRef, &[String]>,
    src: &str,
    path: &Path,
    spec: &VarSpec,
) -> Result<()> {
    let names: Vec<&str> = spec.names.iter().map(|(n, _)| n.as_str()).collect();

    // Helpers and the assignment map.
    if spec.values.len() == names.len() {
        for (i, value) in spec.values.iter().enumerate() {
            let helper = arbiter.next_init();
            let value_text = &src[value.start..value.end];
            work.appends
                .push(make_assign_func(&helper, names[i], value_text));
            init_assigns.insert(
                ExprRef {
                    file: path.to_path_buf(),
                    offset: value.start,
                },
                format!("{helper}()"),
            );
        }
    } else if spec.values.len() == 1 {
        // Tuple assignment: `var a, b = f()`.
        let helper = arbiter.next_init();
        let value = &spec.values[0];
        let value_text = &src[value.start..value.end];
        work.appends
            .push(make_assign_func(&helper, &names.join(", "), value_text));
        init_assigns.insert(
            ExprRef {
                file: path.to_path_buf(),
                offset: value.start,
            },
            format!("{helper}()"),
        );
    } else {
        bail!(
            "malformed var declaration in {}: {} names, {} values",
            path.display(),
            names.len(),
            spec.values.len()
        );
    }

    // The replacement declaration: names plus a type, no initialisers.
    let replacement = if let Some(type_span) = spec.type_span {
        format!("{} {}", names.join(", "), &src[type_span.start..type_span.end])
    } else {
        let rendered = rendered_types(
            program, arbiter, qualifier, entry_types, path, spec, &names,
        )?;
        if rendered.iter().all(|t| t == &rendered[0]) {
            format!("{} {}", names.join(", "), rendered[0])
        } else if spec.in_block {
            // Heterogeneous types need one line per name; inside a block a
            // bare newline separates specs.
            names
                .iter()
                .zip(&rendered)
                .map(|(n, t)| format!("{n} {t}"))
                .collect::<Vec<_>>()
                .join("\n\t")
        } else {
            let lines = names
                .iter()
                .zip(&rendered)
                .map(|(n, t)| format!("\t{n} {t}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("(\n{lines}\n)")
        }
    };
    work.edits.replace(spec.span.start, spec.span.end, replacement);
    Ok(())
}

/// The textual type for every name of a spec whose type was inferred,
/// rendered into the file's namespace.
fn rendered_types(
    program: &Program,
    arbiter: &mut NameArbiter,
    qualifier: &mut Qualifier<'_>,
    entry_types: &BTreeMap<&ExprRef, &[String]>,
    path: &Path,
    spec: &VarSpec,
    names: &[&str],
) -> Result<Vec<String>> {
    let mut rendered = Vec::new();
    if spec.values.len() == names.len() {
        for (i, value) in spec.values.iter().enumerate() {
            let key = ExprRef {
                file: path.to_path_buf(),
                offset: value.start,
            };
            let Some(types) = entry_types.get(&key) else {
                bail!(
                    "internal error: no type information for initialiser of {} in {} \
                     (expression at {}:{})",
                    names[i],
                    program.import_path,
                    path.display(),
                    value.start
                );
            };
            rendered.push(qualifier.render(arbiter, &types[0])?);
        }
    } else {
        let key = ExprRef {
            file: path.to_path_buf(),
            offset: spec.values[0].start,
        };
        let Some(types) = entry_types.get(&key) else {
            bail!(
                "internal error: no type information for initialiser of {} in {}",
                names.join(", "),
                program.import_path
            );
        };
        if types.len() != names.len() {
            bail!(
                "internal error: initialiser of {} in {} reports {} types for {} names",
                names.join(", "),
                program.import_path,
                types.len(),
                names.len()
            );
        }
        for ty in types.iter() {
            rendered.push(qualifier.render(arbiter, ty)?);
        }
    }
    Ok(rendered)
}

fn make_func(name: &str, body_calls: &[String]) -> String {
    let mut out = format!("func {name}() {{\n");
    for call in body_calls {
        out.push_str("\t");
        out.push_str(call);
        out.push('\n');
    }
    out.push('}');
    out
}

fn make_assign_func(name: &str, targets: &str, value: &str) -> String {
    format!("func {name}() {{\n\t{targets} = {value}\n}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Analysis, InitEntry, Module};
    use crate::loader::golist::GoListPackage;

    const REGISTRY: &str = "gobb.invalid/bb/pkg/bbmain";

    const HELLO: &str = r#"package main

import (
	"flag"
	"fmt"
)

var greeting = "hello world"

var verbose = flag.Bool("v", false, "verbose")

func init() {
	flag.Parse()
}

func main() {
	if *verbose {
		fmt.Println(greeting, "(verbose)")
		return
	}
	fmt.Println(greeting)
}
"#;

    fn graph() -> PackageGraph {
        let mk = |path: &str, name: &str| GoListPackage {
            import_path: path.to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        PackageGraph::from_packages(vec![
            mk("example.com/mod1/cmd/helloworld", "main"),
            mk("flag", "flag"),
            mk("fmt", "fmt"),
        ])
    }

    /// Build a Program whose analysis matches `src`, deriving initialiser
    /// offsets from the scanner so they agree by construction.
    fn program(name: &str, file: &str, src: &str, types: &[&[&str]]) -> Program {
        let scan = decls::scan_file(src).unwrap();
        let mut init_order = Vec::new();
        let mut ti = 0;
        for spec in &scan.var_specs {
            if spec.values.is_empty() {
                continue;
            }
            if spec.values.len() == spec.names.len() {
                for (i, value) in spec.values.iter().enumerate() {
                    init_order.push(InitEntry {
                        targets: vec![spec.names[i].0.clone()],
                        types: types[ti].iter().map(|s| s.to_string()).collect(),
                        rhs: ExprRef {
                            file: PathBuf::from(file),
                            offset: value.start,
                        },
                    });
                    ti += 1;
                }
            } else {
                init_order.push(InitEntry {
                    targets: spec.names.iter().map(|(n, _)| n.clone()).collect(),
                    types: types[ti].iter().map(|s| s.to_string()).collect(),
                    rhs: ExprRef {
                        file: PathBuf::from(file),
                        offset: spec.values[0].start,
                    },
                });
                ti += 1;
            }
        }

        let mut package_scope: std::collections::BTreeSet<String> = scan
            .funcs
            .iter()
            .filter(|f| !f.has_receiver)
            .map(|f| f.name.clone())
            .collect();
        for spec in &scan.var_specs {
            for (n, _) in &spec.names {
                package_scope.insert(n.clone());
            }
        }
        let file_scopes = [(
            PathBuf::from(file),
            scan.imports
                .iter()
                .map(|i| {
                    i.alias
                        .clone()
                        .unwrap_or_else(|| i.path.rsplit('/').next().unwrap().to_string())
                })
                .filter(|a| a != "_" && a != ".")
                .collect(),
        )]
        .into_iter()
        .collect();

        Program {
            name: name.to_string(),
            import_path: format!("example.com/mod1/cmd/{name}"),
            dir: PathBuf::from("/src/mod1/cmd").join(name),
            go_files: vec![PathBuf::from(file)],
            other_files: Vec::new(),
            module: None::<Module>,
            analysis: Analysis {
                package_scope,
                file_scopes,
                init_order,
            },
        }
    }

    fn rewrite_one(name: &str, src: &str, types: &[&[&str]]) -> String {
        let file = format!("/src/mod1/cmd/{name}/main.go");
        let p = program(name, &file, src, types);
        let files = rewrite_sources(
            &p,
            &graph(),
            REGISTRY,
            &[(PathBuf::from(&file), src.to_string())],
        )
        .unwrap();
        assert_eq!(files.len(), 1);
        files[0].content.clone()
    }

    #[test]
    fn test_hello_package_renamed_and_registered() {
        let out = rewrite_one("helloworld", HELLO, &[&["string"], &["*bool"]]);

        assert!(out.starts_with("package helloworld\n"));
        assert!(out.contains("func registeredMain() {"));
        assert!(!out.contains("func main()"));
        assert!(out.contains(
            "func init() {\n\tbbmain.Register(\"helloworld\", registeredInit, registeredMain)\n}"
        ));
        assert!(out.contains(&format!("import bbmain {:?}", REGISTRY)));
    }

    #[test]
    fn test_hello_globals_hoisted_in_order() {
        let out = rewrite_one("helloworld", HELLO, &[&["string"], &["*bool"]]);

        // Declarations keep their names with textual types.
        assert!(out.contains("var greeting string"));
        assert!(out.contains("var verbose *bool"));
        assert!(!out.contains("var greeting = "));

        // The original init was renamed and its body kept.
        assert!(out.contains("func busyboxInit3() {\n\tflag.Parse()\n}"));

        // busyboxInit0 replays the variable initialisers in order, and the
        // aggregate initialiser runs it before the renamed init.
        assert!(out.contains(
            "func busyboxInit0() {\n\tbusyboxInit1()\n\tbusyboxInit2()\n}"
        ));
        assert!(out.contains(
            "func registeredInit() {\n\tbusyboxInit0()\n\tbusyboxInit3()\n}"
        ));
        assert!(out.contains("func busyboxInit1() {\n\tgreeting = \"hello world\"\n}"));
        assert!(out.contains(
            "func busyboxInit2() {\n\tverbose = flag.Bool(\"v\", false, \"verbose\")\n}"
        ));
    }

    #[test]
    fn test_sanitised_package_ident() {
        let src = "package main\n\nfunc main() {}\n";
        let out = rewrite_one("12-fancy-cmd", src, &[]);
        assert!(out.starts_with("package _12_fancy_cmd\n"));
        assert!(out.contains("bbmain.Register(\"12-fancy-cmd\""));
    }

    #[test]
    fn test_collision_with_existing_names() {
        // The program already uses the default helper names; fresh ones
        // must not collide.
        let src = r#"package main

import "fmt"

func registeredMain() {}

func registeredInit() {}

func busyboxInit0() {}

var x = 1

func main() {
	registeredMain()
	registeredInit()
	busyboxInit0()
	fmt.Println(x)
}
"#;
        let out = rewrite_one("clash", src, &[&["int"]]);
        assert!(out.contains("func registeredMain0() {\n\tregisteredMain()"));
        assert!(out.contains("Register(\"clash\", registeredInit0, registeredMain0)"));
        // busyboxInit0 is taken, so numbering starts at 1.
        assert!(out.contains("func busyboxInit1() {\n\tbusyboxInit2()\n}"));
        assert!(out.contains("func busyboxInit2() {\n\tx = 1\n}"));
    }

    #[test]
    fn test_tuple_assignment_hoisted_whole() {
        let src = "package main\n\nvar a, b = pair()\n\nfunc pair() (int, string) { return 1, \"x\" }\n\nfunc main() {}\n";
        let out = rewrite_one("tuple", src, &[&["int", "string"]]);
        assert!(out.contains("func busyboxInit1() {\n\ta, b = pair()\n}"));
        // Heterogeneous standalone spec splits into a parenthesised block.
        assert!(out.contains("var (\n\ta int\n\tb string\n)"));
    }

    #[test]
    fn test_explicit_type_kept() {
        let src = "package main\n\nvar n int = 7\n\nfunc main() {}\n";
        let out = rewrite_one("keep", src, &[&["int"]]);
        assert!(out.contains("var n int\n"));
        assert!(out.contains("func busyboxInit1() {\n\tn = 7\n}"));
    }

    #[test]
    fn test_missing_main_is_fatal() {
        let src = "package main\n\nfunc notmain() {}\n";
        let file = "/src/mod1/cmd/broken/main.go";
        let p = program("broken", file, src, &[]);
        let err = rewrite_sources(
            &p,
            &graph(),
            REGISTRY,
            &[(PathBuf::from(file), src.to_string())],
        )
        .unwrap_err();
        assert!(err.to_string().contains("no main function"));
    }

    #[test]
    fn test_init_order_mismatch_is_invariant_violation() {
        let src = "package main\n\nvar x = 1\n\nfunc main() {}\n";
        let file = "/src/mod1/cmd/bad/main.go";
        let mut p = program("bad", file, src, &[&["int"]]);
        // Corrupt the reported offset.
        p.analysis.init_order[0].rhs.offset += 1000;
        let err = rewrite_sources(
            &p,
            &graph(),
            REGISTRY,
            &[(PathBuf::from(file), src.to_string())],
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("internal error"), "{msg}");
        assert!(msg.contains("example.com/mod1/cmd/bad"), "{msg}");
    }

    #[test]
    fn test_methods_named_main_or_init_untouched() {
        let src = "package main\n\ntype t struct{}\n\nfunc (t) init() {}\n\nfunc (t) main() {}\n\nfunc main() {}\n";
        let out = rewrite_one("methods", src, &[]);
        assert!(out.contains("func (t) init() {}"));
        assert!(out.contains("func (t) main() {}"));
        assert!(out.contains("func registeredMain() {}"));
    }

    #[test]
    fn test_two_files_registration_in_main_file() {
        let a_src = "package main\n\nvar color = \"red\"\n";
        let b_src = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(color)\n}\n";
        let a = PathBuf::from("/p/a.go");
        let b = PathBuf::from("/p/b.go");

        let a_scan = decls::scan_file(a_src).unwrap();
        let analysis = Analysis {
            package_scope: ["color".to_string(), "main".to_string()]
                .into_iter()
                .collect(),
            file_scopes: [
                (a.clone(), Default::default()),
                (b.clone(), ["fmt".to_string()].into_iter().collect()),
            ]
            .into_iter()
            .collect(),
            init_order: vec![InitEntry {
                targets: vec!["color".to_string()],
                types: vec!["string".to_string()],
                rhs: ExprRef {
                    file: a.clone(),
                    offset: a_scan.var_specs[0].values[0].start,
                },
            }],
        };
        let p = Program {
            name: "twofile".to_string(),
            import_path: "example.com/mod1/cmd/twofile".to_string(),
            dir: PathBuf::from("/p"),
            go_files: vec![a.clone(), b.clone()],
            other_files: Vec::new(),
            module: None,
            analysis,
        };
        let files = rewrite_sources(
            &p,
            &graph(),
            REGISTRY,
            &[(a, a_src.to_string()), (b, b_src.to_string())],
        )
        .unwrap();

        let a_out = &files[0].content;
        let b_out = &files[1].content;
        // The helper lands in the file that declared the variable; the
        // aggregates and registration land in the file with main.
        assert!(a_out.contains("func busyboxInit1() {\n\tcolor = \"red\"\n}"));
        assert!(!a_out.contains("Register("));
        assert!(b_out.contains("func busyboxInit0() {\n\tbusyboxInit1()\n}"));
        assert!(b_out.contains("bbmain.Register(\"twofile\""));
    }
}
