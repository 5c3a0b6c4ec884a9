//! Go source templates for the synthetic `bb` package.
//!
//! These are emitted, not rewritten: the dispatcher `main.go` (with one
//! blank import per embedded command spliced in) and the registry package
//! every rewritten command registers itself with. They live in the
//! synthesised `gobb.invalid/bb` module so they can never collide with a
//! user module.

/// Import path of the registry package inside the synthetic module.
pub const REGISTRY_IMPORT: &str = "gobb.invalid/bb/pkg/bbmain";

/// `pkg/bbmain/register.go`: registry primitives.
pub const REGISTER_SOURCE: &str = r#"// Package bbmain is the registry of commands compiled into this binary.
//
// It is populated at startup by one init per embedded command; after that
// it is read-only.
package bbmain

import (
	"errors"
	"fmt"
	"os"
	"sort"
)

// ErrNotRegistered is returned by Run for unknown command names.
var ErrNotRegistered = errors.New("command not registered")

// Noop does nothing. It is registered for commands without initializers.
var Noop = func() {}

type command struct {
	init func()
	main func()
}

var commands = map[string]command{}

// Register registers the init and main function for name.
func Register(name string, init, main func()) {
	if _, ok := commands[name]; ok {
		panic(fmt.Sprintf("cannot register two commands with name %q", name))
	}
	commands[name] = command{init: init, main: main}
}

// Names returns every registered command name, sorted.
func Names() []string {
	names := make([]string, 0, len(commands))
	for name := range commands {
		names = append(names, name)
	}
	sort.Strings(names)
	return names
}

// Run runs the command with the given name.
//
// If the command's main returns without calling os.Exit, Run exits with
// code 0.
func Run(name string) error {
	cmd, ok := commands[name]
	if !ok {
		return ErrNotRegistered
	}
	cmd.init()
	cmd.main()
	os.Exit(0)
	// Unreachable.
	return nil
}
"#;

/// The dispatcher `main.go`, with `%IMPORTS%` replaced by one blank import
/// per embedded command.
const MAIN_TEMPLATE: &str = r##"// Command bb dispatches to an embedded command chosen by invocation name.
package main

import (
	"fmt"
	"log"
	"os"
	"path/filepath"

	"gobb.invalid/bb/pkg/bbmain"
%IMPORTS%)

// interpMarker supports filesystems without symbolic links: a script whose
// interpreter line passes this marker invokes the binary as
//
//	bb #!gobb!# /path/of/script [args...]
//
// in which case the script path takes over as argv[0].
const interpMarker = "#!gobb!#"

// absSymlink returns an absolute path for the link from a file to a target.
func absSymlink(originalFile, target string) string {
	if !filepath.IsAbs(originalFile) {
		var err error
		originalFile, err = filepath.Abs(originalFile)
		if err != nil {
			// Should not happen on Unix systems, or you're
			// already royally screwed.
			log.Fatalf("could not determine absolute path for %v: %v", originalFile, err)
		}
	}
	// Relative symlinks resolve relative to the original file's parent.
	if !filepath.IsAbs(target) {
		return filepath.Join(filepath.Dir(originalFile), target)
	}
	return target
}

// isTargetSymlink returns true if the target of a symlink is also a symlink.
func isTargetSymlink(originalFile, target string) bool {
	s, err := os.Lstat(absSymlink(originalFile, target))
	if err != nil {
		return false
	}
	return (s.Mode() & os.ModeSymlink) == os.ModeSymlink
}

// resolveUntilLastSymlink resolves a symlink chain up to, but not through,
// the last link. A chain ./ls -> ./wrapper -> /bin/bb must still report the
// name "ls", which is why filepath.EvalSymlinks does not fit here.
func resolveUntilLastSymlink(p string) string {
	for target, err := os.Readlink(p); err == nil && isTargetSymlink(p, target); target, err = os.Readlink(p) {
		p = absSymlink(p, target)
	}
	return p
}

// diagnose compares registered command names against the symlinks next to
// the binary that point back at it. For every command there should be a
// link, and for every link a command; running `bb bbdiagnose` is a cheap
// way to tell whether an image is misassembled.
func diagnose() {
	self, err := os.Executable()
	if err != nil {
		log.Fatalf("could not locate the running binary: %v", err)
	}
	links := map[string]bool{}
	entries, err := os.ReadDir(filepath.Dir(self))
	if err != nil {
		log.Fatalf("could not enumerate %s: %v", filepath.Dir(self), err)
	}
	for _, entry := range entries {
		full := filepath.Join(filepath.Dir(self), entry.Name())
		if entry.Type()&os.ModeSymlink == 0 {
			continue
		}
		if target, err := os.Readlink(full); err == nil {
			if absSymlink(full, target) == self {
				links[entry.Name()] = true
			}
		}
	}
	ok := true
	for _, name := range bbmain.Names() {
		if name == "bbdiagnose" {
			continue
		}
		if !links[name] {
			fmt.Printf("%s:\tNO SYMLINK\n", name)
			ok = false
		}
		delete(links, name)
	}
	for name := range links {
		fmt.Printf("%s:\tNO COMMAND\n", name)
		ok = false
	}
	if !ok {
		fmt.Println("There is at least one problem. Known causes:")
		fmt.Println("The image was changed after creation or merged with another one.")
		fmt.Println("Files were added next to the binary by mistake.")
	}
}

func run(name string) error {
	return bbmain.Run(name)
}

func main() {
	os.Args[0] = resolveUntilLastSymlink(os.Args[0])

	if len(os.Args) > 2 && os.Args[1] == interpMarker {
		os.Args = append([]string{os.Args[2]}, os.Args[3:]...)
	}

	name := filepath.Base(os.Args[0])
	err := run(name)
	if err == bbmain.ErrNotRegistered && len(os.Args) > 1 {
		// Subcommand form: bb <command> [args...].
		os.Args = os.Args[1:]
		name = filepath.Base(os.Args[0])
		err = run(name)
	}
	if err == bbmain.ErrNotRegistered {
		fmt.Fprintf(os.Stderr, "%q is not a registered command; this binary contains:\n", name)
		for _, registered := range bbmain.Names() {
			fmt.Fprintf(os.Stderr, "  %s\n", registered)
		}
		os.Exit(1)
	}
	if err != nil {
		log.Fatalf("%s: %v", name, err)
	}
}

func init() {
	bbmain.Register("bbdiagnose", bbmain.Noop, diagnose)
}
"##;

/// Render the dispatcher `main.go` for the given command import paths, in
/// registration order.
pub fn main_source(command_imports: &[String]) -> String {
    let mut imports = String::new();
    for path in command_imports {
        imports.push_str(&format!("\t_ {path:?}\n"));
    }
    MAIN_TEMPLATE.replace("%IMPORTS%", &imports)
}
