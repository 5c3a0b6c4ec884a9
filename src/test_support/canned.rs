//! Canned subprocess output.

/// `go list -e -json` output for two commands in one module. Note: the
/// tool emits concatenated objects, not an array.
pub const GOLIST_TWO_COMMANDS: &str = r#"{
	"Dir": "/src/mod1/cmd/helloworld",
	"ImportPath": "example.com/mod1/cmd/helloworld",
	"Name": "main",
	"GoFiles": ["helloworld.go"],
	"Imports": ["fmt"],
	"Module": {
		"Path": "example.com/mod1",
		"Main": true,
		"Dir": "/src/mod1",
		"GoMod": "/src/mod1/go.mod"
	}
}
{
	"Dir": "/src/mod1/cmd/getppid",
	"ImportPath": "example.com/mod1/cmd/getppid",
	"Name": "main",
	"GoFiles": ["getppid.go"],
	"Imports": ["fmt", "os"],
	"Module": {
		"Path": "example.com/mod1",
		"Main": true,
		"Dir": "/src/mod1",
		"GoMod": "/src/mod1/go.mod"
	}
}
"#;

/// A dependency package whose module is rebound to a local directory.
pub const GOLIST_REPLACED_DEP: &str = r#"{
	"Dir": "/src/dep/pkg/exthello",
	"ImportPath": "example.com/dep/pkg/exthello",
	"Name": "exthello",
	"GoFiles": ["hello.go"],
	"Module": {
		"Path": "example.com/dep",
		"Version": "v1.0.0",
		"Dir": "/src/dep",
		"GoMod": "/src/dep/go.mod",
		"Replace": {
			"Path": "../dep",
			"Dir": "/src/dep",
			"GoMod": "/src/dep/go.mod"
		}
	}
}
"#;

/// A package `go list -e` could not load.
pub const GOLIST_BROKEN_PACKAGE: &str = r#"{
	"Dir": "/src/mod1/cmd/broken",
	"ImportPath": "example.com/mod1/cmd/broken",
	"Name": "main",
	"GoFiles": ["broken.go"],
	"Incomplete": true,
	"Error": {
		"ImportStack": ["example.com/mod1/cmd/broken"],
		"Pos": "broken.go:4:1",
		"Err": "expected ';', found 'EOF'"
	}
}
"#;

/// A `gobb-inspect` report for the helloworld fixture.
pub const INSPECT_HELLOWORLD: &str = r#"[
	{
		"importPath": "example.com/mod1/cmd/helloworld",
		"dir": "/src/mod1/cmd/helloworld",
		"packageScope": ["greeting", "main"],
		"fileScopes": {
			"/src/mod1/cmd/helloworld/helloworld.go": ["fmt", "flag"]
		},
		"initOrder": [
			{
				"targets": ["greeting"],
				"types": ["string"],
				"rhs": {
					"file": "/src/mod1/cmd/helloworld/helloworld.go",
					"offset": 57
				}
			}
		]
	}
]
"#;
