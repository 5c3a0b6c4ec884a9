//! gobb CLI - compile many Go commands into one bb-style binary.

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;
use gobb::builder::BuildOpts;
use gobb::core::GoEnv;
use gobb::ops::{build_busybox, BuildBusyboxOpts};
use gobb::resolver::ResolveOpts;
use gobb::util::shell::{ColorChoice, Shell};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let filter = if cli.verbose {
        EnvFilter::new("gobb=debug")
    } else {
        EnvFilter::new("gobb=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color: ColorChoice = cli
        .color
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, color));

    let mut env = GoEnv::detect()?;
    if let Some(go) = cli.go {
        env.go_cmd = go;
    }
    if let Some(goos) = cli.goos {
        env.goos = goos;
    }
    if let Some(goarch) = cli.goarch {
        env.goarch = goarch;
    }
    env.build_tags = cli.tags;
    shell.note(format!("Build environment: {env}"));

    let working_dir = std::env::current_dir()?;
    let opts = BuildBusyboxOpts {
        env,
        resolve: ResolveOpts::from_env(working_dir),
        patterns: cli.patterns,
        output: cli.output,
        gen_dir: cli.gen_dir,
        generate_only: cli.generate_only,
        keep_sources: cli.keep,
        strict: cli.strict,
        tie_break_local: cli.tie_break_local,
        build: BuildOpts {
            no_strip: cli.no_strip,
            ldflags: cli.ldflags,
            trimpath: cli.trimpath,
            mod_flag: cli.mod_flag,
            extra_args: Vec::new(),
        },
    };

    build_busybox(&shell, &opts)
}
