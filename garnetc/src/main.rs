//! Garnet inference CLI
//!
//! Runs call resolution and type inference over a normalized program
//! serialized as JSON.
//!
//! # Usage
//!
//! ```text
//! garnetc [OPTIONS] <COMMAND>
//!
//! Commands:
//!   check  Infer types and print the type of every top-level expression
//!   calls  Print every call site with its targets and dispatch table
//!
//! Options:
//!   -c, --config <FILE>  Configuration file (garnet.toml)
//!   -v, --verbose        Increase verbosity (can be repeated)
//!   -q, --quiet          Suppress non-error output
//!   --color <WHEN>       Control color output [default: auto] [possible values: auto, always, never]
//!   -h, --help           Print help information
//!   -V, --version        Print version information
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use garnetc::ast::Program;
use garnetc::config::Config;
use garnetc::diagnostics::DiagnosticEmitter;
use garnetc::typeck::{check_program, DispatchResolver, InferenceContext, TypeError};

/// The Garnet type inference engine
#[derive(Parser)]
#[command(name = "garnetc")]
#[command(version)]
#[command(about = "Call resolution and type inference for Garnet programs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Control when to use colored output
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer types of a normalized program
    ///
    /// Prints the type of every top-level expression and variable.
    Check(FileArgs),

    /// Show call resolution
    ///
    /// Prints every call site with its resolved targets, and the dispatch
    /// table of calls with more than one target.
    Calls(FileArgs),
}

#[derive(Args)]
struct FileArgs {
    /// Normalized program (JSON)
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

/// When to use colored output
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Follow the configuration file
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::from(1);
            }
        },
        None => Config::default(),
    };
    match cli.color {
        ColorChoice::Auto => {}
        ColorChoice::Always => config.diagnostics.color = true,
        ColorChoice::Never => config.diagnostics.color = false,
    }

    match cli.command {
        Commands::Check(args) => cmd_check(&args, &config, cli.quiet),
        Commands::Calls(args) => cmd_calls(&args, &config),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Read and deserialize a normalized program.
fn read_program(path: &Path) -> Result<Program, ExitCode> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            return Err(ExitCode::from(1));
        }
    };
    serde_json::from_str(&content).map_err(|e| {
        eprintln!("Error parsing program '{}': {}", path.display(), e);
        ExitCode::from(1)
    })
}

fn infer(args: &FileArgs, config: &Config) -> Result<(InferenceContext, Program), ExitCode> {
    let program = read_program(&args.file)?;
    match check_program(&program, config) {
        Ok((ctx, _)) => Ok((ctx, program)),
        Err(err) => {
            report(&err, &args.file, &program, config);
            Err(ExitCode::from(1))
        }
    }
}

fn report(err: &TypeError, path: &Path, program: &Program, config: &Config) {
    let mut err = err.clone();
    if !config.diagnostics.show_trace {
        err.trace.clear();
    }
    let diagnostic = err.to_diagnostic();
    match &program.source {
        Some(source) => {
            let filename = path.display().to_string();
            DiagnosticEmitter::new(&filename, source)
                .with_color(config.diagnostics.color)
                .emit(&diagnostic);
        }
        None => eprint!("{}", diagnostic.render_plain()),
    }
}

fn cmd_check(args: &FileArgs, config: &Config, quiet: bool) -> ExitCode {
    let (ctx, _) = match infer(args, config) {
        Ok(result) => result,
        Err(code) => return code,
    };
    if quiet {
        return ExitCode::SUCCESS;
    }

    let root = ctx.scope(InferenceContext::ROOT);
    for (name, node) in &root.vars {
        println!("{} : {}", name, ctx.display_node(*node));
    }
    let dead = ctx.calls().filter(|(_, call)| call.is_dead()).count();
    if dead > 0 {
        println!("{} call(s) unreachable after NoReturn", dead);
    }
    ExitCode::SUCCESS
}

fn cmd_calls(args: &FileArgs, config: &Config) -> ExitCode {
    let (ctx, _) = match infer(args, config) {
        Ok(result) => result,
        Err(code) => return code,
    };

    let resolver = DispatchResolver::new(&ctx);
    let universe = ctx.universe();
    for (id, call) in ctx.calls() {
        let receiver = call
            .obj
            .map(|obj| format!("{}.", ctx.display_node(obj)))
            .unwrap_or_default();
        println!(
            "{:?} {}{} : {} at {}",
            id,
            receiver,
            call.name,
            ctx.display_node(call.node),
            call.span
        );
        if call.is_dead() {
            println!("    (unreachable)");
            continue;
        }
        for target in call.targets() {
            println!("    -> {}", ctx.describe_typed_def(*target));
        }
        if call.targets().len() > 1 {
            for entry in resolver.table(id) {
                let receiver = entry.receiver.map(|r| universe.display(r)).unwrap_or_default();
                let target = entry
                    .target
                    .map_or_else(|| "-".to_string(), |t| ctx.describe_typed_def(t));
                println!("       [{}]({}) => {}", receiver, universe.display_list(&entry.args), target);
            }
        }
    }
    ExitCode::SUCCESS
}
