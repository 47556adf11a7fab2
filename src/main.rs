//! FIL-S Compiler
//!
//! Command line front end: checks modules and dumps typed trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use filsc::feedback::{CheckFeedback, CheckStats};
use filsc::frontend::module::{parse_sources, ModuleLoader};
use filsc::{Ast, Error, NodeId};

/// FIL-S Compiler
#[derive(Parser, Debug)]
#[command(name = "filsc")]
#[command(version)]
#[command(about = "FIL-S compiler - semantic analysis of actor-oriented embedded programs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (.fil)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the files of one module for errors
    Check {
        /// Source files of the module
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory to search for imported modules
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Module name (defaults to the first file's name)
        #[arg(long)]
        module: Option<String>,
    },
    /// Analyze a file and write its typed tree as JSON
    Dump {
        /// Input source file
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory to search for imported modules
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,
    },
    /// Print version information
    Version,
}

/// An analyzed (or rejected) module
struct Analysis {
    ast: Ast,
    module: String,
    result: Result<NodeId, Vec<Error>>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let ok = match cli.command {
        Some(Commands::Check {
            files,
            include,
            json,
            module,
        }) => check(&files, include, module, json)?,
        Some(Commands::Dump { input, output, include }) => dump(&input, output.as_deref(), include)?,
        Some(Commands::Version) => {
            println!("filsc {}", env!("CARGO_PKG_VERSION"));
            println!("FIL-S Compiler");
            println!("License: {}", env!("CARGO_PKG_LICENSE"));
            true
        }
        None => match cli.input {
            Some(input) => check(&[input], Vec::new(), None, false)?,
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: filsc <FILE> or filsc check <FILES>...");
                false
            }
        },
    };

    if !ok {
        process::exit(1);
    }
    Ok(())
}

fn module_name(files: &[PathBuf], module: Option<String>) -> anyhow::Result<String> {
    if let Some(name) = module {
        return Ok(name);
    }
    let Some(first) = files.first() else {
        bail!("no input files");
    };
    first
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a module name from {}", first.display()))
}

/// Parse `files` as one module and analyze it with its imports
fn analyze(files: &[PathBuf], include: Vec<PathBuf>, module: Option<String>) -> anyhow::Result<Analysis> {
    for file in files {
        if !file.is_file() {
            bail!("cannot read {}", file.display());
        }
    }
    let module = module_name(files, module)?;
    log::debug!("analyzing module '{}' ({} file(s))", module, files.len());

    let mut ast = Ast::new();
    let mut loader = ModuleLoader::with_search_paths(include);
    let result = parse_sources(&mut ast, files).and_then(|scripts| loader.analyze_module(&mut ast, &module, &scripts));

    Ok(Analysis { ast, module, result })
}

fn report_errors(errors: &[Error], ast: &Ast, fallback: &str) {
    for err in errors {
        eprintln!("{}{}", error_file(err, ast, fallback), format_error(err));
    }
    eprintln!("{} error(s) found", errors.len());
}

/// File an error was found in; errors without a source position (module
/// loading, I/O) are attributed to `fallback`
fn error_file<'a>(err: &Error, ast: &'a Ast, fallback: &'a str) -> &'a str {
    err.position().and_then(|pos| ast.source_name(pos)).unwrap_or(fallback)
}

fn format_error(err: &Error) -> String {
    match err.position() {
        Some(pos) if !pos.is_synthetic() => format!("{}: {}", pos, err),
        _ => format!(": {}", err),
    }
}

/// Check a module for errors without generating code
fn check(files: &[PathBuf], include: Vec<PathBuf>, module: Option<String>, json: bool) -> anyhow::Result<bool> {
    let started = Instant::now();
    let analysis = analyze(files, include, module)?;
    let stats = CheckStats {
        file_count: files.len(),
        node_count: analysis.ast.len(),
        type_count: analysis.ast.types().len(),
        total_time_ms: started.elapsed().as_millis() as u64,
    };
    let first_file = files.first().map(|f| f.display().to_string()).unwrap_or_default();

    match analysis.result {
        Ok(_) if json => {
            println!("{}", CheckFeedback::success(analysis.module, stats).to_json());
            Ok(true)
        }
        Ok(_) => {
            println!("OK");
            Ok(true)
        }
        Err(errors) if json => {
            let file_of = |err: &Error| error_file(err, &analysis.ast, &first_file).to_string();
            println!("{}", CheckFeedback::failure(analysis.module, &errors, file_of, stats).to_json());
            Ok(false)
        }
        Err(errors) => {
            report_errors(&errors, &analysis.ast, &first_file);
            Ok(false)
        }
    }
}

/// Write the typed tree of an analyzed file
fn dump(input: &Path, output: Option<&Path>, include: Vec<PathBuf>) -> anyhow::Result<bool> {
    let files = [input.to_path_buf()];
    let analysis = analyze(&files, include, None)?;
    if let Err(errors) = &analysis.result {
        report_errors(errors, &analysis.ast, &input.display().to_string());
        return Ok(false);
    }

    let json = analysis.ast.to_json()?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            log::debug!("typed tree written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(true)
}
