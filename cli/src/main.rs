use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use bidl_compiler::compatibility::check_directories;
use bidl_compiler::{
    compile_file, parse_file, write_generated, CompatibilityAbort, CompatibilityErrorCollection,
    CompileError, CompileOptions,
};

#[derive(Parser)]
#[command(name = "bidlc")]
#[command(about = "Generate Rust from bidl IDL files, or check two IDL trees for compatibility", long_about = None)]
struct Cli {
    /// More log output. Repeat for more. `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the declarations and definitions files for one `.idl` file
    Generate {
        /// Input `.idl` file
        #[arg(short, long)]
        input: PathBuf,

        /// Declarations file to write
        #[arg(long)]
        header: PathBuf,

        /// Definitions file to write; it `include!`s the declarations
        #[arg(long)]
        source: PathBuf,

        /// Directory relative output paths are taken from
        #[arg(short, long)]
        output_base_dir: Option<PathBuf>,

        /// Directories searched for imports
        #[arg(short = 'I', long = "include", env = "BIDL_INCLUDE", value_delimiter = ':')]
        include: Vec<PathBuf>,
    },

    /// Check that the IDL files under NEW are compatible with those under OLD
    CheckCompat {
        old: PathBuf,
        new: PathBuf,

        /// Directories searched for imports
        #[arg(short = 'I', long = "include", env = "BIDL_INCLUDE", value_delimiter = ':')]
        include: Vec<PathBuf>,

        /// Print the errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse an `.idl` file and print the result as JSON
    Dump {
        /// Input `.idl` file
        #[arg(short, long)]
        input: PathBuf,

        /// Directories searched for imports
        #[arg(short = 'I', long = "include", env = "BIDL_INCLUDE", value_delimiter = ':')]
        include: Vec<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn generate(options: CompileOptions) -> Result<(), CompileError> {
    let code = compile_file(&options.input, &options)?;
    write_generated(&code, &options)?;
    println!(
        "Generated {} and {}",
        options.header_path().display(),
        options.source_path().display()
    );
    Ok(())
}

fn report(errors: &CompatibilityErrorCollection, json: bool) -> io::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(errors).map_err(io::Error::other)?;
        println!("{}", text);
        Ok(())
    } else {
        errors.dump_errors(&mut io::stdout())
    }
}

fn check_compat(old: PathBuf, new: PathBuf, include: Vec<PathBuf>, json: bool) -> io::Result<ExitCode> {
    match check_directories(&old, &new, &include) {
        Ok(errors) => {
            report(&errors, json)?;
            Ok(if errors.has_errors() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Err(abort) => {
            if let CompatibilityAbort::UnresolvedType { collected, .. } = &abort {
                report(collected, json)?;
            }
            eprintln!("error: {}", abort);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn dump(input: PathBuf, include: Vec<PathBuf>) -> Result<(), CompileError> {
    let spec = parse_file(&input, &include)?;
    let json = serde_json::to_string_pretty(&spec)
        .map_err(|e| CompileError::Abort(format!("cannot serialize {}: {}", input.display(), e)))?;
    println!("{}", json);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            input,
            header,
            source,
            output_base_dir,
            include,
        } => {
            let mut options = CompileOptions::new(input, header, source);
            options.output_base_dir = output_base_dir;
            options.import_dirs = include;
            generate(options)
        }

        Commands::CheckCompat { old, new, include, json } => {
            return match check_compat(old, new, include, json) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            };
        }

        Commands::Dump { input, include } => dump(input, include),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
