use anyhow::Result;
use clap::Parser;
use clap::error::{ContextKind, ErrorKind};
use std::path::PathBuf;

use png_param_cleaner::config;
use png_param_cleaner::pipeline::{self, BatchOptions, InputError, ProcessResult};
use png_param_cleaner::report::ConsoleReporter;
use png_param_cleaner::transliterate::Transliterator;

#[derive(Parser, Debug)]
#[command(
    name = "png-param-cleaner",
    version,
    args_override_self = true,
    about = "Transliterate non-ASCII characters in the `parameters` text chunk of PNG images"
)]
struct Cli {
    /// Path to the input image/directory
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Path to the output image/directory
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the source and cleaned metadata of each image
    #[arg(long)]
    debug: bool,

    /// Use batch mode to process a directory of images
    #[arg(long)]
    batch: bool,

    /// Write unusual-character notices to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// In batch mode, record failing files and continue instead of aborting
    #[arg(long)]
    keep_going: bool,

    /// Output results as JSON on stdout (notices and progress move to stderr)
    #[arg(long, conflicts_with = "debug")]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Print a one-line usage error to stdout and exit with status 1.
fn fail(message: impl std::fmt::Display) -> ! {
    println!("Error: {message}");
    std::process::exit(1)
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            ErrorKind::UnknownArgument => {
                let arg = e
                    .get(ContextKind::InvalidArg)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                fail(format_args!("Unexpected argument {arg}"))
            }
            _ => {
                let _ = e.print();
                std::process::exit(1)
            }
        },
    }
}

fn main() -> Result<()> {
    let cli = parse_cli();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let (Some(input), Some(output)) = (cli.input.as_deref(), cli.output.as_deref()) else {
        fail("--input and --output are required");
    };

    let config = config::Config::load(cli.config.as_deref())?;
    let transliterator = Transliterator::from_config(&config)?;

    let mut reporter = match cli.log.as_deref().or(config.log_file.as_deref()) {
        Some(path) => ConsoleReporter::with_log_file(path)?,
        None => ConsoleReporter::stdout(),
    };
    if cli.json {
        reporter = reporter.on_stderr();
    }

    if !cli.batch {
        let result =
            pipeline::clean_image(input, output, cli.debug, &transliterator, &mut reporter)?;
        if cli.json {
            print_json(std::slice::from_ref(&result))?;
        }
        return Ok(());
    }

    let mut options = BatchOptions::from_config(&config, cli.debug);
    if cli.keep_going {
        options.fail_fast = false;
    }

    let outcome = pipeline::run_batch(input, output, &options, &transliterator, &mut reporter);
    let report = match outcome {
        Ok(report) => report,
        Err(e) => match e.downcast_ref::<InputError>() {
            Some(input_error) => fail(input_error),
            None => return Err(e),
        },
    };

    if cli.json {
        print_json(&report.results)?;
    }

    let failed = report.failed();
    log::info!(
        "Done: {} succeeded, {failed} failed out of {} images",
        report.succeeded(),
        report.total()
    );
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_json(results: &[ProcessResult]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(results)?);
    Ok(())
}
