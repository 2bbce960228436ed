mod config;
mod discover;
mod runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::{Level, debug};

use config::{Config, Flavour};
use discover::PathFilter;
use runner::Runner;

#[derive(Parser)]
#[command(name = "exemplar", version, about = "Check the examples in documentation")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More logging on stderr. Repeatable.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the examples in every matching document
    Test(Selection),

    /// List matching documents and the examples found in them
    List(Selection),
}

#[derive(Args)]
struct Selection {
    /// Directory to search, or a single document
    path: Option<PathBuf>,

    /// Config file. Defaults to exemplar.toml in the searched directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pattern matching documents to check. Repeatable.
    #[arg(short, long = "pattern")]
    patterns: Vec<String>,

    /// Pattern matching documents to leave alone. Repeatable.
    #[arg(short, long = "exclude")]
    excludes: Vec<String>,

    /// File name to check wherever it appears. Repeatable.
    #[arg(long = "filename")]
    filenames: Vec<String>,

    #[arg(long)]
    encoding: Option<String>,

    #[arg(long, value_enum)]
    flavour: Option<Flavour>,

    /// Doctest option flag, such as ELLIPSIS. Repeatable.
    #[arg(short = 'o', long = "option")]
    options: Vec<String>,
}

impl Selection {
    /// The config to use, with command-line values layered over it.
    fn config(&self) -> Result<Config, config::ConfigError> {
        let directory = self.path.as_deref().filter(|path| path.is_dir()).unwrap_or(Path::new("."));
        let mut config = match &self.config {
            Some(file) => Config::from_file(file)?,
            None => Config::discover(directory)?.unwrap_or_default(),
        };
        if let Some(path) = &self.path {
            config.path = path.clone();
        }
        if !self.patterns.is_empty() {
            config.patterns = self.patterns.clone();
        }
        config.excludes.extend(self.excludes.iter().cloned());
        config.filenames.extend(self.filenames.iter().cloned());
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }
        if let Some(flavour) = self.flavour {
            config.flavour = flavour;
        }
        config.doctest.optionflags.extend(self.options.iter().cloned());
        Ok(config)
    }
}

fn documents(config: &Config) -> Result<Vec<PathBuf>, regex::Error> {
    if config.path.is_file() {
        return Ok(vec![config.path.clone()]);
    }
    let filter = PathFilter::new(&config.patterns(), &config.filenames, &config.excludes)?;
    Ok(discover::documents(&config.path, &filter))
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(2);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let (selection, listing) = match &cli.command {
        Command::Test(selection) => (selection, false),
        Command::List(selection) => (selection, true),
    };
    let config = selection.config().unwrap_or_else(|error| fail(error));
    let runner = Runner::new(&config).unwrap_or_else(|error| fail(error));
    let paths = documents(&config).unwrap_or_else(|error| fail(format!("invalid pattern: {error}")));
    debug!(root = %config.path.display(), documents = paths.len(), "discovered");

    if paths.is_empty() {
        eprintln!("no documents found in {}", config.path.display());
        process::exit(1);
    }

    if listing {
        list(&runner, &paths);
        return;
    }

    let reports: Vec<_> = paths.iter().map(|path| runner.run_document(path)).collect();
    let summary = runner::print_reports(&reports, cli.no_color);
    process::exit(summary.exit_code());
}

fn list(runner: &Runner, paths: &[PathBuf]) {
    for path in paths {
        match runner.parse(path) {
            Ok(document) => {
                println!("{}", path.display());
                for example in document.examples() {
                    println!("  line {}, column {}: {}", example.line, example.column, example.evaluator().name());
                }
            }
            Err(error) => eprintln!("{}: {error}", path.display()),
        }
    }
}
