//! The graft command line driver: a thin shell which reads documents, calls the
//! engine and prints the composed output.

use clap::{Args, Parser, Subcommand, ValueEnum};
use graft::config::EngineConfig;
use graft::{diff, fan, DataflowOrder, Engine, EngineOptions, Map, Value};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "graft", version, about = "A document composition engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fold the input documents into one composed document.
    Merge(MergeArgs),
    /// Merge each target document with a common source document.
    Fan(FanArgs),
    /// Re-emit each input as JSON.
    Json(InputArgs),
    /// Compare two documents, listing the paths which differ.
    Diff(DiffArgs),
    /// Report the secret references a merge would fetch, without fetching.
    Vaultinfo(InputArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    Alphabetical,
    Insertion,
}

#[derive(Args)]
struct MergeArgs {
    /// Input files; `-` reads standard input.
    files: Vec<String>,
    /// Split each input on `---` separator lines.
    #[arg(short = 'm', long)]
    multi_doc: bool,
    /// Stop after the merge, skipping expression evaluation.
    #[arg(long)]
    skip_eval: bool,
    /// Remove a key from the final document (repeatable).
    #[arg(long, value_name = "KEY")]
    prune: Vec<String>,
    /// Project the final document to a path (repeatable).
    #[arg(long, value_name = "PATH")]
    cherry_pick: Vec<String>,
    /// Concatenate sequences which cannot be paired by name instead of
    /// overwriting.
    #[arg(long)]
    fallback_append: bool,
    /// Scheduling and reporting order within an evaluation round.
    #[arg(long, value_enum, default_value = "alphabetical")]
    dataflow_order: OrderArg,
    /// Engine settings file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FanArgs {
    /// The source document.
    source: String,
    /// The target documents.
    targets: Vec<String>,
    #[arg(short = 'm', long)]
    multi_doc: bool,
    #[arg(long)]
    fallback_append: bool,
}

#[derive(Args)]
struct InputArgs {
    files: Vec<String>,
    #[arg(short = 'm', long)]
    multi_doc: bool,
}

#[derive(Args)]
struct DiffArgs {
    left: String,
    right: String,
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage problems exit 1; --help and --version exit 0.
            let code: u8 = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Fan(args) => run_fan(args),
        Command::Json(args) => run_json(args),
        Command::Diff(args) => run_diff(args),
        Command::Vaultinfo(args) => run_vaultinfo(args),
    }
}

fn init_logging() {
    let level = if std::env::var("TRACE").is_ok() {
        log::LevelFilter::Trace
    } else if std::env::var("DEBUG").is_ok() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();
}

fn run_merge(args: MergeArgs) -> ExitCode {
    let mut opts = match args.config.as_deref() {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config.engine_options(),
            Err(err) => return fail(err.to_string()),
        },
        None => EngineOptions::default(),
    };
    opts.skip_eval = args.skip_eval;
    opts.fallback_append = args.fallback_append;
    opts.prune = args.prune;
    opts.cherry_pick = args.cherry_pick;
    opts.dataflow_order = match args.dataflow_order {
        OrderArg::Alphabetical => DataflowOrder::Alphabetical,
        OrderArg::Insertion => DataflowOrder::Insertion,
    };

    let documents = match read_documents(&args.files, args.multi_doc) {
        Ok(documents) => documents,
        Err(message) => return fail(message),
    };

    let engine = Engine::new(opts);
    match engine.run(documents) {
        Ok(tree) => {
            println!("{}", tree.to_json());
            ExitCode::SUCCESS
        }
        Err(report) => fail(report.to_string()),
    }
}

fn run_fan(args: FanArgs) -> ExitCode {
    let mut opts = EngineOptions::default();
    opts.fallback_append = args.fallback_append;

    let mut source_docs = match read_documents(&[args.source.clone()], args.multi_doc) {
        Ok(docs) => docs,
        Err(message) => return fail(message),
    };
    if source_docs.len() != 1 {
        return fail("fan needs exactly one source document".to_string());
    }
    let source = source_docs.remove(0);

    let targets = match read_documents(&args.targets, args.multi_doc) {
        Ok(docs) => docs,
        Err(message) => return fail(message),
    };

    match fan(opts, source, targets) {
        Ok(outputs) => {
            for (index, output) in outputs.iter().enumerate() {
                if index > 0 {
                    println!("---");
                }
                println!("{}", output.to_json());
            }
            ExitCode::SUCCESS
        }
        Err(report) => fail(report.to_string()),
    }
}

fn run_json(args: InputArgs) -> ExitCode {
    match read_documents(&args.files, args.multi_doc) {
        Ok(documents) => {
            for (index, document) in documents.iter().enumerate() {
                if index > 0 {
                    println!("---");
                }
                println!("{}", document.to_json());
            }
            ExitCode::SUCCESS
        }
        Err(message) => fail(message),
    }
}

fn run_diff(args: DiffArgs) -> ExitCode {
    let documents = match read_documents(&[args.left, args.right], false) {
        Ok(documents) => documents,
        Err(message) => return fail(message),
    };

    let entries = diff::diff(&documents[0], &documents[1]);
    if entries.is_empty() {
        ExitCode::SUCCESS
    } else {
        for entry in &entries {
            println!("{}", entry);
        }
        ExitCode::from(1)
    }
}

fn run_vaultinfo(args: InputArgs) -> ExitCode {
    let documents = match read_documents(&args.files, args.multi_doc) {
        Ok(documents) => documents,
        Err(message) => return fail(message),
    };

    let mut opts = EngineOptions::default();
    opts.redact = true;
    let engine = Engine::new(opts);
    if let Err(report) = engine.run(documents) {
        return fail(report.to_string());
    }

    let mut report = Map::new();
    report.insert(
        "secrets".to_string(),
        Value::Seq(engine.secrets().into_iter().map(Value::String).collect()),
    );
    println!("{}", Value::Map(report).to_json());
    ExitCode::SUCCESS
}

/// Merge and evaluation problems exit 2.
fn fail(message: String) -> ExitCode {
    eprintln!("{}", message.trim_end());
    ExitCode::from(2)
}

fn read_documents(files: &[String], multi_doc: bool) -> Result<Vec<Value>, String> {
    let mut documents = Vec::new();
    for file in files {
        let text = if file == "-" {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("cannot read standard input: {}", err))?;
            buffer
        } else {
            std::fs::read_to_string(file).map_err(|err| format!("cannot read {}: {}", file, err))?
        };

        if multi_doc {
            documents
                .extend(Value::from_json_multi(&text).map_err(|err| format!("{}: {}", file, err))?);
        } else {
            documents.push(Value::from_json(&text).map_err(|err| format!("{}: {}", file, err))?);
        }
    }
    Ok(documents)
}
