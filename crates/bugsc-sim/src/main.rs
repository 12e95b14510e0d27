use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bugsc_build::{assemble, model_to_json};
use bugsc_collect::collect;
use bugsc_core::ast::Program;
use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::BugsError;
use bugsc_core::registry::PrimitiveRegistry;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bugsc-sim", about = "BUGS model compiler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a model body and data environment into a variable/shape/graph artifact.
    Compile(CompileArgs),
}

#[derive(clap::Args, Debug)]
struct CompileArgs {
    /// JSON-encoded model body (a `Program`, i.e. a list of statements).
    #[arg(long)]
    program: PathBuf,
    /// JSON-encoded data environment (identifier -> scalar or array cell).
    #[arg(long)]
    data: PathBuf,
    /// JSON-encoded initialization environment, carried through to `--out` for a
    /// downstream consumer (samplers); the compiler itself does not read it (spec.md
    /// §6: "used only by the consumer").
    #[arg(long)]
    init: Option<PathBuf>,
    /// Where to write the compiled model as JSON.
    #[arg(long)]
    out: PathBuf,
    /// Print the collection report and a short summary to stderr.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Compile(args) => run_compile(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(err.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn run_compile(args: CompileArgs) -> Result<(), Box<dyn Error>> {
    let program: Program = read_json(&args.program)?;
    let data: BTreeMap<String, Cell> = read_json(&args.data)?;
    let init: Option<BTreeMap<String, Cell>> = match &args.init {
        Some(path) => Some(read_json(path)?),
        None => None,
    };

    let env = Env::from_data(data);
    let reg = PrimitiveRegistry::default();

    let model = compile(&program, env, &reg)?;

    let mut artifact = model_to_json(&model)?;
    if let Some(init) = &init {
        if let serde_json::Value::Object(map) = &mut artifact {
            map.insert("init".to_string(), serde_json::to_value(init)?);
        }
    }

    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&args.out, serde_json::to_string_pretty(&artifact)?)?;

    if args.verbose {
        eprintln!(
            "collection: {} scalar(s), {} array element(s), {} loop(s) unrolled, {} variable(s) transformed to data",
            model.report.scalars,
            model.report.array_elements,
            model.report.loops_unrolled,
            model.report.transformed_variables,
        );
        eprintln!(
            "compiled {} variable(s), {} parameter(s)",
            model.topological_order.len(),
            model.parameters.len()
        );
        let parameter_names: Vec<String> = model.parameters.iter().map(|v| v.to_string()).collect();
        eprintln!("parameters: [{}]", parameter_names.join(", "));
    }

    Ok(())
}

/// Runs normalization (A), variable collection/fixpoint (C-E), node-function and
/// graph building, and model assembly (F-H) in sequence.
fn compile(program: &Program, env: Env, reg: &PrimitiveRegistry) -> Result<bugsc_build::Model, BugsError> {
    let normalized = bugsc_eval::normalize(program, &env, reg)?;
    let collected = collect(&normalized, env, reg)?;
    assemble(collected, reg)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn report_failure(err: &(dyn Error + 'static)) {
    if let Some(bugs_err) = err.downcast_ref::<BugsError>() {
        let info = bugs_err.info();
        eprintln!("error[{}]: {}", info.code, info.message);
        for (key, value) in &info.context {
            eprintln!("  {key}: {value}");
        }
        if let Some(hint) = &info.hint {
            eprintln!("  hint: {hint}");
        }
    } else {
        eprintln!("error: {err}");
    }
}
