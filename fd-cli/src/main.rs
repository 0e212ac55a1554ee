use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use engine::{
    DEFAULT_MAX_DEPTH, DerivationSnapshot, DeriveOptions, Deriver, JsonElementResolver,
    StandardProvider, init_logging,
};
use serde_json::Value;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_cli_args(&args) {
        Ok(CliAction::Run(cli)) => cli,
        Ok(CliAction::Help) => {
            print_cli_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("{}", binary_version_text());
            return Ok(());
        }
        Err(err) => {
            eprintln!("error: {err}\n");
            print_cli_help();
            return Err(err.into());
        }
    };

    init_logging()?;
    info!("{}", binary_version_text());

    let raw_form = read_json(&cli.form)?;
    let root = JsonElementResolver::new().resolve_form(&raw_form)?;
    let inputs = match &cli.input {
        Some(path) => read_inputs(path)?,
        None => HashMap::new(),
    };
    info!(
        "deriving form {} with {} submitted values",
        cli.form.display(),
        inputs.len()
    );

    let options = DeriveOptions {
        skip_validation: cli.skip_validation,
        max_depth: cli.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
    };
    let state = Deriver::new(StandardProvider::new()).derive_with(&root, inputs, options)?;
    let snapshot = DerivationSnapshot::from_state(&state);

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    match &cli.output {
        Some(path) => {
            fs::write(path, format!("{rendered}\n"))?;
            info!("wrote snapshot to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq)]
struct CliArgs {
    form: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    skip_validation: bool,
    max_depth: Option<usize>,
    pretty: bool,
}

#[derive(Debug, PartialEq)]
enum CliAction {
    Run(CliArgs),
    Help,
    Version,
}

fn parse_cli_args(args: &[String]) -> Result<CliAction, String> {
    let mut args = args.iter().cloned().peekable();
    let mut cli = CliArgs::default();
    let mut form = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--form" => {
                form = Some(PathBuf::from(next_arg_value("--form", &mut args)?));
            }
            "--input" => {
                cli.input = Some(PathBuf::from(next_arg_value("--input", &mut args)?));
            }
            "--output" => {
                cli.output = Some(PathBuf::from(next_arg_value("--output", &mut args)?));
            }
            "--skip-validation" => cli.skip_validation = true,
            "--pretty" => cli.pretty = true,
            "--max-depth" => {
                let value = next_arg_value("--max-depth", &mut args)?;
                let depth = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --max-depth: {value}"))?;
                if depth == 0 {
                    return Err("--max-depth must be at least 1".to_string());
                }
                cli.max_depth = Some(depth);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    cli.form = form.ok_or_else(|| "missing required --form <PATH>".to_string())?;
    Ok(CliAction::Run(cli))
}

fn next_arg_value(
    flag: &str,
    args: &mut std::iter::Peekable<impl Iterator<Item = String>>,
) -> Result<String, String> {
    let value = args
        .next()
        .ok_or_else(|| format!("missing value for {flag}"))?;
    if value.trim().is_empty() {
        return Err(format!("value for {flag} cannot be empty"));
    }
    Ok(value)
}

fn print_cli_help() {
    eprintln!(concat!(
        "Usage: fd-derive --form <PATH> [options]\n\n",
        "Options:\n",
        "  --form <PATH>        Form definition (JSON, rooted at a root element)\n",
        "  --input <PATH>       Submitted values as a JSON object keyed by resolved id\n",
        "  --output <PATH>      Write the snapshot to a file instead of stdout\n",
        "  --skip-validation    Do not run the error phase\n",
        "  --max-depth <N>      Maximum element nesting depth (default: 64)\n",
        "  --pretty             Pretty-print the snapshot\n",
        "  -V, --version        Show version\n",
        "  -h, --help           Show this help\n",
        "\n",
        "Logging is controlled through RUST_LOG (default: info).\n"
    ));
}

fn binary_version_text() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let value = serde_json::from_str(&text)
        .map_err(|err| format!("{} is not valid JSON: {err}", path.display()))?;
    Ok(value)
}

fn read_inputs(path: &Path) -> Result<HashMap<String, Value>, Box<dyn std::error::Error>> {
    match read_json(path)? {
        Value::Object(values) => Ok(values.into_iter().collect()),
        _ => Err(format!("{} must contain a JSON object", path.display()).into()),
    }
}
