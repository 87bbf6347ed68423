mod debug_report;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use footprints::{Attributes, Collector, Context, Options, Value, catalog, util};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "footprints", version, about = "Resolve descriptions against the built-in catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ambient default consulted before declared defaults (repeatable)
    #[arg(long = "default", value_name = "KEY=VALUE", value_parser = parse_pair, global = true)]
    defaults: Vec<(String, String)>,

    /// Force ANSI color output
    #[arg(long, global = true, conflicts_with = "no_color")]
    color: bool,

    /// Disable ANSI color output
    #[arg(long, global = true)]
    no_color: bool,

    /// Fail on a missing mandatory attribute instead of reporting it
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick the best candidate of a collector for a description
    ///
    /// List, `range(a,b,c)` and comma separated values are expanded and each
    /// resulting description is picked in turn.
    Pick {
        /// Collector tag (resource, provider, store)
        tag: String,
        /// Description entries
        #[arg(value_name = "KEY=VALUE", value_parser = parse_pair)]
        attrs: Vec<(String, String)>,
    },
    /// Print how every candidate of a collector declares its attributes
    Map {
        /// Collector tag (resource, provider, store)
        tag: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("FOOTPRINTS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let color = !cli.no_color && (cli.color || io::stdout().is_terminal());

    match run(&cli, color) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when some description found no match; `Err` on bad arguments.
fn run(cli: &Cli, color: bool) -> Result<bool, String> {
    let mut registry = catalog::registry().map_err(|err| format!("catalog: {err}"))?;
    let mut ctx = Context::default();
    if !cli.defaults.is_empty() {
        ctx.defaults.push("cli", to_desc(&cli.defaults));
    }
    let opts = Options::from_env();

    match &cli.command {
        Command::Pick { tag, attrs } => {
            let collector = registry.collector_mut(tag).ok_or_else(|| unknown_tag(tag))?;
            let descs = util::expand(&to_desc(attrs)).map_err(|err| err.to_string())?;
            let mut matched = true;
            for desc in &descs {
                matched &= pick(collector, desc, &ctx, &opts, cli.strict, color);
            }
            Ok(matched)
        }
        Command::Map { tag } => {
            let collector = registry.collector(tag).ok_or_else(|| unknown_tag(tag))?;
            debug_report::print_map(collector, color);
            Ok(true)
        }
    }
}

fn pick(collector: &mut Collector, desc: &Attributes, ctx: &Context, opts: &Options, strict: bool, color: bool) -> bool {
    let (result, report) = collector.pick_best_with_report(desc, ctx, opts);
    let built = result.and_then(|found| {
        found
            .map(|selection| {
                if strict { selection.candidate.instantiate(desc, ctx, opts) } else { selection.instantiate() }
            })
            .transpose()
    });
    if let Ok(Some(instance)) = &built {
        collector.adopt(instance);
    }
    debug_report::print_pick(&report, &built, color);
    matches!(built, Ok(Some(_)))
}

fn to_desc(pairs: &[(String, String)]) -> Attributes {
    pairs.iter().map(|(k, v)| (k.clone(), Value::Str(v.clone()))).collect()
}

fn unknown_tag(tag: &str) -> String {
    format!("unknown collector '{tag}' (expected one of: {})", catalog::TAGS.join(", "))
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("invalid entry '{raw}' (expected KEY=VALUE)")),
    }
}
