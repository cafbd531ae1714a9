mod debug_report;

use speechrule::{EngineConfig, Markup, to_speech_verbose};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SPEECHRULE_LOG";

fn main() {
    init_logging();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match to_speech_verbose(&cli.input, &cli.config) {
        Ok(res) => debug_report::print_run(&cli.input, &cli.config, &res, cli.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

struct CliConfig {
    input: String,
    config: EngineConfig,
    color: bool,
}

/// Command-line overrides, applied on top of `--config` (or the defaults).
#[derive(Default)]
struct Overrides {
    locale: Option<String>,
    domain: Option<String>,
    style: Option<String>,
    rules: Option<Vec<String>>,
    markup: Option<Markup>,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut overrides = Overrides::default();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value_for = |name: &str| -> Result<String, String> {
            match inline.clone() {
                Some(value) => Ok(value),
                None => args.next().ok_or_else(|| format!("error: {name} expects a value")),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("speechrule {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--locale" => overrides.locale = Some(value_for("--locale")?),
            "--domain" => overrides.domain = Some(value_for("--domain")?),
            "--style" => overrides.style = Some(value_for("--style")?),
            "--rules" => overrides.rules = Some(parse_list(&value_for("--rules")?)?),
            "--markup" => {
                let value = value_for("--markup")?;
                overrides.markup = Some(value.parse().map_err(|err| format!("error: {err}"))?);
            }
            "--config" => config_path = Some(PathBuf::from(value_for("--config")?)),
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    let config = build_config(config_path, overrides)?;

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { input, config, color })
}

fn build_config(path: Option<PathBuf>, overrides: Overrides) -> Result<EngineConfig, String> {
    let mut config = match path {
        Some(path) => {
            EngineConfig::load(&path).map_err(|err| format!("error: failed to load '{}': {err}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(locale) = overrides.locale {
        config = config.with_locale(locale);
    }
    if let Some(domain) = overrides.domain {
        config = config.with_domain(domain);
    }
    if let Some(style) = overrides.style {
        config = config.with_style(style);
    }
    if let Some(rules) = overrides.rules {
        config = config.with_rule_sets(rules);
    }
    if let Some(markup) = overrides.markup {
        config = config.with_markup(markup);
    }
    config.validate().map_err(|err| format!("error: {err}"))?;
    Ok(config)
}

fn parse_list(value: &str) -> Result<Vec<String>, String> {
    let items: Vec<String> =
        value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect();
    if items.is_empty() {
        return Err("error: --rules expects at least one rule set name".to_string());
    }
    Ok(items)
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    let locales = speechrule::rules::locales().join(", ");
    format!(
        "speechrule {version}

Speak semantic math trees with a trie-indexed rule engine.

Usage:
  speechrule [OPTIONS] [--] <xml...>
  echo '<sqrt>...</sqrt>' | speechrule [OPTIONS]

Options:
  --locale <code>            Rule locale. Bundled: {locales}. Default: en
  --domain <name>            Rule domain (mathspeak, prefix). Default: mathspeak
  --style <name>             Speech style (default, brief, sbrief).
  --rules <a,b>              Only load the named rule sets.
  --markup <kind>            Output markup: none, punctuation, ssml.
  --config <file>            Read settings from a TOML file; options above
                             override it.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {log_env}             Log filter, e.g. speechrule=trace. Default: warn

Exit codes:
  0  Success.
  1  Markup, rule loading or evaluation error.
  2  Invalid arguments, configuration or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        locales = locales,
        log_env = LOG_ENV,
    )
}
