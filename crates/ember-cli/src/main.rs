//! Ember tree CLI
//!
//! Builds directory and command requests for a dotted element path and
//! decodes framed messages into a readable tree dump.

mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ember_tree::{
    CommandCode, ContentRegistry, ElementId, ElementTree, FieldFlags, RelativeOid, RootElement,
    Tag,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{EmberConfig, LoggingConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "ember")]
#[command(version = "0.1.0")]
#[command(about = "Ember+ control tree requests and message inspection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "ember.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a GetDirectory request for an element path
    Dir {
        /// Dotted element path, e.g. 1.2.5
        path: String,

        /// Address the element by its absolute path
        #[arg(long)]
        qualified: bool,

        /// Field flags label (overrides the configuration)
        #[arg(long)]
        field_flags: Option<String>,

        /// Output format (overrides the configuration)
        #[arg(short, long, value_enum)]
        output: Option<OutputArg>,
    },

    /// Build a request carrying any command for an element path
    Command {
        /// Dotted element path
        path: String,

        /// Command code
        #[arg(long, value_enum)]
        code: CodeArg,

        /// Address the element by its absolute path
        #[arg(long)]
        qualified: bool,

        /// Field flags label (defaults to the command's own default)
        #[arg(long)]
        field_flags: Option<String>,

        /// Output format (overrides the configuration)
        #[arg(short, long, value_enum)]
        output: Option<OutputArg>,
    },

    /// Decode a hex-encoded message and print its elements
    Decode {
        /// Message bytes as hex (whitespace ignored)
        hex: String,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum CodeArg {
    Subscribe,
    Unsubscribe,
    #[value(name = "getdirectory")]
    GetDirectory,
    Invoke,
}

impl From<CodeArg> for CommandCode {
    fn from(code: CodeArg) -> Self {
        match code {
            CodeArg::Subscribe => CommandCode::Subscribe,
            CodeArg::Unsubscribe => CommandCode::Unsubscribe,
            CodeArg::GetDirectory => CommandCode::GetDirectory,
            CodeArg::Invoke => CommandCode::Invoke,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputArg {
    Hex,
    Tree,
}

impl From<OutputArg> for OutputFormat {
    fn from(output: OutputArg) -> Self {
        match output {
            OutputArg::Hex => OutputFormat::Hex,
            OutputArg::Tree => OutputFormat::Tree,
        }
    }
}

/// `--verbose` wins over `RUST_LOG`, which wins over the configured level
fn log_filter(verbose: bool, logging: &LoggingConfig) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    }
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(log_filter(verbose, logging));
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// A resident tree holding only the chain of stand-ins down to `path`
fn resident_for(path: &RelativeOid, tag: Tag) -> anyhow::Result<(ElementTree, ElementId)> {
    let mut tree = ElementTree::new().with_span(tracing::info_span!("resident", %path));
    let mut numbers = path.iter();
    let first = numbers.next().context("element path is empty")?;

    let mut current = tree.create(tag, i32::try_from(first)?, None);
    tree.add_root(current)?;
    for number in numbers {
        let child = tree.create(tag, i32::try_from(number)?, None);
        tree.add_child(current, child)?;
        current = child;
    }
    Ok((tree, current))
}

struct Request {
    path: String,
    code: CommandCode,
    qualified: bool,
    field_flags: Option<String>,
    output: Option<OutputArg>,
}

fn build_request(config: &EmberConfig, request: Request) -> anyhow::Result<()> {
    let path: RelativeOid = request
        .path
        .parse()
        .with_context(|| format!("invalid element path '{}'", request.path))?;
    let field_flags = match request.field_flags {
        Some(label) => FieldFlags::from_label(&label)
            .with_context(|| format!("unknown field flags '{}'", label))?,
        None if request.code == CommandCode::GetDirectory => config.request.field_flags()?,
        None => request.code.default_field_flags(),
    };

    let (mut tree, target) = resident_for(&path, config.request.tag())?;
    let message = if request.qualified || config.request.qualified {
        tree.qualified_command_msg(target, request.code, field_flags, None)?
    } else {
        tree.command_msg(target, request.code, field_flags, None)?
    };
    tracing::info!(%path, code = %request.code, %field_flags, "built request");

    let output = request.output.map(OutputFormat::from).unwrap_or(config.output.format);
    match output {
        OutputFormat::Hex => println!("{}", hex::encode(message.encode()?)),
        OutputFormat::Tree => {
            for id in message.elements() {
                print!("{}", message.tree().display(*id));
            }
        }
    }
    Ok(())
}

fn decode_message(input: &str) -> anyhow::Result<()> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&compact).context("message is not valid hex")?;
    let message = RootElement::decode(&bytes, &ContentRegistry::default())?;

    tracing::info!(
        bytes = bytes.len(),
        elements = message.elements().len(),
        "decoded message"
    );
    for id in message.elements() {
        print!("{}", message.tree().display(*id));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EmberConfig::load(&cli.config)?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Dir {
            path,
            qualified,
            field_flags,
            output,
        } => build_request(
            &config,
            Request {
                path,
                code: CommandCode::GetDirectory,
                qualified,
                field_flags,
                output,
            },
        )?,

        Commands::Command {
            path,
            code,
            qualified,
            field_flags,
            output,
        } => build_request(
            &config,
            Request {
                path,
                code: code.into(),
                qualified,
                field_flags,
                output,
            },
        )?,

        Commands::Decode { hex } => decode_message(&hex)?,

        Commands::Config => print!("{}", config.to_toml()?),

        Commands::Version => {
            println!("ember v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Protocol:");
            println!("  - Element tree with one-level directory encoding");
            println!("  - GetDirectory / Subscribe / Unsubscribe / Invoke commands");
            println!("  - Matrix targets, sources and connections");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_tree::tags;

    #[test]
    fn test_resident_for_builds_chain() {
        let path: RelativeOid = "1.2.5".parse().unwrap();
        let (tree, target) = resident_for(&path, tags::NODE).unwrap();
        assert_eq!(tree.path(target).unwrap(), path);
        assert_eq!(tree.find(&path), Some(target));
        assert_eq!(tree.depth(target).unwrap(), 2);
    }

    #[test]
    fn test_resident_for_rejects_empty_path() {
        assert!(resident_for(&RelativeOid::new(), tags::NODE).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_hex() {
        assert!(decode_message("zz").is_err());
        assert!(decode_message("60 02 6b 00").is_ok());
    }

    #[test]
    fn test_cli_parses_command() {
        let cli = Cli::try_parse_from(["ember", "command", "1.2", "--code", "getdirectory"]).unwrap();
        match cli.command {
            Commands::Command { code, .. } => {
                assert_eq!(CommandCode::from(code), CommandCode::GetDirectory)
            }
            _ => panic!("expected command subcommand"),
        }
    }

    #[test]
    fn test_verbose_overrides_rust_log() {
        std::env::set_var("RUST_LOG", "warn");
        let logging = LoggingConfig::default();
        assert_eq!(log_filter(true, &logging).to_string(), "debug");
        assert_eq!(log_filter(false, &logging).to_string(), "warn");
        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter(false, &logging).to_string(), "info");
    }
}
