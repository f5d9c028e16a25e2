//! The `arbor` command line tool.

pub(crate) mod error;
pub(crate) mod log_args;
pub(crate) mod output;

use error::Error;
use log_args::LogArgs;
use output::{build_output_path, print_with_less};
use tracing::{debug, info, Level};

use clap::{Parser, Subcommand};

use arbor_common::utils::io::file::{short_path, write_file};
use arbor_config::{config, ConfigArgs, Configuration};
use arbor_tracing::FileWorkerGuard;
use arbor_core::arbor_structurizer::{structurize, StructurizeResult, StructurizerArgs};

#[derive(Debug, Parser)]
#[clap(name = "arbor", version)]
pub(crate) struct Arguments {
    #[clap(subcommand)]
    pub(crate) sub: Subcommands,

    #[clap(flatten)]
    logs: LogArgs,
}

#[derive(Debug, Subcommand)]
#[clap(about = "arbor rebuilds structured control flow from merge-annotated basic blocks.")]
pub(crate) enum Subcommands {
    #[clap(
        name = "structurize",
        about = "Turn the blocks of a module's functions into structured pseudo code"
    )]
    Structurize(StructurizerArgs),

    #[clap(name = "config", about = "Display and edit the current configuration")]
    Config(ConfigArgs),
}

/// Installs the subscriber. A failure is reported on stderr and the run continues unlogged.
fn init_logging(logs: &LogArgs) -> Option<FileWorkerGuard> {
    match logs.init_tracing() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize tracing: {e}");
            None
        }
    }
}

/// Fills the flags left at their defaults from the configuration.
fn apply_configuration(cmd: &mut StructurizerArgs, configuration: &Configuration) {
    if cmd.guard_prefix.is_empty() {
        cmd.guard_prefix = configuration.guard_prefix.clone();
    }
    if cmd.indent_width.is_none() {
        cmd.indent_width = Some(configuration.indent_width);
    }
    cmd.block_markers |= configuration.emit_block_markers;
}

/// Renders the requested output format, returning the contents and the default file name.
fn render(cmd: &StructurizerArgs, result: &StructurizeResult) -> Result<(String, String), Error> {
    if cmd.dot {
        let graphs = result
            .functions
            .iter()
            .filter_map(|outcome| result.as_dot(&outcome.name))
            .collect::<Vec<_>>();
        return Ok((graphs.join("\n"), "cfg.dot".to_string()));
    }

    if cmd.json {
        return Ok((result.as_json()?, "structured.json".to_string()));
    }

    Ok((result.source(), "structured.wgsl".to_string()))
}

fn main() -> Result<(), Error> {
    let args = Arguments::parse();

    // setup logging. the guard flushes the log file on drop
    let _guard = init_logging(&args.logs);

    let configuration = Configuration::load()
        .map_err(|e| Error::Generic(format!("failed to load configuration: {}", e)))?;
    match args.sub {
        Subcommands::Structurize(mut cmd) => {
            apply_configuration(&mut cmd, &configuration);

            let result = structurize(cmd.clone())?;
            let (contents, mut filename) = render(&cmd, &result)?;

            // if the user has passed an output filename, override the default filename
            if !cmd.name.is_empty() {
                filename = format!("{}-{}", cmd.name, filename);
            }

            if args.logs.verbosity.level() >= Level::DEBUG {
                for (name, e) in result.failures() {
                    debug!("'{}' failed with {}: {}", name, e.category(), e);
                }
            }

            if cmd.output == "print" {
                print_with_less(&contents)
                    .map_err(|e| Error::Generic(format!("failed to print output: {}", e)))?;
            } else {
                let output_path = build_output_path(&cmd.output, &cmd.target, &filename)
                    .map_err(|e| Error::Generic(format!("failed to build output path: {}", e)))?;

                write_file(&output_path, &contents)
                    .map_err(|e| Error::Generic(format!("failed to write output: {}", e)))?;
                info!("wrote output to '{}'", short_path(&output_path));
            }

            let failed = result.failures().count();
            if failed > 0 {
                return Err(Error::Generic(format!(
                    "{} of {} function(s) could not be structured",
                    failed,
                    result.functions.len()
                )));
            }
        }

        Subcommands::Config(cmd) => {
            config(cmd)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_fills_defaults() {
        let mut cmd = Arguments::parse_from(["arbor", "structurize", "module.json"]);
        let Subcommands::Structurize(ref mut args) = cmd.sub else {
            panic!("expected the structurize subcommand");
        };

        let configuration = Configuration {
            guard_prefix: "flow_".to_string(),
            indent_width: 2,
            emit_block_markers: true,
        };
        apply_configuration(args, &configuration);

        assert_eq!(args.guard_prefix, "flow_");
        assert_eq!(args.indent_width, Some(2));
        assert!(args.block_markers);
    }

    #[test]
    fn test_invalid_log_filter_falls_back_to_no_logging() {
        let args = Arguments::parse_from([
            "arbor",
            "--log.stdout.filter",
            "arbor=loud",
            "structurize",
            "module.json",
        ]);

        assert!(args.logs.init_tracing().is_err());
        assert!(init_logging(&args.logs).is_none());
    }

    #[test]
    fn test_flags_override_configuration() {
        let mut cmd = Arguments::parse_from([
            "arbor",
            "structurize",
            "module.json",
            "--guard-prefix",
            "g_",
            "--indent",
            "8",
        ]);
        let Subcommands::Structurize(ref mut args) = cmd.sub else {
            panic!("expected the structurize subcommand");
        };

        apply_configuration(args, &Configuration::default());

        assert_eq!(args.guard_prefix, "g_");
        assert_eq!(args.indent_width, Some(8));
        assert!(!args.block_markers);
    }
}
