use std::path::Path;

use arbor_common::utils::io::file::read_file;
use clap::Parser;
use derive_builder::Builder;
use eyre::{eyre, Result};

use crate::interfaces::Module;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Rebuilds structured control flow from merge-annotated basic blocks",
    after_help = "The target is a JSON module: { \"functions\": [{ \"name\": ..., \"blocks\": [...] }] }",
    override_usage = "arbor structurize <TARGET> [OPTIONS]"
)]
/// Arguments for the structurize operation
///
/// The target module is read from a file, or parsed directly when the target is inline JSON.
pub struct StructurizerArgs {
    /// The target to structurize, either a path to a JSON module or the JSON itself.
    #[clap(required = true)]
    pub target: String,

    /// Only structurize the function with this name.
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub function: String,

    /// The output directory to write the output to or 'print' to print to the console
    #[clap(long = "output", short = 'o', default_value = "output", hide_default_value = true)]
    pub output: String,

    /// The name for the output file
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub name: String,

    /// The prefix of synthesized guard variables. Falls back to the configured prefix.
    #[clap(long = "guard-prefix", default_value = "", hide_default_value = true)]
    pub guard_prefix: String,

    /// The number of spaces per indentation level. Falls back to the configured width.
    #[clap(long = "indent")]
    pub indent_width: Option<usize>,

    /// Whether to mark the start of every basic block in the output.
    #[clap(long = "block-markers")]
    pub block_markers: bool,

    /// Whether to output the classified control flow graph in DOT format instead.
    #[clap(long)]
    pub dot: bool,

    /// Whether to output the statement trees as JSON instead.
    #[clap(long)]
    pub json: bool,
}

impl StructurizerArgs {
    /// Loads the target module. An existing path is read from disk; anything else is parsed as
    /// inline JSON.
    pub fn get_module(&self) -> Result<Module> {
        let contents = if Path::new(&self.target).is_file() {
            read_file(&self.target)?
        } else if self.target.trim_start().starts_with('{') {
            self.target.clone()
        } else {
            return Err(eyre!("target '{}' is neither a file nor an inline JSON module", self.target));
        };

        Module::from_json(&contents).map_err(|e| eyre!("{e}"))
    }
}

impl StructurizerArgsBuilder {
    /// Creates a new StructurizerArgsBuilder with default values
    pub fn new() -> Self {
        Self {
            target: Some(String::new()),
            function: Some(String::new()),
            output: Some(String::from("output")),
            name: Some(String::new()),
            guard_prefix: Some(String::new()),
            indent_width: Some(None),
            block_markers: Some(false),
            dot: Some(false),
            json: Some(false),
        }
    }
}
