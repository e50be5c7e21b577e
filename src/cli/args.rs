//! Defines the command-line arguments and subcommands for the BPMN-Lite CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Direction;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "bpmn-lite",
    version,
    about = "Compiles BPMN-Lite process notation into process graphs and Mermaid flowcharts."
)]
pub struct BplArgs {
    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a document and print its Mermaid flowchart.
    Render {
        /// The BPMN-Lite file to render, or `-` for standard input.
        #[arg(required = true)]
        file: PathBuf,
        /// Write the diagram to this file instead of standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Flowchart direction: TD, LR, BT or RL.
        #[arg(long)]
        direction: Option<Direction>,
        /// Leave out class definitions and lane styles.
        #[arg(long)]
        no_styles: bool,
        /// YAML file with compiler options.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the parse result (lanes, elements, connections, diagnostics) as JSON.
    Ast {
        /// The BPMN-Lite file to parse, or `-` for standard input.
        #[arg(required = true)]
        file: PathBuf,
        /// Print JSON on a single line.
        #[arg(long)]
        compact: bool,
        /// YAML file with compiler options.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check every `.bpl` file under a path and report diagnostics.
    Check {
        /// A file or a directory to search for `.bpl` files.
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Fail when any warning is reported.
        #[arg(long)]
        deny_warnings: bool,
        /// YAML file with compiler options.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_arguments() {
        let args = BplArgs::try_parse_from([
            "bpmn-lite",
            "-vv",
            "render",
            "order.bpl",
            "--direction",
            "lr",
            "--no-styles",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        let Command::Render {
            file,
            direction,
            no_styles,
            output,
            ..
        } = args.command
        else {
            panic!("expected render");
        };
        assert_eq!(file, PathBuf::from("order.bpl"));
        assert_eq!(direction, Some(Direction::LR));
        assert!(no_styles);
        assert!(output.is_none());
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        assert!(BplArgs::try_parse_from(["bpmn-lite", "render", "a.bpl", "--direction", "up"]).is_err());
    }

    #[test]
    fn test_check_defaults_to_current_directory() {
        let args = BplArgs::try_parse_from(["bpmn-lite", "check"]).unwrap();
        let Command::Check { path, deny_warnings, .. } = args.command else {
            panic!("expected check");
        };
        assert_eq!(path, PathBuf::from("."));
        assert!(!deny_warnings);
    }
}
