//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use quarry_remote::LifecycleStrategy;

/// Quarry - index schema emission, validation, and lifecycle
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about, long_about = None)]
pub struct Cli {
    /// Backend settings file (TOML); defaults apply when omitted
    #[arg(short, long, global = true, env = "QUARRY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the mapping emitted for a schema
    Emit {
        #[command(flatten)]
        target: IndexArgs,

        /// Print the whole index creation request instead of the mapping
        #[arg(long)]
        create_request: bool,
    },

    /// Validate the existing index against a schema
    Validate {
        #[command(flatten)]
        target: IndexArgs,
    },

    /// Run the start half of the lifecycle strategy
    Start {
        #[command(flatten)]
        target: IndexArgs,

        /// Override the configured lifecycle strategy
        #[arg(long)]
        strategy: Option<LifecycleStrategy>,

        /// Run against an empty in-memory cluster and print the requests
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the stop half of the lifecycle strategy
    Stop {
        #[command(flatten)]
        target: IndexArgs,

        /// Override the configured lifecycle strategy
        #[arg(long)]
        strategy: Option<LifecycleStrategy>,
    },
}

/// The schema and names of one index.
#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Schema description file (TOML or JSON)
    #[arg(long)]
    pub schema: PathBuf,

    /// Index base name; defaults to the schema file name
    #[arg(long)]
    pub index: Option<String>,

    /// Mapped entity type name; defaults to the index base name
    #[arg(long)]
    pub type_name: Option<String>,
}

impl IndexArgs {
    /// The index base name.
    pub fn base(&self) -> String {
        self.index.clone().unwrap_or_else(|| {
            self.schema
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "index".to_string())
        })
    }

    /// The mapped type name.
    pub fn type_name(&self) -> String {
        self.type_name.clone().unwrap_or_else(|| self.base())
    }
}

impl Cli {
    /// The log filter implied by `-v`.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_arguments() {
        let cli = Cli::try_parse_from(["quarry", "emit", "--schema", "schemas/books.toml"]).unwrap();
        let Command::Emit {
            target,
            create_request,
        } = cli.command
        else {
            panic!("expected emit");
        };
        assert!(!create_request);
        assert_eq!(target.base(), "books");
        assert_eq!(target.type_name(), "books");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quarry",
            "start",
            "--schema",
            "books.toml",
            "--index",
            "library",
            "--type-name",
            "Book",
            "--strategy",
            "drop-and-create",
            "-vv",
            "--settings",
            "quarry.toml",
        ])
        .unwrap();
        assert_eq!(cli.log_filter(), "trace");
        assert_eq!(cli.settings, Some(PathBuf::from("quarry.toml")));
        let Command::Start {
            target, strategy, ..
        } = cli.command
        else {
            panic!("expected start");
        };
        assert_eq!(strategy, Some(LifecycleStrategy::DropAndCreate));
        assert_eq!(target.base(), "library");
        assert_eq!(target.type_name(), "Book");
    }

    #[test]
    fn test_invalid_strategy() {
        let err = Cli::try_parse_from([
            "quarry",
            "stop",
            "--schema",
            "books.toml",
            "--strategy",
            "sometimes",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_schema_is_required() {
        assert!(Cli::try_parse_from(["quarry", "validate"]).is_err());
    }
}
