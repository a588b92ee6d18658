use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "hearken")]
#[command(about = "hearken - manage scripted event listeners")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses config file value
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/hearken/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Listener database path (overrides config file)
    #[arg(long = "db", global = true)]
    pub db_path: Option<PathBuf>,

    /// Name recorded as author of changes
    #[arg(short = 'u', long, global = true, env = "USER", default_value = "admin")]
    pub user: String,

    /// Set output format
    #[arg(short = 'f', long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List listener definitions
    List {
        /// Include disabled listeners
        #[arg(short, long)]
        all: bool,
    },

    /// Show one listener including its script
    Show { id: i64 },

    /// Register a new listener
    Create(ListenerArgs),

    /// Replace a listener's definition
    Update {
        id: i64,

        #[command(flatten)]
        listener: ListenerArgs,
    },

    /// Delete a listener
    Delete { id: i64 },

    /// Show the change log of a listener
    History { id: i64 },

    /// Fire an event at the active listeners and report outcomes
    Fire {
        /// Event type, matched against listener selectors
        event_type: String,

        /// JSON payload handed to the scripts
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },

    /// Compile a script without registering it
    Check {
        /// Script file, or `-` for stdin
        file: PathBuf,
    },
}

/// Form fields shared by create and update
#[derive(Args, Debug, Clone)]
pub struct ListenerArgs {
    /// Listener name
    #[arg(short, long)]
    pub name: String,

    /// Event type to listen for (repeatable)
    #[arg(short = 's', long = "selector", required = true)]
    pub selectors: Vec<String>,

    /// Script file, or `-` for stdin
    #[arg(long, conflicts_with = "body", required_unless_present = "body")]
    pub script: Option<PathBuf>,

    /// Inline script body
    #[arg(long)]
    pub body: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Store the listener without activating it
    #[arg(long)]
    pub disabled: bool,

    /// Note recorded in the change log
    #[arg(short = 'm', long)]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_parses_repeated_selectors() {
        let cli = Cli::try_parse_from([
            "hearken", "create", "-n", "notify", "-s", "IssueCreated", "-s", "IssueUpdated",
            "--body", "return 1",
        ])
        .unwrap();

        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.selectors, vec!["IssueCreated", "IssueUpdated"]);
                assert_eq!(args.body.as_deref(), Some("return 1"));
                assert!(!args.disabled);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_requires_a_body_source() {
        let err = Cli::try_parse_from(["hearken", "create", "-n", "x", "-s", "E"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_verbose_and_db_are_global() {
        let cli = Cli::try_parse_from(["hearken", "list", "--all", "-v", "--db", "/tmp/x.db"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
    }
}
