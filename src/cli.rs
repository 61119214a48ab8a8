use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::guard::DangerAction;

/// Schema Guard - safety gate for generated SQL
#[derive(Parser, Debug)]
#[command(name = "schema-guard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short = 'f', long = "format", global = true, value_enum, default_value = "text")]
    pub output_format: Format,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report destructive statement keywords
    Classify {
        #[command(flatten)]
        input: SqlInput
    },

    /// Show the alias map and dotted references of a statement
    Extract {
        #[command(flatten)]
        input: SqlInput
    },

    /// Check dotted references against a schema
    Validate {
        /// Schema file (snapshot JSON, `{"tables": ...}` or DDL)
        #[arg(short, long)]
        schema: PathBuf,

        /// Dialect for DDL schema files
        #[arg(long)]
        dialect: Option<String>,

        #[command(flatten)]
        input: SqlInput
    },

    /// Classify and validate every statement of a script
    Check {
        /// Schema file to validate references against
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Dialect for DDL schema files
        #[arg(long)]
        dialect: Option<String>,

        /// What to do with destructive statements
        #[arg(long, value_enum)]
        danger_action: Option<DangerAction>,

        /// Warn instead of block on unknown references
        #[arg(long)]
        allow_unknown: bool,

        #[command(flatten)]
        input: SqlInput
    },

    /// Generate SQL from a natural-language request and check it
    Generate {
        /// Natural-language request
        #[arg(short, long)]
        request: String,

        /// Schema file handed to the model and used for validation
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// SQL dialect named in the prompt
        #[arg(long, default_value = "postgres")]
        dialect: String,

        /// LLM provider to use
        #[arg(short, long, value_enum)]
        provider: Option<Provider>,

        /// API key for OpenAI or Anthropic
        #[arg(short, long, env = "LLM_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Ollama base URL
        #[arg(long)]
        ollama_url: Option<String>,

        /// What to do with destructive statements
        #[arg(long, value_enum)]
        danger_action: Option<DangerAction>,

        /// Show what would be sent to LLM without making API call
        #[arg(long)]
        dry_run: bool
    },

    /// Compare two schema files
    Diff {
        /// Old schema file
        old: PathBuf,
        /// New schema file
        new: PathBuf
    },

    /// Print the content fingerprint of a schema file
    Fingerprint {
        /// Schema file
        file: PathBuf
    },

    /// Manage stored schema snapshots
    Snapshot {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Snapshot store directory
        #[arg(long, env = "SCHEMA_GUARD_STORE")]
        store: Option<PathBuf>,

        #[command(subcommand)]
        action: SnapshotCommand
    },

    /// Read a schema from a PostgreSQL catalog
    Introspect {
        /// Connection URL
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        db_url: String,

        /// Schema to read
        #[arg(long)]
        schema: Option<String>,

        /// Maximum number of tables (1-2000)
        #[arg(long)]
        max_tables: Option<u32>,

        /// Continue when the role can read user data
        #[arg(long)]
        allow_data_access: bool,

        /// Save the result as a snapshot with this name
        #[arg(long, requires = "owner_source")]
        save_as: Option<String>,

        #[command(flatten)]
        owner: OwnerArgs,

        /// Snapshot store directory
        #[arg(long, env = "SCHEMA_GUARD_STORE")]
        store: Option<PathBuf>
    }
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List snapshots, newest first
    List,
    /// Save a schema file as a snapshot
    Save {
        name:    String,
        #[arg(short, long)]
        schema:  PathBuf,
        #[arg(long, default_value = "postgres")]
        dialect: String
    },
    /// Print a stored snapshot
    Get { name: String },
    /// Delete a snapshot
    Delete { name: String },
    /// Compare a snapshot with a schema file
    Diff {
        name:   String,
        #[arg(short, long)]
        schema: PathBuf
    },
    /// Replace a snapshot's tables unless nothing changed
    Update {
        name:   String,
        #[arg(short, long)]
        schema: PathBuf
    }
}

/// SQL text given inline or as a file
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SqlInput {
    /// SQL text
    #[arg(long)]
    pub sql:  Option<String>,

    /// SQL file (use - for stdin)
    #[arg(long)]
    pub file: Option<PathBuf>
}

/// Owner namespace given directly or as a bearer token
#[derive(Args, Debug, Clone)]
#[group(id = "owner_source", multiple = false)]
pub struct OwnerArgs {
    /// Owner id
    #[arg(long)]
    pub owner: Option<String>,

    /// JWT whose `sub` claim is the owner id
    #[arg(long, env = "SCHEMA_GUARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Get default model for provider
    pub fn default_model(&self) -> &str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    /// Provider named in configuration
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name.trim(), true).ok()
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}
