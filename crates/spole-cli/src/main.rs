mod commands;
mod output;

use clap::{Parser, Subcommand};
use spole_core::parsing::labels::ColumnRange;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "spole",
    version,
    about = "Read transformer design reports into structured winding, core and tank data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a design report (PDF or JSON token stream)
    Extract {
        /// Path to PDF or JSON token stream
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the extraction to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Extra label rule file(s), tried before the built-in rules
        #[arg(short, long = "rules", value_name = "FILE")]
        rules: Vec<PathBuf>,

        /// Fixed winding column x-ranges, e.g. 180-250,260-330 (negative
        /// starts such as -5-60 are accepted)
        #[arg(
            long,
            value_name = "X0-X1",
            value_delimiter = ',',
            allow_hyphen_values = true
        )]
        columns: Vec<ColumnRange>,
    },
    /// Print the assembled text lines of a document (for template debugging)
    Lines {
        /// Path to PDF or JSON token stream
        input_file: PathBuf,

        /// Show cell boundaries
        #[arg(long)]
        cells: bool,
    },
    /// Inspect and validate label rule tables
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List predefined rule tables
    List,
    /// Show every rule of a predefined table
    Show {
        /// Preset name (e.g., "transformer")
        preset: String,
    },
    /// Print the rule file format with an example
    Schema,
    /// Validate a custom rule file
    Validate {
        /// Path to JSON rule file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input_file,
            output,
            out,
            rules,
            columns,
        } => commands::extract::run(input_file, &output, out, rules, columns),
        Commands::Lines { input_file, cells } => commands::lines::run(input_file, cells),
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(),
            RulesAction::Show { preset } => commands::rules::show(&preset),
            RulesAction::Schema => commands::rules::schema(),
            RulesAction::Validate { file } => commands::rules::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
