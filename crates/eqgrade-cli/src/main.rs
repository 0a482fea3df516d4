//! eqgrade CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "eqgrade", version, about = "Equation-aware grading of math answers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How `analyze` prints its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a master answer and its student answers
    Store {
        /// JSON payload with questionId, master_answer and student_answers
        #[arg(long)]
        payload: PathBuf,

        /// Storage directory (overrides the config)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade every answer a user submitted for a question
    Analyze {
        /// Question identifier
        question_id: String,

        /// User (student) identifier
        user_id: String,

        /// Save a grading report JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Max students graded concurrently (overrides the config)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Storage directory (overrides the config)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade one student answer file against a master answer file
    Grade {
        /// Master answer text file
        #[arg(long)]
        master: PathBuf,

        /// Student answer text file
        #[arg(long)]
        student: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example answer payload
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eqgrade=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Store {
            payload,
            storage_dir,
            config,
        } => commands::store::execute(payload, storage_dir, config),
        Commands::Analyze {
            question_id,
            user_id,
            output,
            format,
            parallelism,
            storage_dir,
            config,
        } => {
            commands::analyze::execute(commands::analyze::AnalyzeArgs {
                question_id,
                user_id,
                output,
                format,
                parallelism,
                storage_dir,
                config,
            })
            .await
        }
        Commands::Grade {
            master,
            student,
            config,
        } => commands::grade::execute(master, student, config).await,
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
