//! Pulse: feedback analytics service
//!
//! Main binary with subcommands:
//! - `serve`: HTTP API, live WebSocket feed and insight generation
//! - `seed`: Populate a database with a synthetic demo dataset

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod seed;
mod serve;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Feedback analytics service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Address to listen on
        #[arg(long, env = "PULSE_LISTEN", default_value = "0.0.0.0:8000")]
        listen: String,

        /// SQLite database path, or `:memory:` for a non-persistent store
        #[arg(long, env = "PULSE_DB", default_value = "pulse.db")]
        db: String,

        /// Directory of static dashboard files, served under /ui
        #[arg(long, env = "PULSE_STATIC_DIR")]
        static_dir: Option<String>,

        /// Number of latest reviews included in each snapshot
        #[arg(long, env = "PULSE_RECENT_LIMIT", default_value = "5")]
        recent_limit: usize,

        /// API key for the chat-completion oracle; heuristic insights only when absent
        #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
        groq_api_key: Option<String>,

        /// Model requested from the oracle
        #[arg(long, env = "GROQ_MODEL", default_value = pulse_oracle::DEFAULT_MODEL)]
        groq_model: String,

        /// OpenAI-compatible API root
        #[arg(long, env = "GROQ_BASE_URL", default_value = pulse_oracle::DEFAULT_BASE_URL)]
        groq_base_url: String,

        /// Oracle request timeout in seconds
        #[arg(long, env = "GROQ_TIMEOUT_SECS", default_value = "30")]
        groq_timeout_secs: u64,
    },

    /// Insert the synthetic demo dataset
    Seed {
        /// SQLite database path
        #[arg(long, env = "PULSE_DB", default_value = "pulse.db")]
        db: String,

        /// Delete existing reviews first
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "pulse=info,pulse_analytics=info,pulse_web=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            db,
            static_dir,
            recent_limit,
            groq_api_key,
            groq_model,
            groq_base_url,
            groq_timeout_secs,
        } => {
            serve::run(serve::ServeOptions {
                listen,
                db,
                static_dir,
                recent_limit,
                groq_api_key,
                groq_model,
                groq_base_url,
                groq_timeout_secs,
            })
            .await
        }

        Commands::Seed { db, reset } => seed::run(&db, reset).await,
    }
}
