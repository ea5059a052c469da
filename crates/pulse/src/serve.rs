//! `pulse serve`: wire the store, oracle and analytics into the web server.

use std::sync::Arc;
use std::time::Duration;

use miette::{IntoDiagnostic, Result, miette};
use tracing::{info, warn};

use pulse_analytics::{
    Analytics, AnalyticsConfig, HeuristicOracle, InsightOracle, MemoryStore, RecordStore,
    RecordWriter, ReviewSummarizer,
};
use pulse_oracle::{ChatCompletionOracle, OracleConfig};
use pulse_store::SqliteStore;
use pulse_web::{AppState, create_router};

/// Database path that selects the in-memory store.
pub(crate) const MEMORY_DB: &str = ":memory:";

pub(crate) struct ServeOptions {
    pub listen: String,
    pub db: String,
    pub static_dir: Option<String>,
    pub recent_limit: usize,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub groq_timeout_secs: u64,
}

type Stores = (Arc<dyn RecordStore>, Arc<dyn RecordWriter>);

fn open_store(db: &str) -> Result<Stores> {
    if db == MEMORY_DB {
        info!("using in-memory review store; data is lost on exit");
        let store = Arc::new(MemoryStore::new());
        let reader: Arc<dyn RecordStore> = store.clone();
        let writer: Arc<dyn RecordWriter> = store;
        return Ok((reader, writer));
    }

    let store = Arc::new(
        SqliteStore::open(db).map_err(|e| miette!("failed to open database {}: {}", db, e))?,
    );
    let reader: Arc<dyn RecordStore> = store.clone();
    let writer: Arc<dyn RecordWriter> = store;
    Ok((reader, writer))
}

/// Insight oracle and review summarizer; one chat client serves both.
struct Oracles {
    insights: Arc<dyn InsightOracle>,
    reviews: Arc<dyn ReviewSummarizer>,
}

fn build_oracle(options: &ServeOptions) -> Result<Oracles> {
    let api_key = options
        .groq_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let Some(api_key) = api_key else {
        info!("no oracle API key configured, using heuristic insights and summaries");
        return Ok(Oracles {
            insights: Arc::new(HeuristicOracle),
            reviews: Arc::new(HeuristicOracle),
        });
    };

    let config = OracleConfig::new(api_key)
        .with_model(&options.groq_model)
        .with_base_url(&options.groq_base_url)
        .with_timeout(Duration::from_secs(options.groq_timeout_secs));
    let oracle = Arc::new(ChatCompletionOracle::new(config).map_err(|e| miette!("{}", e))?);
    info!(model = %oracle.model(), "chat-completion oracle enabled");
    let insights: Arc<dyn InsightOracle> = oracle.clone();
    let reviews: Arc<dyn ReviewSummarizer> = oracle;
    Ok(Oracles { insights, reviews })
}

pub(crate) async fn run(options: ServeOptions) -> Result<()> {
    let (store, writer) = open_store(&options.db)?;
    let oracles = build_oracle(&options)?;

    let config = AnalyticsConfig {
        recent_limit: options.recent_limit,
        ..AnalyticsConfig::default()
    };
    let analytics = Analytics::new(Arc::clone(&store), oracles.insights, config);

    let router = create_router(
        AppState::new(analytics, store, writer).with_summarizer(oracles.reviews),
        options.static_dir.as_deref(),
    );
    let listener = tokio::net::TcpListener::bind(&options.listen)
        .await
        .into_diagnostic()?;

    info!(listen = %options.listen, db = %options.db, "pulse started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    info!("pulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
