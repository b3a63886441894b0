use anyhow::Result;
use clap::Parser;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;
use tutorbench::cli::CommonArgs;
use tutorbench::dispatcher::DispatchMode;
use tutorbench::pipeline::run_collection;

#[derive(Parser, Debug)]
#[command(about = "Generate and persist System B responses for stored sessions")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// How generation calls are scheduled
    #[arg(long, value_enum, default_value = "sequential")]
    dispatch_mode: DispatchMode,

    /// CSV destination for the review export
    #[arg(long, default_value = "system_b_responses.csv")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let args = Args::parse();

    // Generation needs a credential; fail before touching any session.
    if args.common.openai_api_key.is_none() {
        anyhow::bail!(
            "OPENAI_API_KEY is required to generate System B responses"
        );
    }

    let sessions_path = args
        .common
        .sessions_db
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("sessions_db path is not valid UTF-8"))?
        .to_string();

    info!("Opening sessions database at {}", sessions_path);
    let sessions_manager = SqliteConnectionManager::file(&sessions_path);
    let sessions_pool = Pool::new(sessions_manager)?;

    {
        let mut conn = sessions_pool.get()?;
        tutorbench::init_tutorbench_db(&mut conn)?;
    }

    let state = tutorbench::create_app_state(tutorbench::AppConfig {
        sessions_pool,
        openai_api_key: args.common.openai_api_key,
        openai_api_base: args.common.openai_api_base,
        generation_model: args.common.generation_model,
        session_limit: args.common.session_limit,
        refusal_marker: args.common.refusal_marker,
    });

    let summary =
        run_collection(&state, args.dispatch_mode, &args.output).await?;

    println!("{}", summary);
    Ok(())
}
