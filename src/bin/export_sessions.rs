use anyhow::Result;
use clap::Parser;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;
use tutorbench::cli::CommonArgs;
use tutorbench::projector::{self, ProjectionPolicy};
use tutorbench::segmenter::segment;
use tutorbench::{export, store};

#[derive(Parser, Debug)]
#[command(about = "Export stored sessions as flat CSV rows")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// How transcripts are flattened into rows
    #[arg(long, value_enum, default_value = "pairwise")]
    projection: ProjectionPolicy,

    /// CSV destination
    #[arg(long, default_value = "sessions_export.csv")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

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
        openai_api_key: None,
        openai_api_base: None,
        generation_model: args.common.generation_model,
        session_limit: args.common.session_limit,
        refusal_marker: args.common.refusal_marker,
    });

    let sessions =
        store::fetch_sessions(&state, state.session_limit).await?;
    if sessions.is_empty() {
        println!("No sessions to export.");
        return Ok(());
    }

    let written = match args.projection {
        ProjectionPolicy::Pairwise => {
            let rows: Vec<_> =
                sessions.iter().flat_map(projector::pairwise).collect();
            info!("Projected {} pair rows", rows.len());
            export::write_rows(&rows, &args.output)?
        }
        ProjectionPolicy::AggregateByCategory => {
            let rows: Vec<_> = sessions
                .iter()
                .flat_map(|session| {
                    projector::aggregate_by_category(
                        session,
                        &segment(session),
                    )
                })
                .collect();
            info!("Projected {} category rows", rows.len());
            export::write_rows(&rows, &args.output)?
        }
        ProjectionPolicy::FirstOfCategory => {
            let rows: Vec<_> = sessions
                .iter()
                .flat_map(|session| {
                    projector::first_of_category(&segment(session))
                })
                .collect();
            info!("Projected {} first-exchange rows", rows.len());
            export::write_rows(&rows, &args.output)?
        }
    };

    println!(
        "Exported {} sessions to {}",
        sessions.len(),
        written.display()
    );
    Ok(())
}
