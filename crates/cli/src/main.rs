use anyhow::Context;
use clap::Parser;
use montres_core::domain::preferences::UserPreferences;
use montres_core::llm::gemini::GeminiClient;
use montres_core::llm::prompt::render_instruction;
use montres_core::llm::{LlmClient, Provider};
use montres_core::domain::recommendation::Recommendation;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod input;
mod render;
mod session;

#[derive(Debug, Parser)]
#[command(name = "montres_cli")]
struct Args {
    /// JSON file with the answers (same shape the front-end posts). Skips the
    /// interactive wizard.
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Print the instruction that would be sent instead of calling the service.
    #[arg(long)]
    dry_run: bool,

    /// Print the recommendation as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = montres_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let Some(path) = args.preferences.as_deref() else {
        let client: Arc<dyn LlmClient> = if args.dry_run {
            Arc::new(DryRun)
        } else {
            Arc::new(GeminiClient::from_settings(&settings)?)
        };
        return session::run_interactive(client, args.dry_run).await;
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let preferences: UserPreferences = serde_json::from_str(&raw)
        .with_context(|| format!("invalid preferences in {}", path.display()))?;

    if args.dry_run {
        tracing::info!(dry_run = true, path = %path.display(), "rendering instruction only");
        println!("{}", render_instruction(&preferences));
        return Ok(());
    }

    let client = GeminiClient::from_settings(&settings)?;
    let recommendation = match client.fetch_recommendations(&preferences).await {
        Ok(rec) => rec,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "recommendation request failed");
            return Err(err);
        }
    };

    print_recommendation(&recommendation, args.json)
}

fn print_recommendation(rec: &Recommendation, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rec)?);
    } else {
        print!("{}", render::recommendation(rec));
    }
    Ok(())
}

/// Stands in for the service when only the instruction is wanted.
struct DryRun;

#[async_trait::async_trait]
impl LlmClient for DryRun {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn fetch_recommendations(
        &self,
        _preferences: &UserPreferences,
    ) -> anyhow::Result<Recommendation> {
        anyhow::bail!("dry run: no request sent")
    }
}

fn init_sentry(settings: &montres_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
