use schema_automap::{
    engine::create_pool,
    logging,
    mapping::AutoMap,
    model_graph::ModelGraph,
    notify::RefreshNotifier,
    routes::{router, AppState},
    settings::Settings,
    Result,
};
use std::path::Path;
use std::sync::Arc;
use std::{env, process};

const USAGE: &str = "usage: schema-automap [serve|notify] [config.toml]";

#[tokio::main]
async fn main() {
    let arguments: Vec<String> = env::args().collect();

    let command = arguments.get(1).map(String::as_str).unwrap_or("serve");
    let config = arguments.get(2).map(Path::new);

    let settings = match Settings::load(config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load settings: {e}");
            process::exit(2);
        }
    };

    logging::init(&settings.log_level);

    let outcome = match command {
        "serve" => serve(settings).await,
        "notify" => {
            notify(&settings);
            Ok(())
        }
        _ => {
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "exiting");
        process::exit(1);
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let graph = Arc::new(ModelGraph::load(&settings.models_path)?);
    let pool = create_pool(&settings.database).await?;
    let automap = Arc::new(AutoMap::new(pool, graph, settings.migrations_table.clone()));

    // migrations may not have run yet; the notifier or the endpoint refreshes later
    if let Err(e) = automap.refresh(false).await {
        tracing::warn!(error = %e, "startup mapping refresh failed");
    }

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, prefix = %settings.api_prefix, "listening");

    let app = router(AppState {
        automap,
        settings: Arc::new(settings),
    });
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run by the migration process once migrations complete.
fn notify(settings: &Settings) {
    let notifier = RefreshNotifier::from_settings(settings);
    if notifier.notify().join().is_err() {
        tracing::warn!("notification thread panicked");
    }
}
