use concierge_brain::brain::Brain;
use concierge_brain::service::messenger::Messenger;
use concierge_core::config::Config;
use concierge_telegram::bot::TelegramBot;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config_path = std::env::var("CONCIERGE_CONFIG")
        .unwrap_or_else(|_| "concierge.toml".to_string());

    let config = Config::load(Path::new(&config_path)).unwrap_or_else(|e| {
        eprintln!("fatal: failed to load config: {e}");
        std::process::exit(1);
    });

    let filter = EnvFilter::try_new(&config.log.filter).unwrap_or_else(|e| {
        eprintln!("concierge: bad log filter '{}' ({e}), using info", config.log.filter);
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        error!("fatal: {e}");
        std::process::exit(1);
    }

    info!("concierge: starting...");

    let bot = Arc::new(TelegramBot::new(config.telegram.token.clone()));
    let messenger: Arc<dyn Messenger> = Arc::clone(&bot) as Arc<dyn Messenger>;

    let brain: Brain = Brain::new(config, messenger).await.unwrap_or_else(|e| {
        error!("fatal: failed to initialize brain: {e}");
        std::process::exit(1);
    });
    let brain = Arc::new(brain);

    if let Err(e) = brain.run(&bot).await {
        error!("fatal: brain error: {e}");
        std::process::exit(1);
    }
}
