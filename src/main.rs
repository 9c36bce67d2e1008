mod availability;
mod data;
mod engine;
mod preferences;
mod report;
mod server;
mod slots;
mod store;

use std::path::PathBuf;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let pref_path = PathBuf::from(
        std::env::var("PREF_FILE").unwrap_or_else(|_| "saved_preferences.csv".to_string()),
    );
    let prefs = match store::load_preferences(&pref_path) {
        Ok(prefs) => prefs,
        Err(e) => {
            log::error!(
                "Could not load preference table {}: {}",
                pref_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    server::run_server(prefs, pref_path).await;
}
