//! Main application entry point (native).

use regionsnap_app::AppConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting RegionSnap overlay");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = regionsnap_app::run(config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
