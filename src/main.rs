#[macro_use]
extern crate rocket;

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use imgcache::api;
use imgcache::cache::{DiskStore, ImageFetcher, MemoryCache, MemoryPressure};
use imgcache::config::AppConfig;
use imgcache::images::HttpTransport;
use log::info;
use rocket::{
    figment::{
        providers::{Format, Toml},
        Figment, Profile,
    },
    Config,
};

#[launch]
async fn rocket() -> _ {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let mut figment = Figment::from(Config::default())
        .merge(Toml::file("App.toml").nested());

    // Environment overrides apply to every profile
    figment = AppConfig::with_overrides(
        figment,
        env::var("IMAGE_CACHE_DIR").ok(),
        env::var("MEMORY_CACHE_CAPACITY").ok().and_then(|v| v.parse::<usize>().ok()),
    );

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    let config = figment.extract::<AppConfig>().expect("invalid configuration");
    info!("Configuration loaded successfully");

    let transport = HttpTransport::new(config.timeout, &config.user_agent)
        .expect("failed to build HTTP transport");

    let memory = Arc::new(MemoryCache::new(config.memory_cache_capacity));
    info!("Memory image cache initialized (capacity {})", config.memory_cache_capacity);

    // Falls back to memory-only caching when the directory is unusable
    let disk = DiskStore::new(config.cache_root());

    let pressure = MemoryPressure::new();
    let fetcher = ImageFetcher::with_purge(
        memory,
        disk,
        Arc::new(transport),
        &pressure,
        config.purge_corrupt_entries,
    );
    info!("Image fetcher initialized");

    info!(
        "Starting image cache server on {}:{}",
        config.address, config.port
    );

    rocket::custom(figment)
        .manage(fetcher)
        .manage(pressure)
        .manage(config)
        .mount("/images", api::routes())
}
