//! Viewport-synchronized overlay layers for the car-enthusiast map.
//!
//! Each overlay owns one source and a stack of layers on a shared map
//! engine, refetches its dataset when the viewport settles and routes
//! clicks back to the host. [`scene::MapScene`] drives a set of them
//! against one engine.

pub mod config;
pub mod error;
pub mod events;
pub mod geojson;
pub mod layers;
pub mod map;
pub mod overlay;
pub mod scene;
pub mod style;

#[cfg(test)]
mod test_support;

pub use config::MapConfig;
pub use error::MapError;
pub use scene::{MapScene, OverlayDriver};

/// Install the logger for the current target. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Install the logger for the current target. Safe to call more than once.
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}
