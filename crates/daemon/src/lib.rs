pub mod logging;
pub mod setup;

// App state (configuration, paths)
pub mod state;

pub use setup::{setup_disk, SetupError};
pub use state::{AppConfig, AppState, StateError};

/// Build version string shown by `tierfs version`
pub fn build_info() -> String {
    format!(
        "{} {} (core {})",
        state::APP_NAME,
        env!("CARGO_PKG_VERSION"),
        common::VERSION
    )
}
