//=============================================
// uvm/src/logging.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup shared by the uvm binaries
// Objective: Install one stderr subscriber so program output on stdout stays clean
//=============================================

use std::io;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialise tracing with a component label. `RUST_LOG` overrides the level.
pub fn init(component: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()));
        SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(true)
            .with_writer(io::stderr)
            .compact()
            .init();
    });
    tracing::debug!(component, "tracing initialised");
}
