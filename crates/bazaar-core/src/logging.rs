// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Tracing setup for host applications

use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, with this crate at
/// `info` by default. Returns false if a subscriber was already installed.
pub fn init_tracing() -> bool {
    let directive = "bazaar_core=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let filter = EnvFilter::from_default_env().add_directive(directive);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
