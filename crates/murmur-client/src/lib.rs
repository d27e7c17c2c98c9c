//! Conversation session for a simulated messaging client.
//!
//! The presentation layer spawns a session, feeds it user intents through a
//! [`SessionHandle`] and renders the [`SessionView`] snapshots it publishes.

pub mod config;
pub mod error;
pub mod reply;
pub mod session;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::{ClientConfig, SessionTimings};
pub use error::SessionError;
pub use reply::{ChatCompletionsBackend, ReplyBackend, ReplyError, ReplyOutcome, ReplySimulator};
pub use session::{
    spawn_default_session, spawn_session, RecordingToggle, SessionCommand, SessionHandle, SessionOptions,
};
pub use view::SessionView;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("murmur_client=debug,murmur_media=info,murmur_store=info,warn")
    });

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialised for {}", murmur_shared::constants::APP_NAME);
    }
}
