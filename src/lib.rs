pub mod api;
pub mod core;
pub mod platform;
pub mod shared;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::conversation::Conversation;
use crate::core::storage::StorageBackend;
use crate::platform::LocalPlatform;
use crate::shared::error::AppResult;
use crate::shared::settings::{ChatSettings, StorageBackendKind};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `info` filter. Calling it twice is harmless.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Open the configured storage backend, falling back to memory.
pub fn open_storage(settings: &ChatSettings) -> StorageBackend {
    match settings.storage.backend {
        StorageBackendKind::Memory => StorageBackend::memory(),
        StorageBackendKind::Redb => match settings.data_path() {
            Ok(path) => StorageBackend::open_or_memory(&path),
            Err(e) => {
                warn!(error = %e, "no data directory, keeping conversation in memory");
                StorageBackend::memory()
            }
        },
    }
}

/// Build the conversation from settings with the local providers.
///
/// # Panics
///
/// Must be called from within a tokio runtime.
pub fn build_conversation(settings: ChatSettings) -> Arc<Conversation> {
    let storage = open_storage(&settings);
    let platform = Arc::new(LocalPlatform::new(settings.translation.clone()));
    Conversation::start(settings, platform, storage)
}

async fn start() -> AppResult<()> {
    let settings = ChatSettings::load().await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to load settings, using defaults");
        ChatSettings::default()
    });
    info!(
        target_language = %settings.preferences.default_target_lang,
        backend = ?settings.storage.backend,
        "starting lingua-chat"
    );

    let conversation = build_conversation(settings);
    api::repl::run_repl(conversation).await
}

pub fn run() {
    setup_logging();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(start()) {
        error!(error = %e, "lingua-chat exited with an error");
        std::process::exit(1);
    }
}
