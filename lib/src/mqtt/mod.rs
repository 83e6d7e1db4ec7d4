pub mod backoff;
pub mod publisher;
pub mod session;
pub mod status;
pub mod subscriber;

pub use backoff::{Backoff, ReconnectPolicy};
pub use session::{Session, SessionEvent, SessionState};
pub use status::ConnackStatus;

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
