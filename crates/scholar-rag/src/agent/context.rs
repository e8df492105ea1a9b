//! Per-request context handed to every tool execution.

use tokio_util::sync::CancellationToken;

/// Carries the caller's session identity and cancellation signal through the
/// tool loop. The session id is passed opaquely so document search stays
/// scoped to the caller's own uploads.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub session_id: Option<String>,
    pub cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            session_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(session_id: Option<String>, cancel: CancellationToken) -> Self {
        Self { session_id, cancel }
    }
}
