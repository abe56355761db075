//! Dialog state machine.
//!
//! One call to [`DialogEngine::handle`] is one USSD turn. The engine decides
//! between two mutually exclusive branches:
//!
//! - the session has a pending free-text flow: the newest path segment goes
//!   to that flow's handler, and the flow is cleared afterwards whatever the
//!   outcome;
//! - otherwise the whole path is looked up in the menu tree, possibly
//!   installing a flow.
//!
//! Store reads and writes for one session are serialized through a
//! per-session lock. Handlers run outside the lock.

use crate::handlers::FlowHandler;
use crate::menu::{last_segment, MenuTree, NodeKind};
use crate::response::DialogResponse;
use crate::session::{FlowKind, PendingFlow, SessionLocks, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Terminal text for a path that matches nothing.
pub const INVALID_SELECTION: &str = "Invalid selection. Please try again.";

const HANDLER_FAILED: &str = "Sorry, something went wrong. Please try again.";

/// Per-request attributes supplied by the telecom gateway. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogContext {
    pub phone_number: Option<String>,
    pub service_code: Option<String>,
}

pub struct DialogEngine {
    menu: MenuTree,
    store: Arc<dyn SessionStore>,
    locks: Arc<SessionLocks>,
    handlers: HashMap<FlowKind, Arc<dyn FlowHandler>>,
}

impl DialogEngine {
    /// Engine over the standard menu with no flow handlers registered.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            menu: MenuTree::standard(),
            store,
            locks: Arc::new(SessionLocks::new()),
            handlers: HashMap::new(),
        }
    }

    /// Register the handler that resolves `kind` flows.
    pub fn with_handler(mut self, kind: FlowKind, handler: Arc<dyn FlowHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Whether a handler for `kind` is registered and configured.
    pub fn is_available(&self, kind: FlowKind) -> bool {
        self.handlers.get(&kind).is_some_and(|h| h.is_available())
    }

    /// The flow `session_id` is waiting in, if any.
    pub async fn pending_flow(&self, session_id: &str) -> Option<FlowKind> {
        self.store.get(session_id).await.map(|f| f.kind)
    }

    /// Resolve one dialog turn. Never fails.
    pub async fn handle(&self, session_id: &str, raw_path: &str, ctx: &DialogContext) -> DialogResponse {
        let path = raw_path.trim();
        if path.is_empty() {
            return DialogResponse::prompt(self.menu.root().render(ctx));
        }

        let guard = self.locks.lock(session_id).await;

        if let Some(pending) = self.store.get(session_id).await {
            // Free text always arrives appended to the entry path, so the bare
            // entry path is a redelivered entry turn
            if let Some(node) = self.menu.lookup(path).filter(|n| n.flow == Some(pending.kind)) {
                tracing::debug!(flow = pending.kind.as_str(), "Entry turn redelivered");
                return DialogResponse::prompt(node.render(ctx));
            }
            drop(guard);
            return self.resolve_pending(session_id, pending, last_segment(path)).await;
        }

        let response = self.navigate(session_id, path, ctx).await;
        drop(guard);
        response
    }

    /// Menu branch. Caller holds the session lock.
    async fn navigate(&self, session_id: &str, path: &str, ctx: &DialogContext) -> DialogResponse {
        let Some(node) = self.menu.lookup(path) else {
            tracing::info!(path, "Invalid menu selection");
            return DialogResponse::end(INVALID_SELECTION);
        };

        match (node.kind, node.flow) {
            (NodeKind::Terminal, _) => DialogResponse::end(node.render(ctx)),
            (NodeKind::Continuation, None) => DialogResponse::prompt(node.render(ctx)),
            (NodeKind::Continuation, Some(kind)) => {
                if !self.is_available(kind) {
                    tracing::warn!(
                        error_kind = "missing_configuration",
                        flow = kind.as_str(),
                        "Flow entered but its service is not configured"
                    );
                    return DialogResponse::end(kind.not_available_text());
                }
                self.store.set(session_id, PendingFlow::new(kind)).await;
                tracing::debug!(flow = kind.as_str(), "Pending flow installed");
                DialogResponse::prompt(node.render(ctx))
            }
        }
    }

    /// Flow branch. Runs the handler and the cleanup on their own task so the
    /// flow is cleared even if the request future is dropped mid-call. Only
    /// the dispatched flow is cleared; one installed meanwhile survives.
    async fn resolve_pending(&self, session_id: &str, pending: PendingFlow, payload: &str) -> DialogResponse {
        let kind = pending.kind;
        let handler = self.handlers.get(&kind).cloned();
        let store = Arc::clone(&self.store);
        let locks = Arc::clone(&self.locks);
        let sid = session_id.to_string();
        let input = payload.to_string();

        let task = tokio::spawn(
            async move {
                let text = match handler {
                    Some(handler) => {
                        tracing::debug!(handler = handler.name(), "Resolving pending flow");
                        handler.resolve(&input).await
                    }
                    None => kind.not_available_text(),
                };

                let _guard = locks.lock(&sid).await;
                store.clear_if(&sid, pending).await;
                text
            }
            .instrument(tracing::Span::current()),
        );

        match task.await {
            Ok(text) => {
                tracing::info!(flow = kind.as_str(), "Pending flow resolved");
                DialogResponse::end(text)
            }
            Err(e) => {
                tracing::error!(flow = kind.as_str(), error = %e, "Flow handler task failed");
                let _guard = self.locks.lock(session_id).await;
                self.store.clear_if(session_id, pending).await;
                DialogResponse::end(HANDLER_FAILED)
            }
        }
    }
}
