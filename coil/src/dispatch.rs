//! The update dispatch pipeline.
//!
//! Updates are processed one at a time, in arrival order, through a single
//! logical stream: the conversation manager sees each update first and may
//! consume it to resolve a pending wait; everything else flows on to the
//! registered handlers whose filters match.  Nothing is buffered or
//! replayed — an update either resolves a wait or reaches each matching
//! handler exactly once.

use std::sync::Arc;

use crate::conversation::ConversationManager;
use crate::filters;
use crate::update::Update;

/// A registered update handler.
pub type Handler = Box<dyn FnMut(&Update) + Send>;

struct Route {
    keys:    Vec<String>,
    handler: Handler,
}

/// Routes incoming updates to conversations and filtered handlers.
pub struct Dispatcher {
    conversations: Arc<ConversationManager>,
    routes:        Vec<Route>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(ConversationManager::new()),
            routes:        Vec::new(),
        }
    }

    /// The shared conversation manager, for creating and removing
    /// conversations from handler or application code.
    pub fn conversations(&self) -> Arc<ConversationManager> {
        self.conversations.clone()
    }

    /// Register `handler` for updates matching the filter `key`.
    pub fn on(&mut self, key: impl Into<String>, handler: impl FnMut(&Update) + Send + 'static) {
        self.on_any([key.into()], handler);
    }

    /// Register `handler` for updates matching any of `keys`.
    pub fn on_any<I, S>(&mut self, keys: I, handler: impl FnMut(&Update) + Send + 'static)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.push(Route {
            keys:    keys.into_iter().map(Into::into).collect(),
            handler: Box::new(handler),
        });
    }

    /// Feed one update through the pipeline.
    pub fn handle_update(&mut self, update: &Update) {
        if self.conversations.handle(update).is_break() {
            // Consumed by an active conversation's wait.
            return;
        }
        for route in &mut self.routes {
            if filters::matches_any(&route.keys, update) {
                (route.handler)(update);
            }
        }
    }
}
