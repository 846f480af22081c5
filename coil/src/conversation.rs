//! Per-chat conversations: suspend a handler until the next matching update.
//!
//! A [`Conversation`] holds at most one pending wait.  Calling
//! [`Conversation::wait`] arms a single-shot predicate and returns a future;
//! the dispatch pipeline later offers incoming updates for that chat to the
//! predicate, and the first accepted update resolves the future.  Rejected
//! updates are not consumed — they continue down the pipeline, unbuffered,
//! and the wait stays armed for a later one.
//!
//! Waits carry no built-in timeout.  A supervisor wrapping a wait with its
//! own timeout must call [`ConversationManager::remove`] on expiry so the
//! stale wait can never fire afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::errors::Superseded;
use crate::filters;
use crate::update::Update;

/// Synchronous accept/reject predicate over a candidate update.
///
/// Returning `false` declines the candidate without consuming it; the
/// predicate may have side effects first (e.g. queueing a prompt back to
/// the user).
pub type WaitFilter = Box<dyn FnMut(&Update) -> bool + Send>;

struct PendingWait {
    key:    String,
    accept: Option<WaitFilter>,
    tx:     oneshot::Sender<Update>,
}

// ─── Conversation ────────────────────────────────────────────────────────────

/// The wait state of a single chat.  Obtained from
/// [`ConversationManager::create`].
pub struct Conversation {
    pending: Mutex<Option<PendingWait>>,
}

impl Conversation {
    pub(crate) fn new() -> Self {
        Self { pending: Mutex::new(None) }
    }

    /// Wait for the next update in this chat matching the filter `key`.
    ///
    /// Installing a new wait replaces any unresolved previous one — last
    /// wait wins, and the superseded future settles with [`Superseded`]
    /// instead of staying pending forever.
    pub fn wait(&self, key: impl Into<String>) -> Wait {
        self.install(key.into(), None)
    }

    /// Like [`wait`](Conversation::wait), with an additional synchronous
    /// accept filter run against each matching candidate.
    pub fn wait_filtered(
        &self,
        key:    impl Into<String>,
        accept: impl FnMut(&Update) -> bool + Send + 'static,
    ) -> Wait {
        self.install(key.into(), Some(Box::new(accept)))
    }

    fn install(&self, key: String, accept: Option<WaitFilter>) -> Wait {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.pending.lock().unwrap();
        if slot.replace(PendingWait { key, accept, tx }).is_some() {
            // The replaced sender is dropped here, settling the old future.
            log::debug!("pending wait superseded by a newer wait");
        }
        Wait { rx }
    }

    /// Clear any pending wait and return to pass-through.
    ///
    /// Happens automatically once a wait resolves; an explicitly ended
    /// unresolved wait settles with [`Superseded`].
    pub fn end(&self) {
        self.pending.lock().unwrap().take();
    }

    /// Offer `update` to the pending wait, if any.
    ///
    /// `Break` means the update resolved the wait and is consumed;
    /// `Continue` means it should keep flowing down the pipeline.
    pub(crate) fn handle(&self, update: &Update) -> ControlFlow<()> {
        let mut slot = self.pending.lock().unwrap();
        let accepted = match slot.as_mut() {
            Some(wait) => {
                filters::matches(&wait.key, update)
                    && wait.accept.as_mut().is_none_or(|accept| accept(update))
            }
            None => false,
        };
        if !accepted {
            return ControlFlow::Continue(());
        }
        if let Some(wait) = slot.take() {
            // A send error just means the waiter went away; the update is
            // consumed either way, mirroring a resolve.
            let _ = wait.tx.send(update.clone());
        }
        ControlFlow::Break(())
    }
}

// ─── Wait ────────────────────────────────────────────────────────────────────

/// Future returned by [`Conversation::wait`].
///
/// Resolves exactly once with the matching update, or with [`Superseded`]
/// when the wait was replaced, ended, or its conversation removed.  It never
/// times out on its own.
pub struct Wait {
    rx: oneshot::Receiver<Update>,
}

impl Future for Wait {
    type Output = Result<Update, Superseded>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| Superseded))
    }
}

// ─── ConversationManager ─────────────────────────────────────────────────────

/// Keyed registry of active conversations, at most one per chat id.
///
/// Plugged into the dispatch pipeline ahead of ordinary handlers: updates
/// for a chat with an active conversation are offered to its wait first and
/// fall through untouched when not consumed.
#[derive(Default)]
pub struct ConversationManager {
    active: Mutex<HashMap<i64, Arc<Conversation>>>,
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation in the given chat.
    ///
    /// An existing conversation under the same chat id is replaced; its
    /// in-flight wait is abandoned (the manager will never route to it
    /// again).
    pub fn create(&self, chat_id: i64) -> Arc<Conversation> {
        let conversation = Arc::new(Conversation::new());
        self.active.lock().unwrap().insert(chat_id, conversation.clone());
        conversation
    }

    /// Stop the conversation in the given chat.
    ///
    /// Returns whether one existed.  A pending wait on the removed
    /// conversation settles with [`Superseded`].
    pub fn remove(&self, chat_id: i64) -> bool {
        match self.active.lock().unwrap().remove(&chat_id) {
            Some(conversation) => {
                conversation.end();
                true
            }
            None => false,
        }
    }

    /// The active conversation for a chat, if any.
    pub fn get(&self, chat_id: i64) -> Option<Arc<Conversation>> {
        self.active.lock().unwrap().get(&chat_id).cloned()
    }

    /// Route `update` to the active conversation for its chat.
    ///
    /// Updates without a derivable chat id, or for chats without an active
    /// conversation, always pass through.
    pub fn handle(&self, update: &Update) -> ControlFlow<()> {
        let Some(chat_id) = update.chat_id() else {
            return ControlFlow::Continue(());
        };
        let conversation = self.active.lock().unwrap().get(&chat_id).cloned();
        match conversation {
            Some(conversation) => conversation.handle(update),
            None => ControlFlow::Continue(()),
        }
    }
}
