//! # coil
//!
//! A high-level convenience layer over an MTProto client: compact binary
//! session/cache persistence, a typed update model with filter-based
//! dispatch, and per-chat conversations that suspend until the next
//! matching update arrives.
//!
//! ## Features
//! - Versioned binary cache of peer and secret-chat records, plus the fixed
//!   271-byte session blob and a portable session string
//! - Interchangeable storage backends (filesystem, key-value) producing
//!   byte-identical artifacts
//! - `"msg.text"`-style filter keys with alias shorthands, driving both the
//!   dispatch pipeline and conversations
//! - `conversation.wait(…)` futures resolved by the first matching update;
//!   non-matching updates flow through unbuffered
//! - The wire protocol itself stays behind the injected
//!   [`MtprotoClient`] — this crate never opens a socket
//!
//! ## Conversations
//!
//! ```rust,no_run
//! use coil::{Dispatcher, Update};
//!
//! let mut dispatcher = Dispatcher::new();
//! let conversations = dispatcher.conversations();
//!
//! dispatcher.on("msg.text", move |update: &Update| {
//!     let Some(chat_id) = update.chat_id() else { return };
//!     let conversation = conversations.create(chat_id);
//!     tokio::spawn(async move {
//!         // Prompt the user through the client here, then:
//!         if let Ok(reply) = conversation.wait("msg.text").await {
//!             let _text = reply.message().and_then(|m| m.text.clone());
//!         }
//!     });
//! });
//! ```
//!
//! Waits never time out on their own; a supervisor adding a timeout must
//! remove the conversation on expiry (see [`ConversationManager::remove`]).

#![deny(unsafe_code)]

mod errors;

pub mod client;
pub mod conversation;
pub mod dispatch;
pub mod filters;
pub mod session;
pub mod session_backend;
pub mod update;

pub use client::{ByteStream, FileHandle, FileLocation, MtprotoClient, PeerRef, ProgressFn};
pub use conversation::{Conversation, ConversationManager, Wait, WaitFilter};
pub use dispatch::{Dispatcher, Handler};
pub use errors::{ClientError, RpcError, StorageError, Superseded};
pub use session::{PeerRecord, SecretChatRecord, SessionState};
pub use session_backend::{FileBackend, KvBackend, KvStore, MemoryKv, SessionBackend};
pub use update::Update;
