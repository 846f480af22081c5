//! The typed update model consumed by the filter engine and conversations.
//!
//! Every event handed to the dispatch pipeline is one of the variants of
//! [`Update`].  Each variant carries exactly the payload relevant to that
//! kind of event; anything this layer has no dedicated shape for arrives as
//! [`Update::Raw`] with its wire-level class tag.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ─── Chat / User ─────────────────────────────────────────────────────────────

/// The chat an event happened in.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Chat {
    pub id:       i64,
    /// `"private"`, `"group"`, `"supergroup"` or `"channel"`.
    pub kind:     String,
    pub title:    Option<String>,
    pub username: Option<String>,
}

impl Chat {
    pub fn new(id: i64, kind: impl Into<String>) -> Self {
        Self { id, kind: kind.into(), title: None, username: None }
    }
}

/// The account an event originated from.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct User {
    pub id:         i64,
    pub first_name: String,
    pub last_name:  Option<String>,
    pub username:   Option<String>,
    pub is_bot:     bool,
}

impl User {
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self { id, first_name: first_name.into(), last_name: None, username: None, is_bot: false }
    }
}

// ─── Media payloads ───────────────────────────────────────────────────────────

/// A photo attached to a message.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Photo {
    pub file_id: String,
    pub width:   i32,
    pub height:  i32,
}

/// A generic file attached to a message.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Document {
    pub file_id:   String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size:      i64,
}

/// A geographic point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    pub latitude:  f64,
    pub longitude: f64,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A chat message (new, edited, or a channel post — the [`Update`] variant
/// says which).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    pub id:               i32,
    pub chat:             Chat,
    pub date:             i32,
    pub from:             Option<User>,
    pub text:             Option<String>,
    pub caption:          Option<String>,
    pub photo:            Option<Photo>,
    pub document:         Option<Document>,
    pub reply_to_message: Option<Box<Message>>,
    pub new_chat_members: Option<Vec<User>>,
    pub left_chat_member: Option<User>,
    pub pinned_message:   Option<Box<Message>>,
}

impl Message {
    /// A bare message in `chat` with no payload fields set.
    pub fn new(id: i32, chat: Chat) -> Self {
        Self {
            id,
            chat,
            date: 0,
            from: None,
            text: None,
            caption: None,
            photo: None,
            document: None,
            reply_to_message: None,
            new_chat_members: None,
            left_chat_member: None,
            pinned_message: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_from(mut self, from: User) -> Self {
        self.from = Some(from);
        self
    }

    /// Field presence by wire name, as probed by dotted filter keys.
    pub(crate) fn has(&self, field: &str) -> bool {
        match field {
            "id" | "chat" | "date" => true,
            "from"            => self.from.is_some(),
            "text"            => self.text.is_some(),
            "caption"         => self.caption.is_some(),
            "photo"           => self.photo.is_some(),
            "document"        => self.document.is_some(),
            "replyToMessage"  => self.reply_to_message.is_some(),
            "newChatMembers"  => self.new_chat_members.is_some(),
            "leftChatMember"  => self.left_chat_member.is_some(),
            "pinnedMessage"   => self.pinned_message.is_some(),
            _ => false,
        }
    }
}

// ─── CallbackQuery ───────────────────────────────────────────────────────────

/// A user pressed an inline keyboard button.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CallbackQuery {
    pub query_id:      i64,
    pub from:          User,
    /// The message the pressed button was attached to, when available.
    pub message:       Option<Message>,
    pub chat_instance: i64,
    /// Raw `data` bytes from the button.
    pub data_raw:      Option<Vec<u8>>,
}

impl CallbackQuery {
    /// Button data as a UTF-8 string, if valid.
    pub fn data(&self) -> Option<&str> {
        self.data_raw.as_ref().and_then(|d| std::str::from_utf8(d).ok())
    }

    pub(crate) fn has(&self, field: &str) -> bool {
        match field {
            "id" | "from" | "chatInstance" => true,
            "message" => self.message.is_some(),
            "data"    => self.data_raw.is_some(),
            _ => false,
        }
    }
}

// ─── InlineQuery ─────────────────────────────────────────────────────────────

/// A user is typing an inline query (`@bot something`).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InlineQuery {
    pub query_id:  i64,
    pub from:      User,
    pub query:     String,
    pub offset:    String,
    pub location:  Option<Location>,
    pub chat_type: Option<String>,
}

impl InlineQuery {
    pub(crate) fn has(&self, field: &str) -> bool {
        match field {
            "id" | "from" | "query" | "offset" => true,
            "location" => self.location.is_some(),
            "chatType" => self.chat_type.is_some(),
            _ => false,
        }
    }
}

// ─── RawUpdate ───────────────────────────────────────────────────────────────

/// An event with no dedicated variant; only its wire-level identity is kept.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawUpdate {
    /// Class tag of the underlying object, e.g. `"UpdatesTooLong"`.
    pub class_name:     String,
    /// TL constructor ID, when known.
    pub constructor_id: u32,
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// A high-level event flowing through the dispatch pipeline.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Update {
    /// A new message in a private chat or group.
    NewMessage(Message),
    /// An existing message was edited.
    EditedMessage(Message),
    /// A new post in a channel.
    ChannelPost(Message),
    /// An existing channel post was edited.
    EditedChannelPost(Message),
    /// An inline keyboard button was pressed.
    CallbackQuery(CallbackQuery),
    /// A user typed an inline query for the bot.
    InlineQuery(InlineQuery),
    /// An event not mapped to any of the above variants.
    Raw(RawUpdate),
}

/// Borrowed payload of an [`Update`], used for field-presence probing.
#[derive(Clone, Copy, Debug)]
pub enum Container<'a> {
    Message(&'a Message),
    CallbackQuery(&'a CallbackQuery),
    InlineQuery(&'a InlineQuery),
}

impl Container<'_> {
    /// Whether the named field is present on this payload.
    pub fn has(&self, field: &str) -> bool {
        match self {
            Self::Message(m)       => m.has(field),
            Self::CallbackQuery(q) => q.has(field),
            Self::InlineQuery(q)   => q.has(field),
        }
    }
}

impl Update {
    /// The update's kind tag: the container name of a typed variant
    /// (`"message"`, `"editedMessage"`, …) or a raw update's class tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::NewMessage(_)        => "message",
            Self::EditedMessage(_)     => "editedMessage",
            Self::ChannelPost(_)       => "channelPost",
            Self::EditedChannelPost(_) => "editedChannelPost",
            Self::CallbackQuery(_)     => "callbackQuery",
            Self::InlineQuery(_)       => "inlineQuery",
            Self::Raw(r)               => &r.class_name,
        }
    }

    /// The payload behind the given container name, if this update carries it.
    pub fn container(&self, name: &str) -> Option<Container<'_>> {
        match (self, name) {
            (Self::NewMessage(m), "message")                 => Some(Container::Message(m)),
            (Self::EditedMessage(m), "editedMessage")        => Some(Container::Message(m)),
            (Self::ChannelPost(m), "channelPost")            => Some(Container::Message(m)),
            (Self::EditedChannelPost(m), "editedChannelPost") => Some(Container::Message(m)),
            (Self::CallbackQuery(q), "callbackQuery")        => Some(Container::CallbackQuery(q)),
            (Self::InlineQuery(q), "inlineQuery")            => Some(Container::InlineQuery(q)),
            _ => None,
        }
    }

    /// The chat this update belongs to, when one can be derived.
    ///
    /// Message-carrying variants expose their chat directly; callback
    /// queries expose the chat of the message the button was attached to.
    /// Inline queries and raw updates have no chat context.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::NewMessage(m)
            | Self::EditedMessage(m)
            | Self::ChannelPost(m)
            | Self::EditedChannelPost(m) => Some(m.chat.id),
            Self::CallbackQuery(q) => q.message.as_ref().map(|m| m.chat.id),
            Self::InlineQuery(_) | Self::Raw(_) => None,
        }
    }

    /// Shorthand for "whatever message this update is about": the channel
    /// post, edited post, edited message, new message, or the callback
    /// query's embedded message — first present wins, in that order.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::ChannelPost(m)
            | Self::EditedChannelPost(m)
            | Self::EditedMessage(m)
            | Self::NewMessage(m) => Some(m),
            Self::CallbackQuery(q) => q.message.as_ref(),
            Self::InlineQuery(_) | Self::Raw(_) => None,
        }
    }
}
