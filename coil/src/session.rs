//! Session state and the binary session/cache formats.
//!
//! Two artifacts are persisted:
//!
//! * The **session blob** — a fixed 271-byte layout holding the
//!   authentication material: `dc_id` (u8), `api_id` (u32 LE), `test_mode`
//!   (u8), `auth_key` (256 raw bytes), `user_id` (u64 **big-endian**),
//!   `is_bot` (u8).  Trailing bytes belong to higher layers and are ignored.
//! * The **cache blob** — a versioned container of peer and secret-chat
//!   records.  Version 2 is a version byte `0x02`, a length-prefixed peer
//!   section (an `i32` record count followed by `i32`-length-prefixed
//!   records) and a length-prefixed E2E section (which carries its own
//!   leading version byte `0x01`).  Version 1 is a bare peer vector with no
//!   version byte and no E2E section.  Saving always emits version 2;
//!   loading accepts both.
//!
//! Section lengths exactly bound their content, so a reader can skip a
//! section using only the declared length.  A declared length that overruns
//! the buffer is corruption and fails the whole load.

use std::collections::HashMap;

use coil_tl::deserialize::Buffer;
use coil_tl::{Cursor, Deserializable, Serializable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Length of a raw authorization key.
pub const AUTH_KEY_LEN: usize = 256;

/// Exact length of the session blob.
pub const SESSION_BLOB_LEN: usize = 271;

const CACHE_VERSION: u8 = 2;
const E2E_VERSION: u8 = 1;

const PEER_FLAG_PHONE:     i32 = 1 << 5;
const PEER_FLAG_USERNAMES: i32 = 1 << 6;

const E2E_FLAG_REKEY_STEP:     i32 = 1 << 3;
const E2E_FLAG_REKEY_EXCHANGE: i32 = 1 << 4;
const E2E_FLAG_ADMIN_ID:       i32 = 1 << 5;
const E2E_FLAG_TTL:            i32 = 1 << 6;

// ─── PeerRecord ──────────────────────────────────────────────────────────────

/// A cached peer identity: a chat/user/channel id plus the access hash the
/// server expects alongside it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerRecord {
    pub id:           i64,
    pub access_hash:  i64,
    /// `"user"`, `"bot"`, `"group"`, `"channel"`, …
    pub kind:         String,
    pub usernames:    Option<Vec<String>>,
    pub phone_number: Option<String>,
}

impl PeerRecord {
    pub fn new(id: i64, access_hash: i64, kind: impl Into<String>) -> Self {
        Self { id, access_hash, kind: kind.into(), usernames: None, phone_number: None }
    }
}

impl Serializable for PeerRecord {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let mut flags = 0i32;
        if self.usernames.is_some() {
            flags |= PEER_FLAG_USERNAMES;
        }
        if self.phone_number.is_some() {
            flags |= PEER_FLAG_PHONE;
        }
        flags.serialize(buf);
        self.id.serialize(buf);
        self.access_hash.serialize(buf);
        self.kind.serialize(buf);
        if let Some(usernames) = &self.usernames {
            usernames.serialize(buf);
        }
        if let Some(phone) = &self.phone_number {
            phone.serialize(buf);
        }
    }
}

impl Deserializable for PeerRecord {
    fn deserialize(buf: Buffer) -> coil_tl::deserialize::Result<Self> {
        let flags = i32::deserialize(buf)?;
        let id = i64::deserialize(buf)?;
        let access_hash = i64::deserialize(buf)?;
        let kind = String::deserialize(buf)?;
        // Bit 6 is the only username-presence bit the encoder ever sets.
        let usernames = if flags & PEER_FLAG_USERNAMES != 0 {
            Some(Vec::<String>::deserialize(buf)?)
        } else {
            None
        };
        let phone_number = if flags & PEER_FLAG_PHONE != 0 {
            Some(String::deserialize(buf)?)
        } else {
            None
        };
        Ok(Self { id, access_hash, kind, usernames, phone_number })
    }
}

// ─── SecretChatRecord ────────────────────────────────────────────────────────

/// An end-to-end encrypted chat session, including its ratcheting counters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SecretChatRecord {
    pub id:             i32,
    pub access_hash:    i64,
    pub is_admin:       bool,
    /// 256-byte shared authorization key.
    pub auth_key:       Vec<u8>,
    pub mtproto:        i32,
    pub layer:          i32,
    pub in_seq_no:      i32,
    pub out_seq_no:     i32,
    pub in_seq_no_x:    i32,
    pub out_seq_no_x:   i32,
    /// Messages left before the next rekey.
    pub time_rekey:     i32,
    /// Unix seconds when the chat was created.
    pub created:        f64,
    /// Unix seconds of the last state change.
    pub changed:        f64,
    pub rekey_step:     Option<i32>,
    pub rekey_exchange: Option<i64>,
    pub admin_id:       Option<i64>,
    pub ttl:            Option<i32>,
}

impl SecretChatRecord {
    /// A freshly-established secret chat with default protocol parameters.
    pub fn new(id: i32, access_hash: i64, is_admin: bool, auth_key: Vec<u8>) -> Self {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        Self {
            id,
            access_hash,
            is_admin,
            auth_key,
            mtproto: 2,
            layer: 46,
            in_seq_no: 0,
            out_seq_no: 0,
            in_seq_no_x: 0,
            out_seq_no_x: 0,
            time_rekey: 100,
            created: now,
            changed: now,
            rekey_step: None,
            rekey_exchange: None,
            admin_id: None,
            ttl: None,
        }
    }
}

impl Serializable for SecretChatRecord {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let mut flags = 0i32;
        if self.rekey_step.is_some() {
            flags |= E2E_FLAG_REKEY_STEP;
        }
        if self.rekey_exchange.is_some() {
            flags |= E2E_FLAG_REKEY_EXCHANGE;
        }
        if self.admin_id.is_some() {
            flags |= E2E_FLAG_ADMIN_ID;
        }
        if self.ttl.is_some() {
            flags |= E2E_FLAG_TTL;
        }
        flags.serialize(buf);
        self.id.serialize(buf);
        self.access_hash.serialize(buf);
        self.is_admin.serialize(buf);
        self.auth_key.as_slice().serialize(buf);
        self.mtproto.serialize(buf);
        self.layer.serialize(buf);
        self.in_seq_no.serialize(buf);
        self.out_seq_no.serialize(buf);
        self.in_seq_no_x.serialize(buf);
        self.out_seq_no_x.serialize(buf);
        self.time_rekey.serialize(buf);
        self.created.serialize(buf);
        self.changed.serialize(buf);
        // Optional fields follow in ascending flag-bit order.
        self.rekey_step.serialize(buf);
        self.rekey_exchange.serialize(buf);
        self.admin_id.serialize(buf);
        self.ttl.serialize(buf);
    }
}

impl Deserializable for SecretChatRecord {
    fn deserialize(buf: Buffer) -> coil_tl::deserialize::Result<Self> {
        let flags = i32::deserialize(buf)?;
        let id = i32::deserialize(buf)?;
        let access_hash = i64::deserialize(buf)?;
        let is_admin = bool::deserialize(buf)?;
        let auth_key = Vec::<u8>::deserialize(buf)?;
        let mtproto = i32::deserialize(buf)?;
        let layer = i32::deserialize(buf)?;
        let in_seq_no = i32::deserialize(buf)?;
        let out_seq_no = i32::deserialize(buf)?;
        let in_seq_no_x = i32::deserialize(buf)?;
        let out_seq_no_x = i32::deserialize(buf)?;
        let time_rekey = i32::deserialize(buf)?;
        let created = f64::deserialize(buf)?;
        let changed = f64::deserialize(buf)?;
        let rekey_step = if flags & E2E_FLAG_REKEY_STEP != 0 {
            Some(i32::deserialize(buf)?)
        } else {
            None
        };
        let rekey_exchange = if flags & E2E_FLAG_REKEY_EXCHANGE != 0 {
            Some(i64::deserialize(buf)?)
        } else {
            None
        };
        let admin_id = if flags & E2E_FLAG_ADMIN_ID != 0 {
            Some(i64::deserialize(buf)?)
        } else {
            None
        };
        let ttl = if flags & E2E_FLAG_TTL != 0 {
            Some(i32::deserialize(buf)?)
        } else {
            None
        };
        Ok(Self {
            id,
            access_hash,
            is_admin,
            auth_key,
            mtproto,
            layer,
            in_seq_no,
            out_seq_no,
            in_seq_no_x,
            out_seq_no_x,
            time_rekey,
            created,
            changed,
            rekey_step,
            rekey_exchange,
            admin_id,
            ttl,
        })
    }
}

// ─── SessionState ────────────────────────────────────────────────────────────

/// The authentication material and entity cache of one logged-in account.
///
/// Auth fields are written once per login cycle; the `peers` and
/// `secret_chats` maps mutate continuously while the client resolves new
/// entities.  Persistence is delegated to a
/// [`SessionBackend`](crate::session_backend::SessionBackend).
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub dc_id:        u8,
    pub api_id:       u32,
    pub test_mode:    bool,
    pub auth_key:     [u8; AUTH_KEY_LEN],
    pub user_id:      i64,
    pub is_bot:       bool,
    pub peers:        HashMap<i64, PeerRecord>,
    pub secret_chats: HashMap<i32, SecretChatRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            dc_id: 0,
            api_id: 0,
            test_mode: false,
            auth_key: [0u8; AUTH_KEY_LEN],
            user_id: 0,
            is_bot: false,
            peers: HashMap::new(),
            secret_chats: HashMap::new(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a peer record, keyed by its id.
    pub fn put_peer(&mut self, peer: PeerRecord) {
        self.peers.insert(peer.id, peer);
    }

    pub fn peer(&self, id: i64) -> Option<&PeerRecord> {
        self.peers.get(&id)
    }

    /// Insert (or overwrite) a secret-chat record, keyed by its id.
    pub fn put_secret_chat(&mut self, chat: SecretChatRecord) {
        self.secret_chats.insert(chat.id, chat);
    }

    pub fn secret_chat(&self, id: i32) -> Option<&SecretChatRecord> {
        self.secret_chats.get(&id)
    }

    // ── Session blob ─────────────────────────────────────────────────────

    /// Encode the authentication material into the fixed 271-byte layout.
    pub fn session_blob(&self) -> [u8; SESSION_BLOB_LEN] {
        let mut blob = [0u8; SESSION_BLOB_LEN];
        blob[0] = self.dc_id;
        blob[1..5].copy_from_slice(&self.api_id.to_le_bytes());
        blob[5] = self.test_mode as u8;
        blob[6..262].copy_from_slice(&self.auth_key);
        blob[262..270].copy_from_slice(&(self.user_id as u64).to_be_bytes());
        blob[270] = self.is_bot as u8;
        blob
    }

    /// Apply a persisted session blob to this state.
    ///
    /// Bytes past offset 270 belong to higher layers and are ignored.
    pub fn apply_session_blob(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if bytes.len() < SESSION_BLOB_LEN {
            return Err(StorageError::corrupt(format!(
                "session blob is {} bytes, expected at least {SESSION_BLOB_LEN}",
                bytes.len()
            )));
        }
        self.dc_id = bytes[0];
        self.api_id = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
        self.test_mode = bytes[5] != 0;
        self.auth_key.copy_from_slice(&bytes[6..262]);
        self.user_id = u64::from_be_bytes(bytes[262..270].try_into().unwrap()) as i64;
        self.is_bot = bytes[270] != 0;
        log::debug!(
            "loaded session blob: dc_id={}, api_id={}, test_mode={}, is_bot={}",
            self.dc_id, self.api_id, self.test_mode, self.is_bot
        );
        Ok(())
    }

    /// The session blob as a portable URL-safe base64 string.
    pub fn export_string(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.session_blob())
    }

    /// Apply a session string produced by [`export_string`].
    ///
    /// [`export_string`]: SessionState::export_string
    pub fn import_string(&mut self, session: &str) -> Result<(), StorageError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(session.trim())
            .map_err(|e| StorageError::corrupt(format!("invalid session string: {e}")))?;
        self.apply_session_blob(&bytes)
    }

    // ── Cache blob ───────────────────────────────────────────────────────

    /// Encode the peer and secret-chat caches as a version-2 container.
    pub fn cache_blob(&self) -> Vec<u8> {
        let mut cache = Vec::new();
        (self.peers.len() as i32).serialize(&mut cache);
        for peer in self.peers.values() {
            let content = peer.to_bytes();
            (content.len() as i32).serialize(&mut cache);
            cache.extend_from_slice(&content);
        }

        // The E2E section is only materialized when there is something in it.
        let e2e = if self.secret_chats.is_empty() {
            Vec::new()
        } else {
            self.e2e_blob()
        };

        let mut blob = vec![CACHE_VERSION];
        (cache.len() as i32).serialize(&mut blob);
        blob.extend_from_slice(&cache);
        (e2e.len() as i32).serialize(&mut blob);
        blob.extend_from_slice(&e2e);
        blob
    }

    fn e2e_blob(&self) -> Vec<u8> {
        let mut blob = vec![E2E_VERSION];
        (self.secret_chats.len() as i32).serialize(&mut blob);
        for chat in self.secret_chats.values() {
            let content = chat.to_bytes();
            (content.len() as i32).serialize(&mut blob);
            blob.extend_from_slice(&content);
        }
        blob
    }

    /// Load a persisted cache container into this state.
    ///
    /// Accepts the current version-2 format and the legacy bare peer
    /// vector.  An empty input is a valid empty cache.
    pub fn apply_cache_blob(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if bytes.is_empty() {
            return Ok(());
        }
        if bytes[0] == CACHE_VERSION {
            log::debug!("loading cache container version 2");
            let mut cur = Cursor::from_slice(&bytes[1..]);
            let peer_section = read_section(&mut cur, "peer section")?;
            let e2e_section = read_section(&mut cur, "e2e section")?;
            self.load_peer_vector(peer_section)?;
            if !e2e_section.is_empty() {
                self.load_e2e(e2e_section)?;
            }
        } else {
            log::debug!("loading legacy cache container");
            self.load_peer_vector(bytes)?;
        }
        log::info!(
            "cache loaded: {} peers, {} secret chats",
            self.peers.len(),
            self.secret_chats.len()
        );
        Ok(())
    }

    fn load_peer_vector(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut cur = Cursor::from_slice(bytes);
        let count = read_len(&mut cur, "peer count")?;
        for _ in 0..count {
            let content = read_section(&mut cur, "peer record")?;
            let peer = PeerRecord::from_bytes(content)?;
            self.peers.insert(peer.id, peer);
        }
        Ok(())
    }

    fn load_e2e(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if bytes[0] != E2E_VERSION {
            log::warn!("unknown e2e sub-container version {}, skipping section", bytes[0]);
            return Ok(());
        }
        let mut cur = Cursor::from_slice(&bytes[1..]);
        let count = read_len(&mut cur, "secret chat count")?;
        for _ in 0..count {
            let content = read_section(&mut cur, "secret chat record")?;
            let chat = SecretChatRecord::from_bytes(content)?;
            self.secret_chats.insert(chat.id, chat);
        }
        Ok(())
    }
}

// ─── Container framing helpers ───────────────────────────────────────────────

fn read_len(cur: &mut Cursor<'_>, what: &str) -> Result<usize, StorageError> {
    let n = i32::deserialize(cur)
        .map_err(|_| StorageError::corrupt(format!("truncated {what} length")))?;
    if n < 0 {
        return Err(StorageError::corrupt(format!("negative {what} length: {n}")));
    }
    Ok(n as usize)
}

fn read_section<'a>(cur: &mut Cursor<'a>, what: &str) -> Result<&'a [u8], StorageError> {
    let len = read_len(cur, what)?;
    let remaining = cur.remaining();
    cur.read_slice(len).map_err(|_| {
        StorageError::corrupt(format!(
            "{what} length {len} exceeds remaining buffer ({remaining} bytes)"
        ))
    })
}
