use std::fs;
use std::path::PathBuf;

use coil::session::{AUTH_KEY_LEN, SESSION_BLOB_LEN};
use coil::{
    FileBackend, KvBackend, MemoryKv, PeerRecord, SecretChatRecord, SessionBackend, SessionState,
    StorageError,
};
use coil_tl::Serializable;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn user_peer() -> PeerRecord {
    PeerRecord::new(123456789, -987654321, "user")
}

fn bot_peer() -> PeerRecord {
    let mut peer = PeerRecord::new(42, 0x0123_4567_89ab_cdef, "bot");
    peer.usernames = Some(vec!["examplebot".to_owned(), "example_bot".to_owned()]);
    peer
}

fn contact_peer() -> PeerRecord {
    let mut peer = PeerRecord::new(-1001234567890, 7, "channel");
    peer.phone_number = Some("+15550100".to_owned());
    peer
}

fn full_peer() -> PeerRecord {
    let mut peer = bot_peer();
    peer.phone_number = Some("+15550101".to_owned());
    peer
}

fn sample_secret_chat(mask: u32) -> SecretChatRecord {
    let mut chat = SecretChatRecord::new(77, -42, true, vec![7u8; AUTH_KEY_LEN]);
    chat.in_seq_no = 3;
    chat.out_seq_no = 4;
    chat.in_seq_no_x = 1;
    chat.out_seq_no_x = 2;
    chat.time_rekey = 98;
    chat.created = 1_699_999_999.5;
    chat.changed = 1_700_000_001.25;
    if mask & 1 != 0 {
        chat.rekey_step = Some(5);
    }
    if mask & 2 != 0 {
        chat.rekey_exchange = Some(0x1122_3344_5566_7788);
    }
    if mask & 4 != 0 {
        chat.admin_id = Some(999);
    }
    if mask & 8 != 0 {
        chat.ttl = Some(60);
    }
    chat
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("coil-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

// ── Record round-trips ────────────────────────────────────────────────────────

#[test]
fn peer_roundtrip_all_optional_combinations() {
    use coil_tl::Deserializable;
    for peer in [user_peer(), bot_peer(), contact_peer(), full_peer()] {
        let decoded = PeerRecord::from_bytes(&peer.to_bytes()).unwrap();
        assert_eq!(decoded, peer);
    }
}

#[test]
fn peer_flags_word_reflects_presence() {
    // Flags are the first i32 of the encoding: bit 6 usernames, bit 5 phone.
    let flags = |peer: &PeerRecord| i32::from_le_bytes(peer.to_bytes()[..4].try_into().unwrap());
    assert_eq!(flags(&user_peer()), 0);
    assert_eq!(flags(&bot_peer()), 1 << 6);
    assert_eq!(flags(&contact_peer()), 1 << 5);
    assert_eq!(flags(&full_peer()), (1 << 6) | (1 << 5));
}

#[test]
fn secret_chat_roundtrip_all_flag_combinations() {
    use coil_tl::Deserializable;
    for mask in 0..16 {
        let chat = sample_secret_chat(mask);
        let decoded = SecretChatRecord::from_bytes(&chat.to_bytes()).unwrap();
        assert_eq!(decoded, chat, "flag combination {mask:#06b}");
    }
}

// ── Cache container ───────────────────────────────────────────────────────────

#[test]
fn cache_container_roundtrip() {
    let mut state = SessionState::new();
    state.put_peer(user_peer());
    state.put_peer(bot_peer());
    state.put_peer(contact_peer());
    state.put_secret_chat(sample_secret_chat(0b1010));
    state.put_secret_chat({
        let mut chat = sample_secret_chat(0b0101);
        chat.id = 78;
        chat
    });

    let blob = state.cache_blob();
    assert_eq!(blob[0], 2, "must emit the current container version");

    let mut loaded = SessionState::new();
    loaded.apply_cache_blob(&blob).unwrap();
    assert_eq!(loaded.peers, state.peers);
    assert_eq!(loaded.secret_chats, state.secret_chats);
    assert_eq!(loaded.peer(42), Some(&bot_peer()));
    assert_eq!(loaded.secret_chat(78).map(|c| c.id), Some(78));
    assert_eq!(loaded.peer(1), None);
}

#[test]
fn legacy_container_loads_like_version_2() {
    // Three records, so the leading count byte cannot be mistaken for a
    // version tag.
    let peers = [user_peer(), bot_peer(), contact_peer()];

    let mut legacy = Vec::new();
    (peers.len() as i32).serialize(&mut legacy);
    for peer in &peers {
        let content = peer.to_bytes();
        (content.len() as i32).serialize(&mut legacy);
        legacy.extend_from_slice(&content);
    }

    let mut from_legacy = SessionState::new();
    from_legacy.apply_cache_blob(&legacy).unwrap();

    let mut current = SessionState::new();
    for peer in peers {
        current.put_peer(peer);
    }
    let mut from_v2 = SessionState::new();
    from_v2.apply_cache_blob(&current.cache_blob()).unwrap();

    assert_eq!(from_legacy.peers, from_v2.peers);
    assert!(from_legacy.secret_chats.is_empty());
}

#[test]
fn empty_cache_blob_is_empty_state() {
    let mut state = SessionState::new();
    state.apply_cache_blob(&[]).unwrap();
    assert!(state.peers.is_empty());
    assert!(state.secret_chats.is_empty());
}

#[test]
fn empty_e2e_section_when_no_secret_chats() {
    let mut state = SessionState::new();
    state.put_peer(user_peer());
    let blob = state.cache_blob();
    // The trailing e2e length must be zero with no bytes after it.
    assert_eq!(&blob[blob.len() - 4..], &0i32.to_le_bytes());
}

#[test]
fn unknown_e2e_version_is_skipped() {
    let mut cache = Vec::new();
    0i32.serialize(&mut cache);
    let e2e = [9u8, 1, 2, 3];

    let mut blob = vec![2u8];
    (cache.len() as i32).serialize(&mut blob);
    blob.extend_from_slice(&cache);
    (e2e.len() as i32).serialize(&mut blob);
    blob.extend_from_slice(&e2e);

    let mut state = SessionState::new();
    state.apply_cache_blob(&blob).unwrap();
    assert!(state.secret_chats.is_empty());
}

// ── Corruption ────────────────────────────────────────────────────────────────

#[test]
fn overlong_section_length_is_corruption() {
    let mut blob = vec![2u8];
    1000i32.serialize(&mut blob); // peer section claims 1000 bytes
    blob.extend_from_slice(&[0u8; 8]);

    let mut state = SessionState::new();
    let err = state.apply_cache_blob(&blob).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt(_)), "got {err:?}");
}

#[test]
fn negative_section_length_is_corruption() {
    let mut blob = vec![2u8];
    (-5i32).serialize(&mut blob);

    let mut state = SessionState::new();
    let err = state.apply_cache_blob(&blob).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt(_)));
}

#[test]
fn truncated_record_is_a_wire_error() {
    // Framing is fine (the record's declared length bounds real bytes) but
    // the record itself is cut short.
    let mut cache = Vec::new();
    1i32.serialize(&mut cache);
    2i32.serialize(&mut cache);
    cache.extend_from_slice(&[0xAA, 0xBB]);

    let mut blob = vec![2u8];
    (cache.len() as i32).serialize(&mut blob);
    blob.extend_from_slice(&cache);
    0i32.serialize(&mut blob);

    let mut state = SessionState::new();
    let err = state.apply_cache_blob(&blob).unwrap_err();
    assert!(matches!(err, StorageError::Wire(_)), "got {err:?}");
}

// ── Session blob ──────────────────────────────────────────────────────────────

#[test]
fn session_blob_layout_and_roundtrip() {
    let mut state = SessionState::new();
    state.dc_id = 5;
    state.api_id = 12345;
    state.test_mode = false;
    state.auth_key = [0u8; AUTH_KEY_LEN];
    state.user_id = 987654321;
    state.is_bot = true;

    let blob = state.session_blob();
    assert_eq!(blob.len(), SESSION_BLOB_LEN);
    assert_eq!(blob[0], 5);
    assert_eq!(&blob[1..5], &12345u32.to_le_bytes());
    assert_eq!(blob[5], 0);
    assert_eq!(&blob[262..270], &987654321u64.to_be_bytes());
    assert_eq!(blob[270], 1);

    let mut loaded = SessionState::new();
    loaded.apply_session_blob(&blob).unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn session_blob_ignores_trailing_bytes() {
    let mut state = SessionState::new();
    state.dc_id = 2;
    state.user_id = 44;

    let mut bytes = state.session_blob().to_vec();
    bytes.extend_from_slice(b"higher-layer data");

    let mut loaded = SessionState::new();
    loaded.apply_session_blob(&bytes).unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn short_session_blob_is_corruption() {
    let mut state = SessionState::new();
    let err = state.apply_session_blob(&[0u8; 100]).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt(_)));
}

#[test]
fn session_string_roundtrip() {
    let mut state = SessionState::new();
    state.dc_id = 4;
    state.api_id = 1_048_576;
    state.auth_key = [0x5a; AUTH_KEY_LEN];
    state.user_id = -1; // must survive the unsigned big-endian encoding
    state.is_bot = false;

    let exported = state.export_string();
    let mut imported = SessionState::new();
    imported.import_string(&exported).unwrap();
    assert_eq!(imported, state);
}

// ── Backends ──────────────────────────────────────────────────────────────────

fn populated_state() -> SessionState {
    let mut state = SessionState::new();
    state.dc_id = 2;
    state.api_id = 424242;
    state.test_mode = true;
    state.auth_key = [0xab; AUTH_KEY_LEN];
    state.user_id = 1_000_000_007;
    state.is_bot = false;
    state.put_peer(full_peer());
    state.put_secret_chat(sample_secret_chat(0b1111));
    state
}

#[test]
fn file_backend_roundtrip() {
    let dir = temp_dir("file-roundtrip");
    let backend = FileBackend::in_dir("bot", &dir);
    assert_eq!(backend.name(), "file");

    let state = populated_state();
    backend.save(&state).unwrap();

    let mut loaded = SessionState::new();
    backend.load(&mut loaded).unwrap();
    assert_eq!(loaded, state);

    backend.delete().unwrap();
    let mut after_delete = SessionState::new();
    backend.load(&mut after_delete).unwrap();
    assert_eq!(after_delete, SessionState::new());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_artifacts_load_as_empty_state() {
    let dir = temp_dir("file-missing");
    let backend = FileBackend::in_dir("nobody", &dir);

    let mut state = SessionState::new();
    backend.load(&mut state).unwrap();
    assert_eq!(state, SessionState::new());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn session_blob_is_written_once() {
    let dir = temp_dir("file-write-once");
    let backend = FileBackend::in_dir("bot", &dir);

    let mut state = populated_state();
    backend.save(&state).unwrap();

    // Login material changes are not re-persisted; cache changes are.
    state.dc_id = 9;
    state.put_peer(user_peer());
    backend.save(&state).unwrap();

    let mut loaded = SessionState::new();
    backend.load(&mut loaded).unwrap();
    assert_eq!(loaded.dc_id, 2);
    assert!(loaded.peers.contains_key(&user_peer().id));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn kv_backend_roundtrip() {
    let backend = KvBackend::new("bot", MemoryKv::new());
    assert_eq!(backend.name(), "key-value");

    let state = populated_state();
    backend.save(&state).unwrap();

    let mut loaded = SessionState::new();
    backend.load(&mut loaded).unwrap();
    assert_eq!(loaded, state);

    backend.delete().unwrap();
    let mut after_delete = SessionState::new();
    backend.load(&mut after_delete).unwrap();
    assert_eq!(after_delete, SessionState::new());
}

#[test]
fn backends_store_identical_bytes() {
    use base64::Engine as _;
    use coil::KvStore;

    let dir = temp_dir("byte-identical");
    let file = FileBackend::in_dir("twin", &dir);
    let kv = KvBackend::new("twin", MemoryKv::new());

    // A single record per map keeps the encoding independent of map
    // iteration order.
    let mut state = SessionState::new();
    state.dc_id = 1;
    state.auth_key = [0x11; AUTH_KEY_LEN];
    state.put_peer(bot_peer());
    state.put_secret_chat(sample_secret_chat(0b0011));

    file.save(&state).unwrap();
    kv.save(&state).unwrap();

    let std64 = base64::engine::general_purpose::STANDARD;
    let kv_session = std64.decode(kv.store().get("twin.session").unwrap()).unwrap();
    let kv_cache = std64.decode(kv.store().get("twin.cache").unwrap()).unwrap();
    assert_eq!(kv_session, fs::read(dir.join("twin.session")).unwrap());
    assert_eq!(kv_cache, fs::read(dir.join("twin.cache")).unwrap());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn generate_name_skips_taken_names() {
    let dir = temp_dir("gen-name");
    assert_eq!(
        FileBackend::generate_name("bot", &dir, "session", &dir, "cache"),
        "bot"
    );
    fs::write(dir.join("bot.session"), b"").unwrap();
    assert_eq!(
        FileBackend::generate_name("bot", &dir, "session", &dir, "cache"),
        "bot1"
    );
    fs::write(dir.join("bot1.cache"), b"").unwrap();
    assert_eq!(
        FileBackend::generate_name("bot", &dir, "session", &dir, "cache"),
        "bot2"
    );
    fs::remove_dir_all(&dir).unwrap();
}
