//! The boundary to the underlying MTProto client.
//!
//! This layer never speaks the wire protocol itself — encryption, transport
//! and RPC framing live in the injected client, reached exclusively through
//! [`MtprotoClient`].  Errors crossing the boundary are carried unmodified;
//! see [`ClientError`](crate::ClientError).

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::errors::ClientError;
use crate::session::PeerRecord;

/// Reference to a peer, as accepted by [`MtprotoClient::resolve_peer`].
#[derive(Clone, Debug, PartialEq)]
pub enum PeerRef {
    Id(i64),
    Username(String),
}

impl From<i64> for PeerRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PeerRef {
    fn from(username: &str) -> Self {
        Self::Username(username.trim_start_matches('@').to_string())
    }
}

/// Location of a remote file, opaque to this layer.
#[derive(Clone, Debug, PartialEq)]
pub struct FileLocation {
    pub dc_id:          u8,
    pub id:             i64,
    pub access_hash:    i64,
    pub file_reference: Vec<u8>,
}

/// Handle to a file uploaded through the client.
#[derive(Clone, Debug, PartialEq)]
pub struct FileHandle {
    pub id:    i64,
    pub parts: i32,
    pub name:  String,
}

/// Progress callback: `(transferred bytes, total bytes if known)`.
pub type ProgressFn = Box<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Byte stream handed across the boundary.
pub type ByteStream = Box<dyn AsyncRead + Unpin + Send>;

/// The collaborator contract consumed from the underlying client layer.
#[async_trait]
pub trait MtprotoClient: Send + Sync {
    /// Send a serialized request and return the raw response bytes.
    async fn invoke(&self, request: &[u8]) -> Result<Vec<u8>, ClientError>;

    /// Resolve a chat id or username into a peer record usable in requests.
    async fn resolve_peer(&self, peer: PeerRef) -> Result<PeerRecord, ClientError>;

    /// Open a byte stream over a remote file.
    async fn download_stream(&self, location: &FileLocation) -> Result<ByteStream, ClientError>;

    /// Upload an in-memory buffer.
    async fn save_file(
        &self,
        source:   &[u8],
        filename: &str,
        progress: Option<ProgressFn>,
    ) -> Result<FileHandle, ClientError>;

    /// Upload from a readable source.
    async fn save_file_stream(
        &self,
        source:   ByteStream,
        filename: &str,
        progress: Option<ProgressFn>,
    ) -> Result<FileHandle, ClientError>;
}
