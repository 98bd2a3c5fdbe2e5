// 📦 Store snapshot - the whole store file as one opaque byte value
//
// The sync protocol moves snapshots around without looking inside. Anything
// smarter than "overwrite the file" (a merge, say) belongs in `replace_into`,
// not in the transport.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Snapshot {
            bytes: bytes.into(),
        }
    }

    /// Read the entire store file
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Snapshot { bytes })
    }

    /// Overwrite the store file with this snapshot.
    ///
    /// No backup is taken and the write is not atomic: if it is interrupted
    /// the file may be left truncated.
    pub async fn replace_into(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, &self.bytes).await
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 hex digest, for logs only; nothing on the wire checks it
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }

    /// First 12 hex chars of the fingerprint
    pub fn short_fingerprint(&self) -> String {
        let mut full = self.fingerprint();
        full.truncate(12);
        full
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.short_fingerprint())
            .finish()
    }
}
