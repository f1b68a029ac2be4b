//! Node identity lifecycle.
//!
//! The identity is a secp256k1 signing key persisted as JSON
//! (`{"priv_key": "<hex>"}`). The [`NodeId`] is the address derived from its
//! public key, so loading the same file always yields the same id.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use alloy_signer::k256::ecdsa::SigningKey;
use alloy_signer_local::LocalSigner;
use seeder_node_api::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Length of a secp256k1 secret scalar.
const SECRET_KEY_LEN: usize = 32;

/// Errors loading or creating the node identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The file could not be read or written for a reason other than absence.
    #[error("identity file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file exists but does not hold a valid key.
    #[error("identity file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl IdentityError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// On-disk representation.
#[derive(Serialize, Deserialize)]
struct NodeKeyFile {
    priv_key: String,
}

/// Persistent keypair of this node.
#[derive(Clone)]
pub struct NodeKey {
    signer: LocalSigner<SigningKey>,
    node_id: NodeId,
}

impl std::fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKey")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

impl NodeKey {
    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand_08::thread_rng()))
    }

    /// Wrap an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let signer = LocalSigner::from_signing_key(signing_key);
        let node_id = NodeId::new(signer.address());
        Self { signer, node_id }
    }

    /// The stable identifier derived from the public key.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Load the key at `path`, or generate and persist one if the file is absent.
    pub fn load_or_generate(path: &Path) -> Result<Self, IdentityError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let key = Self::parse(path, &contents)?;
                info!(node_id = %key.node_id, path = %path.display(), "Loaded node key");
                Ok(key)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let key = Self::random();
                key.save(path)?;
                info!(node_id = %key.node_id, path = %path.display(), "Generated new node key");
                Ok(key)
            }
            Err(e) => Err(IdentityError::io(path, e)),
        }
    }

    /// Load the key at `path`. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let contents = fs::read_to_string(path).map_err(|e| IdentityError::io(path, e))?;
        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, IdentityError> {
        let file: NodeKeyFile =
            serde_json::from_str(contents).map_err(|e| IdentityError::corrupt(path, e))?;
        let bytes = hex::decode(file.priv_key.trim_start_matches("0x"))
            .map_err(|e| IdentityError::corrupt(path, e))?;
        if bytes.len() != SECRET_KEY_LEN {
            return Err(IdentityError::corrupt(
                path,
                format!("expected {SECRET_KEY_LEN} key bytes, got {}", bytes.len()),
            ));
        }
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| IdentityError::corrupt(path, e))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Atomically write the key to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<(), IdentityError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IdentityError::io(parent, e))?;
        }

        let file = NodeKeyFile {
            priv_key: hex::encode(self.signer.credential().to_bytes()),
        };
        let json =
            serde_json::to_vec_pretty(&file).map_err(|e| IdentityError::corrupt(path, e))?;

        // Write to temp file first, then rename (atomic)
        let tmp_path = path.with_extension("json.tmp");
        write_secret(&tmp_path, &json).map_err(|e| IdentityError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| IdentityError::io(path, e))?;

        debug!(path = %path.display(), "Persisted node key");
        Ok(())
    }
}

fn write_secret(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(crate::constants::SECRET_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_then_load_is_deterministic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node_key.json");

        let created = NodeKey::load_or_generate(&path).unwrap();
        assert!(path.exists());

        let first = NodeKey::load_or_generate(&path).unwrap();
        let second = NodeKey::load_or_generate(&path).unwrap();
        assert_eq!(created.node_id(), first.node_id());
        assert_eq!(first.node_id(), second.node_id());
        assert_eq!(NodeKey::load(&path).unwrap().node_id(), created.node_id());
    }

    #[test]
    fn test_distinct_files_distinct_ids() {
        let dir = tempdir().unwrap();
        let a = NodeKey::load_or_generate(&dir.path().join("a.json")).unwrap();
        let b = NodeKey::load_or_generate(&dir.path().join("b.json")).unwrap();
        assert_ne!(a.node_id(), b.node_id());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("keys").join("node_key.json");
        NodeKey::load_or_generate(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("node_key.json");
        NodeKey::load_or_generate(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_known_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node_key.json");
        fs::write(
            &path,
            r#"{"priv_key":"4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"}"#,
        )
        .unwrap();

        let key = NodeKey::load_or_generate(&path).unwrap();
        assert_eq!(
            key.node_id().to_string(),
            "2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        );
    }

    #[test]
    fn test_corrupt_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node_key.json");

        for contents in [
            "not json",
            r#"{"priv_key":"zz"}"#,
            r#"{"priv_key":"abcd"}"#,
            r#"{"priv_key":"0000000000000000000000000000000000000000000000000000000000000000"}"#,
            r#"{"other":"field"}"#,
        ] {
            fs::write(&path, contents).unwrap();
            let err = NodeKey::load_or_generate(&path).unwrap_err();
            assert!(
                matches!(err, IdentityError::Corrupt { .. }),
                "{contents}: {err}"
            );
        }
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        let dir = tempdir().unwrap();
        // A directory where the file should be cannot be read as a key.
        let path = dir.path().join("node_key.json");
        fs::create_dir(&path).unwrap();

        let err = NodeKey::load_or_generate(&path).unwrap_err();
        assert!(matches!(err, IdentityError::Io { .. }));
    }
}
