//! Persistent per-region keypair storage.
//!
//! Keys are written as a sibling temp file plus atomic rename so that a
//! crash mid-write never leaves a partially-written key on disk (spec.md
//! 4.1: "the keypair file for a region is either fully written with correct
//! permissions or absent"). The enclosing directory is `0700`; the
//! private-key file is `0600`. The public key is also persisted (`0644`) so
//! callers don't need to recompute it, but it is never treated as the
//! source of truth for `age()`.

use crate::material::{KeyError, KeyGenerator, Keypair, NativeKeyGenerator, PrivateKey};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Owns WireGuard keypairs for every configured region on disk.
pub struct KeyStore {
    base_dir: PathBuf,
    generator: Box<dyn KeyGenerator>,
}

impl KeyStore {
    /// `base_dir` is typically `<config-dir>/keys`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_generator(base_dir, Box::new(NativeKeyGenerator))
    }

    pub fn with_generator(base_dir: impl Into<PathBuf>, generator: Box<dyn KeyGenerator>) -> Self {
        Self {
            base_dir: base_dir.into(),
            generator,
        }
    }

    fn private_key_path(&self, region_id: &str) -> PathBuf {
        self.base_dir.join(format!("{region_id}.key"))
    }

    fn public_key_path(&self, region_id: &str) -> PathBuf {
        self.base_dir.join(format!("{region_id}.pub"))
    }

    fn ensure_dir(&self) -> Result<(), KeyStoreError> {
        fs::create_dir_all(&self.base_dir).map_err(KeyStoreError::Io)?;
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.base_dir)
                .map_err(KeyStoreError::Io)?
                .permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&self.base_dir, perms).map_err(KeyStoreError::Io)?;
        }
        Ok(())
    }

    /// Returns the persisted keypair for `region_id`, or generates,
    /// persists, and returns a new one.
    pub fn load_or_create(&self, region_id: &str) -> Result<Keypair, KeyStoreError> {
        let key_path = self.private_key_path(region_id);
        if key_path.exists() {
            return self.load(region_id);
        }

        info!(region_id, "no keypair on disk, generating one");
        let private = self.generator.generate();
        let created_at = SystemTime::now();
        self.persist(region_id, &private, created_at)?;
        Ok(Keypair::from_private(private, created_at))
    }

    /// Unconditionally replaces the keypair. The previous private key is
    /// overwritten; the file is re-created.
    pub fn rotate(&self, region_id: &str) -> Result<Keypair, KeyStoreError> {
        info!(region_id, "rotating keypair");
        let private = self.generator.generate();
        let created_at = SystemTime::now();
        self.persist(region_id, &private, created_at)?;
        Ok(Keypair::from_private(private, created_at))
    }

    /// Age of the persisted keypair, used by the rotation policy.
    pub fn age(&self, region_id: &str) -> Result<Duration, KeyStoreError> {
        let meta = fs::metadata(self.private_key_path(region_id)).map_err(KeyStoreError::Io)?;
        let modified = meta.modified().map_err(KeyStoreError::Io)?;
        SystemTime::now()
            .duration_since(modified)
            .map_err(|_| KeyStoreError::ClockSkew)
    }

    fn load(&self, region_id: &str) -> Result<Keypair, KeyStoreError> {
        let raw = fs::read_to_string(self.private_key_path(region_id)).map_err(KeyStoreError::Io)?;
        let private = PrivateKey::from_base64(raw.trim()).map_err(KeyStoreError::Key)?;
        let created_at = fs::metadata(self.private_key_path(region_id))
            .and_then(|m| m.modified())
            .map_err(KeyStoreError::Io)?;
        Ok(Keypair::from_private(private, created_at))
    }

    fn persist(
        &self,
        region_id: &str,
        private: &PrivateKey,
        _created_at: SystemTime,
    ) -> Result<(), KeyStoreError> {
        self.ensure_dir()?;

        let key_path = self.private_key_path(region_id);
        let pub_path = self.public_key_path(region_id);

        write_atomic(&key_path, private.to_base64().as_bytes(), 0o600)?;
        write_atomic(
            &pub_path,
            private.public_key().to_base64().as_bytes(),
            0o644,
        )?;

        debug!(region_id, path = %key_path.display(), "keypair persisted");
        Ok(())
    }

    /// Removes the keypair for a region (region removal, spec.md 3
    /// "destroyed on region removal or rotation").
    pub fn delete(&self, region_id: &str) -> Result<(), KeyStoreError> {
        for path in [
            self.private_key_path(region_id),
            self.public_key_path(region_id),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(KeyStoreError::Io(e)),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), KeyStoreError> {
    let dir = path.parent().ok_or(KeyStoreError::InvalidPath)?;
    let tmp_name = format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .ok_or(KeyStoreError::InvalidPath)?
    );
    let tmp_path = dir.join(tmp_name);

    fs::write(&tmp_path, contents).map_err(KeyStoreError::Io)?;
    let mut perms = fs::metadata(&tmp_path).map_err(KeyStoreError::Io)?.permissions();
    perms.set_mode(mode);
    fs::set_permissions(&tmp_path, perms).map_err(KeyStoreError::Io)?;

    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "atomic rename failed, cleaning up temp file");
            let _ = fs::remove_file(&tmp_path);
            Err(KeyStoreError::Io(e))
        }
    }
}

#[cfg(not(unix))]
fn write_atomic(path: &Path, contents: &[u8], _mode: u32) -> Result<(), KeyStoreError> {
    let dir = path.parent().ok_or(KeyStoreError::InvalidPath)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("key")
    ));
    fs::write(&tmp_path, contents).map_err(KeyStoreError::Io)?;
    fs::rename(&tmp_path, path).map_err(KeyStoreError::Io)
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("io error: {0}")]
    Io(#[source] io::Error),
    #[error("stored key is invalid: {0}")]
    Key(#[source] KeyError),
    #[error("system clock went backwards")]
    ClockSkew,
    #[error("invalid key path")]
    InvalidPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn load_or_create_generates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let kp1 = store.load_or_create("us-east").unwrap();
        let kp2 = store.load_or_create("us-east").unwrap();

        assert_eq!(kp1.private.to_bytes(), kp2.private.to_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn permissions_are_restrictive() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.load_or_create("us-east").unwrap();

        assert_eq!(mode_of(dir.path()), 0o700);
        assert_eq!(mode_of(&store.private_key_path("us-east")), 0o600);
    }

    #[test]
    fn rotate_replaces_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let kp1 = store.load_or_create("us-east").unwrap();
        let kp2 = store.rotate("us-east").unwrap();

        assert_ne!(kp1.private.to_bytes(), kp2.private.to_bytes());

        let kp3 = store.load_or_create("us-east").unwrap();
        assert_eq!(kp2.private.to_bytes(), kp3.private.to_bytes());
    }

    #[test]
    fn age_reflects_persisted_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.load_or_create("us-east").unwrap();

        let age = store.age("us-east").unwrap();
        assert!(age < Duration::from_secs(5));
    }

    #[test]
    fn delete_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.load_or_create("us-east").unwrap();
        store.delete("us-east").unwrap();

        assert!(store.age("us-east").is_err());
    }

    #[test]
    fn no_partial_file_left_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        store.load_or_create("us-east").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert!(entries.iter().all(|n| !n.ends_with(".tmp")));
    }
}
