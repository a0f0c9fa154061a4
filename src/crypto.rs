//! Secret store: AES-256-GCM encryption for credential material at rest.
//!
//! A single 32-byte key lives in `<data dir>/.encryption_key` (mode 0600).
//! Ciphertexts are encoded as base64(nonce ‖ tag ‖ ciphertext) so they can be
//! stored directly in the JSON datastore.
//!
//! The key file is shared between processes (an interactive session and a
//! scheduled job), so it is read under a shared lock and created under an
//! exclusive lock. The length is re-checked once the exclusive lock is held,
//! which makes two processes racing to create the key agree on one key.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{BackupError, Result};
use crate::utils::{OWNER_ONLY_MODE, open_for_update, restrict_file_permissions};

/// File name of the encryption key inside the data directory.
pub const KEY_FILE_NAME: &str = ".encryption_key";

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const SELF_TEST_PLAINTEXT: &str = "switchback-encryption-self-test";

/// Owns the encryption key file and performs envelope encryption with it.
pub struct SecretStore {
    key_path: PathBuf,
    key: OnceLock<Zeroizing<[u8; KEY_LEN]>>,
}

impl SecretStore {
    /// Create a store whose key lives in `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_key_path(data_dir.join(KEY_FILE_NAME))
    }

    /// Create a store with an explicit key file path.
    pub fn with_key_path(key_path: PathBuf) -> Self {
        Self {
            key_path,
            key: OnceLock::new(),
        }
    }

    /// Path to the key file.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Return the 32-byte key, generating and persisting it on first use.
    ///
    /// An existing key file is used only if it is exactly 32 bytes long;
    /// anything else is replaced by a freshly generated key.
    pub fn get_or_create_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        if let Some(key) = self.key.get() {
            return Ok(key.clone());
        }

        let key = match self.read_existing_key()? {
            Some(key) => key,
            None => self.create_key()?,
        };
        let _ = self.key.set(key.clone());
        Ok(key)
    }

    fn read_existing_key(&self) -> Result<Option<Zeroizing<[u8; KEY_LEN]>>> {
        let mut file = match File::open(&self.key_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackupError::storage(format!(
                    "cannot open key file {}: {}",
                    self.key_path.display(),
                    e
                )));
            }
        };

        fs2::FileExt::lock_shared(&file)?;
        let mut buf = Zeroizing::new(Vec::with_capacity(KEY_LEN));
        let read = file.read_to_end(&mut buf);
        fs2::FileExt::unlock(&file)?;
        read?;

        let key = key_from_bytes(&buf);
        if key.is_some() {
            // Key files written by older tools may be group or world readable
            if let Err(e) = restrict_file_permissions(&self.key_path) {
                warn!(path = %self.key_path.display(), error = %e, "cannot restrict key file permissions");
            }
        }
        Ok(key)
    }

    fn create_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        if let Some(parent) = self.key_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackupError::storage(format!(
                    "cannot create key directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = open_for_update(&self.key_path, Some(OWNER_ONLY_MODE)).map_err(|e| {
            BackupError::storage(format!(
                "cannot write key file {}: {}",
                self.key_path.display(),
                e
            ))
        })?;

        fs2::FileExt::lock_exclusive(&file)?;
        let result = self.create_key_locked(&mut file);
        fs2::FileExt::unlock(&file)?;
        let key = result?;

        restrict_file_permissions(&self.key_path)?;
        Ok(key)
    }

    fn create_key_locked(&self, file: &mut File) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut existing = Zeroizing::new(Vec::with_capacity(KEY_LEN));
        file.read_to_end(&mut existing)?;
        if let Some(key) = key_from_bytes(&existing) {
            debug!(path = %self.key_path.display(), "key created by another process");
            return Ok(key);
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&key[..])?;
        file.sync_all()?;

        info!(path = %self.key_path.display(), "generated new encryption key");
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.get_or_create_key()?;
        Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| BackupError::encryption(format!("invalid key: {}", e)))
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Returns base64(nonce ‖ tag ‖ ciphertext).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = self
            .cipher()
            .map_err(|e| BackupError::encryption(format!("key unavailable: {}", e)))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        // aes-gcm appends the tag to the ciphertext
        let sealed = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| BackupError::encryption(e.to_string()))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut payload = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(tag);
        payload.extend_from_slice(ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Reverse [`SecretStore::encrypt`].
    ///
    /// Fails if the input is not valid base64, is shorter than nonce plus
    /// tag, or does not authenticate under the current key.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>> {
        let payload = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BackupError::decryption(format!("invalid encoding: {}", e)))?;
        if payload.len() < NONCE_LEN + TAG_LEN {
            return Err(BackupError::decryption(format!(
                "payload too short ({} bytes)",
                payload.len()
            )));
        }

        let (nonce, rest) = payload.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let cipher = self
            .cipher()
            .map_err(|e| BackupError::decryption(format!("key unavailable: {}", e)))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
            .map_err(|_| BackupError::decryption("authentication failed"))
    }

    /// Encrypt a UTF-8 string.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt into a UTF-8 string.
    pub fn decrypt_str(&self, encoded: &str) -> Result<String> {
        let bytes = self.decrypt(encoded)?;
        String::from_utf8(bytes)
            .map_err(|_| BackupError::decryption("plaintext is not valid UTF-8"))
    }

    /// Encrypt and decrypt a fixed plaintext to verify the key works.
    pub fn self_test(&self) -> Result<()> {
        let sealed = self.encrypt_str(SELF_TEST_PLAINTEXT)?;
        let opened = self.decrypt_str(&sealed)?;
        if opened != SELF_TEST_PLAINTEXT {
            return Err(BackupError::decryption("self-test round trip mismatch"));
        }
        Ok(())
    }
}

fn key_from_bytes(bytes: &[u8]) -> Option<Zeroizing<[u8; KEY_LEN]>> {
    if bytes.len() != KEY_LEN {
        return None;
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(bytes);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SecretStore) {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = store();
        for plaintext in [&b""[..], b"a", b"hunter2", &[0u8, 255, 7, 128][..]] {
            let sealed = store.encrypt(plaintext).unwrap();
            assert_eq!(store.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonce_freshness() {
        let (_dir, store) = store();
        let a = store.encrypt_str("same").unwrap();
        let b = store.encrypt_str("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampering_any_byte_fails() {
        let (_dir, store) = store();
        let sealed = store.encrypt_str("enable secret 5 $1$abc").unwrap();
        let payload = STANDARD.decode(&sealed).unwrap();

        for i in 0..payload.len() {
            let mut tampered = payload.clone();
            tampered[i] ^= 0x01;
            let result = store.decrypt(&STANDARD.encode(&tampered));
            assert!(
                matches!(result, Err(BackupError::Decryption(_))),
                "byte {} tamper not detected",
                i
            );
        }
    }

    #[test]
    fn test_short_payload_rejected() {
        let (_dir, store) = store();
        let short = STANDARD.encode([0u8; NONCE_LEN + TAG_LEN - 1]);
        assert!(matches!(
            store.decrypt(&short),
            Err(BackupError::Decryption(_))
        ));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.decrypt("not base64 at all!"),
            Err(BackupError::Decryption(_))
        ));
    }

    #[test]
    fn test_key_persisted_and_reused() {
        let dir = TempDir::new().unwrap();
        let sealed = SecretStore::new(dir.path()).encrypt_str("cisco").unwrap();

        let key_bytes = std::fs::read(dir.path().join(KEY_FILE_NAME)).unwrap();
        assert_eq!(key_bytes.len(), KEY_LEN);

        // A fresh store instance reads the same key back
        let reopened = SecretStore::new(dir.path());
        assert_eq!(reopened.decrypt_str(&sealed).unwrap(), "cisco");
    }

    #[test]
    fn test_wrong_length_key_is_replaced() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(KEY_FILE_NAME), b"short").unwrap();

        let store = SecretStore::new(dir.path());
        store.get_or_create_key().unwrap();

        let key_bytes = std::fs::read(dir.path().join(KEY_FILE_NAME)).unwrap();
        assert_eq!(key_bytes.len(), KEY_LEN);
    }

    #[test]
    fn test_key_mismatch_fails() {
        let (_a, first) = store();
        let (_b, second) = store();
        let sealed = first.encrypt_str("secret").unwrap();
        assert!(matches!(
            second.decrypt(&sealed),
            Err(BackupError::Decryption(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = store();
        store.get_or_create_key().unwrap();
        let mode = std::fs::metadata(dir.path().join(KEY_FILE_NAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_legacy_key_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = store();
        let path = dir.path().join(KEY_FILE_NAME);
        std::fs::write(&path, [7u8; KEY_LEN]).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(&store.get_or_create_key().unwrap()[..], &[7u8; KEY_LEN][..]);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_creation_agrees_on_one_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = SecretStore::new(&path);
                    *store.get_or_create_key().unwrap()
                })
            })
            .collect();
        let keys: Vec<[u8; KEY_LEN]> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_self_test() {
        let (_dir, store) = store();
        store.self_test().unwrap();
    }
}
