//! Persistenza del token di autenticazione
//!
//! Lo store e' l'unico percorso di scrittura della credenziale. Non tiene copie
//! in memoria: ogni lettura va al supporto, cosi' tutti i lettori (anche altre
//! istanze che condividono lo stesso supporto) vedono lo stesso valore.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// Nome dello slot che contiene il bearer token
pub const TOKEN_KEY: &str = "token";

/// Supporto key-value sincrono e durevole
pub trait StorageMedium: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()>;
    fn remove_item(&self, key: &str) -> std::io::Result<()>;
}

/// Supporto in memoria; i cloni condividono gli stessi dati
#[derive(Clone, Default)]
pub struct MemoryMedium {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> std::io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Supporto su file: un documento JSON `{ chiave: valore }` sostituito in modo atomico
pub struct FileMedium {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!("Lettura storage {} fallita: {}", self.path.display(), e);
                return HashMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Storage {} corrotto, ignorato: {}", self.path.display(), e);
            HashMap::new()
        })
    }

    fn store(&self, items: &HashMap<String, String>) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, items)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StorageMedium for FileMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load();
        items.insert(key.to_string(), value.to_string());
        self.store(&items)
    }

    fn remove_item(&self, key: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load();
        if items.remove(key).is_some() {
            self.store(&items)?;
        }
        Ok(())
    }
}

type SharedMedium = Arc<dyn StorageMedium>;

/// Store della credenziale. Senza supporto (prima dell'idratazione) ogni
/// lettura restituisce `None` e le scritture sono ignorate.
#[derive(Clone, Default)]
pub struct CredentialStore {
    medium: Arc<RwLock<Option<SharedMedium>>>,
}

impl CredentialStore {
    /// Store senza supporto persistente
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_medium(medium: impl StorageMedium + 'static) -> Self {
        let store = Self::detached();
        store.attach(medium);
        store
    }

    /// Collega il supporto quando diventa disponibile
    pub fn attach(&self, medium: impl StorageMedium + 'static) {
        let mut slot = self.medium.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(medium));
    }

    pub fn is_attached(&self) -> bool {
        self.medium
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_medium(&self) -> Option<SharedMedium> {
        self.medium
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self) -> Option<String> {
        let medium = self.current_medium()?;
        medium
            .get_item(TOKEN_KEY)
            .filter(|token| !token.is_empty())
    }

    /// Salva il token. Ritorna `true` solo se il valore persistito e' cambiato;
    /// i fallimenti di scrittura vengono solo loggati.
    pub fn set(&self, token: &str) -> bool {
        match self.try_set(token) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!("Salvataggio token fallito: {}", e);
                false
            }
        }
    }

    /// Come [`set`](Self::set), ma un token non persistito (supporto assente o
    /// scrittura fallita) e' un errore e non un "nessun cambiamento".
    pub fn try_set(&self, token: &str) -> std::io::Result<bool> {
        let Some(medium) = self.current_medium() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "storage non disponibile",
            ));
        };

        if medium.get_item(TOKEN_KEY).as_deref() == Some(token) {
            return Ok(false);
        }

        medium.set_item(TOKEN_KEY, token)?;
        tracing::debug!("Token salvato ({})", fingerprint(token));
        Ok(true)
    }

    /// Rimuove il token. Ritorna `true` solo se c'era qualcosa da rimuovere.
    pub fn clear(&self) -> bool {
        let Some(medium) = self.current_medium() else {
            return false;
        };

        if medium.get_item(TOKEN_KEY).is_none() {
            return false;
        }

        match medium.remove_item(TOKEN_KEY) {
            Ok(()) => {
                tracing::debug!("Token rimosso");
                true
            }
            Err(e) => {
                tracing::warn!("Rimozione token fallita: {}", e);
                false
            }
        }
    }
}

/// Impronta breve del token, da usare nei log al posto del valore
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(10);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_store_is_absent() {
        let store = CredentialStore::detached();
        assert_eq!(store.get(), None);
        assert!(!store.set("tok"));
        assert!(store.try_set("tok").is_err());
        assert!(!store.clear());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_failed_write_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = CredentialStore::with_medium(FileMedium::new(blocker.join("credentials.json")));
        assert!(store.try_set("tok123").is_err());
        assert!(!store.set("tok123"));
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_attach_rehydrates() {
        let medium = MemoryMedium::new();
        medium.set_item(TOKEN_KEY, "saved").unwrap();

        let store = CredentialStore::detached();
        assert_eq!(store.get(), None);

        store.attach(medium);
        assert!(store.is_attached());
        assert_eq!(store.get().as_deref(), Some("saved"));
    }

    #[test]
    fn test_set_and_clear_are_idempotent() {
        let store = CredentialStore::with_medium(MemoryMedium::new());

        assert!(store.set("tok123"));
        assert!(!store.set("tok123"));
        assert_eq!(store.get().as_deref(), Some("tok123"));

        assert!(store.clear());
        assert!(!store.clear());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_clones_share_the_same_value() {
        let medium = MemoryMedium::new();
        let tab_a = CredentialStore::with_medium(medium.clone());
        let tab_b = CredentialStore::with_medium(medium);

        tab_a.set("shared");
        assert_eq!(tab_b.get().as_deref(), Some("shared"));

        tab_b.clear();
        assert_eq!(tab_a.get(), None);
    }

    #[test]
    fn test_file_medium_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("credentials.json");

        let store = CredentialStore::with_medium(FileMedium::new(&path));
        assert!(store.set("persisted"));

        let reopened = CredentialStore::with_medium(FileMedium::new(&path));
        assert_eq!(reopened.get().as_deref(), Some("persisted"));

        assert!(reopened.clear());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_corrupted_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let store = CredentialStore::with_medium(FileMedium::new(&path));
        assert_eq!(store.get(), None);
        assert!(store.set("fresh"));
        assert_eq!(store.get().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_fingerprint_hides_token() {
        let print = fingerprint("tok123");
        assert_eq!(print.len(), 10);
        assert!(!print.contains("tok123"));
        assert_eq!(print, fingerprint("tok123"));
    }
}
