use super::TokenStore;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Token store backed by a small JSON file, safe against concurrent
/// processes (sibling lock file) and torn writes (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.openfb/tokens.json`.
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".openfb").join("tokens.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
            }
        }
        Ok(())
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        self.ensure_parent()?;

        let lock_file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        lock_file.lock_exclusive()?;
        let out = f();
        let _ = lock_file.unlock();
        out
    }

    fn load_unlocked(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save_unlocked(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(values)?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Load every stored value.
    pub fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        self.with_exclusive_lock(|| self.load_unlocked())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut values = match self.load_unlocked() {
                Ok(values) => values,
                // A corrupt file would otherwise block every later write.
                Err(e) if e.is::<serde_json::Error>() => {
                    tracing::warn!("Replacing unreadable token store {}: {}", self.path.display(), e);
                    BTreeMap::new()
                }
                Err(e) => return Err(e),
            };
            f(&mut values);
            self.save_unlocked(&values)
        })
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                tracing::warn!("Failed to read token store {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        }) {
            tracing::warn!("Failed to write token store {}: {}", self.path.display(), e);
        }
    }

    fn remove(&self, key: &str) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = self.update(|values| {
            values.remove(key);
        }) {
            tracing::warn!("Failed to write token store {}: {}", self.path.display(), e);
        }
    }
}
