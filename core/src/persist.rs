use crate::signals::SignalSnapshot;
use anyhow::{bail, Result};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Storage for one user's signal snapshot.
pub trait SignalBackend: Send {
    fn name(&self) -> &'static str;
    fn load(&self, user_id: &str) -> Result<Option<SignalSnapshot>>;
    fn save(&self, user_id: &str, snapshot: &SignalSnapshot) -> Result<()>;
    fn remove(&self, user_id: &str) -> Result<()>;
}

/// On-disk layout of a data directory.
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn signals_db(&self) -> PathBuf { self.root.join("signals.sled") }
    pub fn mirror_dir(&self) -> PathBuf { self.root.join("mirror") }
    pub fn user_id(&self) -> PathBuf { self.root.join("user_id") }
    pub fn config(&self) -> PathBuf { self.root.join("config.json") }
}

/// Primary document store: one `sled` tree, JSON snapshot per user id.
pub struct SledBackend {
    tree: sled::Tree,
}

impl SledBackend {
    const TREE: &'static str = "user_signals";

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(Self::TREE)?;
        Ok(Self { tree })
    }

    /// Ephemeral database that vanishes on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(Self::TREE)?;
        Ok(Self { tree })
    }
}

impl SignalBackend for SledBackend {
    fn name(&self) -> &'static str { "sled" }

    fn load(&self, user_id: &str) -> Result<Option<SignalSnapshot>> {
        match self.tree.get(user_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, user_id: &str, snapshot: &SignalSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.tree.insert(user_id.as_bytes(), bytes)?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<()> {
        self.tree.remove(user_id.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}

/// Local fallback: `<dir>/<user_id>.json`, written through a temp file so a
/// crash never leaves half a snapshot behind.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            bail!("user id {user_id:?} is not usable as a file name");
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

impl SignalBackend for JsonFileBackend {
    fn name(&self) -> &'static str { "json-file" }

    fn load(&self, user_id: &str) -> Result<Option<SignalSnapshot>> {
        let path = self.path_for(user_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        Ok(Some(serde_json::from_str(&buf)?))
    }

    fn save(&self, user_id: &str, snapshot: &SignalSnapshot) -> Result<()> {
        let path = self.path_for(user_id)?;
        create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<()> {
        let path = self.path_for(user_id)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Writes go to both backends; reads prefer the primary and fall back when it
/// is empty or failing.
pub struct MirroredBackend<P, F> {
    primary: P,
    fallback: F,
}

impl<P: SignalBackend, F: SignalBackend> MirroredBackend<P, F> {
    pub fn new(primary: P, fallback: F) -> Self { Self { primary, fallback } }
}

impl<P: SignalBackend, F: SignalBackend> SignalBackend for MirroredBackend<P, F> {
    fn name(&self) -> &'static str { "mirrored" }

    fn load(&self, user_id: &str) -> Result<Option<SignalSnapshot>> {
        match self.primary.load(user_id) {
            Ok(Some(snapshot)) => Ok(Some(snapshot)),
            Ok(None) => self.fallback.load(user_id),
            Err(err) => {
                tracing::warn!(error = %err, primary = self.primary.name(), "primary load failed, using fallback");
                self.fallback.load(user_id)
            }
        }
    }

    fn save(&self, user_id: &str, snapshot: &SignalSnapshot) -> Result<()> {
        let primary = self.primary.save(user_id, snapshot);
        let fallback = self.fallback.save(user_id, snapshot);
        match (primary, fallback) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) => {
                tracing::warn!(error = %err, primary = self.primary.name(), "primary save failed, kept fallback copy");
                Ok(())
            }
            (Ok(()), Err(err)) => {
                tracing::warn!(error = %err, fallback = self.fallback.name(), "fallback mirror save failed");
                Ok(())
            }
            (Err(err), Err(_)) => Err(err),
        }
    }

    fn remove(&self, user_id: &str) -> Result<()> {
        let primary = self.primary.remove(user_id);
        self.fallback.remove(user_id)?;
        primary
    }
}

/// The standard backend for a data directory: sled, mirrored to JSON files.
pub fn open_data_dir(paths: &DataPaths) -> Result<MirroredBackend<SledBackend, JsonFileBackend>> {
    create_dir_all(&paths.root)?;
    let primary = SledBackend::open(paths.signals_db())?;
    let fallback = JsonFileBackend::new(paths.mirror_dir());
    Ok(MirroredBackend::new(primary, fallback))
}
