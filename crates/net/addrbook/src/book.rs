//! JSON file-based address book with atomic writes.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use rand_08::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use seeder_node_api::{AddressBook, AddressStore};
use tracing::{debug, trace, warn};

use crate::{
    AddressBookError,
    known::{KnownAddress, unix_now},
    routable::is_routable,
};

#[derive(Serialize)]
struct BookFileRef<'a> {
    addrs: Vec<&'a KnownAddress>,
}

#[derive(Deserialize)]
struct BookFile {
    addrs: Vec<KnownAddress>,
}

/// Address book held in memory and written back on save.
pub struct FileAddressBook {
    path: PathBuf,
    strict: bool,
    addrs: RwLock<BTreeMap<SocketAddr, KnownAddress>>,
    /// Set by mutations, cleared by save. Held for the whole save so that a
    /// mutation racing a save is never marked clean.
    dirty: Mutex<bool>,
}

impl std::fmt::Debug for FileAddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAddressBook")
            .field("path", &self.path)
            .field("strict", &self.strict)
            .field("size", &self.addrs.read().len())
            .finish_non_exhaustive()
    }
}

impl FileAddressBook {
    /// Load the book at `path`, or start empty if there is no file yet.
    ///
    /// Parent directories are created. Nothing is written until the first save.
    pub fn open(path: impl Into<PathBuf>, strict: bool) -> Result<Self, AddressBookError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let addrs = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), known = addrs.len(), strict, "Opened address book");

        Ok(Self {
            path,
            strict,
            addrs: RwLock::new(addrs),
            dirty: Mutex::new(false),
        })
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<SocketAddr, KnownAddress>, AddressBookError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let book: BookFile = serde_json::from_reader(reader)
            .map_err(|e| AddressBookError::Serialization(e.to_string()))?;

        Ok(book.addrs.into_iter().map(|known| (known.addr, known)).collect())
    }

    fn save_to_file(&self) -> Result<(), AddressBookError> {
        let bytes = {
            let addrs = self.addrs.read();
            let book = BookFileRef {
                addrs: addrs.values().collect(),
            };
            serde_json::to_vec_pretty(&book)
                .map_err(|e| AddressBookError::Serialization(e.to_string()))?
        };

        // Write to temp file first, then rename (atomic)
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Callers must not hold the `addrs` lock.
    fn mark_dirty(&self) {
        *self.dirty.lock() = true;
    }

    fn accepts(&self, addr: &SocketAddr) -> bool {
        addr.port() != 0
            && !addr.ip().is_unspecified()
            && (!self.strict || is_routable(addr.ip()))
    }

    fn update(&self, addr: &SocketAddr, f: impl FnOnce(&mut KnownAddress)) {
        let updated = match self.addrs.write().get_mut(addr) {
            Some(known) => {
                f(known);
                true
            }
            None => false,
        };
        if updated {
            self.mark_dirty();
        }
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty.lock()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<KnownAddress> {
        self.addrs.read().get(addr).cloned()
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.addrs.read().contains_key(addr)
    }
}

impl AddressBook for FileAddressBook {
    type Error = AddressBookError;

    fn size(&self) -> usize {
        self.addrs.read().len()
    }

    fn save(&self) -> Result<(), AddressBookError> {
        let mut dirty = self.dirty.lock();
        self.save_to_file()?;
        *dirty = false;
        trace!(path = %self.path.display(), "Saved address book");
        Ok(())
    }
}

impl AddressStore for FileAddressBook {
    fn add_address(&self, addr: SocketAddr, src: Option<SocketAddr>) -> bool {
        if !self.accepts(&addr) {
            trace!(%addr, strict = self.strict, "Ignoring unroutable address");
            return false;
        }

        let inserted = match self.addrs.write().entry(addr) {
            Entry::Vacant(entry) => {
                entry.insert(KnownAddress::new(addr, src, unix_now()));
                true
            }
            Entry::Occupied(_) => false,
        };
        if inserted {
            self.mark_dirty();
        }
        inserted
    }

    fn mark_attempt(&self, addr: SocketAddr) {
        let now = unix_now();
        self.update(&addr, |known| known.mark_attempt(now));
    }

    fn mark_good(&self, addr: SocketAddr) {
        let now = unix_now();
        self.update(&addr, |known| known.mark_good(now));
    }

    fn sample(&self, max: usize) -> Vec<SocketAddr> {
        let addrs: Vec<SocketAddr> = self.addrs.read().keys().copied().collect();
        addrs
            .choose_multiple(&mut rand_08::thread_rng(), max)
            .copied()
            .collect()
    }

    fn dial_candidates(&self, max: usize, retry_after: Duration) -> Vec<SocketAddr> {
        let now = unix_now();
        let retry_after = retry_after.as_secs();

        let mut due: Vec<(u32, u64, SocketAddr)> = self
            .addrs
            .read()
            .values()
            .filter(|known| known.is_due(now, retry_after))
            .map(|known| (known.attempts, known.last_attempt.unwrap_or_default(), known.addr))
            .collect();
        due.sort_unstable();

        due.into_iter().take(max).map(|(_, _, addr)| addr).collect()
    }
}

impl Drop for FileAddressBook {
    fn drop(&mut self) {
        if self.is_dirty()
            && let Err(e) = self.save_to_file()
        {
            warn!(path = %self.path.display(), error = %e, "Failed to save address book on drop");
        }
    }
}
