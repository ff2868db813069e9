use super::{normalize_rows, RawStatusRow, StatusBackend, StatusFlags, StatusMap, StatusRequest, WishlistEntryId};
use crate::auth::UserSession;
use crate::catalog::WineryId;
use crate::error::StatusError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// Status rows of every user, keyed by user id
#[derive(Default, Debug)]
struct Ledger {
    users: HashMap<String, StatusMap>,
}

impl Ledger {
    fn user(&mut self, user: &UserSession) -> &mut StatusMap {
        self.users.entry(user.user_id.clone()).or_default()
    }

    fn fetch(&self, user: &UserSession, request: &StatusRequest) -> StatusMap {
        self.users
            .get(&user.user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|(id, _)| request.wants(id))
                    .map(|(id, flags)| (id.clone(), flags.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_favorite(&mut self, user: &UserSession, id: &WineryId, favorite: bool) {
        self.user(user).entry(id.clone()).or_default().is_favorite = favorite;
    }

    fn add_to_wishlist(&mut self, user: &UserSession, id: &WineryId) -> WishlistEntryId {
        let flags = self.user(user).entry(id.clone()).or_default();
        let entry = flags
            .wishlist_entry
            .clone()
            .unwrap_or_else(|| WishlistEntryId(format!("wl-{}-{}", user.user_id, id)));
        flags.is_want_to_visit = true;
        flags.wishlist_entry = Some(entry.clone());
        entry
    }

    fn remove_from_wishlist(&mut self, user: &UserSession, entry: &WishlistEntryId) -> Result<(), StatusError> {
        let flags = self
            .user(user)
            .values_mut()
            .find(|flags| flags.wishlist_entry.as_ref() == Some(entry))
            .ok_or_else(|| StatusError::UnknownWishlistEntry(entry.0.clone()))?;
        flags.is_want_to_visit = false;
        flags.wishlist_entry = None;
        Ok(())
    }

    fn clear_wishlist(&mut self, user: &UserSession, id: &WineryId) {
        if let Some(flags) = self.user(user).get_mut(id) {
            flags.is_want_to_visit = false;
            flags.wishlist_entry = None;
        }
    }

    fn record_visit(&mut self, user: &UserSession, id: &WineryId, date: NaiveDate) {
        let flags = self.user(user).entry(id.clone()).or_default();
        flags.visited = true;
        flags.visit_count += 1;
        flags.last_visit_date = Some(flags.last_visit_date.map_or(date, |last| last.max(date)));
    }
}

/// In-process backend. `set_available(false)` simulates an outage.
#[derive(Debug)]
pub struct MemoryStatusStore {
    ledger: RwLock<Ledger>,
    available: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Seed one user's rows
    pub fn with_user(self, user_id: &str, rows: StatusMap) -> Self {
        if let Ok(mut ledger) = self.ledger.write() {
            ledger.users.insert(user_id.to_string(), rows);
        }
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StatusError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StatusError::Unavailable("backend offline".to_string()))
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Result<T, StatusError> {
        self.check_available()?;
        let ledger = self
            .ledger
            .read()
            .map_err(|_| StatusError::Unavailable("status ledger poisoned".to_string()))?;
        Ok(f(&ledger))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T, StatusError>) -> Result<T, StatusError> {
        self.check_available()?;
        let mut ledger = self
            .ledger
            .write()
            .map_err(|_| StatusError::Unavailable("status ledger poisoned".to_string()))?;
        f(&mut ledger)
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBackend for MemoryStatusStore {
    fn fetch(&self, user: &UserSession, request: &StatusRequest) -> Result<StatusMap, StatusError> {
        self.read(|ledger| ledger.fetch(user, request))
    }

    fn set_favorite(&self, user: &UserSession, id: &WineryId, favorite: bool) -> Result<(), StatusError> {
        self.write(|ledger| {
            ledger.set_favorite(user, id, favorite);
            Ok(())
        })
    }

    fn add_to_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<WishlistEntryId, StatusError> {
        self.write(|ledger| Ok(ledger.add_to_wishlist(user, id)))
    }

    fn remove_from_wishlist(&self, user: &UserSession, entry: &WishlistEntryId) -> Result<(), StatusError> {
        self.write(|ledger| ledger.remove_from_wishlist(user, entry))
    }

    fn clear_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<(), StatusError> {
        self.write(|ledger| {
            ledger.clear_wishlist(user, id);
            Ok(())
        })
    }

    fn record_visit(&self, user: &UserSession, id: &WineryId, date: NaiveDate) -> Result<(), StatusError> {
        self.write(|ledger| {
            ledger.record_visit(user, id, date);
            Ok(())
        })
    }
}

/// On-disk layout: `{"users": {"<user id>": [row, ...]}}`
#[derive(Deserialize)]
struct StoredFile {
    #[serde(default)]
    users: HashMap<String, Vec<RawStatusRow>>,
}

/// Canonical row written back to disk
#[derive(Serialize)]
struct CanonicalRow<'a> {
    winery_id: &'a str,
    visited: bool,
    visit_count: u32,
    last_visit_date: Option<NaiveDate>,
    is_favorite: bool,
    is_want_to_visit: bool,
    wishlist_id: Option<&'a str>,
}

#[derive(Serialize)]
struct CanonicalFile<'a> {
    users: HashMap<&'a str, Vec<CanonicalRow<'a>>>,
}

impl<'a> CanonicalRow<'a> {
    fn new(id: &'a WineryId, flags: &'a StatusFlags) -> Self {
        Self {
            winery_id: id.as_str(),
            visited: flags.visited,
            visit_count: flags.visit_count,
            last_visit_date: flags.last_visit_date,
            is_favorite: flags.is_favorite,
            is_want_to_visit: flags.is_want_to_visit,
            wishlist_id: flags.wishlist_entry.as_ref().map(|e| e.0.as_str()),
        }
    }
}

/// Backend persisted to a JSON file. Every call reloads the file, so
/// edits made outside the app show up on the next fetch.
#[derive(Debug)]
pub struct JsonStatusStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Ledger, StatusError> {
        let mut bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Ledger::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Ledger::default());
        }

        let stored: StoredFile = simd_json::from_slice(&mut bytes)?;
        let users = stored
            .users
            .into_iter()
            .map(|(user, rows)| (user, normalize_rows(rows)))
            .collect();
        Ok(Ledger { users })
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StatusError> {
        let users = ledger
            .users
            .iter()
            .map(|(user, rows)| {
                let mut canonical: Vec<_> = rows.iter().map(|(id, flags)| CanonicalRow::new(id, flags)).collect();
                canonical.sort_by(|a, b| a.winery_id.cmp(b.winery_id));
                (user.as_str(), canonical)
            })
            .collect();
        let bytes = simd_json::to_vec_pretty(&CanonicalFile { users })?;
        fs::write(&self.path, bytes)?;
        debug!(path = %self.path.display(), "status store saved");
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T, StatusError>) -> Result<T, StatusError> {
        let _guard = self
            .io
            .lock()
            .map_err(|_| StatusError::Unavailable("status file lock poisoned".to_string()))?;
        let mut ledger = self.load()?;
        let out = f(&mut ledger)?;
        self.save(&ledger)?;
        Ok(out)
    }
}

impl StatusBackend for JsonStatusStore {
    fn fetch(&self, user: &UserSession, request: &StatusRequest) -> Result<StatusMap, StatusError> {
        let _guard = self
            .io
            .lock()
            .map_err(|_| StatusError::Unavailable("status file lock poisoned".to_string()))?;
        Ok(self.load()?.fetch(user, request))
    }

    fn set_favorite(&self, user: &UserSession, id: &WineryId, favorite: bool) -> Result<(), StatusError> {
        self.update(|ledger| {
            ledger.set_favorite(user, id, favorite);
            Ok(())
        })
    }

    fn add_to_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<WishlistEntryId, StatusError> {
        self.update(|ledger| Ok(ledger.add_to_wishlist(user, id)))
    }

    fn remove_from_wishlist(&self, user: &UserSession, entry: &WishlistEntryId) -> Result<(), StatusError> {
        self.update(|ledger| ledger.remove_from_wishlist(user, entry))
    }

    fn clear_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<(), StatusError> {
        self.update(|ledger| {
            ledger.clear_wishlist(user, id);
            Ok(())
        })
    }

    fn record_visit(&self, user: &UserSession, id: &WineryId, date: NaiveDate) -> Result<(), StatusError> {
        self.update(|ledger| {
            ledger.record_visit(user, id, date);
            Ok(())
        })
    }
}
