//! File-backed [`KeyValueStore`] shared by every process using the same path.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	storage::{KeyValueStore, StorageError, StorageFuture},
};

/// Persists entries to a JSON snapshot after each mutation.
///
/// Every operation reloads the snapshot from disk before acting, so
/// independent processes sharing the path observe each other's writes, the
/// property the cross-process renewal lease depends on. Reads pay a file read
/// for that visibility; this backend favors correctness over speed.
#[derive(Clone, Debug)]
pub struct FileKeyValueStore {
	path: PathBuf,
	io: Arc<Mutex<()>>,
}
impl FileKeyValueStore {
	/// Opens (or creates) a store at the provided path.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		// Validate any existing snapshot eagerly so corruption fails open(), not a later get().
		if path.exists() {
			Self::load_snapshot(&path)?;
		}

		Ok(Self { path, io: Arc::new(Mutex::new(())) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<String, String>, StorageError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StorageError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StorageError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<(String, String)> =
			serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StorageError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StorageError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_snapshot(&self, contents: &HashMap<String, String>) -> Result<(), StorageError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StorageError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StorageError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StorageError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StorageError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl KeyValueStore for FileKeyValueStore {
	fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
		Box::pin(async move {
			let _io = self.io.lock();

			Ok(Self::load_snapshot(&self.path)?.remove(key))
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let _io = self.io.lock();
			let mut snapshot = Self::load_snapshot(&self.path)?;

			snapshot.insert(key.to_owned(), value);
			self.persist_snapshot(&snapshot)
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let _io = self.io.lock();
			let mut snapshot = Self::load_snapshot(&self.path)?;

			if snapshot.remove(key).is_some() {
				self.persist_snapshot(&snapshot)?;
			}

			Ok(())
		})
	}

	fn keys(&self) -> StorageFuture<'_, Vec<String>> {
		Box::pin(async move {
			let _io = self.io.lock();

			Ok(Self::load_snapshot(&self.path)?.into_keys().collect())
		})
	}
}
