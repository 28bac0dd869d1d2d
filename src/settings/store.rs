//! Settings persistence (§4.7): debounced writes, atomic replace,
//! backup-and-reset on decode failure.

use super::document::SettingsDocument;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::constants::SETTINGS_DEBOUNCE;

const SETTINGS_FILE_NAME: &str = "settings.json";
const BACKUP_FILE_NAME: &str = "settings.backup.json";

/// Resolves `<app-support>/FineTune`, creating it if absent.
pub fn app_support_dir() -> io::Result<PathBuf> {
  let base = dirs::data_dir().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no application support directory for this platform"))?;
  let dir = base.join("FineTune");
  std::fs::create_dir_all(&dir)?;
  Ok(dir)
}

/// Versioned JSON document backing the engine, with debounced async writes
/// and a synchronous flush path for shutdown.
pub struct SettingsStore {
  dir: PathBuf,
  document: Mutex<SettingsDocument>,
  dirty_notify: Arc<Notify>,
  /// Bumped by every `schedule_save` call; a pending debounce task only
  /// writes if its captured generation is still the newest one when its
  /// sleep elapses, so a burst of calls within one window collapses to a
  /// single write from the last call.
  save_generation: Arc<AtomicU64>,
}

impl SettingsStore {
  /// Loads the document at `dir`/settings.json, recovering via
  /// backup-and-reset on decode failure (§4.7 read protocol).
  pub fn load(dir: PathBuf) -> Self {
    let path = dir.join(SETTINGS_FILE_NAME);
    let document = match std::fs::read_to_string(&path) {
      Ok(contents) => match serde_json::from_str::<SettingsDocument>(&contents) {
        Ok(doc) => doc,
        Err(e) => {
          warn!(error = %e, path = %path.display(), "settings decode failed, backing up and resetting to defaults");
          Self::backup_corrupted(&dir, &path);
          SettingsDocument::default()
        }
      },
      Err(e) if e.kind() == io::ErrorKind::NotFound => SettingsDocument::default(),
      Err(e) => {
        warn!(error = %e, path = %path.display(), "settings file unreadable, resetting to defaults");
        SettingsDocument::default()
      }
    };

    Self {
      dir,
      document: Mutex::new(document),
      dirty_notify: Arc::new(Notify::new()),
      save_generation: Arc::new(AtomicU64::new(0)),
    }
  }

  fn backup_corrupted(dir: &Path, path: &Path) {
    let backup = dir.join(BACKUP_FILE_NAME);
    let _ = std::fs::remove_file(&backup);
    if let Err(e) = std::fs::copy(path, &backup) {
      error!(error = %e, "failed to back up corrupted settings file");
    }
  }

  /// Read-only snapshot for the UI thread (§5 shared-resource policy).
  pub fn snapshot(&self) -> SettingsDocument {
    self.document.lock().clone()
  }

  /// Mutates the in-memory document under the control domain's exclusive
  /// access, then schedules a debounced write.
  pub fn update(self: &Arc<Self>, f: impl FnOnce(&mut SettingsDocument)) {
    {
      let mut doc = self.document.lock();
      f(&mut doc);
    }
    self.schedule_save();
  }

  /// §4.7 `scheduleSave`: debounces 500 ms. Each call resets the debounce
  /// window; only the last call in a burst actually writes.
  pub fn schedule_save(self: &Arc<Self>) {
    let generation = self.save_generation.fetch_add(1, Ordering::SeqCst) + 1;
    let store = self.clone();
    let notify = self.dirty_notify.clone();
    let counter = self.save_generation.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = tokio::time::sleep(SETTINGS_DEBOUNCE) => {
          if counter.load(Ordering::SeqCst) == generation {
            store.write_to_disk();
          }
          // else: a later schedule_save call superseded this one.
        }
        _ = notify.notified() => {
          // woken by flush_sync, which already wrote synchronously.
        }
      }
    });
  }

  /// §4.7 `flushSync`: cancels any pending debounce and writes immediately.
  /// Safe to call from any thread, including a termination handler.
  pub fn flush_sync(&self) {
    self.save_generation.fetch_add(1, Ordering::SeqCst);
    self.write_to_disk();
    self.dirty_notify.notify_waiters();
  }

  fn write_to_disk(&self) {
    let encoded = {
      let doc = self.document.lock();
      match serde_json::to_vec_pretty(&*doc) {
        Ok(bytes) => bytes,
        Err(e) => {
          error!(error = %e, "failed to encode settings document");
          return;
        }
      }
    };

    if let Err(e) = Self::atomic_write(&self.dir, SETTINGS_FILE_NAME, &encoded) {
      error!(error = %e, "failed to write settings file");
    } else {
      info!(path = %self.dir.join(SETTINGS_FILE_NAME).display(), "settings saved");
    }
  }

  /// §4.7 write protocol: ensure directory exists, write to a temp path,
  /// atomically replace the target.
  fn atomic_write(dir: &Path, file_name: &str, contents: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, &target)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn missing_file_loads_defaults() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::load(dir.path().to_path_buf());
    assert_eq!(store.snapshot(), SettingsDocument::default());
  }

  #[test]
  fn corrupted_file_backs_up_and_resets() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(SETTINGS_FILE_NAME), b"not valid json{{{").unwrap();
    let store = SettingsStore::load(dir.path().to_path_buf());
    assert_eq!(store.snapshot(), SettingsDocument::default());
    assert!(dir.path().join(BACKUP_FILE_NAME).exists());
  }

  #[test]
  fn recovered_store_is_still_usable_for_further_writes() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(SETTINGS_FILE_NAME), b"{not json").unwrap();
    let store = Arc::new(SettingsStore::load(dir.path().to_path_buf()));
    assert_eq!(store.snapshot().app_volumes.len(), 0);

    store.update(|doc| {
      doc.app_volumes.insert("com.example.app".to_string(), 0.4);
    });
    store.flush_sync();

    let reloaded = SettingsStore::load(dir.path().to_path_buf());
    assert_eq!(reloaded.snapshot().app_volumes.get("com.example.app"), Some(&0.4));
  }

  #[tokio::test]
  async fn flush_sync_writes_immediately() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SettingsStore::load(dir.path().to_path_buf()));
    store.update(|doc| {
      doc.app_volumes.insert("com.example.app".to_string(), 0.5);
    });
    store.flush_sync();

    let contents = std::fs::read_to_string(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
    let decoded: SettingsDocument = serde_json::from_str(&contents).unwrap();
    assert_eq!(decoded.app_volumes.get("com.example.app"), Some(&0.5));
  }

  #[tokio::test]
  async fn reload_after_flush_round_trips() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SettingsStore::load(dir.path().to_path_buf()));
    store.update(|doc| {
      doc.app_mutes.insert("com.example.app".to_string(), true);
    });
    store.flush_sync();

    let reloaded = SettingsStore::load(dir.path().to_path_buf());
    assert_eq!(reloaded.snapshot().app_mutes.get("com.example.app"), Some(&true));
  }

  #[tokio::test]
  async fn a_burst_of_updates_within_one_window_persists_only_the_last_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SettingsStore::load(dir.path().to_path_buf()));

    for target in ["device_a", "device_b", "device_c"] {
      store.update(|doc| {
        doc.app_device_routing.insert("com.example.app".to_string(), target.to_string());
      });
    }

    // Outlive the debounce window so the last scheduled task's own write
    // fires (no flush_sync involved).
    tokio::time::sleep(SETTINGS_DEBOUNCE + std::time::Duration::from_millis(200)).await;

    let contents = std::fs::read_to_string(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
    let decoded: SettingsDocument = serde_json::from_str(&contents).unwrap();
    assert_eq!(decoded.app_device_routing.get("com.example.app"), Some(&"device_c".to_string()));
  }
}
