//! Filesystem-backed storage adapter.
//!
//! Implements [`StoragePort`] on top of `std::fs`.  On the ESP32 the SD
//! card is mounted as a FAT volume through the ESP-IDF VFS layer, so the
//! same code serves both targets:
//!
//! - **`target_os = "espidf"`**: root is the SD mount point (`/sdcard`).
//! - **host**: any directory, typically a temp dir in tests.
//!
//! Whole-file writes go to a `.tmp` sibling first and are renamed into
//! place, so a reset mid-write leaves either the old or the new content.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::{StorageError, StoragePort};

/// Default SD card mount point on the ESP32.
pub const SD_MOUNT_POINT: &str = "/sdcard";

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!("FileStorage: root {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        // Flat namespace: no separators, no parent references.
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(StorageError::IoError);
        }
        Ok(self.root.join(name))
    }
}

fn map_io(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::InvalidData => StorageError::Corrupted,
        _ => StorageError::IoError,
    }
}

impl StoragePort for FileStorage {
    fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn read_text(&self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let path = self.path(name)?;
        let mut file = fs::File::open(&path).map_err(|e| map_io(&e))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io(&e)),
            }
        }
        Ok(filled)
    }

    fn write_text(&mut self, name: &str, text: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| map_io(&e))?;
            file.write_all(text.as_bytes()).map_err(|e| map_io(&e))?;
            file.sync_all().map_err(|e| map_io(&e))?;
        }
        if fs::rename(&tmp, &path).is_err() {
            // FAT refuses to rename over an existing file.
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("FileStorage: cannot replace {name}: {e}");
                    return Err(map_io(&e));
                }
            }
            fs::rename(&tmp, &path).map_err(|e| map_io(&e))?;
        }
        Ok(())
    }

    fn append_record(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| map_io(&e))?;
        writeln!(file, "{line}").map_err(|e| map_io(&e))
    }

    fn delete_file(&mut self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(&e)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok_and(|p| p.is_file())
    }
}
