use anyhow::{bail, Context, Result};
use std::{
    collections::HashMap,
    fmt::Debug,
    io::Write,
    path::{Path, PathBuf},
};

const EGUI_MEMORY_KEY: &str = "egui_memory";
const STORAGE_FILE: &str = "overlay.ron";

/// RON key-value file holding the overlay layout between runs.
pub struct OverlayStorage {
    filepath: PathBuf,
    kv: HashMap<String, String>,
    dirty: bool,
}

impl OverlayStorage {
    fn storage_dir(app_id: &str) -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "", app_id)
            .map(|project_dirs| project_dirs.data_dir().to_owned())
    }

    /// Opens the storage in the platform data directory for `app_id`.
    pub fn from_app_id(app_id: &str) -> Result<Self> {
        let Some(dir) = Self::storage_dir(app_id) else {
            bail!("Failed to get storage directory");
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {dir:?}"))?;
        Ok(Self::at_path(dir.join(STORAGE_FILE)))
    }

    /// Opens the storage at `filepath`. A missing or unreadable file starts empty.
    pub fn at_path(filepath: impl Into<PathBuf>) -> Self {
        let filepath = filepath.into();
        let kv = match std::fs::File::open(&filepath) {
            Ok(file) => ron::de::from_reader(file).unwrap_or_else(|err| {
                log::error!("Failed to deserialize {filepath:?}: {err}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            filepath,
            kv,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.filepath
    }

    pub fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.kv.get(key)?;
        match ron::from_str(value) {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("Failed to deserialize {key}: {err}");
                None
            }
        }
    }

    pub fn set_value<T: serde::Serialize>(&mut self, key: &str, value: &T) {
        match ron::to_string(value) {
            Ok(value) => {
                self.kv.insert(key.to_owned(), value);
                self.dirty = true;
            }
            Err(err) => log::error!("Failed to serialize {key}: {err}"),
        }
    }

    pub fn get_egui_memory(&self) -> Option<egui::Memory> {
        self.get_value(EGUI_MEMORY_KEY)
    }

    pub fn set_egui_memory(&mut self, memory: &egui::Memory) {
        self.set_value(EGUI_MEMORY_KEY, memory);
    }

    /// Writes the file if anything changed since it was read.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent_dir) = self.filepath.parent() {
            std::fs::create_dir_all(parent_dir)
                .with_context(|| format!("Failed to create directory {parent_dir:?}"))?;
        }
        let file = std::fs::File::create(&self.filepath)
            .with_context(|| format!("Failed to create file {:?}", self.filepath))?;
        let mut writer = std::io::BufWriter::new(file);
        ron::ser::to_writer_pretty(&mut writer, &self.kv, Default::default())
            .context("Failed to serialize overlay storage")?;
        writer.flush()?;
        self.dirty = false;
        Ok(())
    }
}

impl Debug for OverlayStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStorage")
            .field("filepath", &self.filepath)
            .finish()
    }
}
