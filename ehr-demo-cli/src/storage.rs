use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ehr_demo_core::{DemoError, Storage};

/// Storage ghi xuống một file JSON, thay cho localStorage/sessionStorage của trình duyệt.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("Không đọc được file {:?}", path))?;
            serde_json::from_str(&data)
                .with_context(|| format!("File trạng thái {:?} không hợp lệ", path))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    /// `<config_dir>/ehr-demo/state.json`.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let base = dirs::config_dir().context("Không xác định được thư mục cấu hình")?;
        Ok(base.join("ehr-demo").join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), DemoError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| DemoError::Storage(err.to_string()))?;
        }
        let data = serde_json::to_string_pretty(&*self.entries.borrow())?;
        fs::write(&self.path, data).map_err(|err| DemoError::Storage(err.to_string()))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DemoError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&self, key: &str) -> Result<(), DemoError> {
        if self.entries.borrow_mut().remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}
