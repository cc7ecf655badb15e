use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::DemoError;

/// Khóa lưu OpenAI key trong local storage.
pub const API_KEY_STORAGE_KEY: &str = "openAiKey";

/// Bộ lưu trữ key-value kiểu `localStorage`.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), DemoError>;
    fn remove(&self, key: &str) -> Result<(), DemoError>;
}

impl<T: Storage + ?Sized> Storage for Rc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DemoError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), DemoError> {
        (**self).remove(key)
    }
}

/// Storage trong bộ nhớ. Các bản clone dùng chung dữ liệu.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DemoError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DemoError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// OpenAI key người dùng đã chọn lưu lại.
#[derive(Debug, Clone)]
pub struct ApiKeyStore<S> {
    storage: S,
}

impl<S: Storage> ApiKeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Key đã lưu; chuỗi rỗng được coi như chưa lưu.
    pub fn load(&self) -> Option<String> {
        self.storage
            .get(API_KEY_STORAGE_KEY)
            .filter(|key| !key.trim().is_empty())
    }

    pub fn save(&self, key: &str) -> Result<(), DemoError> {
        self.storage.set(API_KEY_STORAGE_KEY, key)
    }

    pub fn clear(&self) -> Result<(), DemoError> {
        self.storage.remove(API_KEY_STORAGE_KEY)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
