use std::collections::HashMap;

use crate::string_error::StringError;

/// Typed persistent storage. Reads never fail, a missing or unreadable key
/// yields `default`.
pub trait KeyValueStore {
    fn read_string(&self, key: &str, default: &str) -> String;
    fn read_float(&self, key: &str, default: f32) -> f32;
    fn read_u32(&self, key: &str, default: u32) -> u32;
    fn read_i32(&self, key: &str, default: i32) -> i32;
    fn read_bool(&self, key: &str, default: bool) -> bool;

    fn store_string(&mut self, key: &str, value: &str, max_size: usize) -> anyhow::Result<()>;
    fn store_float(&mut self, key: &str, value: f32) -> anyhow::Result<()>;
    fn store_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()>;
    fn store_i32(&mut self, key: &str, value: i32) -> anyhow::Result<()>;
    fn store_bool(&mut self, key: &str, value: bool) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    String(String),
    Float(f32),
    U32(u32),
    I32(i32),
    Bool(bool),
}

/// RAM backed store, used by the host simulation and the tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, StoredValue>,
    /// Remaining successful writes, unlimited when `None`.
    writes_left: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail, as an unmounted partition would.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.writes_left = unavailable.then_some(0);
    }

    /// Lets `writes` more writes succeed, then fails every following one.
    pub fn fail_after(&mut self, writes: usize) {
        self.writes_left = Some(writes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn put(&mut self, key: &str, value: StoredValue) -> anyhow::Result<()> {
        match self.writes_left {
            Some(0) => return Err(StringError("Storage unavailable").into()),
            Some(n) => self.writes_left = Some(n - 1),
            None => (),
        }

        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn read_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(StoredValue::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    fn read_float(&self, key: &str, default: f32) -> f32 {
        match self.values.get(key) {
            Some(StoredValue::Float(v)) => *v,
            _ => default,
        }
    }

    fn read_u32(&self, key: &str, default: u32) -> u32 {
        match self.values.get(key) {
            Some(StoredValue::U32(v)) => *v,
            _ => default,
        }
    }

    fn read_i32(&self, key: &str, default: i32) -> i32 {
        match self.values.get(key) {
            Some(StoredValue::I32(v)) => *v,
            _ => default,
        }
    }

    fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(StoredValue::Bool(v)) => *v,
            _ => default,
        }
    }

    fn store_string(&mut self, key: &str, value: &str, max_size: usize) -> anyhow::Result<()> {
        let truncated: String = value.chars().take(max_size).collect();
        self.put(key, StoredValue::String(truncated))
    }

    fn store_float(&mut self, key: &str, value: f32) -> anyhow::Result<()> {
        self.put(key, StoredValue::Float(value))
    }

    fn store_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.put(key, StoredValue::U32(value))
    }

    fn store_i32(&mut self, key: &str, value: i32) -> anyhow::Result<()> {
        self.put(key, StoredValue::I32(value))
    }

    fn store_bool(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        self.put(key, StoredValue::Bool(value))
    }
}
