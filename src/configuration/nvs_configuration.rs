use std::sync::atomic::{AtomicBool, Ordering};

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use pad::{Alignment, PadStr};

use super::key_value_store::KeyValueStore;
use crate::string_error::{StringError, StringEspError};

static IS_NVS_TAKEN: AtomicBool = AtomicBool::new(false);

const NAMESPACE: &str = "hygro";

const PAD_CHAR: char = 0x03 as char;

/// `hygro` namespace of the default NVS partition.
pub struct NvsConfiguration {
    nvs: EspNvs<NvsDefault>,
}

impl NvsConfiguration {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, StringError> {
        if IS_NVS_TAKEN.load(Ordering::Relaxed) {
            return Err(StringError("NvsConfiguration already taken"));
        }

        match EspNvs::new(partition, NAMESPACE, true) {
            Ok(nvs) => {
                IS_NVS_TAKEN.store(true, Ordering::Relaxed);
                Ok(Self { nvs })
            }
            Err(_) => Err(StringError("Failed to create EspNvs. Bad namespace ?")),
        }
    }

    fn trunc_pad_string(s: &str, max: usize) -> String {
        s.pad(max, PAD_CHAR, Alignment::Left, true)
    }

    fn erase(&mut self, key: &str) -> Result<(), StringEspError> {
        self.nvs
            .remove(key)
            .map(|_| ())
            .map_err(|e| StringEspError("Failed to erase key", e))
    }
}

impl KeyValueStore for NvsConfiguration {
    fn read_string(&self, key: &str, default: &str) -> String {
        let size = self.nvs.str_len(key).unwrap_or(None).unwrap_or(0);
        let mut buf = vec![0; size];

        if size == 0 {
            return default.to_string();
        }

        let result = self
            .nvs
            .get_str(key, &mut buf)
            .unwrap_or(None)
            .unwrap_or(default)
            .to_string();

        result
            .split_once(PAD_CHAR)
            .unwrap_or((&result, ""))
            .0
            .to_owned()
    }

    fn read_float(&self, key: &str, default: f32) -> f32 {
        match self.nvs.get_u32(key).unwrap_or(None) {
            Some(value) => f32::from_ne_bytes(value.to_ne_bytes()),
            None => default,
        }
    }

    fn read_u32(&self, key: &str, default: u32) -> u32 {
        self.nvs.get_u32(key).unwrap_or(None).unwrap_or(default)
    }

    fn read_i32(&self, key: &str, default: i32) -> i32 {
        self.nvs.get_i32(key).unwrap_or(None).unwrap_or(default)
    }

    fn read_bool(&self, key: &str, default: bool) -> bool {
        self.nvs
            .get_u8(key)
            .unwrap_or(None)
            .map_or(default, |v| v != 0)
    }

    fn store_string(&mut self, key: &str, value: &str, max_size: usize) -> anyhow::Result<()> {
        self.erase(key)?;
        self.nvs
            .set_str(key, &Self::trunc_pad_string(value, max_size))
            .map_err(|e| StringEspError("Failed to store string", e))?;
        Ok(())
    }

    fn store_float(&mut self, key: &str, value: f32) -> anyhow::Result<()> {
        let val = u32::from_ne_bytes(value.to_ne_bytes());
        self.erase(key)?;
        self.nvs
            .set_u32(key, val)
            .map_err(|e| StringEspError("Failed to store float", e))?;
        Ok(())
    }

    fn store_u32(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.erase(key)?;
        self.nvs
            .set_u32(key, value)
            .map_err(|e| StringEspError("Failed to store U32", e))?;
        Ok(())
    }

    fn store_i32(&mut self, key: &str, value: i32) -> anyhow::Result<()> {
        self.erase(key)?;
        self.nvs
            .set_i32(key, value)
            .map_err(|e| StringEspError("Failed to store I32", e))?;
        Ok(())
    }

    fn store_bool(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        self.erase(key)?;
        self.nvs
            .set_u8(key, value as u8)
            .map_err(|e| StringEspError("Failed to store bool", e))?;
        Ok(())
    }
}

impl Drop for NvsConfiguration {
    fn drop(&mut self) {
        IS_NVS_TAKEN.store(false, Ordering::Relaxed);
    }
}
