//! Store metadata descriptor
//!
//! A flat JSON object of string fields kept in `{store}/META`:
//! ```text
//! {"name":"photos","volume_cnt":"10","max_volume_size":"2097152"}
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{NeedleError, Result};

/// File name of the descriptor inside the store directory
pub const META_FILENAME: &str = "META";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMeta {
    pub name: String,
    pub volume_cnt: usize,
    pub max_volume_size: u64,
}

impl StoreMeta {
    /// Write the descriptor to `{dir}/META` and fsync it
    pub fn write(&self, dir: &Path) -> Result<()> {
        let mut fields = BTreeMap::new();
        fields.insert("name", self.name.clone());
        fields.insert("volume_cnt", self.volume_cnt.to_string());
        fields.insert("max_volume_size", self.max_volume_size.to_string());

        let data = serde_json::to_vec(&fields)
            .map_err(|e| NeedleError::Serialization(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(dir.join(META_FILENAME))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read and parse `{dir}/META`
    pub fn read(dir: &Path) -> Result<Self> {
        let data = fs::read(dir.join(META_FILENAME))?;
        let fields: BTreeMap<String, String> = serde_json::from_slice(&data)
            .map_err(|e| NeedleError::Format(format!("Malformed META: {}", e)))?;

        let name = Self::field(&fields, "name")?.to_string();
        let volume_cnt = Self::field(&fields, "volume_cnt")?
            .parse::<usize>()
            .map_err(|e| NeedleError::Format(format!("Invalid volume_cnt: {}", e)))?;
        let max_volume_size = Self::field(&fields, "max_volume_size")?
            .parse::<u64>()
            .map_err(|e| NeedleError::Format(format!("Invalid max_volume_size: {}", e)))?;

        Ok(Self {
            name,
            volume_cnt,
            max_volume_size,
        })
    }

    fn field<'a>(fields: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
        fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| NeedleError::Format(format!("META is missing field {:?}", key)))
    }
}
