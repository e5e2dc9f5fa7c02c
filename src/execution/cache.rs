//! Memoized analysis results keyed by call signature

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::output::AnalysisOutput;

/// `(module, method, sha256(serialized params))`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub module: String,
    pub method: String,
    /// Hex SHA-256 of the compact JSON encoding of the parameters
    pub digest: String,
}

impl CacheKey {
    pub fn new(module: &str, method: &str, params: &Value) -> Result<Self> {
        let encoded = serde_json::to_string(params)?;
        let digest = Sha256::digest(encoded.as_bytes());
        Ok(CacheKey {
            module: module.to_string(),
            method: method.to_string(),
            digest: digest.iter().map(|b| format!("{:02x}", b)).collect(),
        })
    }
}

/// Append-only result cache shared by all compute units
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, AnalysisOutput>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<AnalysisOutput>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    /// Stores a result; an existing entry for the key is kept
    pub fn insert(&self, key: CacheKey, output: AnalysisOutput) -> Result<()> {
        self.entries.write()?.entry(key).or_insert(output);
        Ok(())
    }

    /// Drops every entry produced by `module`
    pub fn remove_module(&self, module: &str) -> Result<usize> {
        let mut entries = self.entries.write()?;
        let before = entries.len();
        entries.retain(|key, _| key.module != module);
        Ok(before - entries.len())
    }

    pub fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
