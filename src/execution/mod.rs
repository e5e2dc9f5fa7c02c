//! Compute-unit execution layer
//!
//! A [`Registry`] hosts one compute unit per module, memoizes results and runs
//! batches of calls concurrently. It is an ordinary value: create one at
//! startup and share it by reference (or `Arc`) with every call site.
//!
//! # Example
//! ```rust
//! use serde_json::json;
//! use statsuite::config::EngineConfig;
//! use statsuite::execution::Registry;
//!
//! let registry = Registry::new(EngineConfig::default()).unwrap();
//! let output = registry
//!     .invoke(
//!         "descriptives",
//!         "descriptives",
//!         &json!({ "variables": [{ "name": "x", "values": [1, 2, 3] }] }),
//!     )
//!     .unwrap();
//! assert_eq!(output.tables[0].title, "Descriptive Statistics");
//! ```

pub mod cache;
pub mod unit;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{builtin_factories, AnalysisContext, ComputeModule};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::output::AnalysisOutput;

pub use crate::analysis::ModuleFactory;
pub use cache::{CacheKey, ResultCache};
pub use unit::{ComputeUnit, UnitInfo, UnitStatus};

/// One call in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub module: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Falls back to the registry default when absent
    #[serde(default, alias = "cacheEnabled", skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
}

impl Task {
    pub fn new<M: Into<String>, F: Into<String>>(module: M, method: F, params: Value) -> Self {
        Task {
            module: module.into(),
            method: method.into(),
            params,
            cache_enabled: None,
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }
}

/// Registry of compute units and their shared result cache
pub struct Registry {
    config: EngineConfig,
    context: AnalysisContext,
    factories: RwLock<HashMap<String, ModuleFactory>>,
    units: RwLock<HashMap<String, Arc<ComputeUnit>>>,
    cache: ResultCache,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("units", &self.units)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Registry {
    /// Creates a registry with the built-in modules registered
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.batch_threads)
            .thread_name(|i| format!("statsuite-batch-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("cannot build batch thread pool: {}", e)))?;

        let factories: HashMap<String, ModuleFactory> = builtin_factories()
            .into_iter()
            .map(|(name, factory)| (name.to_string(), factory))
            .collect();

        Ok(Registry {
            context: AnalysisContext::from_config(&config),
            config,
            factories: RwLock::new(factories),
            units: RwLock::new(HashMap::new()),
            cache: ResultCache::new(),
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers (or replaces) the factory for `name`
    ///
    /// A running unit keeps its module until it is terminated.
    pub fn register_module<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&AnalysisContext) -> Box<dyn ComputeModule> + Send + Sync + 'static,
    {
        self.factories.write()?.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Returns the unit for `module`, creating it on first use
    pub fn resolve(&self, module: &str) -> Result<Arc<ComputeUnit>> {
        if let Some(unit) = self.units.read()?.get(module) {
            unit.touch()?;
            return Ok(Arc::clone(unit));
        }

        let mut units = self.units.write()?;
        if let Some(unit) = units.get(module) {
            unit.touch()?;
            return Ok(Arc::clone(unit));
        }
        let factory = self
            .factories
            .read()?
            .get(module)
            .cloned()
            .ok_or_else(|| Error::UnknownModule(module.to_string()))?;
        let unit = Arc::new(ComputeUnit::spawn(factory(&self.context))?);
        units.insert(module.to_string(), Arc::clone(&unit));
        Ok(unit)
    }

    /// Invokes `module.method` with the registry's default caching
    pub fn invoke(&self, module: &str, method: &str, params: &Value) -> Result<AnalysisOutput> {
        self.invoke_task(&Task::new(module, method, params.clone()))
    }

    /// Invokes one task
    pub fn invoke_task(&self, task: &Task) -> Result<AnalysisOutput> {
        let unit = self.resolve(&task.module)?;
        unit.begin()?;
        self.run_begun(&unit, task)
    }

    /// Runs a task on a unit already marked as processing
    fn run_begun(&self, unit: &ComputeUnit, task: &Task) -> Result<AnalysisOutput> {
        let result = self.run_cached(unit, task);
        if let Err(e) = &result {
            log::warn!("{}.{} failed: {}", task.module, task.method, e);
        }
        unit.finish(result.is_err())?;
        result
    }

    fn run_cached(&self, unit: &ComputeUnit, task: &Task) -> Result<AnalysisOutput> {
        if !task.cache_enabled.unwrap_or(self.config.cache_enabled) {
            log::debug!("{}.{}: cache bypassed", task.module, task.method);
            return unit.execute(&task.method, &task.params);
        }

        let key = CacheKey::new(&task.module, &task.method, &task.params)?;
        if let Some(output) = self.cache.get(&key)? {
            log::debug!("{}.{}: cache hit", task.module, task.method);
            thread::sleep(self.config.cache_hit_delay());
            return Ok(output);
        }

        log::debug!("{}.{}: cache miss", task.module, task.method);
        let output = unit.execute(&task.method, &task.params)?;
        self.cache.insert(key, output.clone())?;
        Ok(output)
    }

    /// Runs named tasks concurrently
    ///
    /// Every referenced unit is marked processing before any task starts. A
    /// failing task does not affect the others; each name maps to its own
    /// result.
    pub fn invoke_batch<I>(&self, tasks: I) -> HashMap<String, Result<AnalysisOutput>>
    where
        I: IntoIterator<Item = (String, Task)>,
    {
        let mut results = HashMap::new();
        let mut runnable = Vec::new();
        for (name, task) in tasks {
            match self.resolve(&task.module).and_then(|unit| unit.begin().map(|_| unit)) {
                Ok(unit) => runnable.push((name, unit, task)),
                Err(e) => {
                    log::warn!("Batch task '{}' not started: {}", name, e);
                    results.insert(name, Err(e));
                }
            }
        }

        let completed: Vec<(String, Result<AnalysisOutput>)> = self.pool.install(|| {
            runnable
                .into_par_iter()
                .map(|(name, unit, task)| {
                    let result = self.run_begun(&unit, &task);
                    (name, result)
                })
                .collect()
        });
        results.extend(completed);
        results
    }

    /// Clears a unit's error status; returns whether the unit exists
    pub fn reset_status(&self, module: &str) -> Result<bool> {
        match self.units.read()?.get(module) {
            Some(unit) => {
                unit.reset()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drops a module's cached results and terminates its unit if it is idle
    ///
    /// Returns whether a unit was terminated.
    pub fn reset_unit(&self, module: &str) -> Result<bool> {
        let dropped = self.cache.remove_module(module)?;
        log::debug!("Dropped {} cached results of '{}'", dropped, module);

        let removed = {
            let mut units = self.units.write()?;
            let idle = match units.get(module) {
                Some(unit) => unit.status()? == UnitStatus::Idle,
                None => false,
            };
            if idle {
                units.remove(module)
            } else {
                None
            }
        };
        match removed {
            Some(unit) => {
                unit.terminate()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Terminates idle units unused for longer than `max_idle`
    pub fn cleanup_idle_units(&self, max_idle: Duration) -> Result<usize> {
        let removed: Vec<Arc<ComputeUnit>> = {
            let mut units = self.units.write()?;
            let mut stale = Vec::new();
            for (name, unit) in units.iter() {
                if unit.is_reclaimable(max_idle)? {
                    stale.push(name.clone());
                }
            }
            stale.iter().filter_map(|name| units.remove(name)).collect()
        };

        for unit in &removed {
            unit.terminate()?;
        }
        if !removed.is_empty() {
            log::info!("Reclaimed {} idle compute unit(s)", removed.len());
        }
        Ok(removed.len())
    }

    /// Terminates every unit and clears the cache
    pub fn terminate_all(&self) -> Result<()> {
        let units: Vec<Arc<ComputeUnit>> = self.units.write()?.drain().map(|(_, unit)| unit).collect();
        self.cache.clear()?;
        for unit in &units {
            unit.terminate()?;
        }
        log::info!("Terminated {} compute unit(s)", units.len());
        Ok(())
    }

    pub fn unit_status(&self, module: &str) -> Result<Option<UnitStatus>> {
        match self.units.read()?.get(module) {
            Some(unit) => Ok(Some(unit.status()?)),
            None => Ok(None),
        }
    }

    /// Snapshot of all live units, ordered by module name
    pub fn units(&self) -> Result<Vec<UnitInfo>> {
        let mut infos = self
            .units
            .read()?
            .values()
            .map(|unit| unit.info())
            .collect::<Result<Vec<_>>>()?;
        infos.sort_by(|a, b| a.module.cmp(&b.module));
        Ok(infos)
    }

    pub fn cache_len(&self) -> Result<usize> {
        self.cache.len()
    }

    /// Starts a background thread reclaiming idle units
    ///
    /// Every `cleanup_interval` the reaper calls
    /// [`Registry::cleanup_idle_units`] with `idle_timeout`. It stops when the
    /// handle is stopped or dropped, or when the registry is gone.
    pub fn start_reaper(self: &Arc<Self>) -> Result<ReaperHandle> {
        let registry: Weak<Registry> = Arc::downgrade(self);
        let interval = self.config.cleanup_interval();
        let max_idle = self.config.idle_timeout();
        let (stop, stopped) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("statsuite-reaper".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(live) = registry.upgrade() else {
                            break;
                        };
                        if let Err(e) = live.cleanup_idle_units(max_idle) {
                            log::warn!("Idle unit cleanup failed: {}", e);
                        }
                    }
                    _ => break,
                }
            })?;

        Ok(ReaperHandle {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if let Err(e) = self.terminate_all() {
            log::warn!("Failed to terminate compute units: {}", e);
        }
    }
}

/// Controls the background idle reaper
#[derive(Debug)]
pub struct ReaperHandle {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stops the reaper and waits for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender disconnects the reaper's channel
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Idle reaper exited abnormally");
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
