//! Process-wide engine runtime.
//!
//! [`init`] brings the runtime up once; every later call is a no-op. The
//! free functions [`intersect`], [`union`] and [`subtract`] run on it.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{info, instrument};

use crate::config::{EngineConfig, Precision};
use crate::engine::Engine;
use crate::error::{InitError, Result};
use crate::polygon::Solid;

/// The initialized runtime: a shared engine built from the loaded config.
#[derive(Debug)]
pub struct Runtime {
    engine: Engine,
}

impl Runtime {
    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initializes the runtime, reading an [`EngineConfig`] from `resource`
/// when given.
///
/// Idempotent: once a call has succeeded, later calls return `Ok(())`
/// without touching `resource`. A failed call leaves the runtime
/// uninitialized, so it can be retried.
#[instrument]
pub fn init(resource: Option<&Path>) -> Result<(), InitError> {
    if RUNTIME.get().is_some() {
        return Ok(());
    }
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if RUNTIME.get().is_some() {
        return Ok(());
    }

    let config = match resource {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    info!(precision = config.precision.exponent(), "engine runtime initialized");
    // Only this thread can set the cell while the lock is held.
    let _ = RUNTIME.set(Runtime {
        engine: Engine::new(config),
    });
    Ok(())
}

/// The initialized runtime.
pub fn runtime() -> Result<&'static Runtime, InitError> {
    RUNTIME.get().ok_or(InitError::NotInitialized)
}

/// Reads an engine configuration file.
pub fn load_config(path: &Path) -> Result<EngineConfig, InitError> {
    let text = fs::read_to_string(path).map_err(|source| InitError::ResourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&text).map_err(|source| InitError::InvalidConfig {
        path: path.to_path_buf(),
        source,
    })?;
    if !config.precision.is_valid() {
        return Err(InitError::InvalidPrecision {
            path: path.to_path_buf(),
            exponent: config.precision.exponent(),
        });
    }
    Ok(config)
}

/// Intersection of `solids` on the process-wide engine.
pub fn intersect(precision: Option<i32>, solids: &[Solid]) -> Result<Solid> {
    runtime()?.engine.intersect(precision.map(Precision::new), solids)
}

/// Union of `solids` on the process-wide engine.
pub fn union(precision: Option<i32>, solids: &[Solid]) -> Result<Solid> {
    runtime()?.engine.union(precision.map(Precision::new), solids)
}

/// The first solid minus all others, on the process-wide engine.
pub fn subtract(precision: Option<i32>, solids: &[Solid]) -> Result<Solid> {
    runtime()?.engine.subtract(precision.map(Precision::new), solids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_config_file(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "bsp-csg-config-{}-{}.json",
            std::process::id(),
            contents.len()
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_config_reads_json() {
        let path = make_config_file(r#"{"precision": -12, "arena_limit_bytes": 1000000}"#);
        let config = load_config(&path).unwrap();
        assert_eq!(config.precision, Precision::new(-12));
        assert_eq!(config.arena_limit_bytes, Some(1_000_000));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_config_reports_missing_and_malformed_files() {
        let missing = std::env::temp_dir().join("bsp-csg-definitely-missing.json");
        assert!(matches!(
            load_config(&missing),
            Err(InitError::ResourceUnavailable { .. })
        ));

        let path = make_config_file("{ not json");
        assert!(matches!(load_config(&path), Err(InitError::InvalidConfig { .. })));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_config_rejects_out_of_range_precision() {
        let path = make_config_file(r#"{"precision": -1100}"#);
        assert!(matches!(
            load_config(&path),
            Err(InitError::InvalidPrecision { exponent: -1100, .. })
        ));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn init_is_idempotent() {
        init(None).unwrap();
        let first = runtime().unwrap() as *const Runtime;
        // A second call does not even look at the resource.
        init(Some(Path::new("/nonexistent/engine.json"))).unwrap();
        assert_eq!(runtime().unwrap() as *const Runtime, first);
    }
}
