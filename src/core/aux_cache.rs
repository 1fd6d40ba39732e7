//! Persisted cache of auxiliary reference data (spec.md §5, §6).
//!
//! Craton polygons and zone statistics are loaded once at process start and
//! are immutable thereafter, so they may be shared across engine instances
//! behind a single `Arc`. The on-disk bincode snapshot is regenerated
//! whenever any source file is newer than the cache, guarded by a
//! shared/exclusive lock: writers (regeneration) hold exclusive, readers
//! hold shared. `bincode`, previously declared but unused, is given a real
//! job here.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::core::craton::CratonMap;
use crate::core::error::{EngineError, Result};
use crate::core::zone_stats::ZoneStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEnvelope {
    source_mtimes: Vec<(PathBuf, SystemTime)>,
    cratons: CratonMap,
    zone_stats: ZoneStats,
}

/// Immutable, shareable auxiliary reference data: craton polygons and the
/// zone-statistics depth-prior table.
#[derive(Debug)]
pub struct AuxiliaryData {
    pub cratons: CratonMap,
    pub zone_stats: ZoneStats,
}

/// Read-mostly cache guarding (re)serialization of `AuxiliaryData` to disk.
pub struct AuxCache {
    cache_path: PathBuf,
    lock: RwLock<()>,
}

impl AuxCache {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Load the auxiliary data, regenerating the on-disk cache if any source
    /// file is newer than it (or the cache doesn't exist).
    pub fn load(
        &self,
        craton_polygon_path: &Path,
        zone_key_path: &Path,
        zone_stat_path: &Path,
    ) -> Result<AuxiliaryData> {
        let sources = [craton_polygon_path, zone_key_path, zone_stat_path];

        {
            let _read_guard = self.lock.read().expect("aux cache lock poisoned");
            if let Some(envelope) = self.try_read_fresh(&sources)? {
                return Ok(AuxiliaryData {
                    cratons: envelope.cratons,
                    zone_stats: envelope.zone_stats,
                });
            }
        }

        let _write_guard = self.lock.write().expect("aux cache lock poisoned");
        // Re-check: another thread may have regenerated while we waited for
        // the exclusive lock.
        if let Some(envelope) = self.try_read_fresh(&sources)? {
            return Ok(AuxiliaryData {
                cratons: envelope.cratons,
                zone_stats: envelope.zone_stats,
            });
        }

        let cratons = load_craton_polygons(craton_polygon_path)?;
        let zone_key_bytes = fs::read(zone_key_path)
            .map_err(|_| EngineError::AuxDataNotFound { path: zone_key_path.to_path_buf() })?;
        let zone_stat_bytes = fs::read(zone_stat_path)
            .map_err(|_| EngineError::AuxDataNotFound { path: zone_stat_path.to_path_buf() })?;
        let zone_stats = ZoneStats::parse(&zone_key_bytes, &zone_stat_bytes)?;

        let envelope = CacheEnvelope {
            source_mtimes: source_mtimes(&sources)?,
            cratons,
            zone_stats,
        };
        let encoded = bincode::serialize(&envelope)
            .map_err(|e| EngineError::MalformedAuxData {
                path: self.cache_path.clone(),
                message: e.to_string(),
            })?;
        fs::write(&self.cache_path, encoded)?;

        Ok(AuxiliaryData {
            cratons: envelope.cratons,
            zone_stats: envelope.zone_stats,
        })
    }

    fn try_read_fresh(&self, sources: &[&Path]) -> Result<Option<CacheEnvelope>> {
        let Ok(bytes) = fs::read(&self.cache_path) else {
            return Ok(None);
        };
        let Ok(envelope) = bincode::deserialize::<CacheEnvelope>(&bytes) else {
            return Ok(None);
        };
        let current = source_mtimes(sources)?;
        if envelope.source_mtimes == current {
            Ok(Some(envelope))
        } else {
            Ok(None)
        }
    }
}

fn source_mtimes(paths: &[&Path]) -> Result<Vec<(PathBuf, SystemTime)>> {
    paths
        .iter()
        .map(|p| {
            let mtime = fs::metadata(p)?.modified()?;
            Ok((p.to_path_buf(), mtime))
        })
        .collect()
}

fn load_craton_polygons(path: &Path) -> Result<CratonMap> {
    let text = fs::read_to_string(path)
        .map_err(|_| EngineError::AuxDataNotFound { path: path.to_path_buf() })?;
    serde_json::from_str(&text).map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::craton::CratonPolygon;
    use std::io::Write;

    fn write_zone_files(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let key_path = dir.join("zone.key");
        let stat_path = dir.join("zone.stat");
        let grid = vec![0i32; 360 * 180];
        let mut key_bytes = Vec::new();
        for v in &grid {
            key_bytes.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(&key_path, &key_bytes).unwrap();

        let mut stat_bytes = vec![0u8; 40];
        stat_bytes[0..4].copy_from_slice(&100i32.to_le_bytes());
        let mut record = Vec::new();
        record.extend_from_slice(&0i32.to_le_bytes());
        for v in [1.0f32, 10.0, 5.0, 15.0, 0.0, 0.0, 0.0, 0.0, 0.0] {
            record.extend_from_slice(&v.to_le_bytes());
        }
        stat_bytes.extend_from_slice(&record);
        fs::write(&stat_path, &stat_bytes).unwrap();

        (key_path, stat_path)
    }

    #[test]
    fn regenerates_when_cache_missing_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let craton_path = dir.path().join("cratons.json");
        let map = CratonMap::new(vec![CratonPolygon {
            name: "test".to_string(),
            vertices: vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)],
        }]);
        let mut f = fs::File::create(&craton_path).unwrap();
        f.write_all(serde_json::to_string(&map).unwrap().as_bytes()).unwrap();

        let (key_path, stat_path) = write_zone_files(dir.path());
        let cache_path = dir.path().join("aux.bin");
        let cache = AuxCache::new(&cache_path);

        let first = cache.load(&craton_path, &key_path, &stat_path).unwrap();
        assert!(cache_path.exists());
        assert_eq!(first.cratons.polygons.len(), 1);

        let second = cache.load(&craton_path, &key_path, &stat_path).unwrap();
        assert_eq!(second.cratons.polygons.len(), 1);
    }
}
