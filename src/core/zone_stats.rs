//! ZoneStats: the gridded historical-seismicity table used to derive the
//! Bayesian depth prior (spec.md §3, §4.6, §6).
//!
//! On-disk layout, per spec.md §6: a zone-key file of 360·180 little-endian
//! `i32` grid cells (index into the stats table, or a sentinel for "no
//! data"), and a zone-stat file with a 40-byte header followed by records of
//! `{i32, 9×f32}`. Parsed with `byteorder`, grounded on
//! `tasansal-tracelens`'s `segy/binary_header.rs` — the one repo in the
//! reference pack that reads a fixed-layout scientific binary format this
//! way.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::core::config::{DEFAULT_DEPTH_SE, ZONE_STAT_HEADER_BYTES};
use crate::core::error::{EngineError, Result};

const GRID_LON_CELLS: usize = 360;
const GRID_COLAT_CELLS: usize = 180;

/// One entry of the sparse statistics table: historical depth distribution
/// for a one-degree cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Fraction of the cell's historical events that were free-depth
    /// solutions (vs. fixed at a conventional depth). A record with
    /// `percent_free == 0.0` carries no usable prior.
    pub percent_free: f32,
    pub mean_depth: f32,
    pub min_depth: f32,
    pub max_depth: f32,
    /// Remaining floats in the 9-float record; kept but not interpreted —
    /// the source format documents no semantics for them beyond the first
    /// four (see SPEC_FULL.md §4.10 on the undocumented header jump).
    pub reserved: [f32; 5],
}

impl ZoneRecord {
    /// `true` if this record carries no usable Bayesian depth prior
    /// (spec.md §3: "Cells whose percent-free is zero or whose minDepth >=
    /// 900 km are null").
    pub fn is_null(&self) -> bool {
        self.percent_free == 0.0 || self.min_depth as f64 >= 900.0
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> Result<(i32, Self)> {
        let key = cursor
            .read_i32::<LittleEndian>()
            .map_err(|e| EngineError::MalformedAuxData {
                path: "zone-stat".into(),
                message: e.to_string(),
            })?;
        let mut floats = [0f32; 9];
        for slot in floats.iter_mut() {
            *slot = cursor
                .read_f32::<LittleEndian>()
                .map_err(|e| EngineError::MalformedAuxData {
                    path: "zone-stat".into(),
                    message: e.to_string(),
                })?;
        }
        Ok((
            key,
            ZoneRecord {
                percent_free: floats[0],
                mean_depth: floats[1],
                min_depth: floats[2],
                max_depth: floats[3],
                reserved: [floats[4], floats[5], floats[6], floats[7], floats[8]],
            },
        ))
    }
}

/// A Bayesian depth prior derived from a `ZoneRecord`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthPrior {
    pub mean_depth: f64,
    pub spread: f64,
}

/// 360x180 grid keyed by `(longitude degree, colatitude degree)` into a
/// sparse statistics table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneStats {
    /// `grid[lon_cell][colat_cell]` holds an index into `records`, or `-1`
    /// for "no data at this cell".
    grid: Vec<Vec<i32>>,
    records: Vec<ZoneRecord>,
}

impl ZoneStats {
    pub fn empty() -> Self {
        Self {
            grid: vec![vec![-1; GRID_COLAT_CELLS]; GRID_LON_CELLS],
            records: Vec::new(),
        }
    }

    /// Parse the zone-key grid (360·180 little-endian `i32`) and the
    /// zone-stat table (40-byte header + `{i32, 9×f32}` records) from their
    /// raw bytes.
    pub fn parse(zone_key_bytes: &[u8], zone_stat_bytes: &[u8]) -> Result<Self> {
        let expected_key_len = GRID_LON_CELLS * GRID_COLAT_CELLS * 4;
        if zone_key_bytes.len() != expected_key_len {
            return Err(EngineError::MalformedAuxData {
                path: "zone-key".into(),
                message: format!(
                    "expected {expected_key_len} bytes, got {}",
                    zone_key_bytes.len()
                ),
            });
        }

        let mut key_cursor = Cursor::new(zone_key_bytes);
        let mut grid = vec![vec![-1i32; GRID_COLAT_CELLS]; GRID_LON_CELLS];
        for lon_cell in grid.iter_mut() {
            for cell in lon_cell.iter_mut() {
                *cell = key_cursor
                    .read_i32::<LittleEndian>()
                    .map_err(|e| EngineError::MalformedAuxData {
                        path: "zone-key".into(),
                        message: e.to_string(),
                    })?;
            }
        }

        if zone_stat_bytes.len() < ZONE_STAT_HEADER_BYTES {
            return Err(EngineError::MalformedAuxData {
                path: "zone-stat".into(),
                message: "file shorter than the fixed header".to_string(),
            });
        }
        let mut header_cursor = Cursor::new(&zone_stat_bytes[..ZONE_STAT_HEADER_BYTES]);
        let _num_historical_years = header_cursor
            .read_i32::<LittleEndian>()
            .map_err(|e| EngineError::MalformedAuxData {
                path: "zone-stat".into(),
                message: e.to_string(),
            })?;
        // The remaining 36 header bytes carry no documented meaning; skip
        // to the fixed record start, matching the original format's jump
        // to byte 40 (see SPEC_FULL.md §4.10 — unresolved upstream).
        let record_bytes: &[u8] = &zone_stat_bytes[ZONE_STAT_HEADER_BYTES..];
        const RECORD_SIZE: usize = 4 + 9 * 4;
        let mut body = Cursor::new(record_bytes);
        let mut records = Vec::new();
        let mut max_key = -1i32;
        while (body.position() as usize) + RECORD_SIZE <= record_bytes.len() {
            let (key, record) = ZoneRecord::read(&mut body)?;
            max_key = max_key.max(key);
            records.push((key, record));
        }

        let table_len = (max_key + 1).max(0) as usize;
        let mut table = vec![
            ZoneRecord {
                percent_free: 0.0,
                mean_depth: 0.0,
                min_depth: 999.0,
                max_depth: 999.0,
                reserved: [0.0; 5],
            };
            table_len
        ];
        for (key, record) in records {
            if key >= 0 {
                table[key as usize] = record;
            }
        }

        Ok(Self { grid, records: table })
    }

    fn cell_indices(lat: f64, lon: f64) -> (usize, usize) {
        let colatitude = crate::core::geo::colatitude_from_latitude(lat);
        let lon_cell = (crate::core::geo::normalize_longitude(lon).floor() as i64 + 360) % 360;
        let colat_cell = (colatitude.floor().clamp(0.0, (GRID_COLAT_CELLS - 1) as f64)) as usize;
        (lon_cell as usize % GRID_LON_CELLS, colat_cell)
    }

    /// Derive a Bayesian depth prior for `(lat, lon)`, or `None` if the
    /// cell carries no usable data per spec.md §3.
    pub fn depth_prior(&self, lat: f64, lon: f64) -> Option<DepthPrior> {
        let (lon_cell, colat_cell) = Self::cell_indices(lat, lon);
        let index = *self.grid.get(lon_cell)?.get(colat_cell)?;
        if index < 0 {
            return None;
        }
        let record = self.records.get(index as usize)?;
        if record.is_null() {
            return None;
        }
        let spread = (0.75 * (record.max_depth as f64 - record.min_depth as f64) / 2.0)
            .max(DEFAULT_DEPTH_SE);
        Some(DepthPrior {
            mean_depth: record.mean_depth as f64,
            spread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_cell_stats(record: ZoneRecord) -> ZoneStats {
        let mut grid = vec![vec![-1i32; GRID_COLAT_CELLS]; GRID_LON_CELLS];
        grid[260][45] = 0;
        ZoneStats {
            grid,
            records: vec![record],
        }
    }

    #[test]
    fn null_cell_has_no_prior() {
        let stats = ZoneStats::empty();
        assert!(stats.depth_prior(45.0, -100.0).is_none());
    }

    #[test]
    fn record_with_zero_percent_free_is_null() {
        let record = ZoneRecord {
            percent_free: 0.0,
            mean_depth: 50.0,
            min_depth: 10.0,
            max_depth: 90.0,
            reserved: [0.0; 5],
        };
        assert!(record.is_null());
    }

    #[test]
    fn record_with_min_depth_over_900_is_null() {
        let record = ZoneRecord {
            percent_free: 1.0,
            mean_depth: 950.0,
            min_depth: 920.0,
            max_depth: 980.0,
            reserved: [0.0; 5],
        };
        assert!(record.is_null());
    }

    #[test]
    fn valid_cell_derives_mean_and_bounded_spread() {
        let record = ZoneRecord {
            percent_free: 1.0,
            mean_depth: 10.0,
            min_depth: 5.0,
            max_depth: 15.0,
            reserved: [0.0; 5],
        };
        let stats = single_cell_stats(record);
        // lon cell 260 => lon in [-100, -99); colat cell 45 => lat ~ 45 deg.
        let prior = stats.depth_prior(45.0, -99.5).expect("should have prior");
        assert_eq!(prior.mean_depth, 10.0);
        assert!(prior.spread >= DEFAULT_DEPTH_SE);
    }
}
