//! Legacy "hydra" text format (spec.md §6): one header line, then one pick
//! line per pick, in both directions.
//!
//! Header: `originTime latitude longitude depth flags bayesDepth
//! bayesSpread`, where `originTime` is `YYYY-MM-DD HH:MM:SS.sss` and `flags`
//! is a bitmask (bit0 `heldLocation`, bit1 `heldDepth`).
//!
//! Pick line: `station channel network location elevation arrivalTime use
//! phase affinity quality source author`, where `arrivalTime` is seconds
//! since epoch and `use` is `1`/`0`. The format carries no author-type code;
//! picks parsed from hydra are tagged `AuthorType::ContribAuto`.

use chrono::{NaiveDateTime, Utc};

use crate::core::error::{EngineError, Result};
use crate::core::pick::AuthorType;
use crate::io::request::{LocationRequest, PickInput, SiteInput, SourceInput};
use crate::io::response::LocationResponse;

const FIELD_SEP: char = ' ';
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const FLAG_HELD_LOCATION: u32 = 0b01;
const FLAG_HELD_DEPTH: u32 = 0b10;

pub fn parse_request(text: &str) -> Result<LocationRequest> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| EngineError::bad_input("hydra input has no header line"))?;
    // "YYYY-MM-DD HH:MM:SS.sss" is two space-separated tokens, followed by
    // lat, lon, depth, flags, bayesDepth, bayesSpread: 8 tokens total.
    let fields: Vec<&str> = header.split(FIELD_SEP).collect();
    if fields.len() < 8 {
        return Err(EngineError::bad_input("hydra header needs 8 fields"));
    }
    let origin_time = parse_datetime(&format!("{} {}", fields[0], fields[1]))?;
    let flags: u32 = fields[5]
        .parse()
        .map_err(|_| EngineError::bad_input(format!("could not parse flags: {}", fields[5])))?;

    let source = SourceInput {
        origin_time,
        latitude: parse_field(fields[2], "latitude")?,
        longitude: parse_field(fields[3], "longitude")?,
        depth: parse_field(fields[4], "depth")?,
        bayes_depth: parse_optional_field(fields[6]),
        bayes_spread: parse_optional_field(fields[7]),
        held_location: flags & FLAG_HELD_LOCATION != 0,
        held_depth: flags & FLAG_HELD_DEPTH != 0,
    };

    let mut picks = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(FIELD_SEP).collect();
        if fields.len() < 12 {
            return Err(EngineError::bad_input(format!(
                "hydra pick line needs 12 fields, got {}: {line}",
                fields.len()
            )));
        }
        picks.push(PickInput {
            site: SiteInput {
                network: fields[2].to_string(),
                station: fields[0].to_string(),
                location: fields[3].to_string(),
                channel: fields[1].to_string(),
                latitude: 0.0,
                longitude: 0.0,
                elevation_km: parse_field(fields[4], "elevation")? / 1000.0,
            },
            agency: fields[10].to_string(),
            author: fields[11].to_string(),
            author_type: AuthorType::ContribAuto,
            arrival_time: parse_field(fields[5], "arrivalTime")?,
            observed_phase: fields[7].to_string(),
            affinity: parse_field(fields[8], "affinity")?,
            quality: parse_field(fields[9], "quality")?,
            force_association: false,
            surface_wave: false,
            used: fields[6] == "1",
        });
    }

    Ok(LocationRequest {
        source,
        picks,
        earth_model: "ak135".to_string(),
    })
}

pub fn write_response(response: &LocationResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {} {} {} {} {}\n",
        response.status,
        format_datetime(response.origin_time),
        response.latitude,
        response.longitude,
        response.depth,
        response.quality,
        response.bayesian_depth_importance.unwrap_or(0.0),
    ));
    for pick in &response.picks {
        out.push_str(&format!(
            "{} {} {} {} {} {} {} {} {}\n",
            pick.network,
            pick.station,
            pick.location,
            pick.channel,
            pick.phase,
            pick.residual,
            pick.weight,
            pick.distance_deg,
            pick.azimuth_deg,
        ));
    }
    out
}

fn parse_field(value: &str, name: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| EngineError::bad_input(format!("could not parse {name}: {value}")))
}

fn parse_optional_field(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| *v != 0.0)
}

fn parse_datetime(value: &str) -> Result<f64> {
    let parsed = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|_| EngineError::bad_input(format!("could not parse originTime: {value}")))?;
    Ok(parsed.and_utc().timestamp() as f64 + parsed.and_utc().timestamp_subsec_nanos() as f64 / 1e9)
}

fn format_datetime(epoch_seconds: f64) -> String {
    let secs = epoch_seconds.floor() as i64;
    let nanos = ((epoch_seconds - secs as f64) * 1e9).round() as u32;
    match chrono::DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.format(DATETIME_FORMAT).to_string(),
        None => "1970-01-01 00:00:00.000".to_string(),
    }
}
