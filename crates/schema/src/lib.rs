//! Layout detection and normalization for recorded telemetry rows, plus
//! the derived fields (heading, power) the recordings do not carry.

use replay_model::{CanonicalTelemetry, RawRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("row matches no known telemetry layout")]
    Unrecognized,
    #[error("field `{field}` is not numeric: {value:?}")]
    Malformed { field: String, value: String },
}

/// A normalized row, tagged with the rule that produced it.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub telemetry: CanonicalTelemetry,
    pub rule: &'static str,
    /// Whether `power` came straight from the source, as opposed to
    /// needing derivation from voltage and current.
    pub power_from_source: bool,
}

type MapFn = fn(&RawRecord) -> Result<Normalized, SchemaError>;

/// One known source layout: a sentinel column that identifies it and the
/// mapping into the canonical shape.
pub struct LayoutRule {
    pub name: &'static str,
    sentinel: &'static str,
    map: MapFn,
}

impl LayoutRule {
    pub fn new(name: &'static str, sentinel: &'static str, map: MapFn) -> Self {
        Self {
            name,
            sentinel,
            map,
        }
    }
}

/// Ordered rule table, first match wins. New layouts are added as rules;
/// call sites never change.
pub struct Normalizer {
    rules: Vec<LayoutRule>,
}

impl Normalizer {
    /// The two recorded-data layouts the team has shipped so far: the
    /// legacy on-board-computer dump and the current-year logger format.
    pub fn with_default_rules() -> Self {
        Self {
            rules: vec![
                LayoutRule::new("legacy", "obc_timestamp", map_legacy),
                LayoutRule::new("current", "timestamp", map_current),
            ],
        }
    }

    pub fn push_rule(&mut self, rule: LayoutRule) {
        self.rules.push(rule);
    }

    pub fn normalize(&self, row: &RawRecord) -> Result<Normalized, SchemaError> {
        for rule in &self.rules {
            if row.contains(rule.sentinel) {
                return (rule.map)(row);
            }
        }
        Err(SchemaError::Unrecognized)
    }
}

/// Missing or blank columns default to zero; a present but non-numeric
/// value poisons the whole row.
fn num(row: &RawRecord, field: &str) -> Result<f64, SchemaError> {
    match row.get(field) {
        None => Ok(0.0),
        Some(s) if s.trim().is_empty() => Ok(0.0),
        Some(s) => s.trim().parse().map_err(|_| SchemaError::Malformed {
            field: field.into(),
            value: s.into(),
        }),
    }
}

fn int(row: &RawRecord, field: &str) -> Result<u32, SchemaError> {
    match row.get(field) {
        None => Ok(0),
        Some(s) if s.trim().is_empty() => Ok(0),
        Some(s) => s.trim().parse().map_err(|_| SchemaError::Malformed {
            field: field.into(),
            value: s.into(),
        }),
    }
}

fn map_legacy(row: &RawRecord) -> Result<Normalized, SchemaError> {
    let telemetry = CanonicalTelemetry {
        source_timestamp: num(row, "obc_timestamp")?,
        latitude: num(row, "gps_latitude")?,
        longitude: num(row, "gps_longitude")?,
        speed: num(row, "gps_speed")?,
        voltage: num(row, "jm3_voltage")?,
        // Recorded current is often negative (regen / sensor polarity).
        current: num(row, "jm3_current")?.abs(),
        power: 0.0,
        distance: num(row, "dist")?,
        lap_distance: num(row, "lap_dist")?,
        energy: num(row, "jm3_netjoule")?,
        lap_energy: num(row, "lap_jm3_netjoule")?,
        lap: int(row, "lap_lap")?,
        heading: 0.0,
    };
    Ok(Normalized {
        telemetry,
        rule: "legacy",
        power_from_source: false,
    })
}

fn map_current(row: &RawRecord) -> Result<Normalized, SchemaError> {
    let power_from_source = row.get("power").is_some_and(|s| !s.trim().is_empty());
    let telemetry = CanonicalTelemetry {
        source_timestamp: num(row, "timestamp")?,
        latitude: num(row, "latitude")?,
        longitude: num(row, "longitude")?,
        speed: num(row, "speed")?,
        voltage: num(row, "voltage")?,
        current: num(row, "current")?.abs(),
        power: num(row, "power")?,
        distance: num(row, "distance_km")?,
        lap_distance: 0.0,
        energy: num(row, "total_energy_wh")?,
        lap_energy: 0.0,
        lap: 0,
        heading: 0.0,
    };
    Ok(Normalized {
        telemetry,
        rule: "current",
        power_from_source,
    })
}

/// How heading is computed from two GPS fixes. The flat approximation
/// matches one of the historical replay scripts; keep both until the
/// dashboards agree on one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeadingStrategy {
    /// Great-circle initial bearing.
    #[default]
    Spherical,
    /// atan2 over raw degree deltas, close enough at track scale.
    FlatApprox,
}

impl HeadingStrategy {
    /// Bearing in degrees [0, 360) from `prev` to `cur`, both
    /// (latitude, longitude) in degrees. Identical fixes give 0.
    pub fn bearing(self, prev: (f64, f64), cur: (f64, f64)) -> f64 {
        if prev == cur {
            return 0.0;
        }
        match self {
            HeadingStrategy::Spherical => {
                let lat1 = prev.0.to_radians();
                let lat2 = cur.0.to_radians();
                let dlon = (cur.1 - prev.1).to_radians();
                let x = dlon.sin() * lat2.cos();
                let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
                (x.atan2(y).to_degrees() + 360.0) % 360.0
            }
            HeadingStrategy::FlatApprox => {
                let dlat = cur.0 - prev.0;
                let dlon = cur.1 - prev.1;
                dlon.atan2(dlat).to_degrees().rem_euclid(360.0)
            }
        }
    }
}

/// Fill in the derived fields: heading from the previous fix, and power
/// when the source layout did not supply one.
pub fn augment(rec: &mut Normalized, prev_fix: Option<(f64, f64)>, strategy: HeadingStrategy) {
    let t = &mut rec.telemetry;
    t.heading = match prev_fix {
        Some(prev) => strategy.bearing(prev, (t.latitude, t.longitude)),
        None => 0.0,
    };
    if !rec.power_from_source {
        t.power = t.voltage * t.current.abs();
    }
}
