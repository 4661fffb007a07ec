use serde::{Deserialize, Serialize};

/// One row from the tabular source: field names paired with raw string
/// values, kept in column order. Produced by the file reader, consumed
/// once by the schema normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Value of the first column named `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The normalized shape every source layout is converted into. Always
/// fully populated; fields a layout does not provide default to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTelemetry {
    /// Seconds, monotonic within one recording. Not wall-clock.
    pub source_timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h
    pub speed: f64,
    pub voltage: f64,
    /// Amps, stored as a non-negative magnitude.
    pub current: f64,
    /// Watts. Derived as voltage * |current| when the source has no
    /// power column.
    pub power: f64,
    pub distance: f64,
    pub lap_distance: f64,
    pub energy: f64,
    pub lap_energy: f64,
    pub lap: u32,
    /// Compass degrees in [0, 360), derived from consecutive GPS fixes.
    pub heading: f64,
}
