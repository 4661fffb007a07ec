//! Topic routing: which topics a canonical record fans out to and the
//! field subset each one carries on the wire.

use replay_model::CanonicalTelemetry;
use serde_json::{json, Value};

/// Origin tag stamped on every payload so dashboards can tell replayed
/// data from the live car.
pub const SOURCE_TAG: &str = "replay";

/// Field subset a topic receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The full telemetry shape the dashboard consumes.
    Telemetry,
    /// GPS-only shape mirroring the on-car Pi GPS feed.
    PositionOnly,
}

/// One output topic and the projection applied to it.
#[derive(Debug, Clone)]
pub struct TopicRoute {
    pub topic: String,
    pub projection: Projection,
}

impl TopicRoute {
    pub fn new(topic: impl Into<String>, projection: Projection) -> Self {
        Self {
            topic: topic.into(),
            projection,
        }
    }
}

pub fn render(projection: Projection, t: &CanonicalTelemetry) -> Value {
    match projection {
        Projection::Telemetry => json!({
            "latitude": t.latitude,
            "longitude": t.longitude,
            "speed": t.speed,
            "rpm": 0,
            "heading": t.heading,
            "voltage": t.voltage,
            "current": t.current,
            "power": t.power,
            "total_energy_wh": t.energy,
            "energy": t.energy,
            "lap_energy": t.lap_energy,
            "lap": t.lap,
            "distance_km": t.distance,
            "lap_distance": t.lap_distance,
            "source": SOURCE_TAG,
        }),
        // The live GPS daemon reports fix metadata the recordings never
        // kept; fixed defaults keep the consumer schema happy.
        Projection::PositionOnly => json!({
            "latitude": t.latitude,
            "longitude": t.longitude,
            "speed_kmh": t.speed,
            "heading": t.heading,
            "altitude": 0.0,
            "satellites": 8,
            "fix_quality": 1,
            "source": SOURCE_TAG,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalTelemetry {
        CanonicalTelemetry {
            source_timestamp: 12.5,
            latitude: 52.07,
            longitude: 4.30,
            speed: 28.4,
            voltage: 48.1,
            current: 3.2,
            power: 153.92,
            distance: 1.2,
            lap_distance: 410.0,
            energy: 1520.0,
            lap_energy: 80.0,
            lap: 3,
            heading: 91.5,
        }
    }

    #[test]
    fn telemetry_projection_fields() {
        let v = render(Projection::Telemetry, &sample());
        assert_eq!(v["latitude"], json!(52.07));
        assert_eq!(v["speed"], json!(28.4));
        assert_eq!(v["power"], json!(153.92));
        assert_eq!(v["total_energy_wh"], json!(1520.0));
        assert_eq!(v["energy"], json!(1520.0));
        assert_eq!(v["lap"], json!(3));
        assert_eq!(v["distance_km"], json!(1.2));
        assert_eq!(v["source"], json!("replay"));
    }

    #[test]
    fn position_projection_uses_fixed_gps_defaults() {
        let v = render(Projection::PositionOnly, &sample());
        assert_eq!(v["speed_kmh"], json!(28.4));
        assert_eq!(v["heading"], json!(91.5));
        assert_eq!(v["altitude"], json!(0.0));
        assert_eq!(v["satellites"], json!(8));
        assert_eq!(v["fix_quality"], json!(1));
        assert_eq!(v["source"], json!("replay"));
        assert!(v.get("voltage").is_none());
    }
}
