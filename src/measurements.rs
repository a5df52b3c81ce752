//! The lane measurement log written by the simulation engine.

use crate::error::Result;
use crate::util::Interval;
use crate::xml;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::path::Path;

/// A time-windowed sample of one lane.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LaneMeasurement {
    pub lane_id: String,
    pub edge_id: String,
    /// The simulated time window in s.
    pub window: Interval<f64>,
    /// Mean speed in m/s.
    pub speed: f64,
    /// Mean speed relative to the speed limit.
    pub speed_relative: f64,
    /// Occupancy in %.
    pub occupancy: f64,
    /// Vehicles per km.
    pub density: f64,
    pub entered: f64,
    pub left: f64,
    /// Vehicle-seconds spent on the lane.
    pub sampled_seconds: f64,
    pub waiting_time: f64,
    pub time_loss: f64,
}

/// All measurements from one simulation run, in log order.
#[derive(Clone, Debug, Default)]
pub struct LaneDataLog {
    pub records: Vec<LaneMeasurement>,
    /// The end of the latest interval, including intervals with no lanes.
    pub last_end: Option<f64>,
}

impl LaneDataLog {
    /// Parses a lane data document.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut log = Self::default();
        let mut window = Interval::new(0.0, 0.0);
        let mut edge_id = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(elem) | Event::Empty(elem) => match elem.name().as_ref() {
                    b"interval" => {
                        window = Interval::new(
                            xml::number(&elem, "begin")?.unwrap_or(0.0),
                            xml::number(&elem, "end")?.unwrap_or(0.0),
                        );
                        log.last_end = Some(log.last_end.map_or(window.max, |t| t.max(window.max)));
                    }
                    b"edge" => edge_id = xml::required(&elem, "id")?,
                    b"lane" => {
                        let record = Self::read_lane(&elem, &edge_id, window)?;
                        log.records.push(record);
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(log)
    }

    /// Loads a lane data file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let log = Self::parse(&content)?;
        log::info!(
            "Read {} lane measurements from {}",
            log.records.len(),
            path.display()
        );
        Ok(log)
    }

    fn read_lane(elem: &BytesStart, edge_id: &str, window: Interval<f64>) -> Result<LaneMeasurement> {
        let lane_id = xml::required(elem, "id")?;
        // Lanes without traffic omit most attributes.
        let field = |name: &str| -> Result<f64> { Ok(xml::number(elem, name)?.unwrap_or(0.0)) };
        let density = match xml::number(elem, "laneDensity")? {
            Some(density) => density,
            None => field("density")?,
        };
        Ok(LaneMeasurement {
            edge_id: edge_id.to_string(),
            window,
            speed: field("speed")?,
            speed_relative: field("speedRelative")?,
            occupancy: field("occupancy")?,
            density,
            entered: field("entered")?,
            left: field("left")?,
            sampled_seconds: field("sampledSeconds")?,
            waiting_time: field("waitingTime")?,
            time_loss: field("timeLoss")?,
            lane_id,
        })
    }

    /// Whether the run reached `end_time`.
    pub fn reached(&self, end_time: f64) -> bool {
        self.last_end.map_or(false, |t| t + 1e-6 >= end_time)
    }
}

#[cfg(test)]
mod test {
    use super::LaneDataLog;

    const LOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<meandata>
    <interval begin="0.00" end="300.00" id="lane_data">
        <edge id="e1">
            <lane id="e1_0" sampledSeconds="120.5" traveltime="10" speed="12.5" speedRelative="0.9"
                  laneDensity="4.2" occupancy="2.1" waitingTime="0" timeLoss="3.5" entered="10" left="9"/>
            <lane id="e1_1" sampledSeconds="0"/>
        </edge>
    </interval>
    <interval begin="300.00" end="600.00" id="lane_data"/>
</meandata>"#;

    #[test]
    fn parse_lane_data() {
        let log = LaneDataLog::parse(LOG).unwrap();
        assert_eq!(log.records.len(), 2);
        let first = &log.records[0];
        assert_eq!(first.lane_id, "e1_0");
        assert_eq!(first.edge_id, "e1");
        assert_eq!(first.window.length(), 300.0);
        assert_eq!(first.speed_relative, 0.9);
        assert_eq!(first.density, 4.2);
        assert_eq!(log.records[1].speed, 0.0);
        assert_eq!(log.last_end, Some(600.0));
        assert!(log.reached(600.0));
        assert!(!log.reached(900.0));
    }

    #[test]
    fn rejects_bad_numbers() {
        let bad = r#"<meandata><interval begin="x" end="1"/></meandata>"#;
        assert!(LaneDataLog::parse(bad).is_err());
    }
}
