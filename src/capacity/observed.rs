use crate::measurements::LaneMeasurement;
use std::collections::HashMap;

/// Estimates lane capacity from simulation: the largest hourly volume seen
/// entering or leaving each lane in any interval after the warm-up.
pub fn observed_max_volume(records: &[LaneMeasurement], warm_up: f64) -> HashMap<String, f64> {
    let mut volumes: HashMap<String, f64> = HashMap::new();
    for record in records.iter().filter(|r| r.window.max > warm_up) {
        let duration = record.window.length();
        if duration <= 0.0 {
            continue;
        }
        let volume = f64::max(record.entered, record.left) * 3600.0 / duration;
        let entry = volumes.entry(record.lane_id.clone()).or_insert(0.0);
        *entry = entry.max(volume);
    }
    volumes
}

#[cfg(test)]
mod test {
    use super::observed_max_volume;
    use crate::measurements::LaneMeasurement;
    use crate::util::Interval;

    fn sample(begin: f64, entered: f64, left: f64) -> LaneMeasurement {
        LaneMeasurement {
            lane_id: "a_0".into(),
            window: Interval::new(begin, begin + 300.0),
            entered,
            left,
            ..Default::default()
        }
    }

    #[test]
    fn max_after_warm_up() {
        let records = [
            sample(3000.0, 200.0, 0.0),
            sample(3600.0, 50.0, 60.0),
            sample(3900.0, 40.0, 30.0),
        ];
        let volumes = observed_max_volume(&records, 3600.0);
        assert_eq!(volumes["a_0"], 720.0);
    }
}
