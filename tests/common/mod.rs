//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::json;
use traffic_calib::network::NetworkDocument;
use traffic_calib::NetworkModel;

/// A 4-node diamond: A fans out to B and C, both merge at the signalized
/// junction D, and D leads back to A. Every edge has one lane.
///
/// The signal at D runs two 30 s phases, each green for one approach.
pub fn diamond_document() -> NetworkDocument {
    serde_json::from_value(json!({
        "nodes": [
            { "id": "A", "type": "priority", "x": 0.0, "y": 0.0 },
            { "id": "B", "type": "priority", "x": 100.0, "y": 100.0 },
            { "id": "C", "type": "priority", "x": 100.0, "y": -100.0 },
            {
                "id": "D", "type": "traffic_light", "x": 200.0, "y": 0.0,
                "program": { "phases": [
                    { "duration": 30.0, "state": "Gr" },
                    { "duration": 30.0, "state": "rG" }
                ]}
            }
        ],
        "edges": [
            { "id": "AB", "from": "A", "to": "B", "lanes": [
                { "id": "AB_0", "shape": [[0.0, 0.0], [100.0, 100.0]] } ] },
            { "id": "AC", "from": "A", "to": "C", "lanes": [
                { "id": "AC_0", "shape": [[0.0, 0.0], [100.0, -100.0]] } ] },
            { "id": "BD", "from": "B", "to": "D", "lanes": [
                { "id": "BD_0", "shape": [[100.0, 100.0], [200.0, 0.0]] } ] },
            { "id": "CD", "from": "C", "to": "D", "lanes": [
                { "id": "CD_0", "shape": [[100.0, -100.0], [200.0, 0.0]] } ] },
            { "id": "DA", "from": "D", "to": "A", "lanes": [
                { "id": "DA_0", "length": 200.0, "shape": [[200.0, 0.0], [0.0, 0.0]] } ] }
        ],
        "connections": [
            { "from": "AB_0", "to": "BD_0" },
            { "from": "AC_0", "to": "CD_0" },
            { "from": "BD_0", "to": "DA_0", "linkIndex": 0 },
            { "from": "CD_0", "to": "DA_0", "linkIndex": 1 },
            { "from": "DA_0", "to": "AB_0" },
            { "from": "DA_0", "to": "AC_0" }
        ]
    }))
    .unwrap()
}

pub fn diamond() -> NetworkModel {
    NetworkModel::from_document(&diamond_document()).unwrap()
}

/// The route definition matching [diamond], with one flow generator per route.
pub const DIAMOND_ROUTES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<routes>
    <vType id="car" accel="2.6" length="5"/>
    <route id="r_0" edges="AB BD"/>
    <route id="r_1" edges="AC CD"/>
    <route id="r_CAV" edges="AB BD DA"/>
    <flow id="f_0" type="car" route="r_0" begin="0" end="50400" vehsPerHour="100"/>
    <flow id="f_1" type="car" route="r_1" begin="0" end="50400" departLane="best"/>
    <flow id="f_cav" type="car" route="r_CAV" begin="0" end="50400" vehsPerHour="10"/>
</routes>
"#;

/// A lane data log with the given `(lane, speedRelative, sampledSeconds)`
/// samples repeated in every 300 s interval from `begin` to `end`.
pub fn lane_data(begin: u32, end: u32, lanes: &[(&str, f64, f64)]) -> String {
    let mut out = String::from("<meandata>\n");
    let mut t = begin;
    while t < end {
        out.push_str(&format!(
            "    <interval begin=\"{t}.00\" end=\"{}.00\" id=\"lane\">\n",
            t + 300
        ));
        for (lane, relative, sampled) in lanes {
            let edge = lane.split('_').next().unwrap_or(*lane);
            out.push_str(&format!("        <edge id=\"{edge}\">\n"));
            out.push_str(&format!(
                "            <lane id=\"{lane}\" sampledSeconds=\"{sampled}\" speed=\"{}\" speedRelative=\"{relative}\" laneDensity=\"3.5\" occupancy=\"2.0\" waitingTime=\"0.00\" timeLoss=\"4.2\" entered=\"20\" left=\"20\"/>\n",
                relative * 13.89
            ));
            out.push_str("        </edge>\n");
        }
        out.push_str("    </interval>\n");
        t += 300;
    }
    out.push_str("</meandata>\n");
    out
}
