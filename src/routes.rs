//! Reading routes from, and writing demand into, the simulator's route definition.

use crate::error::Result;
use crate::xml;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The attribute of a flow generator holding its demand in vehicles per hour.
const DEMAND_ATTR: &str = "vehsPerHour";

/// A named, ordered sequence of edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub edges: Vec<String>,
}

/// Selects which routes of the definition take part in the assignment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFilter {
    /// Only routes whose id starts with this prefix are kept. `None` or an
    /// empty prefix keeps every route.
    pub prefix: Option<String>,
    /// Route ids to leave out even if they match the prefix.
    pub exclude: Vec<String>,
}

impl Default for RouteFilter {
    fn default() -> Self {
        Self {
            prefix: Some("r_".into()),
            exclude: vec!["r_CAV".into()],
        }
    }
}

impl RouteFilter {
    /// A filter that keeps every route.
    pub fn all() -> Self {
        Self {
            prefix: None,
            exclude: vec![],
        }
    }

    pub fn accepts(&self, route_id: &str) -> bool {
        let prefixed = self
            .prefix
            .as_deref()
            .filter(|prefix| !prefix.is_empty())
            .map_or(true, |prefix| route_id.starts_with(prefix));
        prefixed && !self.exclude.iter().any(|id| id == route_id)
    }
}

/// Parses the top-level `route` elements of a route definition.
pub fn parse_routes(content: &str, filter: &RouteFilter) -> Result<Vec<Route>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    let mut routes = vec![];
    let mut depth = 0usize;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(elem) | Event::Empty(elem) => {
                if depth == 1 && elem.name().as_ref() == b"route" {
                    let id = xml::required(elem, "id")?;
                    if filter.accepts(&id) {
                        let edges = xml::required(elem, "edges")?
                            .split_whitespace()
                            .map(str::to_string)
                            .collect();
                        routes.push(Route { id, edges });
                    }
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(routes)
}

/// Reads the routes of a route definition file.
pub fn read_routes(path: &Path, filter: &RouteFilter) -> Result<Vec<Route>> {
    let content = std::fs::read_to_string(path)?;
    parse_routes(&content, filter)
}

/// Reads the demand of every top-level flow generator, keyed by route id.
pub fn parse_demand(content: &str) -> Result<HashMap<String, f64>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    let mut demand = HashMap::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(elem) | Event::Empty(elem) => {
                if depth == 1 && elem.name().as_ref() == b"flow" {
                    if let (Some(route), Some(vph)) = (
                        xml::attribute(elem, "route")?,
                        xml::number(elem, DEMAND_ATTR)?,
                    ) {
                        demand.insert(route, vph);
                    }
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(demand)
}

/// Rewrites the demand attribute of the flow generators whose route appears in `demand`.
/// Flows are rounded to whole vehicles per hour; all other content passes through untouched.
///
/// Returns the new document and the number of generators updated.
pub fn rewrite_demand(content: &str, demand: &HashMap<String, f64>) -> Result<(String, usize)> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::with_capacity(content.len()));
    let mut depth = 0usize;
    let mut updated = 0;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Start(ref elem) | Event::Empty(ref elem)
                if depth == 1 && elem.name().as_ref() == b"flow" =>
            {
                let vph = match xml::attribute(elem, "route")? {
                    Some(route) => demand.get(&route).copied(),
                    None => None,
                };
                match vph {
                    Some(vph) => {
                        let elem = with_demand(elem, vph)?;
                        updated += 1;
                        if matches!(event, Event::Start(_)) {
                            depth += 1;
                            writer.write_event(Event::Start(elem))?;
                        } else {
                            writer.write_event(Event::Empty(elem))?;
                        }
                    }
                    None => {
                        if matches!(event, Event::Start(_)) {
                            depth += 1;
                        }
                        writer.write_event(event)?;
                    }
                }
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event)?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event)?;
            }
            event => writer.write_event(event)?,
        }
    }

    let output = String::from_utf8(writer.into_inner())
        .map_err(|e| crate::Error::malformed("route definition", e.to_string()))?;
    Ok((output, updated))
}

/// Copies a flow element, replacing (or appending) its demand attribute. The rest of
/// the tag keeps its original spelling, quoting and whitespace.
fn with_demand(elem: &BytesStart, vph: f64) -> Result<BytesStart<'static>> {
    let malformed = |reason: String| crate::Error::malformed("route definition", reason);
    let raw = std::str::from_utf8(elem).map_err(|e| malformed(e.to_string()))?;
    let value = format!("{}", vph.max(0.0).round() as i64);

    let mut span = None;
    for attr in elem.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == DEMAND_ATTR.as_bytes() {
            // Raw attribute values are slices of the tag itself.
            let start = (attr.value.as_ptr() as usize).wrapping_sub(raw.as_ptr() as usize);
            let end = start.saturating_add(attr.value.len());
            if raw.as_bytes().get(start..end) != Some(&*attr.value) {
                return Err(malformed(format!("cannot locate {DEMAND_ATTR} in <{raw}>")));
            }
            span = Some(start..end);
        }
    }

    let content = match span {
        Some(span) => format!("{}{value}{}", &raw[..span.start], &raw[span.end..]),
        None => format!("{} {DEMAND_ATTR}=\"{value}\"", raw.trim_end()),
    };
    Ok(BytesStart::from_content(content, elem.name().as_ref().len()))
}

/// Overwrites the demand of matching flow generators in a route definition file.
pub fn write_demand(path: &Path, demand: &HashMap<String, f64>) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let (output, updated) = rewrite_demand(&content, demand)?;
    std::fs::write(path, output)?;
    log::info!(
        "Wrote demand for {updated} flow generators to {}",
        path.display()
    );
    Ok(updated)
}

#[cfg(test)]
mod test {
    use super::{parse_routes, RouteFilter};

    #[test]
    fn filter_by_prefix() {
        let content = r#"<routes>
            <vType id="car"/>
            <route id="r_0" edges="a b c"/>
            <route id="r_CAV" edges="a b"/>
            <route id="bus" edges="c"/>
        </routes>"#;
        let routes = parse_routes(content, &RouteFilter::default()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, "r_0");
        assert_eq!(routes[0].edges, ["a", "b", "c"]);

        let routes = parse_routes(content, &RouteFilter::all()).unwrap();
        assert_eq!(routes.len(), 3);

        let filter = RouteFilter {
            prefix: Some(String::new()),
            exclude: vec!["bus".into()],
        };
        let routes = parse_routes(content, &filter).unwrap();
        assert_eq!(routes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r_0", "r_CAV"]);
    }

    #[test]
    fn nested_routes_are_ignored() {
        let content = r#"<routes>
            <vehicle id="v0" depart="0"><route id="r_inner" edges="x"/></vehicle>
            <route id="r_1" edges="a"></route>
        </routes>"#;
        let routes = parse_routes(content, &RouteFilter::default()).unwrap();
        assert_eq!(routes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["r_1"]);
    }
}
