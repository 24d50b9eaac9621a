//! Element-to-record mapping over a parsed `roxmltree` document.

use crate::{Activity, Lap, TcxError, Trackpoint};
use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::{Document, Node};

pub const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";

/// Parse a TCX timestamp. RFC 3339 with any offset is accepted; a timestamp
/// without an offset is taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TcxError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TcxError::InvalidTimestamp(s.to_string()))
}

pub(crate) fn read_activities(doc: &Document<'_>) -> Result<Vec<Activity>, TcxError> {
    doc.descendants()
        .filter(|n| n.has_tag_name((TCX_NAMESPACE, "Activity")))
        .map(read_activity)
        .collect()
}

fn read_activity(node: Node<'_, '_>) -> Result<Activity, TcxError> {
    let sport = required_attribute(node, "Sport")?.to_string();
    let time = parse_timestamp(required_text(node, "Id")?)?;
    let laps = children(node, "Lap").map(read_lap).collect::<Result<_, _>>()?;
    Ok(Activity { sport, time, laps })
}

fn read_lap(node: Node<'_, '_>) -> Result<Lap, TcxError> {
    let start_time = parse_timestamp(required_attribute(node, "StartTime")?)?;
    let duration = required_f64(node, "TotalTimeSeconds")?;
    let distance = required_f64(node, "DistanceMeters")?;
    let calories = required_f64(node, "Calories")?;
    let max_speed = optional_text(node, "MaximumSpeed").map(str::to_string);
    // Only the first Track of a lap is read.
    let trackpoints = match child(node, "Track") {
        Some(track) => track
            .children()
            .filter(|n| n.is_element())
            .map(read_trackpoint)
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    Ok(Lap {
        start_time,
        duration,
        distance,
        calories,
        max_speed,
        trackpoints,
    })
}

fn read_trackpoint(node: Node<'_, '_>) -> Result<Trackpoint, TcxError> {
    let time = parse_timestamp(required_text(node, "Time")?)?;
    let latlng = match child(node, "Position") {
        Some(position) => Some((
            required_f64(position, "LatitudeDegrees")?,
            required_f64(position, "LongitudeDegrees")?,
        )),
        None => None,
    };
    Ok(Trackpoint {
        time,
        latlng,
        altitude: optional_text(node, "AltitudeMeters").map(str::to_string),
        distance: optional_text(node, "DistanceMeters").map(str::to_string),
    })
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.has_tag_name((TCX_NAMESPACE, name)))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &'static str) -> Result<&'a str, TcxError> {
    node.attribute(name).ok_or_else(|| TcxError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        name,
    })
}

fn required_text<'a>(node: Node<'a, '_>, name: &'static str) -> Result<&'a str, TcxError> {
    let element = child(node, name).ok_or_else(|| TcxError::MissingElement {
        parent: node.tag_name().name().to_string(),
        name,
    })?;
    Ok(element.text().unwrap_or("").trim())
}

fn optional_text<'a>(node: Node<'a, '_>, name: &'static str) -> Option<&'a str> {
    child(node, name).map(|n| n.text().unwrap_or("").trim())
}

fn required_f64(node: Node<'_, '_>, name: &'static str) -> Result<f64, TcxError> {
    parse_f64(name, required_text(node, name)?)
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, TcxError> {
    raw.parse().map_err(|_| TcxError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}
