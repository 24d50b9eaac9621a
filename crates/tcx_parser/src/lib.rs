//! Loader for Garmin Training Center XML (TCX) documents.
//!
//! The schema is published at
//! <http://www8.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd>. Only the
//! `Activity → Lap → Trackpoint` hierarchy is mapped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

mod reader;

pub use reader::{TCX_NAMESPACE, parse_timestamp};

#[derive(Debug, Error)]
pub enum TcxError {
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("<{parent}> is missing required element <{name}>")]
    MissingElement { parent: String, name: &'static str },
    #[error("<{element}> is missing required attribute {name}")]
    MissingAttribute { element: String, name: &'static str },
    #[error("invalid number in <{field}>: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("expected exactly one activity, found {found}")]
    ActivityCount { found: usize },
}

/// One recorded workout.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Activity {
    pub sport: String,
    pub time: DateTime<Utc>,
    pub laps: Vec<Lap>,
}

impl Activity {
    /// Sum of the lap durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.laps.iter().map(|l| l.duration).sum()
    }

    /// Sum of the lap distances, in meters.
    pub fn total_distance(&self) -> f64 {
        self.laps.iter().map(|l| l.distance).sum()
    }

    pub fn trackpoints(&self) -> impl Iterator<Item = &Trackpoint> {
        self.laps.iter().flat_map(|l| l.trackpoints.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Lap {
    pub start_time: DateTime<Utc>,
    /// Seconds.
    pub duration: f64,
    /// Meters.
    pub distance: f64,
    pub calories: f64,
    /// Raw `MaximumSpeed` text; see [`Lap::max_speed_mps`].
    pub max_speed: Option<String>,
    pub trackpoints: Vec<Trackpoint>,
}

impl Lap {
    /// Maximum speed in meters per second, when present and numeric.
    pub fn max_speed_mps(&self) -> Option<f64> {
        self.max_speed.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

impl fmt::Display for Lap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lap[dur={}, dist={}, max_speed=",
            self.duration as i64, self.distance as i64
        )?;
        match self.max_speed_mps() {
            Some(speed) => write!(f, "{}", speed as i64)?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            ", cal={}, {} points]",
            self.calories as i64,
            self.trackpoints.len()
        )
    }
}

/// A single timestamped sample.
///
/// `latlng` is set only when the sample carries a position, and then always
/// holds both coordinates. Altitude and distance are kept as the raw element
/// text; use [`Trackpoint::altitude_meters`] and
/// [`Trackpoint::distance_meters`] for numbers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trackpoint {
    pub time: DateTime<Utc>,
    pub latlng: Option<(f64, f64)>,
    pub altitude: Option<String>,
    pub distance: Option<String>,
}

impl Trackpoint {
    pub fn altitude_meters(&self) -> Option<f64> {
        self.altitude.as_deref().and_then(|s| s.trim().parse().ok())
    }

    pub fn distance_meters(&self) -> Option<f64> {
        self.distance.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

/// Parse every `Activity` element of a TCX document, in document order.
pub fn parse_activities(xml: &str) -> Result<Vec<Activity>, TcxError> {
    let doc = roxmltree::Document::parse(xml)?;
    let activities = reader::read_activities(&doc)?;
    tracing::debug!(count = activities.len(), "parsed tcx activities");
    Ok(activities)
}

/// Like [`parse_activities`], reading the document from `source`.
pub fn read_activities<R: Read>(mut source: R) -> Result<Vec<Activity>, TcxError> {
    let mut xml = String::new();
    source.read_to_string(&mut xml)?;
    parse_activities(&xml)
}

/// Like [`parse_activities`], reading the document from a file.
pub fn load_activities(path: impl AsRef<Path>) -> Result<Vec<Activity>, TcxError> {
    let xml = std::fs::read_to_string(path)?;
    parse_activities(&xml)
}

/// Parse a document that must contain exactly one activity.
pub fn parse_activity(xml: &str) -> Result<Activity, TcxError> {
    exactly_one(parse_activities(xml)?)
}

/// Load a file that must contain exactly one activity.
pub fn load_activity(path: impl AsRef<Path>) -> Result<Activity, TcxError> {
    exactly_one(load_activities(path)?)
}

fn exactly_one(mut activities: Vec<Activity>) -> Result<Activity, TcxError> {
    match activities.len() {
        1 => Ok(activities.remove(0)),
        found => Err(TcxError::ActivityCount { found }),
    }
}
