use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WildtraxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorKind {
    Aru,
    Cam,
    Pc,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Aru => "ARU",
            SensorKind::Cam => "CAM",
            SensorKind::Pc => "PC",
        }
    }

    /// Reports the export endpoint will produce for this sensor.
    pub fn reports(&self) -> &'static [ReportKind] {
        match self {
            SensorKind::Aru => &[
                ReportKind::Main,
                ReportKind::Birdnet,
                ReportKind::Location,
                ReportKind::Recording,
                ReportKind::Tag,
                ReportKind::Project,
            ],
            SensorKind::Cam => &[
                ReportKind::Main,
                ReportKind::MegaDetector,
                ReportKind::MegaClassifier,
                ReportKind::Location,
                ReportKind::ImageSet,
                ReportKind::ImageReport,
                ReportKind::Tag,
                ReportKind::Project,
            ],
            SensorKind::Pc => &[
                ReportKind::Main,
                ReportKind::Location,
                ReportKind::PointCount,
                ReportKind::Project,
            ],
        }
    }

    pub fn supports(&self, report: ReportKind) -> bool {
        self.reports().contains(&report)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = WildtraxError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ARU" => Ok(SensorKind::Aru),
            "CAM" => Ok(SensorKind::Cam),
            "PC" => Ok(SensorKind::Pc),
            _ => Err(WildtraxError::InvalidSensor(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Main,
    Project,
    Recording,
    PointCount,
    Location,
    Tag,
    ImageReport,
    ImageSet,
    Birdnet,
    #[serde(rename = "megadetector")]
    MegaDetector,
    #[serde(rename = "megaclassifier")]
    MegaClassifier,
}

impl ReportKind {
    pub const ALL: [ReportKind; 11] = [
        ReportKind::Main,
        ReportKind::Project,
        ReportKind::Recording,
        ReportKind::PointCount,
        ReportKind::Location,
        ReportKind::Tag,
        ReportKind::ImageReport,
        ReportKind::ImageSet,
        ReportKind::Birdnet,
        ReportKind::MegaDetector,
        ReportKind::MegaClassifier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Main => "main",
            ReportKind::Project => "project",
            ReportKind::Recording => "recording",
            ReportKind::PointCount => "point_count",
            ReportKind::Location => "location",
            ReportKind::Tag => "tag",
            ReportKind::ImageReport => "image_report",
            ReportKind::ImageSet => "image_set",
            ReportKind::Birdnet => "birdnet",
            ReportKind::MegaDetector => "megadetector",
            ReportKind::MegaClassifier => "megaclassifier",
        }
    }

    /// Query parameter toggling this report on the export endpoint.
    pub fn flag(&self) -> &'static str {
        match self {
            ReportKind::Main => "mainReport",
            ReportKind::Project => "projectReport",
            ReportKind::Recording => "recordingReport",
            ReportKind::PointCount => "pointCountReport",
            ReportKind::Location => "locationReport",
            ReportKind::Tag => "tagReport",
            ReportKind::ImageReport => "imageReport",
            ReportKind::ImageSet => "imageSetReport",
            ReportKind::Birdnet => "birdnetReport",
            ReportKind::MegaDetector => "megaDetectorReport",
            ReportKind::MegaClassifier => "megaClassifierReport",
        }
    }

    /// Trailing tokens of the archived file name carrying this report.
    pub fn file_suffix(&self) -> &'static [&'static str] {
        match self {
            ReportKind::Main => &["main", "report"],
            ReportKind::Project => &["project", "report"],
            ReportKind::Recording => &["recording", "report"],
            ReportKind::PointCount => &["point", "count", "report"],
            ReportKind::Location => &["location", "report"],
            ReportKind::Tag => &["tag", "report"],
            ReportKind::ImageReport => &["image", "report"],
            ReportKind::ImageSet => &["image", "set", "report"],
            ReportKind::Birdnet => &["birdnet", "report"],
            ReportKind::MegaDetector => &["megadetector", "report"],
            ReportKind::MegaClassifier => &["megaclassifier", "report"],
        }
    }

    /// True when `stem` ends with exactly this report's suffix tokens.
    pub fn matches_file_stem(&self, stem: &str) -> bool {
        let tokens = stem.split('_').collect::<Vec<_>>();
        let suffix = self.file_suffix();
        if tokens.len() < suffix.len() {
            return false;
        }
        tokens[tokens.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(token, expected)| token.eq_ignore_ascii_case(expected))
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = WildtraxError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| WildtraxError::UnknownReport(value.to_string()))
    }
}

/// Why a polygon boundary was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryDefect {
    NotAList,
    MalformedVertex { index: usize },
    TooFewVertices(usize),
    NotClosed,
    DuplicateVertex { index: usize, lng: f64, lat: f64 },
}

impl fmt::Display for BoundaryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryDefect::NotAList => {
                write!(f, "boundary must be a list of (longitude, latitude) pairs")
            }
            BoundaryDefect::MalformedVertex { index } => write!(
                f,
                "vertex {index} must be a pair of finite numbers (longitude, latitude)"
            ),
            BoundaryDefect::TooFewVertices(count) => {
                write!(f, "boundary must have at least 4 vertices, got {count}")
            }
            BoundaryDefect::NotClosed => write!(
                f,
                "the first and last vertices must be identical to close the polygon"
            ),
            BoundaryDefect::DuplicateVertex { index, lng, lat } => write!(
                f,
                "vertex {index} ({lng}, {lat}) repeats an earlier vertex; only the first and last may coincide"
            ),
        }
    }
}

/// Closed polygon scoping a discovery query, as (longitude, latitude) pairs.
///
/// Only arity, closure and interior uniqueness are checked. Winding order and
/// self-intersection are passed through to the server untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Boundary(Vec<[f64; 2]>);

impl Boundary {
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self, WildtraxError> {
        for (index, [lng, lat]) in vertices.iter().enumerate() {
            if !lng.is_finite() || !lat.is_finite() {
                return Err(WildtraxError::InvalidBoundary(
                    BoundaryDefect::MalformedVertex { index },
                ));
            }
        }
        if vertices.len() < 4 {
            return Err(WildtraxError::InvalidBoundary(
                BoundaryDefect::TooFewVertices(vertices.len()),
            ));
        }
        if vertices.first() != vertices.last() {
            return Err(WildtraxError::InvalidBoundary(BoundaryDefect::NotClosed));
        }

        let mut seen = HashSet::new();
        let interior = &vertices[1..vertices.len() - 1];
        for (offset, [lng, lat]) in interior.iter().enumerate() {
            // -0.0 and 0.0 compare equal, so fold them before hashing bits
            let key = ((lng + 0.0).to_bits(), (lat + 0.0).to_bits());
            if !seen.insert(key) {
                return Err(WildtraxError::InvalidBoundary(
                    BoundaryDefect::DuplicateVertex {
                        index: offset + 1,
                        lng: *lng,
                        lat: *lat,
                    },
                ));
            }
        }

        Ok(Self(vertices))
    }

    /// Builds a boundary from loosely typed input such as `[[lng, lat], ...]`.
    pub fn from_json(value: &Value) -> Result<Self, WildtraxError> {
        let items = value
            .as_array()
            .ok_or(WildtraxError::InvalidBoundary(BoundaryDefect::NotAList))?;
        let vertices = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let malformed = || WildtraxError::InvalidBoundary(BoundaryDefect::MalformedVertex { index });
                let pair = item.as_array().ok_or_else(malformed)?;
                match pair.as_slice() {
                    [lng, lat] => Ok([
                        lng.as_f64().ok_or_else(malformed)?,
                        lat.as_f64().ok_or_else(malformed)?,
                    ]),
                    _ => Err(malformed()),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.0
    }
}
