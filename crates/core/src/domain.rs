use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage format for roll and frame dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Step size of a camera's shutter dial or a lens's aperture ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Increment {
    #[default]
    Third,
    Half,
    Full,
}

impl Increment {
    pub fn as_i64(self) -> i64 {
        match self {
            Increment::Third => 0,
            Increment::Half => 1,
            Increment::Full => 2,
        }
    }

    /// Unknown values fall back to third stops.
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Increment::Half,
            2 => Increment::Full,
            _ => Increment::Third,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GearKind {
    Camera,
    Lens,
    Filter,
}

impl GearKind {
    /// Kinds of gear that can form a mount relation with this kind.
    pub fn mountable_kinds(self) -> &'static [GearKind] {
        match self {
            GearKind::Camera => &[GearKind::Lens],
            GearKind::Lens => &[GearKind::Camera, GearKind::Filter],
            GearKind::Filter => &[GearKind::Lens],
        }
    }

    pub fn can_mount(self, other: GearKind) -> bool {
        self.mountable_kinds().contains(&other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GearKind::Camera => "camera",
            GearKind::Lens => "lens",
            GearKind::Filter => "filter",
        }
    }
}

impl fmt::Display for GearKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a single piece of gear: its kind plus its row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GearKey {
    pub kind: GearKind,
    pub id: i64,
}

impl GearKey {
    pub fn camera(id: i64) -> Self {
        Self { kind: GearKind::Camera, id }
    }

    pub fn lens(id: i64) -> Self {
        Self { kind: GearKind::Lens, id }
    }

    pub fn filter(id: i64) -> Self {
        Self { kind: GearKind::Filter, id }
    }
}

impl fmt::Display for GearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub min_shutter: Option<String>,
    pub max_shutter: Option<String>,
    pub shutter_increments: Increment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub min_aperture: Option<String>,
    pub max_aperture: Option<String>,
    /// Focal lengths in millimetres, 0 when unknown.
    pub min_focal_length: u32,
    pub max_focal_length: u32,
    pub aperture_increments: Increment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: i64,
    pub make: String,
    pub model: String,
}

/// A camera, lens or filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gear {
    Camera(Camera),
    Lens(Lens),
    Filter(Filter),
}

impl Gear {
    pub fn kind(&self) -> GearKind {
        match self {
            Gear::Camera(_) => GearKind::Camera,
            Gear::Lens(_) => GearKind::Lens,
            Gear::Filter(_) => GearKind::Filter,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Gear::Camera(c) => c.id,
            Gear::Lens(l) => l.id,
            Gear::Filter(f) => f.id,
        }
    }

    pub fn key(&self) -> GearKey {
        GearKey {
            kind: self.kind(),
            id: self.id(),
        }
    }

    pub fn make(&self) -> &str {
        match self {
            Gear::Camera(c) => &c.make,
            Gear::Lens(l) => &l.make,
            Gear::Filter(f) => &f.make,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Gear::Camera(c) => &c.model,
            Gear::Lens(l) => &l.model,
            Gear::Filter(f) => &f.model,
        }
    }

    /// Display name, "<make> <model>".
    pub fn name(&self) -> String {
        format!("{} {}", self.make(), self.model())
    }

    /// Rejects gear with a blank make or model.
    pub fn validate(&self) -> Result<()> {
        if self.make().trim().is_empty() {
            return Err(Error::Validation(format!("{} make must not be blank", self.kind())));
        }
        if self.model().trim().is_empty() {
            return Err(Error::Validation(format!("{} model must not be blank", self.kind())));
        }
        Ok(())
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        match self {
            Gear::Camera(c) => c.id = id,
            Gear::Lens(l) => l.id = id,
            Gear::Filter(f) => f.id = id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roll {
    pub id: i64,
    pub name: String,
    pub date: Option<NaiveDateTime>,
    pub note: Option<String>,
    /// `None` when the camera is unknown.
    pub camera_id: Option<i64>,
    pub iso: Option<u32>,
}

impl Roll {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("roll name must not be blank".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: i64,
    pub roll_id: i64,
    /// Frame number within the roll.
    pub count: i32,
    pub date: Option<NaiveDateTime>,
    pub shutter: Option<String>,
    pub aperture: Option<String>,
    pub note: Option<String>,
    pub location: Option<Location>,
    pub formatted_address: Option<String>,
    pub focal_length: u32,
    pub exposure_comp: Option<String>,
    pub lens_id: Option<i64>,
    pub filter_id: Option<i64>,
    pub picture_filename: Option<String>,
}

/// A GPS coordinate, stored as `"<lat> <lng>"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Parse the stored `"<lat> <lng>"` form. Either number may use `,` as its
    /// decimal separator. Empty, `"null"` and malformed strings mean no location.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s == "null" {
            return None;
        }
        let (lat, lng) = s.split_once(char::is_whitespace)?;
        let lat: f64 = lat.trim().replace(',', ".").parse().ok()?;
        let lng: f64 = lng.trim().replace(',', ".").parse().ok()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lat, self.lng)
    }
}

/// Sorting criteria for a roll's frame list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSortMode {
    #[default]
    FrameCount,
    Date,
    FStop,
    ShutterSpeed,
    Lens,
}

impl FrameSortMode {
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => FrameSortMode::Date,
            2 => FrameSortMode::FStop,
            3 => FrameSortMode::ShutterSpeed,
            4 => FrameSortMode::Lens,
            _ => FrameSortMode::FrameCount,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            FrameSortMode::FrameCount => 0,
            FrameSortMode::Date => 1,
            FrameSortMode::FStop => 2,
            FrameSortMode::ShutterSpeed => 3,
            FrameSortMode::Lens => 4,
        }
    }
}

/// Result of applying a desired mount selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountChange {
    pub added: usize,
    pub removed: usize,
}
