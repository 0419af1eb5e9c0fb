//! Rides, their ratings and test measurements.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::TileCoords;
use crate::registry::{EntityData, EntityKind, EntityRegistry};

/// Ticks a ride spends in test mode before its measurement completes.
pub const TEST_DURATION_TICKS: u32 = 640;

/// Rating values are fixed point with two decimals (`650` = 6.50).
pub type RatingValue = u16;

/// Stable ride identifier, allocated from [`SimulationState::next_ride_id`](crate::state::SimulationState::next_ride_id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(pub u16);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ride#{}", self.0)
    }
}

/// Operating state of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RideStatus {
    Closed,
    Testing,
    Open,
}

/// Ride types understood by this build. Stored by numeric id so that a park
/// written by a newer build with unknown types fails to load cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RideType {
    Carousel,
    FerrisWheel,
    WoodenCoaster,
    LogFlume,
}

impl RideType {
    /// Look up a type by its stored id. `None` for types this build lacks.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(RideType::Carousel),
            1 => Some(RideType::FerrisWheel),
            2 => Some(RideType::WoodenCoaster),
            3 => Some(RideType::LogFlume),
            _ => None,
        }
    }

    /// Numeric id written to park files.
    pub fn id(self) -> u8 {
        match self {
            RideType::Carousel => 0,
            RideType::FerrisWheel => 1,
            RideType::WoodenCoaster => 2,
            RideType::LogFlume => 3,
        }
    }

    /// Name of the ride object this type needs loaded.
    pub fn object_id(self) -> &'static str {
        match self {
            RideType::Carousel => "rct2.ride.mgr1",
            RideType::FerrisWheel => "rct2.ride.fwh1",
            RideType::WoodenCoaster => "rct2.ride.wdcoaster",
            RideType::LogFlume => "rct2.ride.lfb1",
        }
    }

    /// Base excitement, intensity and nausea.
    fn base_ratings(self) -> (RatingValue, RatingValue, RatingValue) {
        match self {
            RideType::Carousel => (100, 50, 30),
            RideType::FerrisWheel => (60, 25, 30),
            RideType::WoodenCoaster => (300, 350, 200),
            RideType::LogFlume => (150, 120, 70),
        }
    }

    fn top_speed(self) -> u8 {
        match self {
            RideType::Carousel | RideType::FerrisWheel => 2,
            RideType::WoodenCoaster => 8,
            RideType::LogFlume => 5,
        }
    }

    fn trains(self) -> usize {
        match self {
            RideType::WoodenCoaster => 2,
            _ => 1,
        }
    }
}

impl From<RideType> for u8 {
    fn from(value: RideType) -> Self {
        value.id()
    }
}

impl TryFrom<u8> for RideType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RideType::from_id(value).ok_or_else(|| format!("unsupported ride type {value}"))
    }
}

/// Excitement, intensity and nausea, computed once testing completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ratings {
    /// How thrilling the ride is.
    pub excitement: RatingValue,
    /// How forceful the ride is.
    pub intensity: RatingValue,
    /// How sick the ride makes guests.
    pub nausea: RatingValue,
}

/// Statistics gathered while a ride is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    /// Ticks sampled so far.
    pub samples: u32,
    /// Highest vehicle speed seen during the test.
    pub max_speed: u8,
    /// Set once the test has run for [`TEST_DURATION_TICKS`].
    pub complete: bool,
}

/// A built ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    /// Identifier, unique within the park.
    pub id: RideId,
    /// What kind of ride this is.
    pub ride_type: RideType,
    /// Closed, testing or open.
    pub status: RideStatus,
    /// What a guest pays per ride.
    pub price: u16,
    /// Track circuit in running order. Vehicles loop over it.
    pub track: Vec<TileCoords>,
    /// `None` until the ride has been tested.
    pub ratings: Option<Ratings>,
    /// Test statistics, reset each time the ride enters test mode.
    pub measurement: Measurement,
    /// Guests carried since the ride was built.
    pub total_customers: u32,
    /// Total takings since the ride was built.
    pub income: i64,
    /// Ticks since the ride last changed status.
    pub status_ticks: u32,
}

impl Ride {
    /// A closed, untested ride.
    pub fn new(id: RideId, ride_type: RideType, track: Vec<TileCoords>) -> Self {
        Self {
            id,
            ride_type,
            status: RideStatus::Closed,
            price: 0,
            track,
            ratings: None,
            measurement: Measurement::default(),
            total_customers: 0,
            income: 0,
            status_ticks: 0,
        }
    }

    /// Change status, resetting the status timer. Entering test mode also
    /// restarts the measurement.
    pub fn set_status(&mut self, status: RideStatus) {
        if self.status != status {
            self.status = status;
            self.status_ticks = 0;
            if status == RideStatus::Testing {
                self.measurement = Measurement::default();
            }
        }
    }

    /// Highest speed the ride's vehicles reach.
    pub fn top_speed(&self) -> u8 {
        self.ride_type.top_speed()
    }

    /// Trains spawned when the ride is built.
    pub fn train_count(&self) -> usize {
        self.ride_type.trains()
    }

    /// Whether guests can board.
    pub fn is_open(&self) -> bool {
        self.status == RideStatus::Open
    }
}

/// Per-tick ride bookkeeping. A ride that finishes its test run opens
/// automatically.
pub fn update_all(rides: &mut BTreeMap<RideId, Ride>) {
    for ride in rides.values_mut() {
        ride.status_ticks = ride.status_ticks.saturating_add(1);
        if ride.status == RideStatus::Testing && ride.status_ticks >= TEST_DURATION_TICKS {
            ride.measurement.complete = true;
            ride.set_status(RideStatus::Open);
            tracing::debug!(ride = %ride.id, "test run complete, ride opened");
        }
    }
}

/// Recalculate ratings for one ride per call, round robin by id.
///
/// `cursor` is the id of the ride rated last time.
pub fn update_ratings(rides: &mut BTreeMap<RideId, Ride>, cursor: &mut Option<RideId>) {
    let next = match *cursor {
        Some(last) => rides
            .range(RideId(last.0.saturating_add(1))..)
            .next()
            .map(|(id, _)| *id)
            .or_else(|| rides.keys().next().copied()),
        None => rides.keys().next().copied(),
    };
    *cursor = next;
    let Some(ride) = next.and_then(|id| rides.get_mut(&id)) else {
        return;
    };
    if !ride.measurement.complete {
        ride.ratings = None;
        return;
    }
    let (excitement, intensity, nausea) = ride.ride_type.base_ratings();
    let length = ride.track.len().min(1000) as u16;
    let speed = ride.measurement.max_speed as u16;
    ride.ratings = Some(Ratings {
        excitement: excitement + length * 5 + speed * 10,
        intensity: intensity + speed * 25,
        nausea: nausea + length * 2,
    });
}

/// Sample vehicle speeds for rides under test.
pub fn update_measurements(rides: &mut BTreeMap<RideId, Ride>, entities: &EntityRegistry) {
    for entity in entities.iter_kind(EntityKind::Vehicle) {
        let EntityData::Vehicle(vehicle) = &entity.data else {
            continue;
        };
        let Some(ride) = rides.get_mut(&vehicle.ride) else {
            continue;
        };
        if ride.status != RideStatus::Testing {
            continue;
        }
        ride.measurement.samples += 1;
        ride.measurement.max_speed = ride.measurement.max_speed.max(vehicle.speed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
