//! Park-wide state: finances, rating, admissions, the scenario objective,
//! research and the news ticker.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::guest::Guest;
use crate::registry::{EntityData, EntityKind};
use crate::ride::RideType;
use crate::state::SimulationState;

/// The park rating is recalculated every this many ticks.
const RATING_UPDATE_TICKS: u32 = 128;

/// Research progresses every this many ticks.
const RESEARCH_UPDATE_TICKS: u32 = 32;

/// Progress points needed to finish a research item.
const RESEARCH_ITEM_COST: u32 = 2048;

/// Ticks a news item stays on the ticker.
pub const NEWS_DISPLAY_TICKS: u16 = 320;

const NEWS_ARCHIVE_LEN: usize = 50;
const RIDE_UPKEEP_PER_MONTH: i64 = 100;
const MAX_GUESTS: usize = 200;
const GUEST_STARTING_CASH: i32 = 300;

// ---------------------------------------------------------------------------
// Park
// ---------------------------------------------------------------------------

/// Progress towards the scenario objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStatus {
    InProgress,
    Completed,
    Failed,
}

/// Reach `guests` guests and a rating of at least `rating` by the end of
/// `deadline_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Guests required in the park.
    pub guests: u32,
    /// Minimum park rating.
    pub rating: u16,
    /// Last year in which the objective can be met.
    pub deadline_year: u32,
}

/// Park-wide finances and scenario progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Park {
    /// Shown in the UI and the window title.
    pub name: String,
    /// Bank balance. May go negative.
    pub cash: i64,
    /// Charged to every admitted guest.
    pub entrance_fee: u16,
    /// `0..=999`.
    pub rating: u16,
    /// Guests admitted through the entrance since the park opened.
    pub total_admissions: u32,
    /// Goal of the current scenario.
    pub objective: Objective,
    /// Checked at the start of every month while in progress.
    pub scenario_status: ScenarioStatus,
}

impl Default for Park {
    fn default() -> Self {
        Self {
            name: String::from("Unnamed Park"),
            cash: 10_000,
            entrance_fee: 10,
            rating: 500,
            total_admissions: 0,
            objective: Objective {
                guests: 100,
                rating: 600,
                deadline_year: 2,
            },
            scenario_status: ScenarioStatus::InProgress,
        }
    }
}

impl Park {
    /// The last calculated park rating.
    pub fn rating(&self) -> u16 {
        self.rating
    }
}

fn calculate_rating(state: &SimulationState) -> u16 {
    let open_rides = state.rides.values().filter(|r| r.is_open()).count() as i32;
    let (guests, happiness) = state
        .entities
        .iter_kind(EntityKind::Guest)
        .filter_map(|e| match &e.data {
            EntityData::Guest(g) => Some(g.happiness as i32),
            _ => None,
        })
        .fold((0i32, 0i32), |(n, sum), h| (n + 1, sum + h));
    let avg_happiness = if guests > 0 { happiness / guests } else { 128 };
    let litter = state.entities.count_kind(EntityKind::Litter) as i32;
    (300 + open_rides * 60 + avg_happiness * 2 - litter * 4).clamp(0, 999) as u16
}

/// Admissions, rating and monthly upkeep.
pub fn update(state: &mut SimulationState) {
    if state.current_ticks % RATING_UPDATE_TICKS == 0 {
        state.park.rating = calculate_rating(state);
    }

    if state.date.is_month_start() {
        let upkeep = state.rides.len() as i64 * RIDE_UPKEEP_PER_MONTH;
        state.park.cash -= upkeep;
    }

    let Some(entrance) = state.map.entrance() else {
        return;
    };
    if state.entities.count_kind(EntityKind::Guest) >= MAX_GUESTS {
        return;
    }
    // Better parks attract guests more often.
    let one_in = 1 + (1000 - state.park.rating as u32) / 8;
    if state.rng.one_in(one_in) {
        let fee = state.park.entrance_fee as i32;
        let mut guest = Guest::new(GUEST_STARTING_CASH);
        guest.cash -= fee;
        state.park.cash += fee as i64;
        state.park.total_admissions += 1;
        state.entities.spawn(entrance.centre(), EntityData::Guest(guest));
    }
}

/// Check the scenario objective at the start of each month.
pub fn update_scenario(state: &mut SimulationState) {
    if state.park.scenario_status != ScenarioStatus::InProgress || !state.date.is_month_start() {
        return;
    }
    let guests = state.entities.count_kind(EntityKind::Guest) as u32;
    let objective = state.park.objective;
    if guests >= objective.guests && state.park.rating >= objective.rating {
        state.park.scenario_status = ScenarioStatus::Completed;
        state.news.push("Scenario objective achieved!");
        tracing::info!(tick = state.current_ticks, "scenario completed");
    } else if state.date.year() > objective.deadline_year {
        state.park.scenario_status = ScenarioStatus::Failed;
        state.news.push("Scenario objective failed.");
        tracing::info!(tick = state.current_ticks, "scenario failed");
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Ride research: a queue of types still to invent and the ones already done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Research {
    /// Points gained per research update.
    pub funding: u8,
    /// Points towards the front item of `queue`.
    pub progress: u32,
    /// Types still to research, front first.
    pub queue: VecDeque<RideType>,
    /// Types that may be built.
    pub invented: Vec<RideType>,
}

impl Default for Research {
    fn default() -> Self {
        Self {
            funding: 16,
            progress: 0,
            queue: VecDeque::from([RideType::LogFlume, RideType::WoodenCoaster]),
            invented: vec![RideType::Carousel, RideType::FerrisWheel],
        }
    }
}

impl Research {
    /// Whether `ride_type` may be built.
    pub fn is_invented(&self, ride_type: RideType) -> bool {
        self.invented.contains(&ride_type)
    }
}

/// Add funding to the current research item and announce it once finished.
pub fn update_research(state: &mut SimulationState) {
    if state.current_ticks % RESEARCH_UPDATE_TICKS != 0 || state.research.queue.is_empty() {
        return;
    }
    let research = &mut state.research;
    research.progress += research.funding as u32;
    if research.progress < RESEARCH_ITEM_COST {
        return;
    }
    research.progress = 0;
    if let Some(item) = research.queue.pop_front() {
        research.invented.push(item);
        state.news.push(format!("New ride available: {}", item.object_id()));
        tracing::debug!(?item, "research complete");
    }
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

/// A message on the news ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Message text.
    pub text: String,
    /// Ticks the item has been displayed.
    pub ticks: u16,
}

/// The news ticker and its archive of shown items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewsQueue {
    recent: VecDeque<NewsItem>,
    archive: VecDeque<NewsItem>,
}

impl NewsQueue {
    /// Queue a message behind any that are still waiting.
    pub fn push(&mut self, text: impl Into<String>) {
        self.recent.push_back(NewsItem {
            text: text.into(),
            ticks: 0,
        });
    }

    /// The item on the ticker right now.
    pub fn current(&self) -> Option<&NewsItem> {
        self.recent.front()
    }

    /// Items already shown, oldest first.
    pub fn archive(&self) -> impl Iterator<Item = &NewsItem> {
        self.archive.iter()
    }

    /// Age the current item and move it to the archive once it has been shown
    /// long enough.
    pub fn update_current(&mut self) {
        let Some(current) = self.recent.front_mut() else {
            return;
        };
        current.ticks += 1;
        if current.ticks < NEWS_DISPLAY_TICKS {
            return;
        }
        if let Some(done) = self.recent.pop_front() {
            self.archive.push_back(done);
            if self.archive.len() > NEWS_ARCHIVE_LEN {
                self.archive.pop_front();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
