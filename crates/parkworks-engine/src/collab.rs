//! Collaborator interfaces the run loop drives.
//!
//! The context never knows how windows, rendering, sound, scripts or park
//! files work. It talks to trait objects bundled in [`Collaborators`], and a
//! headless build plugs in the implementations from this module.
//!
//! The headless UI and drawing engine keep a shared log so a test can hold a
//! handle while the context owns the collaborator.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use parkworks_world::climate::ClimateSound;
use parkworks_world::coords::CoordsXYZ;
use parkworks_world::date::GameDate;
use parkworks_world::entity::EntityId;
use parkworks_world::map::TileElementKind;
use parkworks_world::ride::RideType;
use parkworks_world::snapshot::WorldSnapshot;
use parkworks_world::state::SimulationState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DrawingEngineKind;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

/// What the pointer is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Reset,
    Normal,
    WidgetPressed,
    PositioningWindow,
    ViewportDrag,
    ScrollBar,
    DropdownActive,
}

impl InputState {
    /// Idle pointer: nothing held down.
    pub fn is_idle(self) -> bool {
        matches!(self, InputState::Reset | InputState::Normal)
    }
}

/// The window system and UI as seen from the frame loop.
pub trait UiContext {
    /// Pump OS events. Called once per frame before input handling.
    fn process_messages(&mut self);

    /// Per-frame UI bookkeeping.
    fn tick(&mut self);

    /// Drawing is skipped while minimised. Simulation is not.
    fn is_minimised(&self) -> bool;

    /// Screenshot hotkey and keyboard shortcuts.
    fn handle_keyboard(&mut self, is_title: bool);

    /// Process pointer input for this frame.
    fn handle_input(&mut self);

    /// Let open windows refresh their contents.
    fn update_windows(&mut self);

    /// What the pointer is doing right now.
    fn input_state(&self) -> InputState;

    /// Whether the viewport was scrolled since the flag was last cleared.
    fn viewport_scrolling(&self) -> bool;

    /// Reset the flag [`viewport_scrolling`](Self::viewport_scrolling) reports.
    fn clear_viewport_scrolling(&mut self);

    /// A title sequence is being previewed from inside a park.
    fn is_previewing_title_sequence(&self) -> bool;

    /// Advance the title sequence player by one step.
    fn update_title_sequence(&mut self);

    /// Show an error box to the player.
    fn show_error(&mut self, title: &str, message: &str);

    /// Open the windows the scenario editor's current step needs.
    fn open_windows_for_editor_step(&mut self);
}

/// Everything the headless UI was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiLog {
    /// Calls to `process_messages`.
    pub messages_processed: u32,
    /// Calls to `tick`.
    pub ticks: u32,
    /// Calls to `handle_keyboard`.
    pub keyboard_polls: u32,
    /// Calls to `handle_input`.
    pub input_handled: u32,
    /// Calls to `update_windows`.
    pub window_updates: u32,
    /// Calls to `update_title_sequence`.
    pub title_sequence_updates: u32,
    /// Calls to `open_windows_for_editor_step`.
    pub editor_window_checks: u32,
    /// `(title, message)` of every error shown, oldest first.
    pub errors: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct HeadlessUiState {
    log: UiLog,
    input_state: InputState,
    viewport_scrolling: bool,
    minimised: bool,
    previewing_title: bool,
}

/// A UI without windows. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessUi {
    inner: Rc<RefCell<HeadlessUiState>>,
}

impl HeadlessUi {
    /// A UI that is not minimised, with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn log(&self) -> UiLog {
        self.inner.borrow().log.clone()
    }

    /// Set what [`UiContext::input_state`] reports.
    pub fn set_input_state(&self, state: InputState) {
        self.inner.borrow_mut().input_state = state;
    }

    /// Simulate a scroll gesture.
    pub fn set_viewport_scrolling(&self, scrolling: bool) {
        self.inner.borrow_mut().viewport_scrolling = scrolling;
    }

    /// Simulate minimising or restoring the window.
    pub fn set_minimised(&self, minimised: bool) {
        self.inner.borrow_mut().minimised = minimised;
    }

    /// Simulate a title sequence preview opened from a park.
    pub fn set_previewing_title(&self, previewing: bool) {
        self.inner.borrow_mut().previewing_title = previewing;
    }
}

impl UiContext for HeadlessUi {
    fn process_messages(&mut self) {
        self.inner.borrow_mut().log.messages_processed += 1;
    }

    fn tick(&mut self) {
        self.inner.borrow_mut().log.ticks += 1;
    }

    fn is_minimised(&self) -> bool {
        self.inner.borrow().minimised
    }

    fn handle_keyboard(&mut self, _is_title: bool) {
        self.inner.borrow_mut().log.keyboard_polls += 1;
    }

    fn handle_input(&mut self) {
        self.inner.borrow_mut().log.input_handled += 1;
    }

    fn update_windows(&mut self) {
        self.inner.borrow_mut().log.window_updates += 1;
    }

    fn input_state(&self) -> InputState {
        self.inner.borrow().input_state
    }

    fn viewport_scrolling(&self) -> bool {
        self.inner.borrow().viewport_scrolling
    }

    fn clear_viewport_scrolling(&mut self) {
        self.inner.borrow_mut().viewport_scrolling = false;
    }

    fn is_previewing_title_sequence(&self) -> bool {
        self.inner.borrow().previewing_title
    }

    fn update_title_sequence(&mut self) {
        self.inner.borrow_mut().log.title_sequence_updates += 1;
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.inner
            .borrow_mut()
            .log
            .errors
            .push((title.to_owned(), message.to_owned()));
    }

    fn open_windows_for_editor_step(&mut self) {
        self.inner.borrow_mut().log.editor_window_checks += 1;
    }
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// A renderer for the park view.
pub trait DrawingEngine {
    /// The kind this engine was created as.
    fn kind(&self) -> DrawingEngineKind;
    /// Start a frame.
    fn begin_draw(&mut self);
    /// Paint the world using each entity's render position.
    fn paint(&mut self, state: &SimulationState);
    /// Present the frame.
    fn end_draw(&mut self);
}

/// Creates drawing engines by kind.
pub trait DrawingEngineFactory {
    /// Create an engine of `kind`, or say why it is unavailable.
    fn create(&mut self, kind: DrawingEngineKind) -> Result<Box<dyn DrawingEngine>, String>;
}

/// One painted frame: every entity at the position it was drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintedFrame {
    /// Logical tick at the time of painting.
    pub tick: u32,
    /// Render position of every live entity, in slot order.
    pub positions: Vec<(EntityId, CoordsXYZ)>,
}

#[derive(Debug, Default)]
struct FrameLogState {
    frames: u32,
    last: PaintedFrame,
    unbalanced: bool,
    drawing: bool,
}

/// Shared record of painted frames.
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    inner: Rc<RefCell<FrameLogState>>,
}

impl FrameLog {
    /// Frames painted so far.
    pub fn frames(&self) -> u32 {
        self.inner.borrow().frames
    }

    /// The most recent frame.
    pub fn last(&self) -> PaintedFrame {
        self.inner.borrow().last.clone()
    }

    /// Whether a paint ever happened outside begin/end.
    pub fn unbalanced(&self) -> bool {
        self.inner.borrow().unbalanced
    }
}

/// Draws nothing, remembers what it would have drawn.
#[derive(Debug)]
pub struct HeadlessDrawingEngine {
    kind: DrawingEngineKind,
    log: FrameLog,
}

impl DrawingEngine for HeadlessDrawingEngine {
    fn kind(&self) -> DrawingEngineKind {
        self.kind
    }

    fn begin_draw(&mut self) {
        self.log.inner.borrow_mut().drawing = true;
    }

    fn paint(&mut self, state: &SimulationState) {
        let mut log = self.log.inner.borrow_mut();
        if !log.drawing {
            log.unbalanced = true;
        }
        log.frames += 1;
        log.last = PaintedFrame {
            tick: state.current_ticks,
            positions: state
                .entities
                .iter()
                .filter_map(|e| state.entities.render_position(e.id).map(|p| (e.id, p)))
                .collect(),
        };
    }

    fn end_draw(&mut self) {
        self.log.inner.borrow_mut().drawing = false;
    }
}

/// Produces headless engines, except for the kinds marked unavailable.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDrawingFactory {
    unavailable: Vec<DrawingEngineKind>,
    log: FrameLog,
}

impl HeadlessDrawingFactory {
    /// A factory that can create every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` fail to create.
    pub fn without(mut self, kind: DrawingEngineKind) -> Self {
        self.unavailable.push(kind);
        self
    }

    /// Log shared by every engine this factory creates.
    pub fn frame_log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl DrawingEngineFactory for HeadlessDrawingFactory {
    fn create(&mut self, kind: DrawingEngineKind) -> Result<Box<dyn DrawingEngine>, String> {
        if self.unavailable.contains(&kind) {
            return Err(format!("{kind:?} is not available on this system"));
        }
        Ok(Box::new(HeadlessDrawingEngine {
            kind,
            log: self.log.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Audio and scripting
// ---------------------------------------------------------------------------

/// Positional and ambient sound.
pub trait AudioSink {
    /// `(vehicle, position, speed)` of every moving vehicle.
    fn update_vehicle_sounds(&mut self, sources: &[(EntityId, CoordsXYZ, u8)]);
    /// `level` grows with the number of guests in view.
    fn update_crowd_noise(&mut self, level: u8);
    /// Switch the ambient weather loop.
    fn update_climate_sound(&mut self, sound: ClimateSound);
}

/// Plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn update_vehicle_sounds(&mut self, _sources: &[(EntityId, CoordsXYZ, u8)]) {}
    fn update_crowd_noise(&mut self, _level: u8) {}
    fn update_climate_sound(&mut self, _sound: ClimateSound) {}
}

/// Plugin hooks.
pub trait ScriptHooks {
    /// After every simulation step.
    fn on_interval_tick(&mut self, tick: u32);
    /// After a step that started a new day.
    fn on_interval_day(&mut self, date: &GameDate);
    /// Once per frame.
    fn tick(&mut self);
}

/// Ignores every hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl ScriptHooks for NullHooks {
    fn on_interval_tick(&mut self, _tick: u32) {}
    fn on_interval_day(&mut self, _date: &GameDate) {}
    fn tick(&mut self) {}
}

// ---------------------------------------------------------------------------
// Park storage
// ---------------------------------------------------------------------------

/// Where parks are loaded from and autosaves go.
pub trait ParkStorage {
    /// Read a park, rejecting files this build cannot run.
    fn load(&mut self, path: &Path) -> Result<SimulationState, LoadError>;

    /// Write an autosave. Returns the file written.
    fn autosave(&mut self, state: &SimulationState) -> std::io::Result<PathBuf>;
}

/// Storage that has nothing to load and discards autosaves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl ParkStorage for NullStorage {
    fn load(&mut self, path: &Path) -> Result<SimulationState, LoadError> {
        Err(LoadError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no park storage configured for {}", path.display()),
        )))
    }

    fn autosave(&mut self, _state: &SimulationState) -> std::io::Result<PathBuf> {
        Ok(PathBuf::new())
    }
}

/// Newest park file version this build reads.
pub const PARK_FILE_VERSION: u32 = 1;

const FOOTPATH_OBJECT: &str = "rct2.footpath.tarmac";
const SCENERY_OBJECT: &str = "rct2.scenery.fountain";

#[derive(Debug, Serialize, Deserialize)]
struct ParkFile {
    version: u32,
    /// Object identifiers the park needs.
    objects: Vec<String>,
    world: WorldSnapshot,
}

/// Parks and autosaves as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonParkStorage {
    dir: PathBuf,
    keep: usize,
    installed: BTreeSet<String>,
    next_autosave: u64,
}

impl JsonParkStorage {
    /// Autosaves go to `dir`; only the newest `keep` are kept.
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        let mut installed: BTreeSet<String> = [
            RideType::Carousel,
            RideType::FerrisWheel,
            RideType::WoodenCoaster,
            RideType::LogFlume,
        ]
        .iter()
        .map(|t| t.object_id().to_owned())
        .collect();
        installed.insert(FOOTPATH_OBJECT.to_owned());
        installed.insert(SCENERY_OBJECT.to_owned());
        Self {
            dir: dir.into(),
            keep: keep.max(1),
            installed,
            next_autosave: 0,
        }
    }

    /// Pretend `object` is not installed.
    pub fn uninstall(&mut self, object: &str) {
        self.installed.remove(object);
    }

    /// The objects a park references.
    pub fn required_objects(state: &SimulationState) -> Vec<String> {
        let mut objects: BTreeSet<String> = state
            .rides
            .values()
            .map(|r| r.ride_type.object_id().to_owned())
            .collect();
        for element in state.map.elements() {
            match element.kind {
                TileElementKind::Footpath => {
                    objects.insert(FOOTPATH_OBJECT.to_owned());
                }
                TileElementKind::AnimatedScenery => {
                    objects.insert(SCENERY_OBJECT.to_owned());
                }
                TileElementKind::Track { .. } | TileElementKind::Entrance => {}
            }
        }
        objects.into_iter().collect()
    }

    /// Write `state` as a park file at `path`, creating parent directories.
    pub fn save(&self, path: &Path, state: &SimulationState) -> std::io::Result<()> {
        let file = ParkFile {
            version: PARK_FILE_VERSION,
            objects: Self::required_objects(state),
            world: WorldSnapshot::capture(state),
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec(&file).expect("ParkFile should always be JSON-serializable");
        std::fs::write(path, json)
    }

    fn autosave_files(&self) -> std::io::Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("autosave_"))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(index) = index {
                files.push((index, path));
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Reject what this build cannot load before decoding the world.
fn precheck(value: &serde_json::Value, installed: &BTreeSet<String>) -> Result<(), LoadError> {
    let version = value
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| LoadError::Format("missing version".into()))?;
    if version > u64::from(PARK_FILE_VERSION) {
        return Err(LoadError::UnsupportedVersion {
            found: u32::try_from(version).unwrap_or(u32::MAX),
            max_supported: PARK_FILE_VERSION,
        });
    }

    let missing: Vec<String> = value
        .get("objects")
        .and_then(|o| o.as_array())
        .into_iter()
        .flatten()
        .filter_map(|o| o.as_str())
        .filter(|o| !installed.contains(*o))
        .map(str::to_owned)
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::ObjectLoad { missing });
    }

    let rides = value
        .pointer("/world/state/rides")
        .and_then(|r| r.as_object())
        .into_iter()
        .flat_map(|r| r.values());
    for ride in rides {
        let ride_type = ride
            .get("ride_type")
            .and_then(|t| t.as_u64())
            .ok_or_else(|| LoadError::Format("ride without a type".into()))?;
        let known = u8::try_from(ride_type).ok().and_then(RideType::from_id);
        if known.is_none() {
            return Err(LoadError::UnsupportedRideType {
                ride_type: u8::try_from(ride_type).unwrap_or(u8::MAX),
            });
        }
    }
    Ok(())
}

impl ParkStorage for JsonParkStorage {
    fn load(&mut self, path: &Path) -> Result<SimulationState, LoadError> {
        let bytes = std::fs::read(path)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| LoadError::Format(e.to_string()))?;
        precheck(&value, &self.installed)?;
        let file: ParkFile =
            serde_json::from_value(value).map_err(|e| LoadError::Format(e.to_string()))?;
        let state = file
            .world
            .restore()
            .map_err(|e| LoadError::Format(e.to_string()))?;
        info!(path = %path.display(), tick = state.current_ticks, "park loaded");
        Ok(state)
    }

    fn autosave(&mut self, state: &SimulationState) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let existing = self.autosave_files()?;
        if let Some((last, _)) = existing.last() {
            self.next_autosave = self.next_autosave.max(last + 1);
        }
        let path = self.dir.join(format!("autosave_{}.json", self.next_autosave));
        self.next_autosave += 1;
        self.save(&path, state)?;

        let files = self.autosave_files()?;
        let excess = files.len().saturating_sub(self.keep);
        for (_, old) in files.into_iter().take(excess) {
            debug!(path = %old.display(), "removing old autosave");
            std::fs::remove_file(old)?;
        }
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Every collaborator the context drives.
pub struct Collaborators {
    /// Windows, input and error boxes.
    pub ui: Box<dyn UiContext>,
    /// Creates the renderer when the context starts.
    pub drawing: Box<dyn DrawingEngineFactory>,
    /// Fed once per simulation step.
    pub audio: Box<dyn AudioSink>,
    /// Plugin callbacks.
    pub hooks: Box<dyn ScriptHooks>,
    /// Park loading and autosaves.
    pub storage: Box<dyn ParkStorage>,
}

impl Collaborators {
    /// Headless UI and drawing, no audio, no hooks, no storage.
    pub fn headless() -> Self {
        Self {
            ui: Box::new(HeadlessUi::new()),
            drawing: Box::new(HeadlessDrawingFactory::new()),
            audio: Box::new(NullAudio),
            hooks: Box::new(NullHooks),
            storage: Box::new(NullStorage),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
