//! The flight controller task.
//!
//! One task owns the viewport, the frame source and the active
//! [`FlightSession`]. Control operations arrive over an mpsc channel from
//! [`FlightHandle`]s and are applied between frames, so a seek or pause
//! always lands atomically before the next tick.

use crate::frames::FrameSource;
use crate::provider::TerrainProvider;
use crate::terrain::{prepare_terrain, CancelSignal, PrepareError};
use crate::viewport::{Viewport, ViewportError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use utpatur_core::{
    overview_pose, Bounds, CameraPose, FlightPlan, FlightSession, FlightStatus, FlightTuning,
    FlyingMode, GeoPoint, SpeedSelector, TerrainHeightCache, TerrainTuning, Tick,
    BOUNDS_MARGIN_DEG,
};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The end of the route was reached
    Completed,
    Requested,
    ViewportFailed,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlightEvent {
    TerrainProgress { percent: u8 },
    /// The flight is positioned at the start, paused
    Started {
        total_km: f64,
        first_waypoint: Option<String>,
    },
    WaypointReached { name: String, day_index: usize },
    Progress { distance_km: f64, percent: f64 },
    Paused,
    Resumed,
    SpeedChanged { multiplier: u32 },
    /// A start request that cannot fly
    Rejected { reason: String },
    Stopped { reason: StopReason },
}

#[derive(Debug)]
enum FlightCommand {
    Start(FlightPlan),
    TogglePause,
    Stop,
    Seek { km: f64 },
    CycleSpeed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("flight controller is no longer running")]
pub struct ControllerGone;

/// Cloneable control surface of a running controller.
#[derive(Debug, Clone)]
pub struct FlightHandle {
    commands: mpsc::Sender<FlightCommand>,
    stop_requests: Arc<watch::Sender<u64>>,
    events: broadcast::Sender<FlightEvent>,
    cursor: watch::Receiver<Option<f64>>,
    status: watch::Receiver<FlightStatus>,
}

impl FlightHandle {
    async fn send(&self, command: FlightCommand) -> Result<(), ControllerGone> {
        self.commands.send(command).await.map_err(|_| ControllerGone)
    }

    /// Prepare terrain and open a paused flight over `plan`. Ignored while a flight is active.
    pub async fn start(&self, plan: FlightPlan) -> Result<(), ControllerGone> {
        self.send(FlightCommand::Start(plan)).await
    }

    pub async fn toggle_pause(&self) -> Result<(), ControllerGone> {
        self.send(FlightCommand::TogglePause).await
    }

    /// Stop the flight, also aborting terrain preparation in progress.
    pub async fn stop(&self) -> Result<(), ControllerGone> {
        self.stop_requests.send_modify(|generation| *generation += 1);
        self.send(FlightCommand::Stop).await
    }

    pub async fn seek_km(&self, km: f64) -> Result<(), ControllerGone> {
        self.send(FlightCommand::Seek { km }).await
    }

    pub async fn cycle_speed(&self) -> Result<(), ControllerGone> {
        self.send(FlightCommand::CycleSpeed).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlightEvent> {
        self.events.subscribe()
    }

    /// Distance flown (km) while flying, `None` otherwise.
    pub fn cursor(&self) -> watch::Receiver<Option<f64>> {
        self.cursor.clone()
    }

    pub fn status(&self) -> watch::Receiver<FlightStatus> {
        self.status.clone()
    }
}

struct ActiveFlight {
    session: FlightSession,
    home: CameraPose,
}

pub struct FlightController<P, V, F> {
    provider: Arc<P>,
    viewport: V,
    frames: F,
    tuning: FlightTuning,
    terrain_tuning: TerrainTuning,
    speed: SpeedSelector,
    commands: mpsc::Receiver<FlightCommand>,
    cancel: CancelSignal,
    events: broadcast::Sender<FlightEvent>,
    cursor: watch::Sender<Option<f64>>,
    status: watch::Sender<FlightStatus>,
    active: Option<ActiveFlight>,
}

impl<P, V, F> FlightController<P, V, F>
where
    P: TerrainProvider + 'static,
    V: Viewport,
    F: FrameSource,
{
    pub fn new(
        provider: Arc<P>,
        viewport: V,
        frames: F,
        tuning: FlightTuning,
        terrain_tuning: TerrainTuning,
    ) -> (Self, FlightHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(0u64);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (cursor_tx, cursor_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(FlightStatus::Idle);

        let handle = FlightHandle {
            commands: command_tx,
            stop_requests: Arc::new(stop_tx),
            events: events.clone(),
            cursor: cursor_rx,
            status: status_rx,
        };
        let controller = Self {
            provider,
            viewport,
            frames,
            tuning,
            terrain_tuning,
            speed: SpeedSelector::default(),
            commands: command_rx,
            cancel: CancelSignal::new(stop_rx),
            events,
            cursor: cursor_tx,
            status: status_tx,
            active: None,
        };
        (controller, handle)
    }

    /// Run until shutdown or until every handle is dropped. Returns the viewport.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> V {
        tracing::info!("Flight controller started");
        loop {
            let flying = self.active.is_some();
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Flight controller shutting down");
                    self.finish(StopReason::Shutdown);
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("All flight handles dropped, controller exiting");
                        self.finish(StopReason::Shutdown);
                        break;
                    };
                    if !self.apply(command, &mut shutdown).await {
                        break;
                    }
                }
                now = self.frames.next_frame(), if flying => {
                    self.on_frame(now);
                }
            }
        }
        self.viewport
    }

    fn emit(&self, event: FlightEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_status(&self, status: FlightStatus) {
        self.status.send_replace(status);
    }

    /// Apply one control command. Returns false when the controller must exit.
    async fn apply(&mut self, command: FlightCommand, shutdown: &mut broadcast::Receiver<()>) -> bool {
        match command {
            FlightCommand::Start(plan) => return self.start(plan, shutdown).await,
            FlightCommand::TogglePause => {
                let Some(active) = self.active.as_mut() else {
                    return true;
                };
                let mode = active.session.toggle_pause();
                self.set_status(FlightStatus::Flying(mode));
                if mode == FlyingMode::Paused {
                    tracing::debug!("Flight paused");
                    self.emit(FlightEvent::Paused);
                } else {
                    tracing::debug!("Flight resumed");
                    self.emit(FlightEvent::Resumed);
                }
            }
            FlightCommand::Stop => {
                if self.active.is_some() {
                    self.finish(StopReason::Requested);
                }
            }
            FlightCommand::Seek { km } => {
                let Some(active) = self.active.as_mut() else {
                    return true;
                };
                let was_paused = active.session.mode() != FlyingMode::Running;
                active.session.seek_km(km);
                let distance_km = active.session.state().current_distance_m / 1000.0;
                tracing::debug!("Seek to {:.2} km", distance_km);
                self.cursor.send_replace(Some(distance_km));
                self.set_status(FlightStatus::Flying(FlyingMode::Running));
                if was_paused {
                    self.emit(FlightEvent::Resumed);
                }
            }
            FlightCommand::CycleSpeed => {
                let multiplier = self.speed.cycle(&self.tuning);
                if let Some(active) = self.active.as_mut() {
                    active.session.set_speed_multiplier(multiplier);
                }
                self.emit(FlightEvent::SpeedChanged { multiplier });
            }
        }
        true
    }

    async fn start(&mut self, plan: FlightPlan, shutdown: &mut broadcast::Receiver<()>) -> bool {
        if self.active.is_some() {
            tracing::debug!("Start ignored, a flight is already active");
            return true;
        }

        let points = plan.points();
        let mut session = match FlightSession::new(
            points.clone(),
            plan.waypoints,
            TerrainHeightCache::new(),
            self.tuning.clone(),
            self.speed.multiplier(&self.tuning),
        ) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("Cannot start flight: {}", err);
                self.emit(FlightEvent::Rejected {
                    reason: err.to_string(),
                });
                return true;
            }
        };

        let home = self.viewport.current_pose().unwrap_or_else(|| {
            let bounds = Bounds::around(points.iter().copied())
                .map(|b| b.padded(BOUNDS_MARGIN_DEG))
                .unwrap_or_default();
            overview_pose(&bounds)
        });

        tracing::info!(
            "Preparing flight over {} points ({:.1} km)",
            points.len(),
            session.total_distance_m() / 1000.0
        );
        self.set_status(FlightStatus::Initializing);
        self.cancel.arm();

        let events = self.events.clone();
        let prepared = {
            let preparation = prepare_terrain(
                &points,
                self.provider.as_ref(),
                &mut self.viewport,
                &self.terrain_tuning,
                &mut self.cancel,
                |percent| {
                    let _ = events.send(FlightEvent::TerrainProgress { percent });
                },
            );
            tokio::pin!(preparation);
            let mut commands_open = true;
            loop {
                tokio::select! {
                    result = &mut preparation => break Some(result),
                    _ = shutdown.recv() => break None,
                    command = self.commands.recv(), if commands_open => match command {
                        // speed is a selector setting, not a flight control
                        Some(FlightCommand::CycleSpeed) => {
                            let multiplier = self.speed.cycle(&self.tuning);
                            session.set_speed_multiplier(multiplier);
                            let _ = events.send(FlightEvent::SpeedChanged { multiplier });
                        }
                        // stop already cancelled preparation through its generation bump
                        Some(FlightCommand::Stop) => {}
                        Some(FlightCommand::Start(_)) => {
                            tracing::debug!("Start ignored, a flight is already preparing");
                        }
                        Some(FlightCommand::TogglePause | FlightCommand::Seek { .. }) => {
                            tracing::debug!("Control ignored while preparing terrain");
                        }
                        None => commands_open = false,
                    },
                }
            }
        };

        let terrain = match prepared {
            Some(Ok(terrain)) => terrain,
            Some(Err(PrepareError::Cancelled)) => {
                tracing::info!("Flight preparation cancelled");
                self.abandon(&home, StopReason::Requested);
                return true;
            }
            Some(Err(PrepareError::Viewport(err))) => {
                tracing::warn!("Viewport failed during terrain warm-up: {}", err);
                self.abandon(&home, StopReason::ViewportFailed);
                return true;
            }
            None => {
                tracing::info!("Shutdown during flight preparation");
                self.abandon(&home, StopReason::Shutdown);
                return false;
            }
        };

        session.replace_terrain(terrain);
        let opening = session.opening_pose();
        let start = session.hiker_position();
        if let Err(err) = self.show_opening(&opening, &start) {
            tracing::warn!("Viewport failed positioning the flight: {}", err);
            self.abandon(&home, StopReason::ViewportFailed);
            return true;
        }

        let total_km = session.total_distance_m() / 1000.0;
        let first_waypoint = session.first_waypoint().map(|wp| wp.name.clone());
        tracing::info!(
            "Flight ready: {:.1} km, {} waypoints, starting at {}",
            total_km,
            session.waypoints().len(),
            first_waypoint.as_deref().unwrap_or("route start")
        );
        self.active = Some(ActiveFlight { session, home });
        self.cursor.send_replace(Some(0.0));
        self.set_status(FlightStatus::Flying(FlyingMode::Paused));
        self.emit(FlightEvent::Started {
            total_km,
            first_waypoint,
        });
        true
    }

    fn show_opening(&mut self, pose: &CameraPose, hiker: &GeoPoint) -> Result<(), ViewportError> {
        self.viewport.set_camera(pose)?;
        self.viewport.place_hiker(hiker)?;
        self.viewport.request_render()
    }

    fn on_frame(&mut self, now: Duration) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.session.tick(now) {
            Tick::Paused | Tick::Holding => {}
            Tick::WaypointReached(marker) => {
                tracing::info!(
                    "Reached {} (day {}) at {:.2} km",
                    marker.name,
                    marker.day_index,
                    active.session.state().current_distance_m / 1000.0
                );
                self.set_status(FlightStatus::Flying(FlyingMode::WaypointPaused));
                self.emit(FlightEvent::WaypointReached {
                    name: marker.name,
                    day_index: marker.day_index,
                });
            }
            Tick::Frame(frame) => {
                let resumed_from_waypoint = self
                    .status
                    .borrow()
                    .eq(&FlightStatus::Flying(FlyingMode::WaypointPaused));
                let shown = self
                    .viewport
                    .set_camera(&frame.camera)
                    .and_then(|_| self.viewport.place_hiker(&frame.hiker))
                    .and_then(|_| self.viewport.request_render());
                if let Err(err) = shown {
                    tracing::warn!("Viewport failed mid-flight: {}", err);
                    self.finish(StopReason::ViewportFailed);
                    return;
                }
                if resumed_from_waypoint {
                    self.set_status(FlightStatus::Flying(FlyingMode::Running));
                }
                self.cursor.send_replace(Some(frame.distance_km));
                self.emit(FlightEvent::Progress {
                    distance_km: frame.distance_km,
                    percent: frame.percent,
                });
            }
            Tick::Finished => {
                tracing::info!("Flight completed");
                self.finish(StopReason::Completed);
            }
        }
    }

    /// End the active flight, if any, and return the camera home.
    fn finish(&mut self, reason: StopReason) {
        let Some(active) = self.active.take() else {
            return;
        };
        tracing::info!(
            "Flight stopped at {:.2} km ({:?})",
            active.session.state().current_distance_m / 1000.0,
            reason
        );
        self.abandon(&active.home, reason);
    }

    fn abandon(&mut self, home: &CameraPose, reason: StopReason) {
        if let Err(err) = self.viewport.remove_hiker() {
            tracing::debug!("Could not remove hiker marker: {}", err);
        }
        if let Err(err) = self.viewport.fly_to(home) {
            tracing::debug!("Could not return camera home: {}", err);
        }
        self.cursor.send_replace(None);
        self.set_status(FlightStatus::Idle);
        self.emit(FlightEvent::Stopped { reason });
    }
}
