//! End-to-end controller lifecycle on the paused tokio clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use utpatur_core::spatial::offset_by_bearing;
use utpatur_core::{
    CameraPose, DistanceIndex, FlightPlan, FlightStatus, FlightTuning, FlyingMode, GeoPoint,
    PathSample, TerrainTuning, WaypointMarker,
};
use utpatur_flight::{
    FlightController, FlightEvent, FlightHandle, IntervalFrames, NoTerrain, StopReason,
    TerrainError, TerrainProvider, Viewport, ViewportError,
};

struct SlopedTerrain;

impl TerrainProvider for SlopedTerrain {
    async fn sample_heights(&self, points: &[GeoPoint]) -> Result<Vec<f64>, TerrainError> {
        Ok(points.iter().map(|p| 400.0 + (p.lat - 68.35) * 20_000.0).collect())
    }
}

#[derive(Debug, Default)]
struct ViewportLog {
    poses: Vec<CameraPose>,
    hiker: Option<GeoPoint>,
    hiker_moves: usize,
    hiker_removed: usize,
    flown_to: Vec<CameraPose>,
}

#[derive(Clone, Default)]
struct RecordingViewport {
    log: Arc<Mutex<ViewportLog>>,
    fail_after: Option<usize>,
}

impl Viewport for RecordingViewport {
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), ViewportError> {
        let mut log = self.log.lock().unwrap();
        if self.fail_after.is_some_and(|limit| log.poses.len() >= limit) {
            return Err(ViewportError::new("context lost"));
        }
        log.poses.push(*pose);
        Ok(())
    }

    fn fly_to(&mut self, pose: &CameraPose) -> Result<(), ViewportError> {
        self.log.lock().unwrap().flown_to.push(*pose);
        Ok(())
    }

    fn request_render(&mut self) -> Result<(), ViewportError> {
        Ok(())
    }

    fn place_hiker(&mut self, at: &GeoPoint) -> Result<(), ViewportError> {
        let mut log = self.log.lock().unwrap();
        log.hiker = Some(*at);
        log.hiker_moves += 1;
        Ok(())
    }

    fn remove_hiker(&mut self) -> Result<(), ViewportError> {
        let mut log = self.log.lock().unwrap();
        log.hiker = None;
        log.hiker_removed += 1;
        Ok(())
    }

    fn current_pose(&self) -> Option<CameraPose> {
        None
    }
}

/// Three 1 km legs due north with a marker at every kilometre.
fn three_km_plan() -> FlightPlan {
    let start = GeoPoint::new(68.35, 18.80);
    let points: Vec<GeoPoint> = (0..4)
        .map(|i| offset_by_bearing(&start, i as f64 * 1_000.0, 0.0))
        .collect();
    let index = DistanceIndex::build(&points);
    let names = ["Abisko", "Abiskojaure", "Alesjaure", "Tjäktja"];
    FlightPlan {
        samples: points.iter().map(|p| PathSample::new(*p, None)).collect(),
        waypoints: names
            .iter()
            .enumerate()
            .map(|(i, name)| WaypointMarker {
                name: name.to_string(),
                distance_m: index.distance_at(i),
                day_index: i,
            })
            .collect(),
    }
}

struct Running<V> {
    handle: FlightHandle,
    events: broadcast::Receiver<FlightEvent>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<V>,
}

fn spawn<P: TerrainProvider + 'static>(
    provider: P,
    viewport: RecordingViewport,
) -> Running<RecordingViewport> {
    let (controller, handle) = FlightController::new(
        Arc::new(provider),
        viewport,
        IntervalFrames::new(Duration::from_millis(50)),
        FlightTuning::default(),
        TerrainTuning::default(),
    );
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    let events = handle.subscribe();
    let task = tokio::spawn(controller.run(shutdown_rx));
    Running {
        handle,
        events,
        shutdown,
        task,
    }
}

/// Receive events until one matches, returning it and everything before it.
async fn until(
    events: &mut broadcast::Receiver<FlightEvent>,
    mut matches: impl FnMut(&FlightEvent) -> bool,
) -> (FlightEvent, Vec<FlightEvent>) {
    let mut seen = Vec::new();
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(event) => seen.push(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    };
    let event = tokio::time::timeout(Duration::from_secs(600), wait)
        .await
        .expect("timed out waiting for flight event");
    (event, seen)
}

#[tokio::test(start_paused = true)]
async fn flight_runs_start_to_finish() {
    let viewport = RecordingViewport::default();
    let log = viewport.log.clone();
    let mut run = spawn(SlopedTerrain, viewport);

    run.handle.start(three_km_plan()).await.unwrap();
    let (started, before) = until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;
    let FlightEvent::Started {
        total_km,
        first_waypoint,
    } = started
    else {
        unreachable!();
    };
    assert!((total_km - 3.0).abs() < 0.01);
    assert_eq!(first_waypoint.as_deref(), Some("Abisko"));
    assert_eq!(
        before.last(),
        Some(&FlightEvent::TerrainProgress { percent: 100 })
    );
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Flying(FlyingMode::Paused));
    assert_eq!(*run.handle.cursor().borrow(), Some(0.0));

    run.handle.toggle_pause().await.unwrap();
    let (stopped, during) =
        until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        FlightEvent::Stopped {
            reason: StopReason::Completed
        }
    );

    let reached: Vec<&str> = during
        .iter()
        .filter_map(|e| match e {
            FlightEvent::WaypointReached { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(reached, vec!["Abiskojaure", "Alesjaure", "Tjäktja"]);

    let distances: Vec<f64> = during
        .iter()
        .filter_map(|e| match e {
            FlightEvent::Progress { distance_km, .. } => Some(*distance_km),
            _ => None,
        })
        .collect();
    assert!(!distances.is_empty());
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(*run.handle.cursor().borrow(), None);
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Idle);
    let log = log.lock().unwrap();
    assert!(log.hiker_moves > 10);
    assert_eq!(log.hiker_removed, 1);
    assert!(log.hiker.is_none());
    assert_eq!(log.flown_to.len(), 1);
    assert_eq!(log.flown_to[0].pitch_deg, -60.0);
}

#[tokio::test(start_paused = true)]
async fn pause_seek_and_stop() {
    let mut run = spawn(NoTerrain, RecordingViewport::default());

    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;
    run.handle.toggle_pause().await.unwrap();
    until(&mut run.events, |e| {
        matches!(e, FlightEvent::Progress { distance_km, .. } if *distance_km > 0.5)
    })
    .await;

    run.handle.toggle_pause().await.unwrap();
    until(&mut run.events, |e| *e == FlightEvent::Paused).await;
    let cursor = run.handle.cursor();
    let held = *cursor.borrow();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*cursor.borrow(), held);

    run.handle.seek_km(2.5).await.unwrap();
    until(&mut run.events, |e| *e == FlightEvent::Resumed).await;
    let (progress, _) = until(&mut run.events, |e| matches!(e, FlightEvent::Progress { .. })).await;
    let FlightEvent::Progress { distance_km, .. } = progress else {
        unreachable!();
    };
    assert!(distance_km >= 2.5);

    run.handle.stop().await.unwrap();
    let (stopped, _) = until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        FlightEvent::Stopped {
            reason: StopReason::Requested
        }
    );

    // stopping again while idle is a no-op
    run.handle.stop().await.unwrap();
    run.shutdown.send(()).unwrap();
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn seek_past_a_waypoint_skips_its_pause() {
    let mut run = spawn(NoTerrain, RecordingViewport::default());
    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;

    run.handle.seek_km(1.2).await.unwrap();
    let (_, during) = until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    let reached: Vec<usize> = during
        .iter()
        .filter_map(|e| match e {
            FlightEvent::WaypointReached { day_index, .. } => Some(*day_index),
            _ => None,
        })
        .collect();
    assert_eq!(reached, vec![2, 3]);
}

#[tokio::test(start_paused = true)]
async fn degenerate_plan_is_rejected() {
    let mut run = spawn(NoTerrain, RecordingViewport::default());
    let single = FlightPlan {
        samples: vec![PathSample::new(GeoPoint::new(68.35, 18.8), None)],
        waypoints: Vec::new(),
    };
    run.handle.start(single).await.unwrap();
    let (event, _) = until(&mut run.events, |e| matches!(e, FlightEvent::Rejected { .. })).await;
    assert!(matches!(event, FlightEvent::Rejected { reason } if reason.contains("at least 2")));
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Idle);

    // commands against an idle controller are ignored
    run.handle.toggle_pause().await.unwrap();
    run.handle.seek_km(1.0).await.unwrap();
    run.handle.cycle_speed().await.unwrap();
    let (event, skipped) =
        until(&mut run.events, |e| matches!(e, FlightEvent::SpeedChanged { .. })).await;
    assert_eq!(event, FlightEvent::SpeedChanged { multiplier: 2 });
    assert!(skipped.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_warmup_cancels_the_start() {
    let viewport = RecordingViewport::default();
    let log = viewport.log.clone();
    let mut run = spawn(SlopedTerrain, viewport);

    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| {
        matches!(e, FlightEvent::TerrainProgress { percent } if *percent > 20 && *percent < 100)
    })
    .await;
    run.handle.stop().await.unwrap();

    let (stopped, between) =
        until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        FlightEvent::Stopped {
            reason: StopReason::Requested
        }
    );
    assert!(!between.iter().any(|e| matches!(e, FlightEvent::Started { .. })));
    // four warm-up passes were planned
    assert!(log.lock().unwrap().poses.len() < 4);
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn controls_during_preparation_do_not_leak_into_the_flight() {
    let mut run = spawn(SlopedTerrain, RecordingViewport::default());

    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| {
        matches!(e, FlightEvent::TerrainProgress { percent } if *percent > 20 && *percent < 100)
    })
    .await;
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Initializing);
    run.handle.toggle_pause().await.unwrap();
    run.handle.seek_km(1.5).await.unwrap();
    run.handle.cycle_speed().await.unwrap();

    let (_, before) = until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;
    assert!(before.contains(&FlightEvent::SpeedChanged { multiplier: 2 }));
    assert!(!before.iter().any(|e| matches!(e, FlightEvent::Resumed)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        *run.handle.status().borrow(),
        FlightStatus::Flying(FlyingMode::Paused)
    );
    assert_eq!(*run.handle.cursor().borrow(), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn viewport_failure_ends_the_flight() {
    let viewport = RecordingViewport {
        // four warm-up passes and the opening pose, then a few frames
        fail_after: Some(15),
        ..RecordingViewport::default()
    };
    let mut run = spawn(SlopedTerrain, viewport);
    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;
    run.handle.toggle_pause().await.unwrap();

    let (stopped, _) = until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        FlightEvent::Stopped {
            reason: StopReason::ViewportFailed
        }
    );
    assert_eq!(*run.handle.cursor().borrow(), None);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_an_active_flight() {
    let mut run = spawn(NoTerrain, RecordingViewport::default());
    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;
    run.handle.toggle_pause().await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Progress { .. })).await;

    run.shutdown.send(()).unwrap();
    let (stopped, _) = until(&mut run.events, |e| matches!(e, FlightEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        FlightEvent::Stopped {
            reason: StopReason::Shutdown
        }
    );
    let viewport = run.task.await.unwrap();
    assert_eq!(viewport.log.lock().unwrap().hiker_removed, 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_ignored_while_flying() {
    let mut run = spawn(NoTerrain, RecordingViewport::default());
    run.handle.start(three_km_plan()).await.unwrap();
    until(&mut run.events, |e| matches!(e, FlightEvent::Started { .. })).await;

    run.handle.start(three_km_plan()).await.unwrap();
    run.handle.cycle_speed().await.unwrap();
    let (_, between) =
        until(&mut run.events, |e| matches!(e, FlightEvent::SpeedChanged { .. })).await;
    assert!(between.is_empty());
    assert_eq!(*run.handle.status().borrow(), FlightStatus::Flying(FlyingMode::Paused));
}

#[test]
fn events_serialize_with_a_type_tag() {
    let event = FlightEvent::WaypointReached {
        name: "Alesjaure".to_string(),
        day_index: 2,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "waypoint_reached");
    assert_eq!(json["day_index"], 2);

    let stopped = serde_json::to_value(FlightEvent::Stopped {
        reason: StopReason::ViewportFailed,
    })
    .unwrap();
    assert_eq!(stopped["reason"], "viewport_failed");
}
