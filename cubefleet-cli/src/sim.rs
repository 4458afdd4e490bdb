//! Synthetic navigation and capture backends for local runs.
//!
//! Stands in for the real locomotion and camera stack: moves are timed by
//! straight-line distance, an obstacle band across the map blocks the first
//! crossing, and captured "frames" are small synthetic payloads.

use bytes::Bytes;
use cubefleet::stream::{SensorCapture, StreamResult};
use cubefleet::{AgentId, MoveHandle, MoveOutcome, Navigator, Vec3, move_channel};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Obstacle band crossing the playfield. The first time an agent's route
/// crosses it, the move stops short with a blocked outcome; the retry after
/// recovery goes through.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleBand {
    pub x_min: f32,
    pub x_max: f32,
    pub height: f32,
}

impl ObstacleBand {
    fn crossed_by(&self, from: Vec3, to: Vec3) -> bool {
        let (lo, hi) = if from.x <= to.x {
            (from.x, to.x)
        } else {
            (to.x, from.x)
        };
        lo < self.x_max && hi > self.x_min
    }

    /// Point on the near edge of the band along the route.
    fn stop_point(&self, from: Vec3, to: Vec3) -> Vec3 {
        let edge = if from.x <= self.x_min {
            self.x_min
        } else {
            self.x_max
        };
        let dx = to.x - from.x;
        if dx.abs() < f32::EPSILON {
            return from;
        }
        let t = ((edge - from.x) / dx).clamp(0.0, 1.0);
        Vec3::new(
            from.x + dx * t,
            from.y + (to.y - from.y) * t,
            from.z + (to.z - from.z) * t,
        )
    }
}

/// Timed straight-line navigator.
///
/// Moves complete after `distance / speed` seconds and teleport the agent to
/// the destination. No pathfinding; a destination outside `bounds` is an
/// invalid path.
pub struct SimNavigator {
    positions: Arc<Mutex<HashMap<AgentId, Vec3>>>,
    speed: f32,
    bounds: (Vec3, Vec3),
    obstacle: Option<ObstacleBand>,
    blocked_once: Mutex<HashSet<u32>>,
}

impl SimNavigator {
    pub fn new(speed: f32, bounds: (Vec3, Vec3)) -> Self {
        Self {
            positions: Arc::new(Mutex::new(HashMap::new())),
            speed: speed.max(0.1),
            bounds,
            obstacle: None,
            blocked_once: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_obstacle(mut self, band: ObstacleBand) -> Self {
        self.obstacle = Some(band);
        self
    }

    pub fn place(&self, agent: AgentId, position: Vec3) {
        self.lock_positions().insert(agent, position);
    }

    fn in_bounds(&self, p: Vec3) -> bool {
        let (min, max) = self.bounds;
        // Delivery zone sits east of the playfield; allow slack on +x.
        p.x >= min.x && p.x <= max.x + 15.0 && p.z >= min.z && p.z <= max.z
    }

    fn lock_positions(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, Vec3>> {
        self.positions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn first_block(&self, agent: AgentId, from: Vec3, to: Vec3) -> Option<ObstacleBand> {
        let band = self.obstacle?;
        if !band.crossed_by(from, to) {
            return None;
        }
        let mut blocked = self.blocked_once.lock().unwrap_or_else(|e| e.into_inner());
        if blocked.insert(agent.as_u32()) {
            Some(band)
        } else {
            None
        }
    }
}

impl Navigator for SimNavigator {
    fn request_move(&self, agent: AgentId, destination: Vec3) -> MoveHandle {
        let (resolver, handle) = move_channel();
        let from = self.position(agent);

        if !self.in_bounds(destination) {
            trace!(agent = %agent, dest = %destination, "destination out of bounds");
            let _ = resolver.send(MoveOutcome::InvalidPath);
            return handle;
        }

        if let Some(band) = self.first_block(agent, from, destination) {
            let stop = band.stop_point(from, destination);
            let travel = travel_time(from.distance(&stop), self.speed);
            let positions = Arc::clone(&self.positions);
            tokio::spawn(async move {
                tokio::time::sleep(travel).await;
                update_position(&positions, agent, stop);
                let _ = resolver.send(MoveOutcome::Blocked {
                    height: band.height,
                });
            });
            return handle;
        }

        let travel = travel_time(from.distance(&destination), self.speed);
        let positions = Arc::clone(&self.positions);
        tokio::spawn(async move {
            tokio::time::sleep(travel).await;
            update_position(&positions, agent, destination);
            let _ = resolver.send(MoveOutcome::Arrived);
        });
        handle
    }

    fn position(&self, agent: AgentId) -> Vec3 {
        self.lock_positions().get(&agent).copied().unwrap_or(Vec3::ZERO)
    }
}

fn travel_time(distance: f32, speed: f32) -> Duration {
    Duration::from_secs_f32((distance / speed).clamp(0.0, 30.0))
}

fn update_position(positions: &Mutex<HashMap<AgentId, Vec3>>, agent: AgentId, position: Vec3) {
    positions
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(agent, position);
}

/// Capture source that fabricates small tagged payloads.
pub struct SyntheticCapture {
    agent: AgentId,
    counter: AtomicU64,
}

impl SyntheticCapture {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl SensorCapture for SyntheticCapture {
    async fn capture(&self) -> StreamResult<(Bytes, u64)> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&self.agent.as_u32().to_le_bytes());
        payload.extend_from_slice(&n.to_le_bytes());
        payload.extend_from_slice(&(now_ms as u32).to_le_bytes());
        Ok((Bytes::from(payload), now_ms))
    }
}
