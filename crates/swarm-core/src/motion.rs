//! Per-tick motion models for a controlled cursor, including collision
//! response against live peers.
//!
//! Every rule works in unit-square coordinates and is driven by wall-time
//! deltas. Collision cooldowns are plain expiry instants checked against the
//! tick's `now`, so the whole engine is deterministic under test and dies
//! with its owning connection.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::pose::{clamp, Pose};

/// Velocity units are tuned for ~1/64 s ticks; `dt * SPEED_SCALE` keeps the
/// same feel at other tick rates.
pub const SPEED_SCALE: f64 = 64.0;
pub const COLLISION_RADIUS: f64 = 0.1;
pub const COLLISION_COOLDOWN: Duration = Duration::from_secs(1);
/// Peer velocity estimate magnitude. Empirically tuned against the live
/// party; kept verbatim.
pub const PEER_VELOCITY_FACTOR: f64 = 1.0 / 512.0;

const GRAVITY: f64 = 2.0;
const BOUNCE_RESTITUTION: f64 = 1.5;
const HOCKEY_DAMPENING: f64 = 0.97;
const LEAF_EDGE_OFFSET: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionModel {
    Dvd,
    Circle,
    Infinity,
    Spiral,
    Sine,
    Leaf,
    Pong,
    Bounce,
    Hockey,
}

impl MotionModel {
    /// `None` for names outside the set; the engine then holds the position
    /// steady instead of failing (new model names roll out before clients
    /// understand them).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dvd" => Some(MotionModel::Dvd),
            "circle" => Some(MotionModel::Circle),
            "infinity" => Some(MotionModel::Infinity),
            "spiral" => Some(MotionModel::Spiral),
            "sine" => Some(MotionModel::Sine),
            "leaf" => Some(MotionModel::Leaf),
            "pong" => Some(MotionModel::Pong),
            "bounce" => Some(MotionModel::Bounce),
            "hockey" => Some(MotionModel::Hockey),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MotionModel::Dvd => "dvd",
            MotionModel::Circle => "circle",
            MotionModel::Infinity => "infinity",
            MotionModel::Spiral => "spiral",
            MotionModel::Sine => "sine",
            MotionModel::Leaf => "leaf",
            MotionModel::Pong => "pong",
            MotionModel::Bounce => "bounce",
            MotionModel::Hockey => "hockey",
        }
    }
}

/// Tracks each peer's displacement between ticks to estimate a velocity for
/// collision math. A peer that did not move keeps its last estimate.
#[derive(Debug, Default)]
struct PeerTracker {
    last_seen: HashMap<String, (f64, f64)>,
    velocities: HashMap<String, (f64, f64)>,
}

impl PeerTracker {
    fn observe(&mut self, peers: &HashMap<String, Pose>) {
        for (id, pose) in peers {
            if let Some(&(px, py)) = self.last_seen.get(id) {
                let dx = pose.x - px;
                let dy = pose.y - py;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > 0.0 {
                    let factor = PEER_VELOCITY_FACTOR / distance;
                    self.velocities.insert(id.clone(), (dx * factor, dy * factor));
                }
            }
            self.last_seen.insert(id.clone(), (pose.x, pose.y));
        }
        self.last_seen.retain(|id, _| peers.contains_key(id));
        self.velocities.retain(|id, _| peers.contains_key(id));
    }

    fn velocity(&self, id: &str) -> (f64, f64) {
        self.velocities.get(id).copied().unwrap_or((0.0, 0.0))
    }
}

/// Mutable per-bot animation state, owned by the bot's connection task and
/// advanced once per tick.
#[derive(Debug)]
pub struct AnimationState {
    pub model: Option<MotionModel>,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub bound_x: f64,
    pub bound_y: f64,
    pub cx: f64,
    pub cy: f64,
    pub angle: f64,
    pub radius: f64,
    /// Mirror this peer's pose instead of integrating, whenever it moves.
    pub follow: Option<String>,
    cooldowns: HashMap<String, Instant>,
    tracker: PeerTracker,
}

impl AnimationState {
    pub fn new(model_name: &str) -> Self {
        Self {
            model: MotionModel::from_name(model_name),
            x: 0.5,
            y: 0.5,
            vx: 0.01,
            vy: 0.0075,
            bound_x: 1.0,
            bound_y: 1.0,
            cx: 0.5,
            cy: 0.5,
            angle: 0.0,
            radius: 0.25,
            follow: None,
            cooldowns: HashMap::new(),
            tracker: PeerTracker::default(),
        }
    }

    /// True while a collision response against `id` is still being absorbed.
    pub fn in_cooldown(&self, id: &str, now: Instant) -> bool {
        self.cooldowns.get(id).is_some_and(|&expiry| expiry > now)
    }

    /// Advances one animation tick. `peers` is a registry snapshot taken at
    /// tick start; `dt` is the elapsed wall time in seconds. The final
    /// position is always clamped into bounds before the pose is committed.
    pub fn tick<R: Rng>(
        &mut self,
        dt: f64,
        peers: &HashMap<String, Pose>,
        now: Instant,
        rng: &mut R,
    ) {
        self.tracker.observe(peers);
        self.cooldowns.retain(|_, expiry| *expiry > now);

        if self.apply_follow(peers) {
            self.clamp_position();
            return;
        }

        match self.model {
            None => {}
            Some(MotionModel::Dvd) => self.tick_dvd(dt),
            Some(MotionModel::Circle) => self.tick_circle(dt),
            Some(MotionModel::Infinity) => self.tick_infinity(dt),
            Some(MotionModel::Spiral) => self.tick_spiral(dt),
            Some(MotionModel::Sine) => self.tick_sine(dt),
            Some(MotionModel::Leaf) => self.tick_leaf(dt, rng),
            Some(MotionModel::Pong) => self.tick_pong(dt, peers, now),
            Some(MotionModel::Bounce) => self.tick_bounce(dt, peers, now, rng),
            Some(MotionModel::Hockey) => self.tick_hockey(dt, peers, now),
        }
        self.clamp_position();
    }

    /// Snaps to the followed pose when it differs; returns true when the
    /// model integration is bypassed for this tick.
    fn apply_follow(&mut self, peers: &HashMap<String, Pose>) -> bool {
        let Some(target) = self.follow.as_ref() else {
            return false;
        };
        let Some(pose) = peers.get(target) else {
            return false;
        };
        if pose.x != self.x || pose.y != self.y {
            self.x = pose.x;
            self.y = pose.y;
            return true;
        }
        false
    }

    fn tick_dvd(&mut self, dt: f64) {
        let step = dt * SPEED_SCALE;
        if !(0.0..=self.bound_x).contains(&(self.x + self.vx * step)) {
            self.vx = -self.vx;
        }
        if !(0.0..=self.bound_y).contains(&(self.y + self.vy * step)) {
            self.vy = -self.vy;
        }
        self.x += self.vx * step;
        self.y += self.vy * step;
    }

    fn tick_circle(&mut self, dt: f64) {
        self.angle += dt * 2.0;
        self.x = self.cx + self.angle.cos() * self.radius / 2.0;
        self.y = self.cy + self.angle.sin() * self.radius;
    }

    fn tick_infinity(&mut self, dt: f64) {
        self.angle += dt * 2.0;
        self.x = self.cx + self.angle.cos() * self.radius;
        self.y = self.cy + (2.0 * self.angle).sin() * self.radius;
    }

    fn tick_spiral(&mut self, dt: f64) {
        let radius = (self.angle / 4.0).sin() * 0.3 + 0.2;
        self.angle += dt;
        self.x = self.cx + self.angle.cos() * radius / 2.0;
        self.y = self.cy + self.angle.sin() * radius;
    }

    fn tick_sine(&mut self, dt: f64) {
        let step = dt * SPEED_SCALE;
        if !(0.0..=self.bound_x).contains(&(self.x + self.vx * step)) {
            self.vx = -self.vx;
        }
        self.x += self.vx * step;
        self.y += self.vy * self.angle.cos() * step;
        self.angle += dt;
    }

    fn tick_leaf<R: Rng>(&mut self, dt: f64, rng: &mut R) {
        self.x += self.angle.cos() * dt / 16.0;
        self.y += self.vy * dt * 8.0;
        if self.y >= self.bound_y {
            self.y = 0.0;
            self.x = rng.gen_range(LEAF_EDGE_OFFSET..=(self.bound_x - LEAF_EDGE_OFFSET));
        }
        self.angle += dt;
    }

    fn tick_pong(&mut self, dt: f64, peers: &HashMap<String, Pose>, now: Instant) {
        for (id, pose) in peers {
            if let Some((nx, ny)) = self.collision_normal(id, pose, now) {
                let dot = self.vx * nx + self.vy * ny;
                self.vx -= 2.0 * dot * nx;
                self.vy -= 2.0 * dot * ny;
                self.cooldowns.insert(id.clone(), now + COLLISION_COOLDOWN);
            }
        }
        let step = dt * SPEED_SCALE;
        if !(0.0..=self.bound_x).contains(&(self.x + self.vx * step)) {
            self.vx = -self.vx;
        }
        if !(0.0..=self.bound_y).contains(&(self.y + self.vy * step)) {
            self.vy = -self.vy;
        }
        self.x += self.vx * step;
        self.y += self.vy * step;
    }

    fn tick_bounce<R: Rng>(
        &mut self,
        dt: f64,
        peers: &HashMap<String, Pose>,
        now: Instant,
        rng: &mut R,
    ) {
        self.y += self.vy * dt + 0.5 * GRAVITY * dt * dt;
        self.vy += GRAVITY * dt;

        if self.y >= self.bound_y {
            // Floor: damped rebound.
            self.y = self.bound_y;
            self.vy *= -0.5;
        } else if self.y <= 0.0 {
            // Ceiling: re-launch at a randomized speed.
            self.y = 0.0;
            self.vy = rng.gen_range(0.05..0.2);
        }

        let step = dt * SPEED_SCALE;
        if !(0.0..=self.bound_x).contains(&(self.x + self.vx * step)) {
            self.vx = -self.vx;
        }
        self.x += self.vx * step;

        for (id, pose) in peers {
            if self.collision_normal(id, pose, now).is_some() {
                self.vy = -self.vy * BOUNCE_RESTITUTION;
                self.cooldowns.insert(id.clone(), now + COLLISION_COOLDOWN);
            }
        }
    }

    fn tick_hockey(&mut self, dt: f64, peers: &HashMap<String, Pose>, now: Instant) {
        for (id, pose) in peers {
            if let Some((nx, ny)) = self.collision_normal(id, pose, now) {
                // Take the peer's estimated velocity, reflected about the
                // collision normal, as the new velocity.
                let (pvx, pvy) = self.tracker.velocity(id);
                let dot = pvx * nx + pvy * ny;
                self.vx = pvx - 2.0 * dot * nx;
                self.vy = pvy - 2.0 * dot * ny;
                self.cooldowns.insert(id.clone(), now + COLLISION_COOLDOWN);
            }
        }

        self.vx *= HOCKEY_DAMPENING;
        self.vy *= HOCKEY_DAMPENING;

        let step = dt * SPEED_SCALE;
        self.x += self.vx * step;
        self.y += self.vy * step;

        if self.x <= 0.0 || self.x >= self.bound_x {
            self.vx = -self.vx * HOCKEY_DAMPENING;
        }
        if self.y <= 0.0 || self.y >= self.bound_y {
            self.vy = -self.vy * HOCKEY_DAMPENING;
        }
        // Hockey clamps rather than reflecting the position.
        self.x = clamp(0.0, self.x, self.bound_x);
        self.y = clamp(0.0, self.y, self.bound_y);
    }

    /// Unit normal from the peer toward the bot when the peer is inside the
    /// collision radius and not cooling down. A peer sitting exactly on the
    /// bot reflects along the bot's own direction of travel, which flips the
    /// velocity outright.
    fn collision_normal(&self, id: &str, pose: &Pose, now: Instant) -> Option<(f64, f64)> {
        if self.in_cooldown(id, now) {
            return None;
        }
        let dx = self.x - pose.x;
        let dy = self.y - pose.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance >= COLLISION_RADIUS * pose.scale {
            return None;
        }
        if distance > 0.0 {
            return Some((dx / distance, dy / distance));
        }
        let speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
        if speed > 0.0 {
            Some((self.vx / speed, self.vy / speed))
        } else {
            None
        }
    }

    fn clamp_position(&mut self) {
        self.x = clamp(0.0, self.x, self.bound_x);
        self.y = clamp(0.0, self.y, self.bound_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn peer_at(x: f64, y: f64) -> Pose {
        let mut pose = Pose::default();
        pose.set_position(x, y).set_scale(1.0);
        pose
    }

    #[test]
    fn dvd_reflects_at_right_edge() {
        let mut state = AnimationState::new("dvd");
        state.x = 0.999;
        state.y = 0.5;
        state.vx = 0.01;
        state.vy = 0.0;

        state.tick(1.0 / 64.0, &HashMap::new(), Instant::now(), &mut rng());

        assert!(state.vx < 0.0, "reflection must flip vx");
        assert!(state.x < 0.999);
    }

    #[test]
    fn circle_orbits_the_center() {
        let mut state = AnimationState::new("circle");
        state.tick(0.25, &HashMap::new(), Instant::now(), &mut rng());
        let angle = 0.5f64;
        assert!((state.x - (0.5 + angle.cos() * 0.25 / 2.0)).abs() < 1e-12);
        assert!((state.y - (0.5 + angle.sin() * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_holds_position() {
        let mut state = AnimationState::new("macarena");
        assert!(state.model.is_none());
        state.x = 0.3;
        state.y = 0.4;
        state.tick(0.5, &HashMap::new(), Instant::now(), &mut rng());
        assert_eq!((state.x, state.y), (0.3, 0.4));
    }

    #[test]
    fn final_position_is_always_clamped() {
        let mut state = AnimationState::new("sine");
        state.x = 0.5;
        state.y = 0.99;
        state.vy = 10.0;
        state.angle = 0.0;
        state.tick(1.0, &HashMap::new(), Instant::now(), &mut rng());
        assert!(state.y <= 1.0);
        assert!(state.x >= 0.0 && state.x <= 1.0);
    }

    #[test]
    fn pong_collision_flips_velocity_and_sets_cooldown() {
        let now = Instant::now();
        let mut state = AnimationState::new("pong");
        state.vx = 0.01;
        state.vy = 0.0;
        let mut peers = HashMap::new();
        peers.insert("P".to_string(), peer_at(state.x, state.y));

        state.tick(1.0 / 64.0, &peers, now, &mut rng());
        assert!(state.vx < 0.0, "coincident peer flips velocity");
        assert!(state.in_cooldown("P", now));

        // Within the cooldown window the same peer triggers nothing.
        let vx_after = state.vx;
        state.tick(1.0 / 64.0, &peers, now + Duration::from_millis(500), &mut rng());
        assert_eq!(state.vx.signum(), vx_after.signum());
    }

    #[test]
    fn pong_cooldown_expires_after_window() {
        let now = Instant::now();
        let mut state = AnimationState::new("pong");
        state.vx = 0.01;
        let mut peers = HashMap::new();
        peers.insert("P".to_string(), peer_at(state.x, state.y));

        state.tick(1.0 / 64.0, &peers, now, &mut rng());
        let later = now + COLLISION_COOLDOWN + Duration::from_millis(10);
        assert!(!state.in_cooldown("P", later));
    }

    #[test]
    fn pong_ignores_distant_peers() {
        let now = Instant::now();
        let mut state = AnimationState::new("pong");
        state.vx = 0.01;
        state.vy = 0.0;
        let mut peers = HashMap::new();
        peers.insert("far".to_string(), peer_at(0.1, 0.1));

        state.tick(1.0 / 64.0, &peers, now, &mut rng());
        assert!(state.vx > 0.0);
        assert!(!state.in_cooldown("far", now));
    }

    #[test]
    fn bounce_rebounds_from_floor_with_energy_loss() {
        let mut state = AnimationState::new("bounce");
        state.y = 0.999;
        state.vy = 0.4;
        state.vx = 0.0;
        state.tick(1.0 / 64.0, &HashMap::new(), Instant::now(), &mut rng());
        assert_eq!(state.y, 1.0);
        assert!(state.vy < 0.0);
        assert!(state.vy.abs() < 0.4);
    }

    #[test]
    fn bounce_relaunches_from_ceiling() {
        let mut state = AnimationState::new("bounce");
        state.y = 0.0;
        state.vy = -0.5;
        state.vx = 0.0;
        state.tick(1.0 / 64.0, &HashMap::new(), Instant::now(), &mut rng());
        assert!(state.vy > 0.0, "ceiling re-launch moves away from the ceiling");
    }

    #[test]
    fn hockey_damps_velocity_each_tick() {
        let mut state = AnimationState::new("hockey");
        state.vx = 0.01;
        state.vy = 0.0;
        state.tick(1.0 / 64.0, &HashMap::new(), Instant::now(), &mut rng());
        assert!((state.vx - 0.01 * 0.97).abs() < 1e-12);
    }

    #[test]
    fn hockey_adopts_reflected_peer_velocity() {
        let now = Instant::now();
        let mut state = AnimationState::new("hockey");
        state.x = 0.5;
        state.y = 0.5;
        state.vx = 0.0;
        state.vy = 0.0;

        // Two observations so the tracker has a displacement: the peer moves
        // along +x toward the bot.
        let mut before = HashMap::new();
        before.insert("P".to_string(), peer_at(0.2, 0.5));
        state.tick(1.0 / 64.0, &before, now, &mut rng());

        let mut after = HashMap::new();
        after.insert("P".to_string(), peer_at(0.45, 0.5));
        state.tick(1.0 / 64.0, &after, now + Duration::from_millis(16), &mut rng());

        assert!(state.vx != 0.0, "collision transfers the peer's velocity");
        assert!(state.in_cooldown("P", now + Duration::from_millis(16)));
    }

    #[test]
    fn peer_velocity_estimate_has_fixed_magnitude() {
        let mut tracker = PeerTracker::default();
        let mut peers = HashMap::new();
        peers.insert("P".to_string(), peer_at(0.1, 0.1));
        tracker.observe(&peers);
        peers.insert("P".to_string(), peer_at(0.4, 0.5));
        tracker.observe(&peers);

        let (vx, vy) = tracker.velocity("P");
        let magnitude = (vx * vx + vy * vy).sqrt();
        assert!((magnitude - PEER_VELOCITY_FACTOR).abs() < 1e-12);

        // No displacement keeps the previous estimate.
        tracker.observe(&peers);
        assert_eq!(tracker.velocity("P"), (vx, vy));
    }

    #[test]
    fn leaf_resets_to_top_on_reaching_bottom() {
        let mut state = AnimationState::new("leaf");
        state.y = 0.999;
        state.vy = 0.05;
        let mut seeded = rng();
        state.tick(0.5, &HashMap::new(), Instant::now(), &mut seeded);
        assert_eq!(state.y, 0.0);
        assert!(state.x >= 0.1 && state.x <= 0.9);
    }

    #[test]
    fn follow_snaps_to_target_pose() {
        let mut state = AnimationState::new("dvd");
        state.follow = Some("leader".to_string());
        let mut peers = HashMap::new();
        peers.insert("leader".to_string(), peer_at(0.8, 0.2));

        state.tick(1.0 / 64.0, &peers, Instant::now(), &mut rng());
        assert_eq!((state.x, state.y), (0.8, 0.2));
    }
}
