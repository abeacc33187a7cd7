//! Top-down track racing simulator
//!
//! A lightweight stand-in for a full car-racing physics engine, good enough
//! to exercise the whole training pipeline end to end.
//!
//! # Dynamics
//!
//! - Track: closed loop through `checkpoints` points placed at evenly spaced
//!   angles with a random radius, subdivided into short tiles
//! - Car: kinematic model with speed and heading; gas accelerates, brake and
//!   drag decelerate, steering turns proportionally to speed
//! - Grass: leaving the road adds heavy drag
//!
//! # Reward
//!
//! `-0.1` every step, `+1000 / num_tiles` for every newly visited tile and
//! `-100` for leaving the playfield.
//!
//! # Termination
//!
//! The episode terminates when every tile has been visited or the car leaves
//! the playfield, and is truncated after `max_steps` steps.
//!
//! # Rendering
//!
//! Frames are 96x96 RGB, rotated so the car always points up. The bottom 12
//! rows hold a dashboard strip with a speed bar. With `render_dir` set, every
//! frame is also saved there as a PNG.

use std::f32::consts::PI;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Action, Frame, Simulator, StepResult};

/// Rendered frame size
pub const FRAME_SIZE: usize = 96;

const DASHBOARD_ROWS: usize = 12;
const CAR_ROW: f32 = 70.0;
const CAR_COL: f32 = 48.0;
const PIXELS_PER_UNIT: f32 = 1.0;

const DT: f32 = 1.0 / 50.0;
const ENGINE_ACCEL: f32 = 60.0;
const BRAKE_DECEL: f32 = 120.0;
const DRAG: f32 = 0.4;
const GRASS_DRAG: f32 = 4.0;
const TURN_RATE: f32 = 3.0;
const MAX_SPEED: f32 = 100.0;
const TILE_LEN: f32 = 6.0;

const GRASS: [u8; 3] = [102, 204, 102];
const ROAD: [u8; 3] = [102, 102, 102];
const ROAD_VISITED: [u8; 3] = [110, 110, 110];
const CAR: [u8; 3] = [204, 0, 0];
const DASHBOARD: [u8; 3] = [0, 0, 0];
const SPEED_BAR: [u8; 3] = [255, 255, 255];

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Seed for track generation (random when `None`)
    pub seed: Option<u64>,

    /// Number of track control points
    pub checkpoints: usize,

    /// Outer radius of the track loop
    pub track_radius: f32,

    /// Road half-width
    pub half_width: f32,

    /// Playfield half-extent; leaving it ends the episode
    pub playfield: f32,

    /// Steps before truncation
    pub max_steps: usize,

    /// Directory receiving one PNG image per rendered frame
    pub render_dir: Option<PathBuf>,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            seed: None,
            checkpoints: 12,
            track_radius: 150.0,
            half_width: 10.0,
            playfield: 300.0,
            max_steps: 1000,
            render_dir: None,
        }
    }
}

impl TrackConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the track generation seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the truncation limit
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Write rendered frames into `dir`
    pub fn render_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.render_dir = Some(dir.into());
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.checkpoints < 3 {
            bail!("checkpoints must be at least 3, got {}", self.checkpoints);
        }
        if self.track_radius <= 0.0 {
            bail!("track_radius must be positive, got {}", self.track_radius);
        }
        if self.half_width <= 0.0 {
            bail!("half_width must be positive, got {}", self.half_width);
        }
        if self.playfield <= self.track_radius {
            bail!(
                "playfield ({}) must extend beyond track_radius ({})",
                self.playfield,
                self.track_radius
            );
        }
        if self.max_steps == 0 {
            bail!("max_steps must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Tile {
    start: (f32, f32),
    end: (f32, f32),
}

impl Tile {
    fn midpoint(&self) -> (f32, f32) {
        ((self.start.0 + self.end.0) / 2.0, (self.start.1 + self.end.1) / 2.0)
    }

    fn heading(&self) -> f32 {
        (self.end.1 - self.start.1).atan2(self.end.0 - self.start.0)
    }

    /// Distance from `p` to the tile's centre segment
    fn distance(&self, p: (f32, f32)) -> f32 {
        let (dx, dy) = (self.end.0 - self.start.0, self.end.1 - self.start.1);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq > 0.0 {
            (((p.0 - self.start.0) * dx + (p.1 - self.start.1) * dy) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (cx, cy) = (self.start.0 + t * dx, self.start.1 + t * dy);
        ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Car {
    x: f32,
    y: f32,
    heading: f32,
    speed: f32,
}

/// Procedural top-down racing simulator
#[derive(Debug)]
pub struct TrackSim {
    config: TrackConfig,
    rng: StdRng,
    tiles: Vec<Tile>,
    visited: Vec<bool>,
    car: Car,
    steps: usize,
    episode: usize,
}

impl TrackSim {
    /// Create a simulator; the track is generated on the first reset
    pub fn new(config: TrackConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            tiles: Vec::new(),
            visited: Vec::new(),
            car: Car::default(),
            steps: 0,
            episode: 0,
        })
    }

    /// Number of tiles on the current track
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Number of tiles visited this episode
    pub fn tiles_visited(&self) -> usize {
        self.visited.iter().filter(|&&v| v).count()
    }

    /// Current car speed
    pub fn speed(&self) -> f32 {
        self.car.speed
    }

    fn generate_track(&mut self) {
        let n = self.config.checkpoints;
        let radius = self.config.track_radius;

        let points: Vec<(f32, f32)> = (0..n)
            .map(|i| {
                let jitter = self.rng.gen_range(0.0..(2.0 * PI / n as f32) * 0.5);
                let angle = 2.0 * PI * i as f32 / n as f32 + jitter;
                let r = self.rng.gen_range(radius / 2.0..radius);
                (r * angle.cos(), r * angle.sin())
            })
            .collect();

        self.tiles.clear();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
            let pieces = (len / TILE_LEN).ceil().max(1.0) as usize;
            for k in 0..pieces {
                let t0 = k as f32 / pieces as f32;
                let t1 = (k + 1) as f32 / pieces as f32;
                self.tiles.push(Tile {
                    start: (a.0 + (b.0 - a.0) * t0, a.1 + (b.1 - a.1) * t0),
                    end: (a.0 + (b.0 - a.0) * t1, a.1 + (b.1 - a.1) * t1),
                });
            }
        }
        self.visited = vec![false; self.tiles.len()];
    }

    /// Index of the tile whose road surface contains `p`, if any
    fn tile_under(&self, p: (f32, f32)) -> Option<usize> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, tile)| (i, tile.distance(p)))
            .filter(|&(_, d)| d <= self.config.half_width)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::filled(FRAME_SIZE, FRAME_SIZE, GRASS);
        let car = self.car;
        let (fwd, right) =
            ((car.heading.cos(), car.heading.sin()), (car.heading.sin(), -car.heading.cos()));

        // Only tiles that can appear in view
        let view_radius = FRAME_SIZE as f32 / PIXELS_PER_UNIT + TILE_LEN + self.config.half_width;
        let nearby: Vec<(usize, &Tile)> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| {
                let (mx, my) = tile.midpoint();
                ((mx - car.x).powi(2) + (my - car.y).powi(2)).sqrt() < view_radius
            })
            .collect();

        for row in 0..FRAME_SIZE - DASHBOARD_ROWS {
            for col in 0..FRAME_SIZE {
                let ahead = (CAR_ROW - row as f32) / PIXELS_PER_UNIT;
                let side = (col as f32 - CAR_COL) / PIXELS_PER_UNIT;
                let p = (
                    car.x + fwd.0 * ahead + right.0 * side,
                    car.y + fwd.1 * ahead + right.1 * side,
                );
                let hit = nearby
                    .iter()
                    .filter(|(_, tile)| tile.distance(p) <= self.config.half_width)
                    .map(|(i, _)| *i)
                    .next();
                if let Some(i) = hit {
                    frame.set_pixel(row, col, if self.visited[i] { ROAD_VISITED } else { ROAD });
                }
            }
        }

        for row in (CAR_ROW as usize - 3)..=(CAR_ROW as usize + 2) {
            for col in (CAR_COL as usize - 1)..=(CAR_COL as usize + 1) {
                frame.set_pixel(row, col, CAR);
            }
        }

        let bar = ((car.speed / MAX_SPEED) * (FRAME_SIZE as f32 - 8.0)) as usize;
        for row in FRAME_SIZE - DASHBOARD_ROWS..FRAME_SIZE {
            for col in 0..FRAME_SIZE {
                let on_bar = (FRAME_SIZE - 8..FRAME_SIZE - 4).contains(&row)
                    && (4..4 + bar).contains(&col);
                frame.set_pixel(row, col, if on_bar { SPEED_BAR } else { DASHBOARD });
            }
        }

        frame
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        let Some(dir) = &self.config.render_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating render directory {}", dir.display()))?;
        let path = dir.join(format!("frame_{:04}_{:05}.png", self.episode, self.steps));
        let image = RgbImage::from_raw(
            frame.width() as u32,
            frame.height() as u32,
            frame.pixels().to_vec(),
        )
        .context("frame buffer does not match its dimensions")?;
        image.save(&path).with_context(|| format!("writing {}", path.display()))
    }
}

impl Simulator for TrackSim {
    fn reset(&mut self) -> Result<Frame> {
        self.generate_track();
        let start = self.tiles[0];
        self.car = Car { x: start.start.0, y: start.start.1, heading: start.heading(), speed: 0.0 };
        self.steps = 0;
        self.episode += 1;

        let frame = self.render();
        self.write_frame(&frame)?;
        Ok(frame)
    }

    fn step(&mut self, action: &Action) -> Result<StepResult<Frame>> {
        let steering = action.steering().clamp(-1.0, 1.0);
        let gas = action.gas().clamp(0.0, 1.0);
        let brake = action.brake().clamp(0.0, 1.0);

        let on_road = self.tile_under((self.car.x, self.car.y)).is_some();
        let drag = if on_road { DRAG } else { DRAG + GRASS_DRAG };

        let car = &mut self.car;
        car.speed += (gas * ENGINE_ACCEL - brake * BRAKE_DECEL - drag * car.speed) * DT;
        car.speed = car.speed.clamp(0.0, MAX_SPEED);
        car.heading -= steering * TURN_RATE * DT * (car.speed / 20.0).min(1.0);
        car.x += car.speed * car.heading.cos() * DT;
        car.y += car.speed * car.heading.sin() * DT;
        self.steps += 1;

        let mut reward = -0.1;
        if let Some(i) = self.tile_under((self.car.x, self.car.y))
            && !self.visited[i]
        {
            self.visited[i] = true;
            reward += 1000.0 / self.tiles.len() as f32;
        }

        let mut terminated = self.visited.iter().all(|&v| v);
        let limit = self.config.playfield;
        if self.car.x.abs() > limit || self.car.y.abs() > limit {
            reward -= 100.0;
            terminated = true;
        }
        let truncated = !terminated && self.steps >= self.config.max_steps;

        let frame = self.render();
        self.write_frame(&frame)?;

        Ok(StepResult { observation: frame, reward, terminated, truncated })
    }
}
