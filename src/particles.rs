//! Particle system: debris from shattered cells plus themed secondary effects.
//!
//! Positions are in board-cell units so physics can query grid occupancy directly.
//! The system only ever reads the grid.

use crate::grid::Grid;
use crate::shapes::generate_chipped_polygon;
use rand::Rng;
use ratatui::style::Color;
use std::f32::consts::{PI, TAU};

pub const DEFAULT_MAX_PARTICLES: usize = 600;
pub const MIN_MAX_PARTICLES: usize = 500;
pub const MAX_MAX_PARTICLES: usize = 800;

// Debris physics, per frame.
const GRAVITY: f32 = 0.012;
const AIR_FRICTION: f32 = 0.98;
const BOUNCE: f32 = 0.6;
const RESTITUTION: f32 = 0.6;
const GROUND_FRICTION: f32 = 0.8;
const REST_EPSILON: f32 = 0.04;
const REST_GAP: f32 = 0.05;
/// How far below the bottom edge debris may fall before it is dropped.
const FLOOR_MARGIN: f32 = 2.0;

// Spawn policy.
const BURST_SPEED: f32 = 0.3;
const DEBRIS_BASE_RADIUS: (f32, f32) = (0.1, 0.2);
const SECONDARY_LIFE: (u32, u32) = (120, 180);

// Lock interaction.
const NUDGE_RADIUS: f32 = 2.5;
const NUDGE_STRENGTH: f32 = 0.06;
const FRAGMENT_SHRINK: (f32, f32) = (0.45, 0.65);
const MIN_FRAGMENT_RADIUS: f32 = 0.04;

// Secondary kinds.
const SMOKE_BUOYANCY: f32 = 0.0015;
const SMOKE_SWIRL: f32 = 0.002;
const SMOKE_DAMPING: f32 = 0.96;
const SMOKE_GROWTH: f32 = 1.01;
const LEAF_FALL: f32 = 0.003;
const LEAF_DAMPING: f32 = 0.96;
const EMBER_RISE: f32 = 0.0012;
const EMBER_DAMPING: f32 = 0.96;
const EMBER_SHRINK: f32 = 0.985;
const EMBER_MIN_RADIUS: f32 = 0.01;

/// Which secondary particle accompanies debris. Chosen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticleTheme {
    #[default]
    Smoke,
    Leaf,
    Ember,
    Sparkle,
}

impl ParticleTheme {
    pub const ALL: [Self; 4] = [Self::Smoke, Self::Leaf, Self::Ember, Self::Sparkle];

    /// Milestone rotation: a new theme every two levels.
    pub fn for_level(level: u32) -> Self {
        Self::ALL[(level.saturating_sub(1) / 2) as usize % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Smoke => "Smoke",
            Self::Leaf => "Leaves",
            Self::Ember => "Embers",
            Self::Sparkle => "Sparkles",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Debris {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Color,
    pub polygon: Vec<(f32, f32)>,
    pub bounding_radius: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    /// Brightness offset applied to `color` when drawn, roughly -0.25..0.25.
    pub color_shade: f32,
    pub resting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Smoke {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub life: u32,
    pub initial_life: u32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub life: u32,
    pub initial_life: u32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub flutter: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ember {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub life: u32,
    pub initial_life: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sparkle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub life: u32,
    pub initial_life: u32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Particle {
    Debris(Debris),
    Smoke(Smoke),
    Leaf(Leaf),
    Ember(Ember),
    Sparkle(Sparkle),
}

impl Particle {
    pub fn position(&self) -> (f32, f32) {
        match self {
            Self::Debris(p) => (p.x, p.y),
            Self::Smoke(p) => (p.x, p.y),
            Self::Leaf(p) => (p.x, p.y),
            Self::Ember(p) => (p.x, p.y),
            Self::Sparkle(p) => (p.x, p.y),
        }
    }

    /// Remaining life as a fraction of the initial life; debris has none.
    pub fn life_ratio(&self) -> Option<f32> {
        let (life, initial) = match self {
            Self::Debris(_) => return None,
            Self::Smoke(p) => (p.life, p.initial_life),
            Self::Leaf(p) => (p.life, p.initial_life),
            Self::Ember(p) => (p.life, p.initial_life),
            Self::Sparkle(p) => (p.life, p.initial_life),
        };
        Some(life as f32 / initial.max(1) as f32)
    }

    /// One physics step. Returns false when the particle should be dropped.
    fn step(&mut self, grid: &Grid) -> bool {
        match self {
            Self::Debris(d) => step_debris(d, grid),
            Self::Smoke(s) => {
                s.vy -= SMOKE_BUOYANCY;
                s.vx += (s.y * 2.0 + s.life as f32 * 0.05).sin() * SMOKE_SWIRL;
                s.vx *= SMOKE_DAMPING;
                s.vy *= SMOKE_DAMPING;
                s.x += s.vx;
                s.y += s.vy;
                s.radius *= SMOKE_GROWTH;
                s.life = s.life.saturating_sub(1);
                s.life > 0
            }
            Self::Leaf(l) => {
                l.vy += LEAF_FALL;
                l.vx += (l.y * 3.0).sin() * l.flutter;
                l.vx *= LEAF_DAMPING;
                l.vy *= LEAF_DAMPING;
                l.x += l.vx;
                l.y += l.vy;
                l.rotation = (l.rotation + l.rotation_speed).rem_euclid(TAU);
                l.life = l.life.saturating_sub(1);
                l.life > 0
            }
            Self::Ember(e) => {
                e.vy -= EMBER_RISE;
                e.vx *= EMBER_DAMPING;
                e.vy *= EMBER_DAMPING;
                e.x += e.vx;
                e.y += e.vy;
                e.radius *= EMBER_SHRINK;
                e.life = e.life.saturating_sub(1);
                e.life > 0 && e.radius > EMBER_MIN_RADIUS
            }
            Self::Sparkle(s) => {
                s.life = s.life.saturating_sub(1);
                s.life > 0
            }
        }
    }
}

fn step_debris(d: &mut Debris, grid: &Grid) -> bool {
    let (w, h) = (grid.width() as f32, grid.height() as f32);
    let r = d.bounding_radius;

    // Embedded in a settled cell (e.g. a piece locked on top of it): lift to its top edge.
    if grid.is_merged_at(d.x, d.y) {
        d.y = d.y.floor() - r;
        d.vy = d.vy.min(0.0);
        d.resting = false;
    }

    d.vy += GRAVITY;
    d.vx *= AIR_FRICTION;
    d.vy *= AIR_FRICTION;

    let supported = grid.is_merged_at(d.x, d.y + r + REST_GAP);
    if supported && d.vy >= 0.0 && d.vy < REST_EPSILON {
        d.vx = 0.0;
        d.vy = 0.0;
        d.rotation_speed = 0.0;
        d.resting = true;
        return true;
    }
    d.resting = false;

    // Side contact with the stack.
    if d.vx.abs() > f32::EPSILON && grid.is_merged_at(d.x + d.vx + r * d.vx.signum(), d.y) {
        d.vx = -d.vx * BOUNCE;
        d.rotation_speed *= BOUNCE;
    }

    // Landing on the stack.
    let mut y_next = d.y + d.vy;
    if d.vy > 0.0 && grid.is_merged_at(d.x, y_next + r) {
        y_next = (y_next + r).floor() - r;
        d.vy = -d.vy * BOUNCE;
        d.vx *= GROUND_FRICTION;
        d.rotation_speed *= BOUNCE;
    }

    let mut x_next = d.x + d.vx;
    if x_next - r < 0.0 {
        x_next = r;
        d.vx = d.vx.abs() * BOUNCE;
        d.rotation_speed *= BOUNCE;
    } else if x_next + r > w {
        x_next = w - r;
        d.vx = -d.vx.abs() * BOUNCE;
        d.rotation_speed *= BOUNCE;
    }
    if y_next - r < 0.0 {
        y_next = r;
        d.vy = d.vy.abs() * BOUNCE;
        d.rotation_speed *= BOUNCE;
    }

    d.x = x_next;
    d.y = y_next;
    d.rotation = (d.rotation + d.rotation_speed).rem_euclid(TAU);

    d.y - r <= h + FLOOR_MARGIN
}

/// Circle overlap between two debris: split the overlap 50/50 along the contact
/// normal and swap normal velocities scaled by restitution.
fn collide_pair(a: &mut Debris, b: &mut Debris) {
    if a.resting && b.resting {
        return;
    }
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let min_dist = a.bounding_radius + b.bounding_radius;
    let dist_sq = dx * dx + dy * dy;
    if dist_sq >= min_dist * min_dist {
        return;
    }
    let dist = dist_sq.sqrt();
    if dist <= f32::EPSILON {
        // No usable normal.
        return;
    }
    let (nx, ny) = (dx / dist, dy / dist);
    let push = (min_dist - dist) * 0.5;
    a.x -= nx * push;
    a.y -= ny * push;
    b.x += nx * push;
    b.y += ny * push;

    let (tx, ty) = (-ny, nx);
    let (a_n, a_t) = (a.vx * nx + a.vy * ny, a.vx * tx + a.vy * ty);
    let (b_n, b_t) = (b.vx * nx + b.vy * ny, b.vx * tx + b.vy * ty);
    let (a_n, b_n) = (b_n * RESTITUTION, a_n * RESTITUTION);
    a.vx = a_n * nx + a_t * tx;
    a.vy = a_n * ny + a_t * ty;
    b.vx = b_n * nx + b_t * tx;
    b.vy = b_n * ny + b_t * ty;
    a.resting = false;
    b.resting = false;
}

/// Multiply each RGB channel by `factor`; named colours pass through.
pub fn scale_rgb(color: Color, factor: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(
            (r as f32 * factor).clamp(0.0, 255.0) as u8,
            (g as f32 * factor).clamp(0.0, 255.0) as u8,
            (b as f32 * factor).clamp(0.0, 255.0) as u8,
        ),
        other => other,
    }
}

fn new_debris(
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    base_radius: f32,
    color: Color,
    color_shade: f32,
    rng: &mut impl Rng,
) -> Debris {
    let poly = generate_chipped_polygon(base_radius, rng);
    Debris {
        x,
        y,
        vx,
        vy,
        color,
        polygon: poly.points,
        bounding_radius: poly.bounding_radius,
        rotation: rng.gen_range(0.0..TAU),
        rotation_speed: rng.gen_range(-0.2..0.2),
        color_shade,
        resting: false,
    }
}

/// One themed secondary particle somewhere inside cell `(ox, oy)`.
fn secondary_particle(
    theme: ParticleTheme,
    ox: f32,
    oy: f32,
    cell_color: Color,
    rng: &mut impl Rng,
) -> Particle {
    let x = ox + rng.gen_range(0.0..1.0);
    let y = oy + rng.gen_range(0.0..1.0);
    let life = rng.gen_range(SECONDARY_LIFE.0..=SECONDARY_LIFE.1);
    match theme {
        ParticleTheme::Smoke => {
            let v = rng.gen_range(90..=160);
            Particle::Smoke(Smoke {
                x,
                y,
                vx: rng.gen_range(-0.02..0.02),
                vy: rng.gen_range(-0.03..0.0),
                radius: rng.gen_range(0.15..0.3),
                life,
                initial_life: life,
                color: Color::Rgb(v, v, v.saturating_add(8)),
            })
        }
        ParticleTheme::Leaf => {
            const LEAF_COLORS: [Color; 4] = [
                Color::Rgb(0x98, 0xC3, 0x79),
                Color::Rgb(0x6A, 0x9A, 0x4B),
                Color::Rgb(0xD1, 0x9A, 0x66),
                Color::Rgb(0xC2, 0x6A, 0x3A),
            ];
            Particle::Leaf(Leaf {
                x,
                y,
                vx: rng.gen_range(-0.03..0.03),
                vy: rng.gen_range(-0.04..0.0),
                size: rng.gen_range(0.15..0.3),
                life,
                initial_life: life,
                rotation: rng.gen_range(0.0..TAU),
                rotation_speed: rng.gen_range(-0.1..0.1),
                flutter: rng.gen_range(0.001..0.004),
                color: LEAF_COLORS[rng.gen_range(0..LEAF_COLORS.len())],
            })
        }
        ParticleTheme::Ember => Particle::Ember(Ember {
            x,
            y,
            vx: rng.gen_range(-0.02..0.02),
            vy: rng.gen_range(-0.05..-0.01),
            radius: rng.gen_range(0.08..0.15),
            life,
            initial_life: life,
        }),
        ParticleTheme::Sparkle => {
            let color = if rng.gen_bool(0.5) {
                Color::Rgb(0xFF, 0xF4, 0xC2)
            } else {
                scale_rgb(cell_color, 1.3)
            };
            Particle::Sparkle(Sparkle {
                x,
                y,
                radius: rng.gen_range(0.05..0.15),
                life,
                initial_life: life,
                color,
            })
        }
    }
}

/// 2..=4 smaller pieces of `d`, thrown upward from the top of its cell.
fn shatter_fragments(d: &Debris, rng: &mut impl Rng) -> Vec<Particle> {
    let count = rng.gen_range(2..=4);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let base = (d.bounding_radius * rng.gen_range(FRAGMENT_SHRINK.0..FRAGMENT_SHRINK.1))
            .max(MIN_FRAGMENT_RADIUS);
        let angle = rng.gen_range(PI + 0.2..TAU - 0.2);
        let speed = rng.gen_range(0.05..0.15);
        let y = d.y.floor() - base;
        out.push(Particle::Debris(new_debris(
            d.x,
            y,
            angle.cos() * speed,
            angle.sin() * speed,
            base,
            d.color,
            d.color_shade,
            rng,
        )));
    }
    out
}

/// Owns every live particle, oldest first.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    max_particles: usize,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARTICLES)
    }
}

impl ParticleSystem {
    pub fn new(max_particles: usize) -> Self {
        Self {
            particles: Vec::with_capacity(max_particles),
            max_particles: max_particles.max(1),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Append and keep only the newest `max_particles`.
    pub fn extend(&mut self, new: impl IntoIterator<Item = Particle>) -> usize {
        self.particles.extend(new);
        self.enforce_cap()
    }

    fn enforce_cap(&mut self) -> usize {
        let excess = self.particles.len().saturating_sub(self.max_particles);
        if excess > 0 {
            self.particles.drain(..excess);
            log::debug!("evicted {excess} oldest particles");
        }
        excess
    }

    /// Spawn policy for one destroyed cell at `(cx, cy)`: 8..=12 debris and
    /// 10..=18 secondary particles of `theme`. Returns how many were evicted.
    pub fn spawn_cell_burst(
        &mut self,
        cx: usize,
        cy: usize,
        color: Color,
        theme: ParticleTheme,
        rng: &mut impl Rng,
    ) -> usize {
        let (ox, oy) = (cx as f32, cy as f32);
        let (mx, my) = (ox + 0.5, oy + 0.5);
        let debris_count = rng.gen_range(8..=12);
        let secondary_count = rng.gen_range(10..=18);
        let mut burst = Vec::with_capacity(debris_count + secondary_count);
        for _ in 0..debris_count {
            let x = ox + rng.gen_range(0.1..0.9);
            let y = oy + rng.gen_range(0.1..0.9);
            let vx = (x - mx) * BURST_SPEED + rng.gen_range(-0.03..0.03);
            let vy = (y - my) * BURST_SPEED - rng.gen_range(0.05..0.2);
            let base = rng.gen_range(DEBRIS_BASE_RADIUS.0..DEBRIS_BASE_RADIUS.1);
            let shade = rng.gen_range(-0.25..0.25);
            burst.push(Particle::Debris(new_debris(x, y, vx, vy, base, color, shade, rng)));
        }
        for _ in 0..secondary_count {
            burst.push(secondary_particle(theme, ox, oy, color, rng));
        }
        self.extend(burst)
    }

    /// One frame of physics for every particle, then debris–debris contacts.
    pub fn step(&mut self, grid: &Grid) {
        self.particles.retain_mut(|p| p.step(grid));
        self.resolve_debris_collisions();
    }

    fn resolve_debris_collisions(&mut self) {
        for i in 0..self.particles.len() {
            let (head, tail) = self.particles.split_at_mut(i + 1);
            let Particle::Debris(a) = &mut head[i] else {
                continue;
            };
            for other in tail.iter_mut() {
                if let Particle::Debris(b) = other {
                    collide_pair(a, b);
                }
            }
        }
    }

    /// A piece just locked into `cells`: resting debris inside those cells
    /// shatters into smaller fragments, and debris nearby gets pushed away.
    pub fn on_piece_locked(&mut self, cells: &[(usize, usize)], rng: &mut impl Rng) -> usize {
        if cells.is_empty() {
            return 0;
        }
        let mut fragments = Vec::new();
        let mut shattered = 0usize;
        self.particles.retain(|p| {
            let Particle::Debris(d) = p else {
                return true;
            };
            if !d.resting || d.x < 0.0 || d.y < 0.0 {
                return true;
            }
            if cells.contains(&(d.x as usize, d.y as usize)) {
                fragments.extend(shatter_fragments(d, rng));
                shattered += 1;
                return false;
            }
            true
        });

        for p in &mut self.particles {
            let Particle::Debris(d) = p else {
                continue;
            };
            let nearest = cells
                .iter()
                .map(|&(cx, cy)| {
                    let (dx, dy) = (d.x - (cx as f32 + 0.5), d.y - (cy as f32 + 0.5));
                    (dx, dy, dx.hypot(dy))
                })
                .min_by(|a, b| a.2.total_cmp(&b.2));
            let Some((dx, dy, dist)) = nearest else {
                continue;
            };
            if dist >= NUDGE_RADIUS {
                continue;
            }
            let (nx, ny) = if dist > f32::EPSILON {
                (dx / dist, dy / dist)
            } else {
                (0.0, -1.0)
            };
            let impulse = NUDGE_STRENGTH / dist.max(0.5);
            d.vx += nx * impulse;
            d.vy += ny * impulse - impulse * 0.5;
            d.rotation_speed += rng.gen_range(-1.0..1.0) * impulse;
            d.resting = false;
        }

        if shattered > 0 {
            log::debug!(
                "lock shattered {shattered} resting debris into {} fragments",
                fragments.len()
            );
        }
        self.extend(fragments);
        shattered
    }
}
