//! Game state: grid, active piece, drop timer, line-clear pipeline, particles, score.

use crate::GameConfig;
use crate::grid::{CellStatus, Grid, collides};
use crate::line_clear::{LineClear, LineClearPhase, Transition};
use crate::particles::{Particle, ParticleSystem, ParticleTheme};
use crate::pieces::{ActivePiece, PieceKind};
use crate::scoring::{gravity_interval_ms, level_for_lines, line_clear_points};
use crate::theme::Theme;
use crate::timer::Interval;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// What the frontend draws each frame. The grid is a display copy with the
/// ghost and active piece painted in.
#[derive(Debug)]
pub struct RenderSnapshot<'a> {
    pub grid: Grid,
    pub particles: &'a [Particle],
    pub next: PieceKind,
    pub phase: LineClearPhase,
    /// Rows in the line-clear pipeline, top to bottom.
    pub clearing: &'a [usize],
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub paused: bool,
    pub game_over: bool,
}

/// Game state: grid, current piece, next piece, score, level, particles.
#[derive(Debug)]
pub struct GameState {
    pub theme: Theme,
    pub grid: Grid,
    pub piece: Option<ActivePiece>,
    pub next: PieceKind,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub game_over: bool,
    pub paused: bool,
    pub particles: ParticleSystem,
    /// Secondary particle kind for the next shatter. Set by the frontend.
    pub particle_theme: ParticleTheme,
    line_clear: LineClear,
    gravity: Interval,
    rng: StdRng,
    shatter_on_lock: bool,
    width: usize,
    height: usize,
}

impl GameState {
    pub fn new(theme: Theme, config: &GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = Self {
            theme,
            grid: Grid::new(config.width, config.height),
            piece: None,
            next: PieceKind::I,
            score: 0,
            level: 1,
            lines: 0,
            game_over: false,
            paused: false,
            particles: ParticleSystem::new(config.max_particles),
            particle_theme: config.particle_theme.unwrap_or_default(),
            line_clear: LineClear::default(),
            gravity: Interval::idle(),
            rng,
            shatter_on_lock: config.shatter_on_lock,
            width: config.width,
            height: config.height,
        };
        state.start();
        state
    }

    /// Fresh grid, counters and pieces; arms gravity.
    fn start(&mut self) {
        self.grid = Grid::new(self.width, self.height);
        self.particles.clear();
        self.score = 0;
        self.level = 1;
        self.lines = 0;
        self.game_over = false;
        self.paused = false;
        self.next = PieceKind::random(&mut self.rng);
        self.spawn_next();
        self.rearm_gravity();
        log::info!("game started on a {}x{} board", self.width, self.height);
    }

    /// Cancel every pending timer and phase before anything else is touched.
    pub fn teardown(&mut self) {
        self.gravity.cancel();
        self.line_clear.cancel();
    }

    /// Restart. Pending phases from the previous game never reach the new grid.
    pub fn reset(&mut self) {
        self.teardown();
        self.piece = None;
        self.start();
    }

    #[inline]
    pub fn phase(&self) -> LineClearPhase {
        self.line_clear.phase()
    }

    /// Rows currently pending removal.
    pub fn clearing_rows(&self) -> &[usize] {
        self.line_clear.rows()
    }

    /// Current gravity interval, if armed.
    pub fn gravity_period_ms(&self) -> Option<u64> {
        self.gravity.is_armed().then(|| self.gravity.period_ms())
    }

    /// Arm gravity at the level's speed if the piece may fall, else cancel it.
    /// Call whenever level, pause, game-over or pipeline phase changes.
    fn rearm_gravity(&mut self) {
        if self.paused || self.game_over || !self.line_clear.is_idle() {
            self.gravity.cancel();
        } else {
            self.gravity.rearm(gravity_interval_ms(self.level));
        }
    }

    /// True while the player may affect the active piece.
    fn accepts_input(&self) -> bool {
        !self.paused && !self.game_over && self.line_clear.is_idle() && self.piece.is_some()
    }

    pub fn toggle_pause(&mut self) {
        if self.game_over {
            return;
        }
        self.paused = !self.paused;
        self.rearm_gravity();
    }

    /// Advance one frame of `dt_ms`: gravity ticks while idle, otherwise the
    /// pipeline clock; then one particle physics step either way.
    pub fn update(&mut self, dt_ms: u64) {
        if self.game_over || self.paused {
            return;
        }
        if self.line_clear.is_idle() {
            let fires = self.gravity.tick(dt_ms);
            for _ in 0..fires {
                if self.game_over || !self.line_clear.is_idle() {
                    break;
                }
                self.gravity_step();
            }
        } else {
            self.advance_line_clear(dt_ms);
        }
        if !self.game_over {
            self.particles.step(&self.grid);
        }
    }

    fn gravity_step(&mut self) {
        let Some(piece) = self.piece.as_ref() else {
            return;
        };
        if collides(piece, &self.grid, (0, 1)) {
            self.lock_piece();
        } else {
            self.piece = Some(piece.shifted(0, 1));
        }
    }

    fn try_shift(&mut self, dx: i32) {
        if !self.accepts_input() {
            return;
        }
        if let Some(piece) = self.piece.as_ref() {
            if !collides(piece, &self.grid, (dx, 0)) {
                self.piece = Some(piece.shifted(dx, 0));
            }
        }
    }

    pub fn move_left(&mut self) {
        self.try_shift(-1);
    }

    pub fn move_right(&mut self) {
        self.try_shift(1);
    }

    /// One row down; locks on contact, like a gravity tick.
    pub fn soft_drop(&mut self) {
        if !self.accepts_input() {
            return;
        }
        self.gravity_step();
    }

    /// Rotate clockwise with the simple kick search: shift by +1, −2, +3, −4, …
    /// (cumulative) until it fits or the shift exceeds the piece width.
    pub fn rotate(&mut self) {
        if !self.accepts_input() {
            return;
        }
        let Some(piece) = self.piece.as_ref() else {
            return;
        };
        let mut candidate = piece.rotated();
        let width = candidate.width() as i32;
        let mut kick: i32 = 1;
        while collides(&candidate, &self.grid, (0, 0)) {
            if kick.abs() > width {
                return;
            }
            candidate.x += kick;
            kick = -(kick + kick.signum());
        }
        self.piece = Some(candidate);
    }

    /// Rows the active piece can fall before it collides.
    fn drop_distance(&self, piece: &ActivePiece) -> i32 {
        let mut k = 0;
        while !collides(piece, &self.grid, (0, k + 1)) {
            k += 1;
        }
        k
    }

    pub fn hard_drop(&mut self) {
        if !self.accepts_input() {
            return;
        }
        if let Some(piece) = self.piece.as_ref() {
            let k = self.drop_distance(piece);
            self.piece = Some(piece.shifted(0, k));
            self.lock_piece();
        }
    }

    /// Landing projection of the active piece. Pure.
    pub fn ghost(&self) -> Option<ActivePiece> {
        let piece = self.piece.as_ref()?;
        Some(piece.shifted(0, self.drop_distance(piece)))
    }

    fn lock_piece(&mut self) {
        let Some(mut piece) = self.piece.take() else {
            return;
        };
        piece.locked = true;
        let cells = self.grid.merge(&piece);
        if self.shatter_on_lock {
            self.particles.on_piece_locked(&cells, &mut self.rng);
        }

        let rows = self.grid.full_rows();
        if rows.is_empty() {
            self.spawn_next();
            return;
        }
        log::debug!("rows {rows:?} cracking");
        self.grid.mark_rows(&rows, CellStatus::Cracking);
        self.line_clear.begin(rows);
        self.rearm_gravity();
    }

    fn advance_line_clear(&mut self, dt_ms: u64) {
        self.line_clear.elapse(dt_ms);
        while let Some(transition) = self.line_clear.poll() {
            match transition {
                Transition::Shatter => self.shatter_rows(),
                Transition::Sweep => self.sweep_rows(),
            }
        }
    }

    /// Clearing: every non-empty cell of the marked rows becomes debris, then the rows blank.
    fn shatter_rows(&mut self) {
        let rows = self.line_clear.rows().to_vec();
        for &y in &rows {
            let Some(row) = self.grid.row(y) else {
                continue;
            };
            let kinds: Vec<(usize, PieceKind)> = row
                .iter()
                .enumerate()
                .filter_map(|(x, cell)| cell.value.map(|kind| (x, kind)))
                .collect();
            for (x, kind) in kinds {
                let color = self.theme.piece_color(kind);
                self.particles
                    .spawn_cell_burst(x, y, color, self.particle_theme, &mut self.rng);
            }
        }
        self.grid.blank_rows(&rows);
        log::debug!("rows {rows:?} shattered, {} particles live", self.particles.len());
    }

    /// Sweeping: drop the rows, score them, then bring in the next piece.
    fn sweep_rows(&mut self) {
        let rows = self.line_clear.finish();
        let n = rows.len();
        self.grid.remove_rows(&rows);
        self.score += line_clear_points(n, self.level);
        self.lines += n as u32;
        let level = level_for_lines(self.lines);
        if level != self.level {
            log::info!("level {} reached at {} lines", level, self.lines);
            self.level = level;
        }
        self.spawn_next();
        self.rearm_gravity();
    }

    /// Promote the queued piece, queue a new one. Blocked spawn ends the game.
    pub fn spawn_next(&mut self) {
        let kind = self.next;
        self.next = PieceKind::random(&mut self.rng);
        let piece = ActivePiece::spawn(kind, self.grid.width());
        if collides(&piece, &self.grid, (0, 0)) {
            self.piece = None;
            self.game_over = true;
            self.teardown();
            log::info!("game over: score {} lines {} level {}", self.score, self.lines, self.level);
        } else {
            self.piece = Some(piece);
        }
    }

    pub fn snapshot(&self) -> RenderSnapshot<'_> {
        let ghost = self.ghost();
        RenderSnapshot {
            grid: self.grid.overlay(self.piece.as_ref(), ghost.as_ref()),
            particles: self.particles.particles(),
            next: self.next,
            phase: self.phase(),
            clearing: self.clearing_rows(),
            score: self.score,
            level: self.level,
            lines: self.lines,
            paused: self.paused,
            game_over: self.game_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::line_clear::{CRACK_DELAY_MS, SETTLE_DELAY_MS};
    use crate::scoring::LINE_POINTS;

    fn config() -> GameConfig {
        GameConfig {
            seed: Some(42),
            ..GameConfig::default()
        }
    }

    fn new_state() -> GameState {
        GameState::new(Theme::default(), &config())
    }

    fn fill_row(grid: &mut Grid, y: usize, skip: &[usize]) {
        for x in 0..grid.width() {
            if !skip.contains(&x) {
                grid.set(x, y, Cell::merged(PieceKind::Z));
            }
        }
    }

    fn place(state: &mut GameState, kind: PieceKind, x: i32, y: i32) {
        let mut piece = ActivePiece::spawn(kind, state.grid.width());
        piece.x = x;
        piece.y = y;
        state.piece = Some(piece);
    }

    /// Horizontal I: matrix row 1 filled.
    fn place_flat_i(state: &mut GameState, x: i32, y: i32) {
        place(state, PieceKind::I, x, y);
        if let Some(piece) = state.piece.as_mut() {
            piece.shape = crate::pieces::rotate_cw(&piece.shape);
        }
    }

    fn debris_count(state: &GameState) -> usize {
        state
            .particles
            .particles()
            .iter()
            .filter(|p| matches!(p, Particle::Debris(_)))
            .count()
    }

    #[test]
    fn new_game_has_centered_piece_and_armed_gravity() {
        let state = new_state();
        let piece = state.piece.as_ref().unwrap();
        let w = piece.width() as i32;
        assert_eq!(piece.x, 10 / 2 - w / 2);
        assert_eq!(piece.y, 0);
        assert_eq!(state.gravity_period_ms(), Some(1000));
        assert_eq!((state.score, state.level, state.lines), (0, 1, 0));
    }

    #[test]
    fn gravity_moves_piece_once_per_interval() {
        let mut state = new_state();
        let y0 = state.piece.as_ref().unwrap().y;
        state.update(999);
        assert_eq!(state.piece.as_ref().unwrap().y, y0);
        state.update(1);
        assert_eq!(state.piece.as_ref().unwrap().y, y0 + 1);
    }

    #[test]
    fn moves_stop_at_walls() {
        let mut state = new_state();
        place(&mut state, PieceKind::O, 0, 5);
        state.move_left();
        assert_eq!(state.piece.as_ref().unwrap().x, 0);
        state.move_right();
        assert_eq!(state.piece.as_ref().unwrap().x, 1);
    }

    #[test]
    fn rotation_kicks_off_the_wall() {
        let mut state = new_state();
        // Spawn-orientation I fills matrix column 1, so x = 8 hugs the right wall.
        place(&mut state, PieceKind::I, 8, 5);
        state.rotate();
        let rotated = state.piece.as_ref().unwrap();
        assert!(!collides(rotated, &state.grid, (0, 0)));
        assert_eq!(rotated.x, 6);
        assert!(rotated.cells(0, 0).all(|(x, y, _)| y == 6 && (6..10).contains(&x)));
    }

    #[test]
    fn blocked_rotation_at_left_wall_is_rejected() {
        let mut state = new_state();
        // T pointing up at the left wall, boxed in on every side.
        place(&mut state, PieceKind::T, 0, 10);
        for y in 9..=14 {
            fill_row(&mut state.grid, y, &[]);
        }
        let before = state.piece.clone().unwrap();
        for (x, y, _) in before.cells(0, 0) {
            state.grid.set(x as usize, y as usize, Cell::EMPTY);
        }
        state.rotate();
        let after = state.piece.as_ref().unwrap();
        assert_eq!(after.x, before.x);
        assert_eq!(after.shape, before.shape);
    }

    #[test]
    fn hard_drop_lands_and_locks() {
        let mut state = new_state();
        place(&mut state, PieceKind::O, 4, 0);
        state.hard_drop();
        for x in 4..=5 {
            for y in 18..=19 {
                assert_eq!(state.grid.get(x, y), Some(Cell::merged(PieceKind::O)));
            }
        }
        assert!(state.piece.is_some());
        assert!(!state.game_over);
    }

    #[test]
    fn ghost_matches_hard_drop_and_is_pure() {
        let mut state = new_state();
        place(&mut state, PieceKind::T, 3, 0);
        state.grid.set(4, 15, Cell::merged(PieceKind::L));
        let grid_before = state.grid.clone();
        let ghost = state.ghost().unwrap();
        assert_eq!(state.grid, grid_before);
        assert_eq!(state.piece.as_ref().unwrap().y, 0);
        assert_eq!(ghost.y, 13);
        assert!(!collides(&ghost, &state.grid, (0, 0)));
        assert!(collides(&ghost, &state.grid, (0, 1)));
    }

    #[test]
    fn single_line_clear_runs_the_whole_pipeline() {
        let mut state = new_state();
        // Bottom row full except x = 0..4, filled by a horizontal I.
        fill_row(&mut state.grid, 19, &[0, 1, 2, 3]);
        place_flat_i(&mut state, 0, 10);
        state.hard_drop();

        assert_eq!(state.phase(), LineClearPhase::Cracking);
        assert!(state.piece.is_none());
        assert_eq!(state.gravity_period_ms(), None);
        let row = state.grid.row(19).unwrap();
        assert!(row.iter().all(|c| c.status == CellStatus::Cracking && c.value.is_some()));

        // Input is suppressed while cracking.
        state.move_left();
        state.rotate();
        assert!(state.piece.is_none());

        state.update(CRACK_DELAY_MS);
        assert_eq!(state.phase(), LineClearPhase::Clearing);
        assert!(state.grid.row(19).unwrap().iter().all(|c| *c == Cell::EMPTY));
        let debris = debris_count(&state);
        assert!((8 * 10..=12 * 10).contains(&debris), "{debris}");
        assert!(state.particles.len() > debris);
        assert_eq!(state.score, 0);

        state.update(SETTLE_DELAY_MS);
        assert_eq!(state.phase(), LineClearPhase::Idle);
        assert_eq!(state.score, LINE_POINTS[0]);
        assert_eq!(state.lines, 1);
        assert_eq!(state.level, 1);
        assert_eq!(state.grid.height(), 20);
        assert!(state.piece.is_some());
        assert_eq!(state.gravity_period_ms(), Some(1000));
    }

    #[test]
    fn tetris_scores_and_inserts_empty_rows() {
        let mut state = new_state();
        for y in 16..20 {
            fill_row(&mut state.grid, y, &[9]);
        }
        state.grid.set(3, 15, Cell::merged(PieceKind::S));
        place(&mut state, PieceKind::I, 8, 0);
        state.lines = 10;
        state.level = 2;
        state.hard_drop();
        assert_eq!(state.clearing_rows(), &[16, 17, 18, 19]);

        state.update(CRACK_DELAY_MS + SETTLE_DELAY_MS);
        assert_eq!(state.score, LINE_POINTS[3] * 2);
        assert_eq!(state.lines, 14);
        assert_eq!(state.level, 2);
        assert_eq!(state.grid.height(), 20);
        for y in 0..4 {
            assert!(state.grid.row(y).unwrap().iter().all(|c| *c == Cell::EMPTY));
        }
        assert_eq!(state.grid.get(3, 19), Some(Cell::merged(PieceKind::S)));
    }

    #[test]
    fn level_tracks_lines_after_every_clear() {
        let mut state = new_state();
        state.lines = 9;
        fill_row(&mut state.grid, 19, &[0, 1, 2, 3]);
        place_flat_i(&mut state, 0, 10);
        state.hard_drop();
        state.update(CRACK_DELAY_MS + SETTLE_DELAY_MS);
        assert_eq!(state.lines, 10);
        assert_eq!(state.level, 2);
        assert_eq!(state.level, state.lines / 10 + 1);
        assert_eq!(state.gravity_period_ms(), Some(850));
    }

    #[test]
    fn blocked_spawn_is_game_over_and_leaves_grid_alone() {
        let mut state = new_state();
        fill_row(&mut state.grid, 0, &[]);
        let before = state.grid.clone();
        state.spawn_next();
        assert!(state.game_over);
        assert!(state.piece.is_none());
        assert_eq!(state.grid, before);
        assert_eq!(state.gravity_period_ms(), None);

        state.update(10_000);
        state.hard_drop();
        state.move_left();
        assert_eq!(state.grid, before);
    }

    #[test]
    fn reset_mid_pipeline_cancels_pending_phases() {
        let mut state = new_state();
        fill_row(&mut state.grid, 19, &[0, 1, 2, 3]);
        place_flat_i(&mut state, 0, 10);
        state.hard_drop();
        assert_eq!(state.phase(), LineClearPhase::Cracking);

        state.reset();
        assert_eq!(state.phase(), LineClearPhase::Idle);
        assert!(state.particles.is_empty());
        state.piece = None;
        state.update(CRACK_DELAY_MS + SETTLE_DELAY_MS);
        assert!(state.particles.is_empty());
        assert_eq!(state.grid, Grid::new(10, 20));
        assert_eq!(state.score, 0);
    }

    #[test]
    fn pause_freezes_gravity_and_input() {
        let mut state = new_state();
        let before = state.piece.clone();
        state.toggle_pause();
        assert_eq!(state.gravity_period_ms(), None);
        state.update(5_000);
        state.move_left();
        state.hard_drop();
        assert_eq!(state.piece, before);
        state.toggle_pause();
        assert_eq!(state.gravity_period_ms(), Some(1000));
    }

    #[test]
    fn particles_keep_moving_during_the_pipeline() {
        let mut state = new_state();
        fill_row(&mut state.grid, 19, &[0, 1, 2, 3]);
        place_flat_i(&mut state, 0, 10);
        state.hard_drop();
        state.update(CRACK_DELAY_MS);
        let before: Vec<(f32, f32)> =
            state.particles.particles().iter().map(Particle::position).collect();
        state.update(16);
        assert_eq!(state.phase(), LineClearPhase::Clearing);
        let after: Vec<(f32, f32)> =
            state.particles.particles().iter().map(Particle::position).collect();
        assert_ne!(before, after);
    }

    #[test]
    fn particle_count_respects_cap() {
        let mut state = GameState::new(
            Theme::default(),
            &GameConfig {
                max_particles: 500,
                ..config()
            },
        );
        for y in 16..20 {
            fill_row(&mut state.grid, y, &[9]);
        }
        place(&mut state, PieceKind::I, 8, 0);
        state.hard_drop();
        state.update(CRACK_DELAY_MS);
        assert_eq!(state.particles.len(), 500);
    }

    #[test]
    fn snapshot_overlays_without_touching_the_grid() {
        let state = new_state();
        let snap = state.snapshot();
        let ghosts = (0..20)
            .flat_map(|y| snap.grid.row(y).unwrap().to_vec())
            .filter(|c| c.status == CellStatus::Ghost)
            .count();
        assert_eq!(ghosts, 4);
        assert!(state.grid.full_rows().is_empty());
        assert!((0..20).all(|y| state.grid.row(y).unwrap().iter().all(|c| *c == Cell::EMPTY)));
    }
}
