//! App: terminal init, frame loop, key handling, high score and particle-theme milestones.

use crate::game::GameState;
use crate::highscores::{default_path, load_high_score, save_high_score};
use crate::input::{Action, key_to_action};
use crate::particles::ParticleTheme;
use crate::theme::Theme;
use crate::ui::{self, Hud};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding. 50 ms ≈ 20 moves/sec.
const REPEAT_INTERVAL_MS: u64 = 50;
/// Longest frame fed to the simulation; a stalled terminal must not fast-forward the pipeline.
const MAX_FRAME_MS: u64 = 250;

/// Whole milliseconds since `last`, advancing `last` only by what was consumed so
/// the sub-millisecond remainder carries into the next frame. A stall is clamped.
fn frame_ms(last: &mut Instant, now: Instant) -> u64 {
    let ms = now.saturating_duration_since(*last).as_millis() as u64;
    if ms >= MAX_FRAME_MS {
        *last = now;
        return MAX_FRAME_MS;
    }
    *last += Duration::from_millis(ms);
    ms
}

pub struct App {
    state: GameState,
    frame_rate: f64,
    /// `None` config theme: rotate with the level.
    auto_particle_theme: bool,
    high_score_path: PathBuf,
    best: u32,
    /// Internal DAS/ARR needs key release events; without them the OS repeat drives movement.
    own_repeat: bool,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    crack_fx: Option<Effect>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Self {
        let high_score_path = args.high_score_file.clone().unwrap_or_else(default_path);
        let best = load_high_score(&high_score_path);
        log::info!("high score {best} from {}", high_score_path.display());
        let auto_particle_theme = config.particle_theme.is_none();
        let mut state = GameState::new(theme, &config);
        if auto_particle_theme {
            state.particle_theme = ParticleTheme::for_level(state.level);
        }
        Self {
            state,
            frame_rate: args.frame_rate.clamp(10.0, 240.0),
            auto_particle_theme,
            high_score_path,
            best,
            own_repeat: false,
            repeat_state: None,
            last_repeat_fire: None,
            crack_fx: None,
        }
    }

    fn restart(&mut self) {
        self.state.reset();
        if self.auto_particle_theme {
            self.state.particle_theme = ParticleTheme::for_level(self.state.level);
        }
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.crack_fx = None;
        log::info!("restart");
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.state.move_left(),
            Action::MoveRight => self.state.move_right(),
            Action::Rotate => self.state.rotate(),
            Action::SoftDrop => self.state.soft_drop(),
            Action::HardDrop => {
                self.state.hard_drop();
                self.repeat_state = None;
            }
            Action::Pause => self.state.toggle_pause(),
            Action::Restart => self.restart(),
            Action::Quit | Action::None => {}
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if now.saturating_duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next =
            self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Level milestones pick the particle theme; a beaten best is saved right away.
    fn after_update(&mut self) {
        if self.auto_particle_theme {
            let theme = ParticleTheme::for_level(self.state.level);
            if theme != self.state.particle_theme {
                log::info!("level {}: particle theme {}", self.state.level, theme.name());
                self.state.particle_theme = theme;
            }
        }
        if self.state.score > self.best {
            self.best = self.state.score;
            match save_high_score(&self.high_score_path, self.best) {
                Ok(()) => log::info!("new high score {}", self.best),
                Err(e) => log::warn!("high score not saved: {e:#}"),
            }
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held keys repeat on our own schedule.
        self.own_repeat = supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        log::debug!("key release events: {}", self.own_repeat);

        let result = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| self.run_loop(&mut terminal));

        if self.own_repeat {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.frame_rate);
        let mut last_frame = Instant::now();
        loop {
            let now = Instant::now();
            let dt_ms = frame_ms(&mut last_frame, now);

            self.tick_repeat(now);
            self.state.update(dt_ms);
            self.after_update();

            let hud = Hud {
                best: self.best,
                particle_theme: self.state.particle_theme,
                particle_cap: self.state.particles.max_particles(),
                drop_ms: self.state.gravity_period_ms(),
            };
            let snap = self.state.snapshot();
            let theme = &self.state.theme;
            let crack_fx = &mut self.crack_fx;
            terminal.draw(|f| ui::draw(f, &snap, theme, hud, crack_fx, dt_ms as u32))?;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                let action = key_to_action(key);
                match key.kind {
                    KeyEventKind::Release => {
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            self.repeat_state = None;
                            self.last_repeat_fire = None;
                        }
                        continue;
                    }
                    // Held key while we repeat it ourselves.
                    KeyEventKind::Repeat if self.own_repeat => continue,
                    _ => {}
                }
                if self.own_repeat && self.repeat_state.map(|(a, _)| a) == Some(action) {
                    continue;
                }
                if action == Action::Quit {
                    return Ok(());
                }
                if self.state.game_over && action != Action::Restart {
                    continue;
                }
                self.apply_action(action);
                if self.own_repeat && action.repeats() {
                    self.repeat_state = Some((action, Instant::now()));
                    self.last_repeat_fire = None;
                }
                // A lock ends the hold so the next piece doesn't inherit it.
                if self.state.piece.is_none() {
                    self.repeat_state = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_remainder_carries_over() {
        let start = Instant::now();
        let mut last = start;
        let frame = Duration::from_micros(16_667);
        let total: u64 = (1..=60).map(|i| frame_ms(&mut last, start + frame * i)).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn stalled_frame_is_clamped() {
        let start = Instant::now();
        let mut last = start;
        assert_eq!(frame_ms(&mut last, start + Duration::from_secs(3)), MAX_FRAME_MS);
        assert_eq!(last, start + Duration::from_secs(3));
        assert_eq!(frame_ms(&mut last, start + Duration::from_millis(3010)), 10);
    }

    #[test]
    fn clock_going_backwards_is_zero() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut last = start;
        assert_eq!(frame_ms(&mut last, start - Duration::from_millis(5)), 0);
        assert_eq!(last, start);
    }
}
