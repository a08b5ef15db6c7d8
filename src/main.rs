//! Shatterblocks: falling-block puzzle in the terminal where cleared lines
//! crack, shatter into physics-driven debris, then sweep away.

mod app;
mod game;
mod grid;
mod highscores;
mod input;
mod line_clear;
mod particles;
mod pieces;
mod scoring;
mod shapes;
mod theme;
mod timer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use particles::{DEFAULT_MAX_PARTICLES, MAX_MAX_PARTICLES, MIN_MAX_PARTICLES, ParticleTheme};
use std::path::{Path, PathBuf};

/// Board sides accepted from the CLI; anything outside is clamped.
const MIN_BOARD_SIDE: u16 = 4;
const MAX_BOARD_SIDE: u16 = 64;

/// Options derived from CLI that affect the simulation.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub max_particles: usize,
    /// Fixed secondary particle kind; `None` lets the frontend rotate it by level.
    pub particle_theme: Option<ParticleTheme>,
    /// Locking a piece shatters resting debris under it and nudges nearby debris.
    pub shatter_on_lock: bool,
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: grid::BOARD_WIDTH,
            height: grid::BOARD_HEIGHT,
            max_particles: DEFAULT_MAX_PARTICLES,
            particle_theme: None,
            shatter_on_lock: true,
            seed: None,
        }
    }
}

impl From<&Args> for GameConfig {
    fn from(args: &Args) -> Self {
        Self {
            width: usize::from(args.width.clamp(MIN_BOARD_SIDE, MAX_BOARD_SIDE)),
            height: usize::from(args.height.clamp(MIN_BOARD_SIDE, MAX_BOARD_SIDE)),
            max_particles: args.max_particles.clamp(MIN_MAX_PARTICLES, MAX_MAX_PARTICLES),
            particle_theme: args.particle_theme.fixed(),
            shatter_on_lock: !args.no_shatter,
            seed: args.seed,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path)?;
    }
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(e) => {
            log::warn!("theme load failed, using defaults: {e}");
            theme::Theme::default_for_palette(args.palette)
        }
    };
    let config = GameConfig::from(&args);
    log::info!(
        "starting {}x{} board, particle cap {}, shatter on lock {}",
        config.width,
        config.height,
        config.max_particles,
        config.shatter_on_lock
    );
    let mut app = App::new(args, config, theme);
    app.run()?;
    Ok(())
}

/// Logs go to a file only; the terminal belongs to the TUI.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}

/// Falling-block puzzle where cleared lines shatter into debris.
#[derive(Debug, Parser)]
#[command(
    name = "shatterblocks",
    version,
    about = "Falling-block puzzle in the terminal. Cleared lines crack, shatter into debris, \
        then sweep away.",
    long_about = "Shatterblocks is a terminal falling-block puzzle.\n\n\
        Complete a row to clear it: the row cracks, bursts into bouncing debris and themed \
        particles, then drops away. Debris piles up on your stack; locking a piece on top of \
        resting debris grinds it into smaller fragments.\n\n\
        CONTROLS:\n  Left/Right h/l  Move    Up/k        Rotate   Down/j     Soft drop\n  \
        Space/Enter     Hard drop   P        Pause    R          Restart   Q / Esc  Quit\n\n\
        Hold a movement key to keep the piece moving. Use --theme to load a btop-style theme."
)]
pub struct Args {
    /// Board width in columns.
    #[arg(long, default_value_t = 10, value_name = "COLS")]
    pub width: u16,

    /// Board height in rows.
    #[arg(long, default_value_t = 20, value_name = "ROWS")]
    pub height: u16,

    /// Live particle cap; the oldest particles are evicted first. Clamped to 500..=800.
    #[arg(long, default_value_t = DEFAULT_MAX_PARTICLES, value_name = "N")]
    pub max_particles: usize,

    /// Secondary particles spawned with debris. `auto` changes every two levels.
    #[arg(long, default_value = "auto")]
    pub particle_theme: ParticleThemeArg,

    /// Locking a piece leaves resting debris alone.
    #[arg(long)]
    pub no_shatter: bool,

    /// Seed for piece order and particle randomness.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Target frames per second; physics advances one step per frame.
    #[arg(long, default_value_t = 60.0, value_name = "RATE")]
    pub frame_rate: f64,

    /// High score file. Defaults to $XDG_CONFIG_HOME/shatterblocks/highscore.
    #[arg(long, value_name = "FILE")]
    pub high_score_file: Option<PathBuf>,

    /// Write logs to this file. Filter with RUST_LOG.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ParticleThemeArg {
    #[default]
    Auto,
    Smoke,
    #[value(alias = "leaves")]
    Leaf,
    #[value(alias = "embers")]
    Ember,
    #[value(alias = "sparkles")]
    Sparkle,
}

impl ParticleThemeArg {
    /// `None` for auto.
    pub fn fixed(self) -> Option<ParticleTheme> {
        match self {
            Self::Auto => None,
            Self::Smoke => Some(ParticleTheme::Smoke),
            Self::Leaf => Some(ParticleTheme::Leaf),
            Self::Ember => Some(ParticleTheme::Ember),
            Self::Sparkle => Some(ParticleTheme::Sparkle),
        }
    }
}
