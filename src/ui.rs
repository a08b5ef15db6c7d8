//! Layout and drawing: board, ghost, particles, next preview, score sidebar, crack flash.

use crate::game::RenderSnapshot;
use crate::grid::{Cell, CellStatus};
use crate::line_clear::{CRACK_DELAY_MS, LineClearPhase};
use crate::particles::{Particle, ParticleTheme, scale_rgb};
use crate::pieces::PieceKind;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is two terminal columns wide so cells look square.
const CELL_WIDTH: u16 = 2;
const SIDEBAR_WIDTH: u16 = 22;
const NEXT_MINI_CELL_W: u16 = 2;

/// Values the frontend tracks outside the game state.
#[derive(Debug, Clone, Copy)]
pub struct Hud {
    pub best: u32,
    pub particle_theme: ParticleTheme,
    pub particle_cap: usize,
    /// Current gravity interval; `None` while gravity is stopped.
    pub drop_ms: Option<u64>,
}

/// Board size in terminal cells, border included.
fn board_outer_size(width: usize, height: usize) -> (u16, u16) {
    (width as u16 * CELL_WIDTH + 2, height as u16 + 2)
}

/// Draw one frame. While rows crack, a tachyonfx fade flashes them from the
/// crack colour into the piece colours; `crack_fx` holds it across frames.
pub fn draw(
    frame: &mut Frame,
    snap: &RenderSnapshot<'_>,
    theme: &Theme,
    hud: Hud,
    crack_fx: &mut Option<Effect>,
    dt_ms: u32,
) {
    let area = frame.area();
    let (pw, ph) = board_outer_size(snap.grid.width(), snap.grid.height());
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let board = draw_board(frame, snap, theme, inner[0]);
    draw_particles(frame.buffer_mut(), snap, theme, board);
    draw_sidebar(frame, snap, theme, hud, inner[1]);

    if snap.phase == LineClearPhase::Cracking {
        let effect = crack_fx.get_or_insert_with(|| crack_effect(snap, theme, board));
        frame.render_effect(effect, board, TfxDuration::from_millis(dt_ms));
    } else {
        *crack_fx = None;
    }
}

/// Fade every cracking cell from the crack colour back to its own colour.
fn crack_effect(snap: &RenderSnapshot<'_>, theme: &Theme, board: Rect) -> Effect {
    let width = snap.grid.width() as u16 * CELL_WIDTH;
    let cracking: HashSet<(u16, u16)> = snap
        .clearing
        .iter()
        .flat_map(|&y| (board.x..board.x + width).map(move |cx| (cx, board.y + y as u16)))
        .collect();
    let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
        cracking.contains(&(pos.x, pos.y))
    }));
    fx::fade_from(theme.crack, theme.bg, (CRACK_DELAY_MS as u32, Interpolation::QuadOut))
        .with_filter(filter)
        .with_area(board)
}

/// Board with border and title; returns the inner board rect.
fn draw_board(frame: &mut Frame, snap: &RenderSnapshot<'_>, theme: &Theme, area: Rect) -> Rect {
    let title = if snap.game_over {
        " Game over  R restart ".to_string()
    } else if snap.paused {
        " Paused ".to_string()
    } else {
        " Shatterblocks ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title))
        .title_alignment(Alignment::Center);
    let board = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for y in 0..snap.grid.height() {
        let Some(row) = snap.grid.row(y) else {
            continue;
        };
        for (x, cell) in row.iter().enumerate() {
            let (symbol, style) = cell_glyph(*cell, theme);
            let bx = board.x + x as u16 * CELL_WIDTH;
            let by = board.y + y as u16;
            if bx + CELL_WIDTH <= board.right() && by < board.bottom() {
                buf.set_string(bx, by, symbol, style);
            }
        }
    }
    board
}

fn cell_glyph(cell: Cell, theme: &Theme) -> (&'static str, Style) {
    let empty = Style::default().fg(theme.div_line).bg(theme.bg);
    match (cell.status, cell.value) {
        (CellStatus::Ghost, _) => ("░░", Style::default().fg(theme.inactive_fg).bg(theme.bg)),
        (CellStatus::Cracking, Some(kind)) => (
            "▓▓",
            Style::default().fg(theme.piece_color(kind)).bg(theme.bg),
        ),
        (_, Some(kind)) => ("██", Style::default().fg(theme.piece_color(kind)).bg(theme.bg)),
        (_, None) => (" ·", empty),
    }
}

/// Particles are drawn as single glyphs over the board; anything outside is skipped.
fn draw_particles(buf: &mut Buffer, snap: &RenderSnapshot<'_>, theme: &Theme, board: Rect) {
    for particle in snap.particles {
        let (px, py) = particle.position();
        if px < 0.0 || py < 0.0 {
            continue;
        }
        let col = board.x + (px * f32::from(CELL_WIDTH)) as u16;
        let row = board.y + py as u16;
        if col >= board.right() || row >= board.bottom() {
            continue;
        }
        let (symbol, fg) = particle_glyph(particle, theme);
        if let Some(cell) = buf.cell_mut((col, row)) {
            cell.set_symbol(symbol).set_fg(fg);
        }
    }
}

fn particle_glyph(particle: &Particle, theme: &Theme) -> (&'static str, Color) {
    let fade = particle.life_ratio().unwrap_or(1.0);
    match particle {
        Particle::Debris(d) => {
            let symbol = if d.bounding_radius > 0.14 { "◆" } else { "•" };
            (symbol, scale_rgb(d.color, 1.0 + d.color_shade))
        }
        Particle::Smoke(s) => {
            let symbol = if s.radius > 0.4 { "▒" } else { "░" };
            (symbol, scale_rgb(s.color, 0.3 + 0.7 * fade))
        }
        Particle::Leaf(l) => (leaf_symbol(l.rotation), scale_rgb(l.color, 0.4 + 0.6 * fade)),
        Particle::Ember(_) => ("·", ember_color(fade)),
        Particle::Sparkle(s) => {
            let symbol = if fade > 0.5 { "✦" } else { "✧" };
            let color = if fade > 0.8 { theme.crack } else { s.color };
            (symbol, color)
        }
    }
}

/// Leaves tumble: pick a stroke by quarter turn.
fn leaf_symbol(rotation: f32) -> &'static str {
    const STROKES: [&str; 4] = ["-", "\\", "|", "/"];
    let quarter = (rotation / std::f32::consts::FRAC_PI_4) as usize;
    STROKES[quarter % STROKES.len()]
}

/// Hot yellow cooling to dull red as life runs out.
fn ember_color(fade: f32) -> Color {
    let t = fade.clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32| (a + (b - a) * t) as u8;
    Color::Rgb(lerp(140.0, 255.0), lerp(30.0, 200.0), lerp(10.0, 60.0))
}

fn draw_sidebar(frame: &mut Frame, snap: &RenderSnapshot<'_>, theme: &Theme, hud: Hud, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Next
            Constraint::Length(1),
            Constraint::Length(10), // Stats
            Constraint::Length(1),
            Constraint::Length(5), // Keys
        ])
        .split(area);

    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Next ", title_style));
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    draw_next_preview(frame.buffer_mut(), snap.next, theme, next_inner);

    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let mut stats = vec![
        stat("Score: ", snap.score.to_string()),
        stat("Best:  ", hud.best.max(snap.score).to_string()),
        stat("Level: ", snap.level.to_string()),
        stat("Lines: ", snap.lines.to_string()),
        stat("Debris: ", hud.particle_theme.name().to_string()),
        stat("Bits:  ", format!("{}/{}", snap.particles.len(), hud.particle_cap)),
        stat(
            "Drop:  ",
            hud.drop_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms} ms")),
        ),
    ];
    if snap.score > 0 && snap.score >= hud.best {
        let bold = title_style.add_modifier(Modifier::BOLD);
        stats.push(Line::from(Span::styled("New best!", bold)));
    }
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    Paragraph::new(Text::from(stats)).render(stats_inner, frame.buffer_mut());

    let keys = vec![
        Line::from(Span::styled("←→ move  ↑ rotate", fg_style)),
        Line::from(Span::styled("↓ soft  ␣ hard drop", fg_style)),
        Line::from(Span::styled("P pause R restart", fg_style)),
    ];
    let keys_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let keys_inner = keys_block.inner(chunks[4]);
    keys_block.render(chunks[4], frame.buffer_mut());
    Paragraph::new(Text::from(keys))
        .style(Style::default().fg(theme.inactive_fg))
        .render(keys_inner, frame.buffer_mut());
}

/// Next piece, trimmed to its occupied rows and columns and centered.
fn draw_next_preview(buf: &mut Buffer, kind: PieceKind, theme: &Theme, area: Rect) {
    let shape = kind.shape();
    let filled: Vec<(usize, usize)> = shape
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(move |(c, _)| (c, r))
        })
        .collect();
    let (Some(min_c), Some(max_c)) = (
        filled.iter().map(|&(c, _)| c).min(),
        filled.iter().map(|&(c, _)| c).max(),
    ) else {
        return;
    };
    let (Some(min_r), Some(max_r)) = (
        filled.iter().map(|&(_, r)| r).min(),
        filled.iter().map(|&(_, r)| r).max(),
    ) else {
        return;
    };
    let bw = (max_c - min_c + 1) as u16 * NEXT_MINI_CELL_W;
    let bh = (max_r - min_r + 1) as u16;
    let off_x = area.width.saturating_sub(bw) / 2;
    let off_y = area.height.saturating_sub(bh) / 2;
    let style = Style::default().fg(theme.piece_color(kind)).bg(theme.bg);
    for (c, r) in filled {
        let x = area.x + off_x + (c - min_c) as u16 * NEXT_MINI_CELL_W;
        let y = area.y + off_y + (r - min_r) as u16;
        if x + NEXT_MINI_CELL_W <= area.right() && y < area.bottom() {
            buf.set_string(x, y, "██", style);
        }
    }
}
