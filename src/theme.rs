//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use crate::pieces::PieceKind;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Piece colours in `PieceKind::index` order: I, J, L, O, S, T, Z.
    pub pieces: [Color; 7],
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Ghost piece and secondary text.
    pub inactive_fg: Color,
    /// Crack flash on rows about to shatter.
    pub crack: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// Exact hex values from onedark.theme.
const ONEDARK_PIECES: [Color; 7] = [
    rgb(0x56B6C2), // I: hi_fg / cyan
    rgb(0x61AFEF), // J: cpu_box / blue
    rgb(0xD19A66), // L: orange
    rgb(0xE5C07B), // O: title / yellow
    rgb(0x98C379), // S: mem_box / green
    rgb(0xC678DD), // T: net_box / magenta
    rgb(0xE06C75), // Z: cpu_end / red
];
const ONEDARK_BG: Color = rgb(0x31353F);
const ONEDARK_DIV_LINE: Color = rgb(0x3F444F);
const ONEDARK_MAIN_FG: Color = rgb(0xABB2BF);
const ONEDARK_TITLE: Color = rgb(0xE5C07B);
const ONEDARK_INACTIVE_FG: Color = rgb(0x5C6370);
const ONEDARK_CRACK: Color = rgb(0xFFFFFF);

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            pieces: ONEDARK_PIECES,
            bg: ONEDARK_BG,
            div_line: ONEDARK_DIV_LINE,
            main_fg: ONEDARK_MAIN_FG,
            title: ONEDARK_TITLE,
            inactive_fg: ONEDARK_INACTIVE_FG,
            crack: ONEDARK_CRACK,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    /// `palette` then overrides piece colours.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map)?;
        theme.apply_palette(palette);
        log::info!("theme loaded from {}", path.display());
        Ok(theme)
    }

    /// Default theme for a palette when no file is loaded.
    pub fn default_for_palette(palette: Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override piece colours for high-contrast or colorblind.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.pieces = [
                    rgb(0x00FFFF),
                    rgb(0x0088FF),
                    rgb(0xFF8800),
                    rgb(0xFFFF00),
                    rgb(0x00FF00),
                    rgb(0xFF00FF),
                    rgb(0xFF0000),
                ];
            }
            Palette::Colorblind => {
                // Okabe-Ito: no red/green pair carries meaning alone
                self.pieces = [
                    rgb(0x56B4E9), // sky blue
                    rgb(0x0072B2), // blue
                    rgb(0xE69F00), // orange
                    rgb(0xF0E442), // yellow
                    rgb(0x009E73), // bluish green
                    rgb(0xCC79A7), // reddish purple
                    rgb(0xD55E00), // vermillion
                ];
            }
        }
    }

    /// Missing keys keep the One Dark value; a present but malformed value is an error.
    fn from_map(map: &HashMap<String, String>) -> Result<Self, ThemeError> {
        let get = |keys: &[&str], fallback: Color| -> Result<Color, ThemeError> {
            keys.iter()
                .find_map(|k| map.get(*k))
                .map_or(Ok(fallback), |v| parse_hex(v))
        };
        Ok(Self {
            pieces: [
                get(&["hi_fg", "proc_misc"], ONEDARK_PIECES[0])?,
                get(&["cpu_box"], ONEDARK_PIECES[1])?,
                get(&["temp_mid", "cpu_mid"], ONEDARK_PIECES[2])?,
                get(&["title"], ONEDARK_PIECES[3])?,
                get(&["mem_box", "cpu_start"], ONEDARK_PIECES[4])?,
                get(&["net_box"], ONEDARK_PIECES[5])?,
                get(&["cpu_end", "temp_end"], ONEDARK_PIECES[6])?,
            ],
            bg: get(&["meter_bg"], ONEDARK_BG)?,
            div_line: get(&["div_line"], ONEDARK_DIV_LINE)?,
            main_fg: get(&["main_fg"], ONEDARK_MAIN_FG)?,
            title: get(&["title"], ONEDARK_TITLE)?,
            inactive_fg: get(&["inactive_fg"], ONEDARK_INACTIVE_FG)?,
            crack: get(&["selected_fg"], ONEDARK_CRACK)?,
        })
    }

    #[inline]
    pub fn piece_color(&self, kind: PieceKind) -> Color {
        self.pieces[kind.index()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'').trim();
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(matches!(parse_hex("#12345"), Err(ThemeError::InvalidHex(_))));
        assert!(matches!(parse_hex("#GGGGGG"), Err(ThemeError::InvalidHex(_))));
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn theme_file_overrides_keys_and_keeps_defaults() {
        let map = parse_theme_file(
            "# comment\ntheme[cpu_box]='#102030'\ntheme[main_fg]=\"#FFF\"\nnot a theme line\n",
        );
        let theme = Theme::from_map(&map).unwrap();
        assert_eq!(theme.piece_color(PieceKind::J), Color::Rgb(0x10, 0x20, 0x30));
        assert_eq!(theme.main_fg, Color::Rgb(255, 255, 255));
        assert_eq!(theme.bg, ONEDARK_BG);
        assert_eq!(theme.piece_color(PieceKind::Z), ONEDARK_PIECES[6]);
    }

    #[test]
    fn malformed_value_is_an_error() {
        let map = parse_theme_file("theme[meter_bg]=\"#nothex\"");
        assert!(Theme::from_map(&map).is_err());
    }

    #[test]
    fn palette_replaces_piece_colours_only() {
        let base = Theme::default();
        let hc = Theme::default_for_palette(Palette::HighContrast);
        assert_ne!(hc.pieces, base.pieces);
        assert_eq!(hc.bg, base.bg);
        assert_eq!(Theme::default_for_palette(Palette::Normal), base);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("/nonexistent/theme.file");
        let theme = Theme::load(Some(path), Palette::Normal).unwrap();
        assert_eq!(theme, Theme::default());
    }
}
