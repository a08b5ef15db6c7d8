//! Score, level and gravity speed policy.

/// Points for clearing 1..=4 rows in one lock, before the level multiplier.
pub const LINE_POINTS: [u32; 4] = [40, 100, 300, 1200];

/// Lines per level.
pub const LINES_PER_LEVEL: u32 = 10;

const BASE_GRAVITY_MS: f64 = 1000.0;
const GRAVITY_DECAY: f64 = 0.85;
const MIN_GRAVITY_MS: u64 = 50;

/// Points awarded for `rows` cleared at `level`. Zero rows scores nothing;
/// more than four is scored as four.
pub fn line_clear_points(rows: usize, level: u32) -> u32 {
    if rows == 0 {
        return 0;
    }
    LINE_POINTS[rows.min(LINE_POINTS.len()) - 1] * level
}

pub fn level_for_lines(lines: u32) -> u32 {
    lines / LINES_PER_LEVEL + 1
}

/// Gravity interval in ms: `max(50, 1000 × 0.85^(level−1))`.
pub fn gravity_interval_ms(level: u32) -> u64 {
    let exp = level.saturating_sub(1).min(i32::MAX as u32) as i32;
    let ms = BASE_GRAVITY_MS * GRAVITY_DECAY.powi(exp);
    (ms.round() as u64).max(MIN_GRAVITY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_scale_with_level() {
        assert_eq!(line_clear_points(1, 1), 40);
        assert_eq!(line_clear_points(2, 3), 300);
        assert_eq!(line_clear_points(4, 2), 2400);
        assert_eq!(line_clear_points(0, 5), 0);
    }

    #[test]
    fn level_every_ten_lines() {
        assert_eq!(level_for_lines(0), 1);
        assert_eq!(level_for_lines(9), 1);
        assert_eq!(level_for_lines(10), 2);
        assert_eq!(level_for_lines(35), 4);
    }

    #[test]
    fn gravity_curve() {
        assert_eq!(gravity_interval_ms(1), 1000);
        assert_eq!(gravity_interval_ms(2), 850);
        assert!((722..=723).contains(&gravity_interval_ms(3)));
        assert_eq!(gravity_interval_ms(40), MIN_GRAVITY_MS);
        assert!(gravity_interval_ms(5) < gravity_interval_ms(4));
    }
}
