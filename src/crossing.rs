//! Crossing detection
//!
//! Pure predicates over two consecutive prices. Equality on the arrival side
//! counts as crossed: a downward cross of `L` is `prev > L >= curr`, an upward
//! cross is `prev < L <= curr`.

use crate::CrossDirection;

/// `prev > level >= curr`
pub fn crossed_down(prev: f64, curr: f64, level: f64) -> bool {
    prev > level && level >= curr
}

/// `prev < level <= curr`
pub fn crossed_up(prev: f64, curr: f64, level: f64) -> bool {
    prev < level && level <= curr
}

/// True if `level` was crossed in `direction` between `prev` and `curr`
pub fn crossed(prev: f64, curr: f64, level: f64, direction: CrossDirection) -> bool {
    match direction {
        CrossDirection::Down => crossed_down(prev, curr, level),
        CrossDirection::Up => crossed_up(prev, curr, level),
    }
}

/// Direction in which `level` was crossed, if at all
pub fn crossing_direction(prev: f64, curr: f64, level: f64) -> Option<CrossDirection> {
    if crossed_down(prev, curr, level) {
        Some(CrossDirection::Down)
    } else if crossed_up(prev, curr, level) {
        Some(CrossDirection::Up)
    } else {
        None
    }
}

/// Every level crossed between `prev` and `curr`, in the order price reached them.
///
/// All levels in the traversed interval are reported, so gaps wider than one
/// grid step never skip a level.
pub fn levels_crossed(prev: f64, curr: f64, levels: &[f64]) -> Vec<(f64, CrossDirection)> {
    let mut hits: Vec<(f64, CrossDirection)> = levels
        .iter()
        .filter_map(|&l| crossing_direction(prev, curr, l).map(|d| (l, d)))
        .collect();

    if curr < prev {
        // Falling: highest level is reached first
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
    } else {
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossed_down_truth_table() {
        assert!(crossed_down(101.0, 99.0, 100.0));
        assert!(crossed_down(101.0, 100.0, 100.0)); // lands exactly on level
        assert!(!crossed_down(100.0, 99.0, 100.0)); // starts on level
        assert!(!crossed_down(99.0, 101.0, 100.0));
        assert!(!crossed_down(102.0, 101.0, 100.0));
    }

    #[test]
    fn test_crossed_up_truth_table() {
        assert!(crossed_up(99.0, 101.0, 100.0));
        assert!(crossed_up(99.0, 100.0, 100.0));
        assert!(!crossed_up(100.0, 101.0, 100.0));
        assert!(!crossed_up(101.0, 99.0, 100.0));
    }

    #[test]
    fn test_swapping_flips_direction() {
        let (a, b, level) = (98.5, 103.25, 100.0);
        assert_eq!(crossing_direction(a, b, level), Some(CrossDirection::Up));
        assert_eq!(crossing_direction(b, a, level), Some(CrossDirection::Down));
    }

    #[test]
    fn test_no_cross_when_unchanged() {
        for level in [99.0, 100.0, 101.0] {
            assert_eq!(crossing_direction(100.0, 100.0, level), None);
        }
    }

    #[test]
    fn test_fast_move_reports_every_level() {
        let levels = [100.0, 110.0, 120.0, 130.0, 140.0];

        let down = levels_crossed(135.0, 105.0, &levels);
        assert_eq!(
            down,
            vec![
                (130.0, CrossDirection::Down),
                (120.0, CrossDirection::Down),
                (110.0, CrossDirection::Down),
            ]
        );

        let up = levels_crossed(95.0, 140.0, &levels);
        assert_eq!(up.len(), 5);
        assert_eq!(up[0], (100.0, CrossDirection::Up));
        assert_eq!(up[4], (140.0, CrossDirection::Up));
    }

    #[test]
    fn test_direction_helper() {
        assert!(crossed(105.0, 95.0, 100.0, CrossDirection::Down));
        assert!(!crossed(105.0, 95.0, 100.0, CrossDirection::Up));
    }
}
