//! Display statistics derivation.
//!
//! A pure function, safe to call on every render. The engine's own series
//! is preferred; a local scan of the display organisms is the fallback.

use petri_types::{DisplayStatistics, Organism, StatisticsPoint};

/// Derive display statistics.
///
/// - A non-empty `series` wins: its last point is used and `live_data` is
///   set.
/// - Otherwise `organisms` (already deduplicated) is scanned.
/// - With neither, every field is zero.
pub fn derive_statistics(series: &[StatisticsPoint], organisms: &[Organism]) -> DisplayStatistics {
    if let Some(latest) = series.last() {
        return from_counts(latest.total, latest.resistant, true);
    }
    if organisms.is_empty() {
        return DisplayStatistics::default();
    }
    let total = u32::try_from(organisms.len()).unwrap_or(u32::MAX);
    let resistant =
        u32::try_from(organisms.iter().filter(|o| o.resistant).count()).unwrap_or(u32::MAX);
    from_counts(total, resistant, false)
}

fn from_counts(total: u32, resistant: u32, live_data: bool) -> DisplayStatistics {
    let resistance_percentage = if total > 0 {
        f64::from(resistant) / f64::from(total) * 100.0
    } else {
        0.0
    };
    DisplayStatistics {
        total,
        resistant,
        sensitive: total.saturating_sub(resistant),
        resistance_percentage,
        live_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn series_wins_over_scan() {
        let series = [StatisticsPoint {
            generation: 1,
            total: 10,
            resistant: 2,
        }];
        let organisms = [Organism::new("a", true)];
        let stats = derive_statistics(&series, &organisms);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.resistant, 2);
        assert_eq!(stats.sensitive, 8);
        assert!(close(stats.resistance_percentage, 20.0));
        assert!(stats.live_data);
    }

    #[test]
    fn last_point_of_series_is_used() {
        let series = [
            StatisticsPoint {
                generation: 1,
                total: 10,
                resistant: 2,
            },
            StatisticsPoint {
                generation: 2,
                total: 20,
                resistant: 15,
            },
        ];
        let stats = derive_statistics(&series, &[]);
        assert_eq!(stats.total, 20);
        assert!(close(stats.resistance_percentage, 75.0));
    }

    #[test]
    fn scan_when_series_is_empty() {
        let organisms = [
            Organism::new("a", true),
            Organism::new("b", false),
            Organism::new("c", true),
        ];
        let stats = derive_statistics(&[], &organisms);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.resistant, 2);
        assert_eq!(stats.sensitive, 1);
        assert!(close(stats.resistance_percentage, 66.7));
        assert!(!stats.live_data);
    }

    #[test]
    fn nothing_available_is_all_zero() {
        let stats = derive_statistics(&[], &[]);
        assert_eq!(stats, DisplayStatistics::default());
        assert!(!stats.live_data);
    }

    #[test]
    fn empty_population_in_series_has_zero_percentage() {
        let series = [StatisticsPoint {
            generation: 9,
            total: 0,
            resistant: 0,
        }];
        let stats = derive_statistics(&series, &[]);
        assert!(close(stats.resistance_percentage, 0.0));
        assert!(stats.live_data);
    }
}
