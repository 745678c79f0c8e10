use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::model::{
    models::{RegionMapEntryType, RegionMapOutputType, RegionScoresType},
    regions::{RegionResolver, map_key},
};

/**
 * Color bucket a region is painted with on the map.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreColor {
    Green,
    LightGreen,
    Yellow,
    Orange,
    Red,
}

impl ScoreColor {
    pub fn hex(&self) -> &'static str {
        match self {
            ScoreColor::Green => "#008000",
            ScoreColor::LightGreen => "#66bb6a",
            ScoreColor::Yellow => "#ffeb3b",
            ScoreColor::Orange => "#ff9800",
            ScoreColor::Red => "#f44336",
        }
    }
}

/**
 * Mean of the given scores rounded to two decimals (ties to even).
 *
 * Ties are decided on the exact decimal mean, not on its nearest binary float.
 *
 * # Arguments
 * `scores`: All scores recorded for one region, in any order.
 *
 * # Returns
 * The rounded mean, or `0.0` when there are no scores.
 */
pub fn average_score(scores: &[i32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let sum: i64 = scores.iter().map(|score| i64::from(*score)).sum();
    let mean = Decimal::from(sum) / Decimal::from(scores.len());
    mean.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven).to_f64().unwrap_or(0.0)
}

/**
 * Maps an average score to its color bucket. Lower bounds are inclusive.
 */
pub fn classify(average: f64) -> ScoreColor {
    if average >= 90.0 {
        ScoreColor::Green
    } else if average >= 70.0 {
        ScoreColor::LightGreen
    } else if average >= 50.0 {
        ScoreColor::Yellow
    } else if average >= 20.0 {
        ScoreColor::Orange
    } else {
        ScoreColor::Red
    }
}

/**
 * Builds the map payload from every region and its scores.
 *
 * Regions the resolver has no slug for are left out.
 *
 * # Arguments
 * `regions`: Regions with their scores.
 * `resolver`: Name to slug lookup.
 * `link_prefix`: Path the region id is appended to for the detail link.
 */
pub fn build_region_map(regions: &[RegionScoresType], resolver: &RegionResolver, link_prefix: &str) -> RegionMapOutputType {
    let mut output = RegionMapOutputType::default();
    for region in regions {
        let Some(slug) = resolver.slug_for(&region.name) else {
            tracing::debug!("Region {} has no map slug, skipped", region.name);
            continue;
        };
        let avg = average_score(&region.scores);
        let color = classify(avg);
        output.city_data.insert(
            map_key(slug),
            RegionMapEntryType { name: region.name.clone(), avg, color, link: format!("{link_prefix}/{}", region.id) },
        );
        output.city_colors_by_slug.insert(slug.to_string(), color);
    }
    output
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_average_no_scores() {
        assert_eq!(average_score(&[]), 0.0);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        assert_eq!(average_score(&[90, 89, 91]), 90.0);
        assert_eq!(average_score(&[1, 2]), 1.5);
        assert_eq!(average_score(&[1, 1, 2]), 1.33);
        assert_eq!(average_score(&[2, 2, 1]), 1.67);
        assert_eq!(average_score(&[100, 100, 99]), 99.67);
    }

    #[test]
    fn test_average_ties_round_to_even() {
        // 9 / 8 = 1.125
        assert_eq!(average_score(&[1, 1, 1, 1, 1, 1, 1, 2]), 1.12);
        // 11 / 8 = 1.375
        assert_eq!(average_score(&[1, 1, 1, 1, 1, 2, 2, 2]), 1.38);
    }

    #[test]
    fn test_average_decides_ties_on_exact_mean() {
        // 207 / 200 = 1.035 exactly; as an f64 it sits just below 1.035
        let mut scores = vec![1; 193];
        scores.extend([2; 7]);
        assert_eq!(average_score(&scores), 1.04);
    }

    #[test]
    fn test_average_independent_of_order() {
        let scores = [17, 93, 44, 61, 2, 100, 58];
        let mut reversed = scores;
        reversed.reverse();
        let mut sorted = scores;
        sorted.sort_unstable();
        assert_eq!(average_score(&scores), average_score(&reversed));
        assert_eq!(average_score(&scores), average_score(&sorted));
        assert_eq!(average_score(&scores), 53.57);
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(100.0), ScoreColor::Green);
        assert_eq!(classify(90.0), ScoreColor::Green);
        assert_eq!(classify(89.99), ScoreColor::LightGreen);
        assert_eq!(classify(70.0), ScoreColor::LightGreen);
        assert_eq!(classify(69.99), ScoreColor::Yellow);
        assert_eq!(classify(50.0), ScoreColor::Yellow);
        assert_eq!(classify(49.99), ScoreColor::Orange);
        assert_eq!(classify(20.0), ScoreColor::Orange);
        assert_eq!(classify(19.99), ScoreColor::Red);
        assert_eq!(classify(0.0), ScoreColor::Red);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(ScoreColor::Green.hex(), "#008000");
        assert_eq!(ScoreColor::LightGreen.hex(), "#66bb6a");
        assert_eq!(ScoreColor::Yellow.hex(), "#ffeb3b");
        assert_eq!(ScoreColor::Orange.hex(), "#ff9800");
        assert_eq!(ScoreColor::Red.hex(), "#f44336");
    }

    #[test]
    fn test_build_region_map() {
        let resolver = RegionResolver::with_known_regions().unwrap();
        let regions = vec![
            RegionScoresType::new(1, "تهران".to_string(), vec![95, 85]),
            RegionScoresType::new(7, "کهگیلویه و بویر احمد".to_string(), vec![]),
        ];
        let output = build_region_map(&regions, &resolver, "/api/services/v1_0/regions");

        let tehran = output.city_data.get("tehran").unwrap();
        assert_eq!(tehran.name, "تهران");
        assert_eq!(tehran.avg, 90.0);
        assert_eq!(tehran.color, ScoreColor::Green);
        assert_eq!(tehran.link, "/api/services/v1_0/regions/1");

        let kohgiluyeh = output.city_data.get("kohgiluyeh_boyer_ahmad").unwrap();
        assert_eq!(kohgiluyeh.avg, 0.0);
        assert_eq!(kohgiluyeh.color, ScoreColor::Red);
        assert_eq!(output.city_colors_by_slug.get("kohgiluyeh-boyer-ahmad"), Some(&ScoreColor::Red));
        assert_eq!(output.city_colors_by_slug.get("tehran"), Some(&ScoreColor::Green));
    }

    #[test]
    fn test_build_region_map_skips_unmapped_regions() {
        let resolver = RegionResolver::with_known_regions().unwrap();
        let regions = vec![RegionScoresType::new(1, "Atlantis".to_string(), vec![50]), RegionScoresType::new(2, "قم".to_string(), vec![50])];
        let output = build_region_map(&regions, &resolver, "/regions");
        assert_eq!(output.city_data.len(), 1);
        assert_eq!(output.city_colors_by_slug.len(), 1);
        assert!(output.city_data.values().all(|entry| entry.name != "Atlantis"));
        assert_eq!(output.city_colors_by_slug.get("qom"), Some(&ScoreColor::Yellow));
    }
}
