use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    model::{
        apperror::{ApplicationError, ErrorType},
        regions::RegionType,
    },
    service::scoring::ScoreColor,
};

/**
 * Lowest score a metric can be given.
 */
pub const MIN_SCORE: i64 = 1;

/**
 * Highest score a metric can be given.
 */
pub const MAX_SCORE: i64 = 100;

pub const MAX_REGION_NAME_LENGTH: usize = 100;
pub const MAX_METRIC_NAME_LENGTH: usize = 50;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/**
 * Checks that a score lies within `MIN_SCORE..=MAX_SCORE`.
 */
pub fn validate_score(score: i64) -> Result<i32, ApplicationError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ApplicationError::new(ErrorType::Validation, format!("Score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}")));
    }
    i32::try_from(score).map_err(|err| ApplicationError::new(ErrorType::Validation, format!("Invalid score: {err}")))
}

fn validate_name(name: &str, max_length: usize, what: &str) -> Result<String, ApplicationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApplicationError::new(ErrorType::Validation, format!("{what} name must not be empty")));
    }
    if name.chars().count() > max_length {
        return Err(ApplicationError::new(ErrorType::Validation, format!("{what} name must be at most {max_length} characters")));
    }
    Ok(name.to_string())
}

/***************** Pagination *********************/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationInput {
    pub start_index: i64,
    pub page_size: i64,
}

impl PaginationInput {
    pub fn new(start_index: Option<i64>, page_size: Option<i64>) -> Self {
        PaginationInput { start_index: start_index.unwrap_or(0), page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE) }
    }

    /**
     * Validates the pagination input.
     *
     * # Returns
     * The validated input or a `Validation` error.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.start_index < 0 {
            return Err(ApplicationError::new(ErrorType::Validation, "startIndex must not be negative".to_string()));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(ApplicationError::new(ErrorType::Validation, format!("pageSize must be between 1 and {MAX_PAGE_SIZE}")));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOutput {
    pub start_index: i64,
    pub page_size: i64,
    pub has_more: bool,
}

impl PaginationOutput {
    pub fn new(start_index: i64, page_size: i64, has_more: bool) -> Self {
        PaginationOutput { start_index, page_size, has_more }
    }
}

/***************** Regions *********************/

/**
 * A region together with every score recorded for it.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct RegionScoresType {
    pub id: i64,
    pub name: String,
    pub scores: Vec<i32>,
}

impl RegionScoresType {
    pub fn new(id: i64, name: String, scores: Vec<i32>) -> Self {
        RegionScoresType { id, name, scores }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionDetailType {
    pub id: i64,
    pub name: String,
    pub population: Option<i64>,
    pub region_type: Option<RegionType>,
    pub is_capital: bool,
    pub inserted_at: DateTime<Utc>,
}

/**
 * One entry of the map payload.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMapEntryType {
    pub name: String,
    pub avg: f64,
    pub color: ScoreColor,
    pub link: String,
}

/**
 * Everything the map view needs: entries keyed by map key and colors keyed by slug.
 */
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionMapOutputType {
    pub city_data: BTreeMap<String, RegionMapEntryType>,
    pub city_colors_by_slug: BTreeMap<String, ScoreColor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricScoreDetailType {
    pub metric_type_id: i64,
    pub metric_name: String,
    pub score: i32,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionDetailOutputType {
    pub region: RegionDetailType,
    pub slug: Option<String>,
    pub average: f64,
    pub color: ScoreColor,
    pub scores: Vec<MetricScoreDetailType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionListElementType {
    pub region: RegionDetailType,
    pub average: f64,
    pub color: ScoreColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionListOutputType {
    pub regions: Vec<RegionListElementType>,
    pub pagination: PaginationOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAddInputType {
    pub name: String,
    pub population: Option<i64>,
    pub region_type: Option<RegionType>,
    pub is_capital: bool,
}

impl RegionAddInputType {
    pub fn validate(self) -> Result<Self, ApplicationError> {
        let name = validate_name(&self.name, MAX_REGION_NAME_LENGTH, "Region")?;
        if let Some(population) = self.population
            && population < 0
        {
            return Err(ApplicationError::new(ErrorType::Validation, "Population must not be negative".to_string()));
        }
        Ok(RegionAddInputType { name, ..self })
    }
}

/***************** Metric types *********************/

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTypeDetailType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTypeListOutputType {
    pub metric_types: Vec<MetricTypeDetailType>,
    pub pagination: PaginationOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTypeAddInputType {
    pub name: String,
}

impl MetricTypeAddInputType {
    pub fn validate(self) -> Result<Self, ApplicationError> {
        Ok(MetricTypeAddInputType { name: validate_name(&self.name, MAX_METRIC_NAME_LENGTH, "Metric")? })
    }
}

/***************** Scores *********************/

/**
 * Score as received from a client, before range checking.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSetInputType {
    pub metric_type_id: i64,
    pub score: i64,
    pub updated_by: String,
}

/**
 * Score that passed validation and can be written.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ValidScoreInputType {
    pub metric_type_id: i64,
    pub score: i32,
    pub updated_by: String,
}

impl ScoreSetInputType {
    pub fn validate(self) -> Result<ValidScoreInputType, ApplicationError> {
        let score = validate_score(self.score)?;
        Ok(ValidScoreInputType { metric_type_id: self.metric_type_id, score, updated_by: self.updated_by })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_score_bounds() {
        assert_eq!(validate_score(1).unwrap(), 1);
        assert_eq!(validate_score(100).unwrap(), 100);
        assert_eq!(validate_score(0).unwrap_err().error_type, ErrorType::Validation);
        assert!(validate_score(101).is_err());
        assert!(validate_score(-5).is_err());
    }

    #[test]
    fn test_pagination_defaults() {
        let pagination = PaginationInput::new(None, None).validate().unwrap();
        assert_eq!(pagination, PaginationInput { start_index: 0, page_size: DEFAULT_PAGE_SIZE });
    }

    #[test]
    fn test_pagination_invalid() {
        assert!(PaginationInput::new(Some(-1), None).validate().is_err());
        assert!(PaginationInput::new(None, Some(0)).validate().is_err());
        assert!(PaginationInput::new(None, Some(MAX_PAGE_SIZE + 1)).validate().is_err());
        assert!(PaginationInput::new(Some(10), Some(MAX_PAGE_SIZE)).validate().is_ok());
    }

    #[test]
    fn test_region_add_input_trims_name() {
        let input = RegionAddInputType { name: "  قشم ".to_string(), population: Some(130_000), region_type: Some(RegionType::Island), is_capital: false };
        assert_eq!(input.validate().unwrap().name, "قشم");
    }

    #[test]
    fn test_region_add_input_invalid() {
        let empty = RegionAddInputType { name: "   ".to_string(), population: None, region_type: None, is_capital: false };
        assert!(empty.validate().is_err());
        let negative = RegionAddInputType { name: "Qom".to_string(), population: Some(-1), region_type: None, is_capital: false };
        assert!(negative.validate().is_err());
        let too_long = RegionAddInputType { name: "x".repeat(MAX_REGION_NAME_LENGTH + 1), population: None, region_type: None, is_capital: false };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_metric_type_name_length_counts_characters() {
        let persian = MetricTypeAddInputType { name: "ش".repeat(MAX_METRIC_NAME_LENGTH) };
        assert!(persian.validate().is_ok());
        let too_long = MetricTypeAddInputType { name: "ش".repeat(MAX_METRIC_NAME_LENGTH + 1) };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_score_set_input_validate() {
        let valid = ScoreSetInputType { metric_type_id: 3, score: 42, updated_by: "admin".to_string() }.validate().unwrap();
        assert_eq!(valid, ValidScoreInputType { metric_type_id: 3, score: 42, updated_by: "admin".to_string() });
        let invalid = ScoreSetInputType { metric_type_id: 3, score: 420, updated_by: "admin".to_string() };
        assert!(invalid.validate().is_err());
    }
}
