use std::collections::BTreeMap;
use std::str::FromStr;

use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{
        MetricScoreDetailType, MetricTypeAddInputType, MetricTypeDetailType, MetricTypeListOutputType, PaginationInput, PaginationOutput, RegionAddInputType, RegionDetailOutputType,
        RegionListElementType, RegionListOutputType, RegionMapEntryType, RegionMapOutputType, ScoreSetInputType,
    },
    regions::RegionType,
};

/***************** Map models *********************/

/**
 * Response structure for the map view.
 *
 * `cityData` is keyed by the map key (slug with underscores), `cityColorsBySlug` by slug.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMapResponse {
    pub city_data: BTreeMap<String, RegionMapElement>,
    pub city_colors_by_slug: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMapElement {
    /**
     * Display name of the region.
     */
    pub name: String,
    /**
     * Average score rounded to two decimals.
     */
    pub avg: f64,
    /**
     * Hex color of the score bucket.
     */
    pub color: String,
    /**
     * Link to the region detail.
     */
    pub link: String,
}

impl From<RegionMapEntryType> for RegionMapElement {
    fn from(entry: RegionMapEntryType) -> Self {
        RegionMapElement { name: entry.name, avg: entry.avg, color: entry.color.hex().to_string(), link: entry.link }
    }
}

impl From<RegionMapOutputType> for RegionMapResponse {
    fn from(output: RegionMapOutputType) -> Self {
        RegionMapResponse {
            city_data: output.city_data.into_iter().map(|(key, entry)| (key, RegionMapElement::from(entry))).collect(),
            city_colors_by_slug: output.city_colors_by_slug.into_iter().map(|(slug, color)| (slug, color.hex().to_string())).collect(),
        }
    }
}

/***************** Region models *********************/

/**
 * Response structure for a single region with its scores.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDetailResponse {
    pub id: i64,
    pub name: String,
    pub population: Option<i64>,
    pub region_type: Option<String>,
    pub is_capital: bool,
    /**
     * Map slug, absent for regions the map has no artwork for.
     */
    pub slug: Option<String>,
    pub average: f64,
    pub color: String,
    pub scores: Vec<MetricScoreElement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricScoreElement {
    pub metric_type_id: i64,
    pub metric_name: String,
    pub score: i32,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<MetricScoreDetailType> for MetricScoreElement {
    fn from(score: MetricScoreDetailType) -> Self {
        MetricScoreElement { metric_type_id: score.metric_type_id, metric_name: score.metric_name, score: score.score, updated_by: score.updated_by, updated_at: score.updated_at }
    }
}

impl From<RegionDetailOutputType> for RegionDetailResponse {
    fn from(output: RegionDetailOutputType) -> Self {
        RegionDetailResponse {
            id: output.region.id,
            name: output.region.name,
            population: output.region.population,
            region_type: output.region.region_type.map(|region_type| region_type.to_string()),
            is_capital: output.region.is_capital,
            slug: output.slug,
            average: output.average,
            color: output.color.hex().to_string(),
            scores: output.scores.into_iter().map(MetricScoreElement::from).collect(),
        }
    }
}

/**
 * Response structure for listing regions.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionListResponse {
    regions: Vec<RegionListElement>,
    pagination: PaginationResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionListElement {
    id: i64,
    name: String,
    population: Option<i64>,
    region_type: Option<String>,
    is_capital: bool,
    average: f64,
    color: String,
    inserted_at: DateTime<Utc>,
}

impl From<RegionListElementType> for RegionListElement {
    fn from(element: RegionListElementType) -> Self {
        RegionListElement {
            id: element.region.id,
            name: element.region.name,
            population: element.region.population,
            region_type: element.region.region_type.map(|region_type| region_type.to_string()),
            is_capital: element.region.is_capital,
            average: element.average,
            color: element.color.hex().to_string(),
            inserted_at: element.region.inserted_at,
        }
    }
}

impl From<RegionListOutputType> for RegionListResponse {
    fn from(output: RegionListOutputType) -> Self {
        RegionListResponse { regions: output.regions.into_iter().map(RegionListElement::from).collect(), pagination: PaginationResponse::from(output.pagination) }
    }
}

/**
 * Request structure for adding a region.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAddRequest {
    pub name: String,
    pub population: Option<i64>,
    /**
     * `province` or `island`.
     */
    pub region_type: Option<String>,
    pub is_capital: Option<bool>,
}

impl TryFrom<web::Json<RegionAddRequest>> for RegionAddInputType {
    type Error = ApplicationError;

    fn try_from(request: web::Json<RegionAddRequest>) -> Result<Self, Self::Error> {
        let request = request.into_inner();
        let region_type = request.region_type.as_deref().map(RegionType::from_str).transpose()?;
        Ok(RegionAddInputType { name: request.name, population: request.population, region_type, is_capital: request.is_capital.unwrap_or(false) })
    }
}

/***************** Metric type models *********************/

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTypeAddRequest {
    pub name: String,
}

impl From<web::Json<MetricTypeAddRequest>> for MetricTypeAddInputType {
    fn from(request: web::Json<MetricTypeAddRequest>) -> Self {
        MetricTypeAddInputType { name: request.into_inner().name }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTypeListResponse {
    metric_types: Vec<MetricTypeElement>,
    pagination: PaginationResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTypeElement {
    id: i64,
    name: String,
}

impl From<MetricTypeDetailType> for MetricTypeElement {
    fn from(metric_type: MetricTypeDetailType) -> Self {
        MetricTypeElement { id: metric_type.id, name: metric_type.name }
    }
}

impl From<MetricTypeListOutputType> for MetricTypeListResponse {
    fn from(output: MetricTypeListOutputType) -> Self {
        MetricTypeListResponse { metric_types: output.metric_types.into_iter().map(MetricTypeElement::from).collect(), pagination: PaginationResponse::from(output.pagination) }
    }
}

/***************** Score models *********************/

/**
 * Request structure for setting the score of a metric type for a region.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSetRequest {
    pub metric_type_id: i64,
    pub score: i64,
}

impl From<(web::Json<ScoreSetRequest>, String)> for ScoreSetInputType {
    fn from((request, updated_by): (web::Json<ScoreSetRequest>, String)) -> Self {
        ScoreSetInputType { metric_type_id: request.metric_type_id, score: request.score, updated_by }
    }
}

/**
 * Response for endpoints creating a resource.
 */
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(get_statuscode(&self.error_type)).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::JwtAuthorization => StatusCode::UNAUTHORIZED,
        ErrorType::Initialization | ErrorType::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorType::Validation | ErrorType::Import => StatusCode::BAD_REQUEST,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::ConstraintViolation => StatusCode::CONFLICT,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::JwtAuthorization => 1000,
        ErrorType::Initialization => 1001,
        ErrorType::Validation => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::NotFound => 1004,
        ErrorType::ConstraintViolation => 1005,
        ErrorType::Import => 1006,
    }
}

/***************** Common models *********************/

/**
 * Pagination query parameters for API requests.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    /**
     * The index of the first item to return.
     */
    pub start_index: Option<i64>,
    /**
     * The size of the page to return.
     */
    pub page_size: Option<i64>,
}

impl From<web::Query<PaginationQuery>> for PaginationInput {
    fn from(query: web::Query<PaginationQuery>) -> Self {
        PaginationInput::new(query.start_index, query.page_size)
    }
}

/**
 * Pagination response structure.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    /**
     * The starting index of the returned items.
     */
    pub start_index: i64,
    /**
     * The size of the page.
     */
    pub page_size: i64,
    /**
     * Indicates if there are more items available.
     */
    pub has_more_elements: bool,
}

impl From<PaginationOutput> for PaginationResponse {
    fn from(pagination_output: PaginationOutput) -> Self {
        PaginationResponse { start_index: pagination_output.start_index, page_size: pagination_output.page_size, has_more_elements: pagination_output.has_more }
    }
}
