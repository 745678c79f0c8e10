use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{MetricScoreDetailType, MetricTypeAddInputType, MetricTypeDetailType, PaginationInput, PaginationOutput, RegionAddInputType, RegionDetailType, RegionScoresType, ValidScoreInputType},
    regions::RegionType,
};

/**
 * Database response type for a region with its aggregated scores.
 */
pub type QueryRegionScoresDbResp = (i64, String, Vec<i32>);

/**
 * Database response type for a single region.
 */
pub type QueryRegionDbResp = (i64, String, Option<i64>, Option<String>, bool, DateTime<Utc>);

/**
 * Database response type for the region list.
 */
pub type QueryRegionListDbResp = (i64, String, Option<i64>, Option<String>, bool, DateTime<Utc>, Vec<i32>);

/**
 * Database response type for the scores of one region.
 */
pub type QueryMetricScoreDbResp = (i64, String, i32, String, DateTime<Utc>);

/**
 * Database response type for the metric type list.
 */
pub type QueryMetricTypeDbResp = (i64, String);

/**
 * SQL query to retrieve every region with all its scores.
 */
const QUERY_REGION_SCORES: &str = "SELECT r.id, r.name, COALESCE(ARRAY_AGG(s.score ORDER BY s.id) FILTER (WHERE s.score IS NOT NULL), ARRAY[]::INTEGER[]) AS scores
                                   FROM region r LEFT JOIN score s ON s.id_region = r.id
                                   GROUP BY r.id, r.name
                                   ORDER BY r.id";

/**
 * SQL query to retrieve a page of regions with all their scores.
 */
const QUERY_REGION_LIST: &str = "SELECT r.id, r.name, r.population, r.region_type, r.is_capital, r.inserted_at,
                                        COALESCE(ARRAY_AGG(s.score ORDER BY s.id) FILTER (WHERE s.score IS NOT NULL), ARRAY[]::INTEGER[]) AS scores
                                 FROM region r LEFT JOIN score s ON s.id_region = r.id
                                 GROUP BY r.id
                                 ORDER BY r.id
                                 LIMIT $1 OFFSET $2";

const QUERY_REGION: &str = "SELECT id, name, population, region_type, is_capital, inserted_at FROM region WHERE id = $1";

const QUERY_REGION_ID_BY_NAME: &str = "SELECT id FROM region WHERE name = $1";

/**
 * SQL query to retrieve the named scores of a region.
 */
const QUERY_REGION_METRIC_SCORES: &str = "SELECT m.id, m.name, s.score, s.updated_by, s.updated_at
                                          FROM score s, metric_type m
                                          WHERE s.id_metric_type = m.id AND s.id_region = $1
                                          ORDER BY m.name";

const ADD_REGION: &str = "INSERT INTO region (name, population, region_type, is_capital, inserted_at) VALUES ($1, $2, $3, $4, now()) RETURNING id";

/**
 * SQL query to add a region unless one with the same name exists. Returns no row when it existed.
 */
const ADD_REGION_IF_ABSENT: &str = "INSERT INTO region (name, population, region_type, is_capital, inserted_at) VALUES ($1, $2, $3, $4, now())
                                    ON CONFLICT (name) DO NOTHING RETURNING id";

const UPDATE_REGION: &str = "UPDATE region SET name = $1, population = $2, region_type = $3, is_capital = $4 WHERE id = $5";

const DELETE_REGION: &str = "DELETE FROM region WHERE id = $1";

const QUERY_METRIC_TYPE_LIST: &str = "SELECT id, name FROM metric_type ORDER BY id LIMIT $1 OFFSET $2";

const QUERY_METRIC_TYPE_ID_BY_NAME: &str = "SELECT id FROM metric_type WHERE name = $1";

const ADD_METRIC_TYPE: &str = "INSERT INTO metric_type (name) VALUES ($1) RETURNING id";

/**
 * SQL query to delete a metric type; its scores go with it through the foreign key.
 */
const DELETE_METRIC_TYPE: &str = "DELETE FROM metric_type WHERE id = $1";

const ADD_METRIC_TYPE_IF_ABSENT: &str = "INSERT INTO metric_type (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id";

/**
 * SQL query to add a score unless the region already has one for the metric.
 */
const ADD_SCORE_IF_ABSENT: &str = "INSERT INTO score (id_region, id_metric_type, score, updated_by, updated_at) VALUES ($1, $2, $3, $4, now())
                                   ON CONFLICT (id_region, id_metric_type) DO NOTHING";

/**
 * SQL query to add a score or overwrite the existing one.
 */
const UPSERT_SCORE: &str = "INSERT INTO score (id_region, id_metric_type, score, updated_by, updated_at) VALUES ($1, $2, $3, $4, now())
                            ON CONFLICT (id_region, id_metric_type) DO UPDATE SET score = EXCLUDED.score, updated_by = EXCLUDED.updated_by, updated_at = now()";

const DELETE_SCORE: &str = "DELETE FROM score WHERE id_region = $1 AND id_metric_type = $2";

impl From<QueryRegionScoresDbResp> for RegionScoresType {
    fn from(row: QueryRegionScoresDbResp) -> Self {
        RegionScoresType::new(row.0, row.1, row.2)
    }
}

impl From<QueryRegionDbResp> for RegionDetailType {
    fn from(row: QueryRegionDbResp) -> Self {
        RegionDetailType {
            id: row.0,
            name: row.1,
            population: row.2,
            region_type: row.3.and_then(|region_type| RegionType::from_str(&region_type).ok()),
            is_capital: row.4,
            inserted_at: row.5,
        }
    }
}

impl From<QueryMetricScoreDbResp> for MetricScoreDetailType {
    fn from(row: QueryMetricScoreDbResp) -> Self {
        MetricScoreDetailType { metric_type_id: row.0, metric_name: row.1, score: row.2, updated_by: row.3, updated_at: row.4 }
    }
}

impl From<QueryMetricTypeDbResp> for MetricTypeDetailType {
    fn from(row: QueryMetricTypeDbResp) -> Self {
        MetricTypeDetailType { id: row.0, name: row.1 }
    }
}

/**
 * DAO for region, metric type and score database operations.
 */
#[derive(Default)]
pub struct RegionDao {}

impl RegionDao {
    /**
     * Creates a new instance of `RegionDao`.
     */
    pub fn new() -> Self {
        RegionDao {}
    }

    /**
     * Retrieves every region together with all its scores.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * A Result containing the regions ordered by id or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_region_scores(&self, connection: &mut PgConnection) -> Result<Vec<RegionScoresType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryRegionScoresDbResp> = sqlx::query_as(QUERY_REGION_SCORES)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get region scores: {err}")))?;
        Ok(results.into_iter().map(RegionScoresType::from).collect())
    }

    /**
     * Retrieves a page of regions together with all their scores.
     *
     * # Arguments
     * `connection`: The database connection.
     * `pagination_input`: `PaginationInput` containing pagination information.
     *
     * # Returns
     * The regions with their scores and the pagination output.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_region_list(&self, connection: &mut PgConnection, pagination_input: &PaginationInput) -> Result<(Vec<(RegionDetailType, Vec<i32>)>, PaginationOutput), ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryRegionListDbResp> = sqlx::query_as(QUERY_REGION_LIST)
            .bind(pagination_input.page_size + 1)
            .bind(pagination_input.start_index)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get region list: {err}")))?;
        let mut elements: Vec<(RegionDetailType, Vec<i32>)> = results
            .into_iter()
            .map(|(id, name, population, region_type, is_capital, inserted_at, scores)| (RegionDetailType::from((id, name, population, region_type, is_capital, inserted_at)), scores))
            .collect();
        let pagination_output = Self::get_pagination_output(
            pagination_input,
            i64::try_from(elements.len()).map_err(|err| ApplicationError::new(ErrorType::Validation, format!("Failed to get pagination output: {err}")))?,
        );
        elements.truncate(usize::try_from(pagination_input.page_size).map_err(|err| ApplicationError::new(ErrorType::Validation, format!("Failed to truncate elements: {err}")))?);
        Ok((elements, pagination_output))
    }

    /**
     * Retrieves a single region.
     *
     * # Returns
     * `None` when no region has the given id.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_region(&self, connection: &mut PgConnection, region_id: i64) -> Result<Option<RegionDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<QueryRegionDbResp> = sqlx::query_as(QUERY_REGION)
            .bind(region_id)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get region: {err}")))?;
        Ok(result.map(RegionDetailType::from))
    }

    /**
     * Retrieves the scores of a region with their metric names, ordered by metric name.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_region_metric_scores(&self, connection: &mut PgConnection, region_id: i64) -> Result<Vec<MetricScoreDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryMetricScoreDbResp> = sqlx::query_as(QUERY_REGION_METRIC_SCORES)
            .bind(region_id)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get region scores: {err}")))?;
        Ok(results.into_iter().map(MetricScoreDetailType::from).collect())
    }

    /**
     * Adds a new region to the database.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `region_add_input`: The validated region to add.
     *
     * # Returns
     * The id of the new region.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn add_region(&self, transaction: &mut PgConnection, region_add_input: RegionAddInputType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let id: (i64,) = sqlx::query_as(ADD_REGION)
            .bind(region_add_input.name)
            .bind(region_add_input.population)
            .bind(region_add_input.region_type.map(|region_type| region_type.as_str()))
            .bind(region_add_input.is_capital)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(id.0)
    }

    /**
     * Looks a region up by name and adds it when missing.
     *
     * # Returns
     * The region id and whether it was created.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn get_or_create_region(&self, transaction: &mut PgConnection, region_add_input: RegionAddInputType) -> Result<(i64, bool), ApplicationError> {
        let span = tracing::Span::current();
        let created: Option<(i64,)> = sqlx::query_as(ADD_REGION_IF_ABSENT)
            .bind(&region_add_input.name)
            .bind(region_add_input.population)
            .bind(region_add_input.region_type.map(|region_type| region_type.as_str()))
            .bind(region_add_input.is_capital)
            .fetch_optional(&mut *transaction)
            .instrument(span.clone())
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        if let Some((id,)) = created {
            return Ok((id, true));
        }
        match self.get_region_id_by_name(transaction, &region_add_input.name).instrument(span).await? {
            Some(id) => Ok((id, false)),
            None => Err(ApplicationError::new(ErrorType::DatabaseError, format!("Region {} neither inserted nor found", region_add_input.name))),
        }
    }

    /**
     * Looks up the id of a region by its exact name.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_region_id_by_name(&self, connection: &mut PgConnection, name: &str) -> Result<Option<i64>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<(i64,)> = sqlx::query_as(QUERY_REGION_ID_BY_NAME)
            .bind(name)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get region id: {err}")))?;
        Ok(result.map(|(id,)| id))
    }

    /**
     * Replaces the name, population, type and capital flag of a region.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `region_id`: The id of the region to change.
     * `region_input`: The validated new values.
     *
     * # Returns
     * `NotFound` when no region has the id, `ConstraintViolation` when the new name is taken.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn update_region(&self, transaction: &mut PgConnection, region_id: i64, region_input: RegionAddInputType) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(UPDATE_REGION)
            .bind(region_input.name)
            .bind(region_input.population)
            .bind(region_input.region_type.map(|region_type| region_type.as_str()))
            .bind(region_input.is_capital)
            .bind(region_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Region with ID {} not found for update", region_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Region not found".to_string()));
        }
        Ok(())
    }

    /**
     * Deletes a region and, through the foreign key, all its scores.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn delete_region(&self, transaction: &mut PgConnection, region_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_REGION)
            .bind(region_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete region: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Region with ID {} not found for deletion", region_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Region not found".to_string()));
        }
        Ok(())
    }

    /**
     * Retrieves a page of metric types.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_metric_type_list(&self, connection: &mut PgConnection, pagination_input: &PaginationInput) -> Result<(Vec<MetricTypeDetailType>, PaginationOutput), ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryMetricTypeDbResp> = sqlx::query_as(QUERY_METRIC_TYPE_LIST)
            .bind(pagination_input.page_size + 1)
            .bind(pagination_input.start_index)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get metric type list: {err}")))?;
        let mut elements: Vec<MetricTypeDetailType> = results.into_iter().map(MetricTypeDetailType::from).collect();
        let pagination_output = Self::get_pagination_output(
            pagination_input,
            i64::try_from(elements.len()).map_err(|err| ApplicationError::new(ErrorType::Validation, format!("Failed to get pagination output: {err}")))?,
        );
        elements.truncate(usize::try_from(pagination_input.page_size).map_err(|err| ApplicationError::new(ErrorType::Validation, format!("Failed to truncate elements: {err}")))?);
        Ok((elements, pagination_output))
    }

    /**
     * Adds a new metric type.
     *
     * # Returns
     * The id of the new metric type.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn add_metric_type(&self, transaction: &mut PgConnection, metric_type_add_input: MetricTypeAddInputType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let id: (i64,) = sqlx::query_as(ADD_METRIC_TYPE)
            .bind(metric_type_add_input.name)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(id.0)
    }

    /**
     * Looks a metric type up by name and adds it when missing.
     *
     * # Returns
     * The metric type id and whether it was created.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn get_or_create_metric_type(&self, transaction: &mut PgConnection, name: &str) -> Result<(i64, bool), ApplicationError> {
        let span = tracing::Span::current();
        let created: Option<(i64,)> = sqlx::query_as(ADD_METRIC_TYPE_IF_ABSENT)
            .bind(name)
            .fetch_optional(&mut *transaction)
            .instrument(span.clone())
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        if let Some((id,)) = created {
            return Ok((id, true));
        }
        let existing: (i64,) = sqlx::query_as(QUERY_METRIC_TYPE_ID_BY_NAME)
            .bind(name)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get metric type id: {err}")))?;
        Ok((existing.0, false))
    }

    /**
     * Adds a score unless the region already has one for the metric type.
     *
     * # Returns
     * `true` when the score was written, `false` when an existing score was kept.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn add_score_if_absent(&self, transaction: &mut PgConnection, region_id: i64, score_input: ValidScoreInputType) -> Result<bool, ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(ADD_SCORE_IF_ABSENT)
            .bind(region_id)
            .bind(score_input.metric_type_id)
            .bind(score_input.score)
            .bind(score_input.updated_by)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(result.rows_affected() == 1)
    }

    /**
     * Sets the score of a metric type for a region, overwriting any existing score.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn set_score(&self, transaction: &mut PgConnection, region_id: i64, score_input: ValidScoreInputType) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query(UPSERT_SCORE)
            .bind(region_id)
            .bind(score_input.metric_type_id)
            .bind(score_input.score)
            .bind(score_input.updated_by)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        Ok(())
    }

    /**
     * Deletes the score of one metric type for a region.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn delete_score(&self, transaction: &mut PgConnection, region_id: i64, metric_type_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_SCORE)
            .bind(region_id)
            .bind(metric_type_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete score: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Score of metric type {} not found for region {}", metric_type_id, region_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Score not found".to_string()));
        }
        Ok(())
    }

    /**
     * Deletes a metric type and, through the foreign key, every score recorded for it.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn delete_metric_type(&self, transaction: &mut PgConnection, metric_type_id: i64) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_METRIC_TYPE)
            .bind(metric_type_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete metric type: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Metric type with ID {} not found for deletion", metric_type_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Metric type not found".to_string()));
        }
        Ok(())
    }

    /**
     * Constructs a `PaginationOutput` based on the pagination input and the number of elements.
     *
     * # Arguments
     * `pagination_input`: The input containing pagination parameters.
     * `elements_size`: The number of elements retrieved from the database.
     *
     * # Returns
     * A `PaginationOutput` instance containing pagination details.
     */
    fn get_pagination_output(pagination_input: &PaginationInput, elements_size: i64) -> PaginationOutput {
        let has_more_elements = elements_size > pagination_input.page_size;
        PaginationOutput::new(pagination_input.start_index, pagination_input.page_size, has_more_elements)
    }

    /**
     * Handles database errors and maps them to application errors.
     *
     * # Arguments
     * `error`: The database error to handle.
     *
     * # Returns
     * An `ApplicationError` corresponding to the database error.
     */
    fn handle_database_error(error: Option<&dyn sqlx::error::DatabaseError>) -> ApplicationError {
        if let Some(db_error) = error {
            tracing::debug!("Database error: {}", db_error);
            return Self::map_database_error_code(db_error.code().as_deref());
        }
        ApplicationError::new(ErrorType::DatabaseError, "Failed to execute database operation".to_string())
    }

    fn map_database_error_code(code: Option<&str>) -> ApplicationError {
        match code {
            Some("23505") => ApplicationError::new(ErrorType::ConstraintViolation, "Already exists".to_string()),
            Some("23503") => ApplicationError::new(ErrorType::ConstraintViolation, "Missing parent value".to_string()),
            Some("23514") => ApplicationError::new(ErrorType::Validation, "Value out of range".to_string()),
            Some("22001") => ApplicationError::new(ErrorType::Validation, "Value too long".to_string()),
            code => {
                tracing::error!("Unhandled database error code: {:?}", code);
                ApplicationError::new(ErrorType::DatabaseError, "Unhandled database error".to_string())
            }
        }
    }
}


#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use super::*;
    use sqlx::PgPool;

    fn region_input(name: &str) -> RegionAddInputType {
        RegionAddInputType { name: name.to_string(), population: Some(1000), region_type: Some(RegionType::Island), is_capital: false }
    }

    #[sqlx::test]
    async fn test_add_region_then_delete() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let id = region_dao.add_region(&mut transaction, region_input("Test Region A")).await.unwrap();
        let region = region_dao.get_region(&mut transaction, id).await.unwrap().unwrap();
        assert_eq!(region.name, "Test Region A");
        assert_eq!(region.region_type, Some(RegionType::Island));
        region_dao.delete_region(&mut transaction, id).await.unwrap();
        assert!(region_dao.get_region(&mut transaction, id).await.unwrap().is_none());
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_add_region_twice_is_constraint_violation() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        region_dao.add_region(&mut transaction, region_input("Test Region B")).await.unwrap();
        let result = region_dao.add_region(&mut transaction, region_input("Test Region B")).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::ConstraintViolation);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_delete_missing_region() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let result = RegionDao::new().delete_region(&mut transaction, -1).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_get_or_create_is_idempotent() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let (region_id, created) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region C")).await.unwrap();
        assert!(created);
        let (same_id, created) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region C")).await.unwrap();
        assert!(!created);
        assert_eq!(region_id, same_id);
        let (metric_id, created) = region_dao.get_or_create_metric_type(&mut transaction, "test metric c").await.unwrap();
        assert!(created);
        let (same_metric_id, created) = region_dao.get_or_create_metric_type(&mut transaction, "test metric c").await.unwrap();
        assert!(!created);
        assert_eq!(metric_id, same_metric_id);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_scores_keep_then_overwrite() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let (region_id, _) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region D")).await.unwrap();
        let (metric_type_id, _) = region_dao.get_or_create_metric_type(&mut transaction, "test metric d").await.unwrap();
        let score = |value: i32| ValidScoreInputType { metric_type_id, score: value, updated_by: "test_user".to_string() };

        assert!(region_dao.add_score_if_absent(&mut transaction, region_id, score(40)).await.unwrap());
        assert!(!region_dao.add_score_if_absent(&mut transaction, region_id, score(80)).await.unwrap());
        let scores = region_dao.get_region_metric_scores(&mut transaction, region_id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 40);

        region_dao.set_score(&mut transaction, region_id, score(80)).await.unwrap();
        let scores = region_dao.get_region_metric_scores(&mut transaction, region_id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 80);

        let all = region_dao.get_region_scores(&mut transaction).await.unwrap();
        let region = all.iter().find(|region| region.id == region_id).unwrap();
        assert_eq!(region.scores, vec![80]);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_update_region() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let id = region_dao.add_region(&mut transaction, region_input("Test Region G")).await.unwrap();
        let changed = RegionAddInputType { name: "Test Region G2".to_string(), population: Some(2500), region_type: Some(RegionType::Province), is_capital: true };
        region_dao.update_region(&mut transaction, id, changed).await.unwrap();
        let region = region_dao.get_region(&mut transaction, id).await.unwrap().unwrap();
        assert_eq!(region.name, "Test Region G2");
        assert_eq!(region.population, Some(2500));
        assert_eq!(region.region_type, Some(RegionType::Province));
        assert!(region.is_capital);
        let result = region_dao.update_region(&mut transaction, -1, region_input("Test Region G3")).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_update_region_to_taken_name_is_constraint_violation() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        region_dao.add_region(&mut transaction, region_input("Test Region H")).await.unwrap();
        let id = region_dao.add_region(&mut transaction, region_input("Test Region I")).await.unwrap();
        let result = region_dao.update_region(&mut transaction, id, region_input("Test Region H")).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::ConstraintViolation);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_delete_score_and_metric_type() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let (region_id, _) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region J")).await.unwrap();
        let (metric_a, _) = region_dao.get_or_create_metric_type(&mut transaction, "test metric j1").await.unwrap();
        let (metric_b, _) = region_dao.get_or_create_metric_type(&mut transaction, "test metric j2").await.unwrap();
        for metric_type_id in [metric_a, metric_b] {
            region_dao.set_score(&mut transaction, region_id, ValidScoreInputType { metric_type_id, score: 50, updated_by: "test_user".to_string() }).await.unwrap();
        }

        region_dao.delete_score(&mut transaction, region_id, metric_a).await.unwrap();
        let result = region_dao.delete_score(&mut transaction, region_id, metric_a).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
        let scores = region_dao.get_region_metric_scores(&mut transaction, region_id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].metric_type_id, metric_b);

        region_dao.delete_metric_type(&mut transaction, metric_b).await.unwrap();
        assert!(region_dao.get_region_metric_scores(&mut transaction, region_id).await.unwrap().is_empty());
        let result = region_dao.delete_metric_type(&mut transaction, metric_b).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_region_without_scores_has_empty_list() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let (region_id, _) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region E")).await.unwrap();
        let all = region_dao.get_region_scores(&mut transaction).await.unwrap();
        assert!(all.iter().find(|region| region.id == region_id).unwrap().scores.is_empty());
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_get_region_id_by_name() {
        let pool = init_db().await;
        let mut transaction = pool.begin().await.unwrap();
        let region_dao = RegionDao::new();
        let (region_id, _) = region_dao.get_or_create_region(&mut transaction, region_input("Test Region F")).await.unwrap();
        assert_eq!(region_dao.get_region_id_by_name(&mut transaction, "Test Region F").await.unwrap(), Some(region_id));
        assert_eq!(region_dao.get_region_id_by_name(&mut transaction, "Test Region Missing").await.unwrap(), None);
        transaction.rollback().await.unwrap();
    }

    #[sqlx::test]
    async fn test_list_pages() {
        let pool = init_db().await;
        let mut connection = pool.acquire().await.unwrap();
        let region_dao = RegionDao::new();
        let result = region_dao.get_region_list(&mut connection, &PaginationInput { start_index: 0, page_size: 10 }).await;
        assert!(result.is_ok());
        let result = region_dao.get_metric_type_list(&mut connection, &PaginationInput { start_index: 0, page_size: 10 }).await;
        assert!(result.is_ok());
    }

    /**
     * Initialize the database connection pool.
     */
    async fn init_db() -> PgPool {
        dotenv::from_filename("./sqlx-postgresql-migration/.env-test").ok();
        let pool = PgPool::connect(dotenv::var("DATABASE_URL").unwrap().as_str()).await.unwrap();
        sqlx::migrate!("./sqlx-postgresql-migration/migrations").run(&pool).await.unwrap();
        pool
    }
}
