use sqlx::{Pool, Postgres, pool::PoolConnection};
use tracing::instrument;

use crate::{
    dao::regions::RegionDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{
            MetricTypeAddInputType, MetricTypeListOutputType, PaginationInput, RegionAddInputType, RegionDetailOutputType, RegionListElementType, RegionListOutputType, RegionMapOutputType,
            ValidScoreInputType,
        },
        regions::RegionResolver,
    },
    service::{
        finish_transaction,
        scoring::{average_score, build_region_map, classify},
    },
};

/**
 * Represents the service for reading and administering regions and their scores.
 */
pub struct RegionService {
    /**
     * The DAO for region operations.
     */
    region_dao: RegionDao,
    /**
     * Connection pool for database operations.
     */
    connection_pool: Pool<Postgres>,
    /**
     * Name to slug lookup for the map.
     */
    resolver: RegionResolver,
    /**
     * Path region ids are appended to when linking to the detail view.
     */
    detail_link_prefix: String,
}

impl RegionService {
    /**
     * Creates a new instance of `RegionService`.
     *
     * # Arguments
     * `region_dao`: The DAO for region operations.
     * `connection_pool`: Connection pool for database operations.
     * `resolver`: Name to slug lookup for the map.
     * `detail_link_prefix`: Path region ids are appended to when linking to the detail view.
     */
    pub fn new(region_dao: RegionDao, connection_pool: Pool<Postgres>, resolver: RegionResolver, detail_link_prefix: String) -> Self {
        RegionService { region_dao, connection_pool, resolver, detail_link_prefix }
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, ApplicationError> {
        self.connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire connection: {err}")))
    }

    /**
     * Builds the map payload: every mapped region with its average, color and detail link.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_region_map(&self) -> Result<RegionMapOutputType, ApplicationError> {
        let mut connection = self.acquire().await?;
        let regions = self.region_dao.get_region_scores(&mut connection).await?;
        Ok(build_region_map(&regions, &self.resolver, &self.detail_link_prefix))
    }

    /**
     * Retrieves a region with its scores.
     *
     * # Arguments
     * `region_id`: The id of the region.
     *
     * # Returns
     * The region detail, or a `NotFound` error for an unknown id.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_region_detail(&self, region_id: i64) -> Result<RegionDetailOutputType, ApplicationError> {
        let mut connection = self.acquire().await?;
        let Some(region) = self.region_dao.get_region(&mut connection, region_id).await? else {
            tracing::debug!("Region with ID {} not found", region_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Region not found".to_string()));
        };
        let scores = self.region_dao.get_region_metric_scores(&mut connection, region_id).await?;
        let values: Vec<i32> = scores.iter().map(|score| score.score).collect();
        let average = average_score(&values);
        let slug = self.resolver.slug_for(&region.name).map(str::to_string);
        Ok(RegionDetailOutputType { region, slug, average, color: classify(average), scores })
    }

    /**
     * Retrieves a region by its map slug.
     *
     * # Returns
     * The region detail, or a `NotFound` error when the slug is unknown or its region is not stored.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_region_detail_by_slug(&self, slug: &str) -> Result<RegionDetailOutputType, ApplicationError> {
        let Some(name) = self.resolver.name_for(slug) else {
            return Err(ApplicationError::new(ErrorType::NotFound, format!("Unknown region slug {slug}")));
        };
        let region_id = {
            let mut connection = self.acquire().await?;
            self.region_dao.get_region_id_by_name(&mut connection, name).await?
        };
        let Some(region_id) = region_id else {
            tracing::debug!("Region {} has no row yet", name);
            return Err(ApplicationError::new(ErrorType::NotFound, "Region not found".to_string()));
        };
        self.get_region_detail(region_id).await
    }

    /**
     * Retrieves a page of regions with their average scores.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_region_list(&self, pagination_input: PaginationInput) -> Result<RegionListOutputType, ApplicationError> {
        let mut connection = self.acquire().await?;
        let (regions, pagination) = self.region_dao.get_region_list(&mut connection, &pagination_input).await?;
        let regions = regions
            .into_iter()
            .map(|(region, scores)| {
                let average = average_score(&scores);
                RegionListElementType { region, average, color: classify(average) }
            })
            .collect();
        Ok(RegionListOutputType { regions, pagination })
    }

    /**
     * Adds a new region.
     *
     * # Returns
     * The id of the new region.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn add_region(&self, region_add_input: RegionAddInputType) -> Result<i64, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.add_region(&mut transaction, region_add_input).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Replaces the name, population, type and capital flag of a region.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn update_region(&self, region_id: i64, region_input: RegionAddInputType) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.update_region(&mut transaction, region_id, region_input).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Deletes a region together with its scores.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn delete_region(&self, region_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.delete_region(&mut transaction, region_id).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Retrieves a page of metric types.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_metric_type_list(&self, pagination_input: PaginationInput) -> Result<MetricTypeListOutputType, ApplicationError> {
        let mut connection = self.acquire().await?;
        let (metric_types, pagination) = self.region_dao.get_metric_type_list(&mut connection, &pagination_input).await?;
        Ok(MetricTypeListOutputType { metric_types, pagination })
    }

    /**
     * Adds a new metric type.
     *
     * # Returns
     * The id of the new metric type.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn add_metric_type(&self, metric_type_add_input: MetricTypeAddInputType) -> Result<i64, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.add_metric_type(&mut transaction, metric_type_add_input).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Sets the score of one metric type for a region, replacing any previous score.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn set_score(&self, region_id: i64, score_input: ValidScoreInputType) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.set_score(&mut transaction, region_id, score_input).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Deletes a metric type together with every score recorded for it.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn delete_metric_type(&self, metric_type_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.delete_metric_type(&mut transaction, metric_type_id).await;
        finish_transaction(transaction, result).await
    }

    /**
     * Deletes the score of one metric type for a region.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn delete_score(&self, region_id: i64, metric_type_id: i64) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.region_dao.delete_score(&mut transaction, region_id, metric_type_id).await;
        finish_transaction(transaction, result).await
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, Postgres>, ApplicationError> {
        self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))
    }
}
