use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use sqlx::{PgConnection, Pool, Postgres};
use tracing::{info, instrument, warn};

use crate::{
    dao::regions::RegionDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{MetricTypeAddInputType, RegionAddInputType, ValidScoreInputType, validate_score},
        regions::{KnownRegion, RegionType},
    },
    service::finish_transaction,
};

/**
 * User name recorded on scores written by the importer.
 */
pub const IMPORT_USER: &str = "import";

/**
 * A parsed score document: region name -> metric name -> raw score.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDocument {
    regions: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ImportDocument {
    /**
     * Parses a score document.
     *
     * # Arguments
     * `contents`: JSON text of the form `{"region": {"metric": score}}`.
     *
     * # Returns
     * The document, or an `Import` error when the text is not such a JSON object.
     */
    pub fn parse(contents: &str) -> Result<Self, ApplicationError> {
        let regions: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_str(contents).map_err(|err| ApplicationError::new(ErrorType::Import, format!("Failed to parse score document: {err}")))?;
        Ok(ImportDocument { regions })
    }

    /**
     * Reads and parses a score document from disk.
     */
    pub async fn from_file(path: &str) -> Result<Self, ApplicationError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| ApplicationError::new(ErrorType::Import, format!("Failed to read score document {path}: {err}")))?;
        Self::parse(&contents)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

/**
 * Converts a raw JSON score to a valid score. Integral floats such as `57.0` are accepted.
 */
fn score_from_value(value: &Value) -> Result<i32, ApplicationError> {
    let number = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.fract() == 0.0 && float.abs() <= 1_000_000.0).map(|float| float as i64)),
        _ => None,
    };
    let Some(number) = number else {
        return Err(ApplicationError::new(ErrorType::Validation, format!("Score must be an integer, got {value}")));
    };
    validate_score(number)
}

/**
 * Region as the importer creates it. Names are trimmed and checked like names added through the API.
 */
fn region_input(region_name: &str) -> Result<RegionAddInputType, ApplicationError> {
    RegionAddInputType { name: region_name.to_string(), population: None, region_type: Some(RegionType::Province), is_capital: false }.validate()
}

fn import_metric_name(metric_name: &str) -> Result<String, ApplicationError> {
    Ok(MetricTypeAddInputType { name: metric_name.to_string() }.validate()?.name)
}

/**
 * Counts of what an import changed.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub regions_created: usize,
    pub metric_types_created: usize,
    pub scores_created: usize,
    pub scores_existing: usize,
    pub scores_rejected: usize,
    pub names_rejected: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "regions created: {}, metric types created: {}, scores created: {}, scores already present: {}, scores rejected: {}, names rejected: {}",
            self.regions_created, self.metric_types_created, self.scores_created, self.scores_existing, self.scores_rejected, self.names_rejected
        )
    }
}

/**
 * Counts of what seeding changed.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "regions created: {}, regions already present: {}", self.created, self.existing)
    }
}

/**
 * Service loading regions and scores into the database.
 *
 * Every write is a get-or-create, so running an import twice changes nothing the second time.
 */
pub struct ImportService {
    region_dao: RegionDao,
    connection_pool: Pool<Postgres>,
}

impl ImportService {
    pub fn new(region_dao: RegionDao, connection_pool: Pool<Postgres>) -> Self {
        ImportService { region_dao, connection_pool }
    }

    /**
     * Creates every given region that does not exist yet.
     *
     * # Arguments
     * `regions`: The regions to create, usually `KNOWN_REGIONS`.
     */
    #[instrument(skip(self, regions), fields(result))]
    pub async fn seed_regions(&self, regions: &[KnownRegion]) -> Result<SeedReport, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.seed_regions_in(&mut transaction, regions).await;
        finish_transaction(transaction, result).await
    }

    async fn seed_regions_in(&self, transaction: &mut PgConnection, regions: &[KnownRegion]) -> Result<SeedReport, ApplicationError> {
        let mut report = SeedReport::default();
        for region in regions {
            let input = RegionAddInputType { name: region.name.to_string(), population: Some(region.population), region_type: Some(region.region_type), is_capital: region.is_capital };
            let (_, created) = self.region_dao.get_or_create_region(transaction, input).await?;
            if created {
                info!("Created region: {}", region.name);
                report.created += 1;
            } else {
                report.existing += 1;
            }
        }
        Ok(report)
    }

    /**
     * Writes the scores of a document. Existing scores are kept, invalid scores and names are skipped.
     *
     * Each region is imported in its own transaction.
     *
     * # Arguments
     * `document`: The parsed score document.
     *
     * # Returns
     * What the import changed.
     */
    #[instrument(skip(self, document), fields(regions = document.region_count(), result))]
    pub async fn import_scores(&self, document: &ImportDocument) -> Result<ImportReport, ApplicationError> {
        let mut report = ImportReport::default();
        for (region_name, scores) in &document.regions {
            let input = match region_input(region_name) {
                Ok(input) => input,
                Err(err) => {
                    warn!("Skipped region {:?}: {}", region_name, err);
                    report.names_rejected += 1;
                    continue;
                }
            };
            let mut transaction = self.begin().await?;
            let result = self.import_region_in(&mut transaction, input, scores, &mut report).await;
            finish_transaction(transaction, result).await?;
        }
        Ok(report)
    }

    async fn import_region_in(&self, transaction: &mut PgConnection, input: RegionAddInputType, scores: &BTreeMap<String, Value>, report: &mut ImportReport) -> Result<(), ApplicationError> {
        let region_name = input.name.clone();
        let (region_id, created) = self.region_dao.get_or_create_region(transaction, input).await?;
        if created {
            info!("Created region: {}", region_name);
            report.regions_created += 1;
        } else {
            info!("Region exists: {}", region_name);
        }
        for (raw_metric_name, value) in scores {
            let metric_name = match import_metric_name(raw_metric_name) {
                Ok(metric_name) => metric_name,
                Err(err) => {
                    warn!("Skipped metric {:?} of {}: {}", raw_metric_name, region_name, err);
                    report.names_rejected += 1;
                    continue;
                }
            };
            let score = match score_from_value(value) {
                Ok(score) => score,
                Err(err) => {
                    warn!("Skipped score for {} - {}: {}", region_name, metric_name, err);
                    report.scores_rejected += 1;
                    continue;
                }
            };
            let (metric_type_id, created) = self.region_dao.get_or_create_metric_type(transaction, &metric_name).await?;
            if created {
                info!("Created metric type: {}", metric_name);
                report.metric_types_created += 1;
            }
            let score_input = ValidScoreInputType { metric_type_id, score, updated_by: IMPORT_USER.to_string() };
            if self.region_dao.add_score_if_absent(transaction, region_id, score_input).await? {
                info!("Added score for {} - {}: {}", region_name, metric_name, score);
                report.scores_created += 1;
            } else {
                info!("Score already exists for {} - {}", region_name, metric_name);
                report.scores_existing += 1;
            }
        }
        Ok(())
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, Postgres>, ApplicationError> {
        self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))
    }
}
