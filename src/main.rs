mod api;
mod dao;
mod model;
mod service;

use std::time::Duration;

use crate::api::endpoints::{REGION_DETAIL_PATH, configure};
use crate::api::middleware::timing_middleware;
use crate::api::security::JwtSecurityService;
use crate::api::state::AppState;
use crate::dao::regions::RegionDao;
use crate::model::apperror::{ApplicationError, ErrorType};
use crate::model::config::{AppSecurity, ApplicationArguments, ApplicationCommand, Config, DatabaseType, HttpsConfig, LoggingConfig};
use crate::model::regions::{KNOWN_REGIONS, RegionResolver};
use crate::service::import::{ImportDocument, ImportService};
use crate::service::regions::RegionService;

use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use clap::Parser;
use prometheus::IntGauge;
use rustls::pki_types::PrivateKeyDer;
use rustls::{ServerConfig, SupportedProtocolVersion};
use rustls_pemfile::{certs, pkcs8_private_keys};
use sqlx::{Pool, Postgres, pool};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/**
 * Entry point. Starts the server, seeds the known regions or imports a score document.
 */
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = ApplicationArguments::parse();

    let config = get_config(&args.config_file)?;

    init_tracing(&config.logging)?;

    match args.command.unwrap_or(ApplicationCommand::Serve) {
        ApplicationCommand::Serve => serve(config).await,
        ApplicationCommand::SeedRegions => {
            let connection_pool = create_connection_pool(&config.database.db_type).await?;
            let report = ImportService::new(RegionDao::new(), connection_pool).seed_regions(&KNOWN_REGIONS).await.map_err(std::io::Error::other)?;
            info!("Seeding finished: {report}");
            println!("{report}");
            Ok(())
        }
        ApplicationCommand::ImportScores { file } => {
            // A broken document must not leave a partial import behind.
            let document = ImportDocument::from_file(&file).await.map_err(std::io::Error::other)?;
            let connection_pool = create_connection_pool(&config.database.db_type).await?;
            let report = ImportService::new(RegionDao::new(), connection_pool).import_scores(&document).await.map_err(std::io::Error::other)?;
            info!("Import of {file} finished: {report}");
            println!("{report}");
            Ok(())
        }
    }
}

/**
 * Runs the HTTP server until it is stopped.
 *
 * #Arguments
 * `config`: The application configuration.
 */
async fn serve(config: Config) -> std::io::Result<()> {
    let connection_pool = create_connection_pool(&config.database.db_type).await?;

    let jwt_service = get_security_service(&config.security)?;

    let resolver = RegionResolver::with_known_regions().map_err(std::io::Error::other)?;
    let region_service = RegionService::new(RegionDao::new(), connection_pool.clone(), resolver, REGION_DETAIL_PATH.to_string());

    let state = web::Data::new(AppState::new(jwt_service, region_service));

    let prometheus = PrometheusMetricsBuilder::new("")
        .endpoint("/metrics")
        .mask_unmatched_patterns("UNKNOWN")
        .build()
        .map_err(|err| std::io::Error::other(format!("Failed to create Prometheus metrics: {err}")))?;

    let max_connections_gauge = IntGauge::new("max_connections", "Connection pool maximum").map_err(|err| std::io::Error::other(format!("Failed to create max_connections gauge: {err}")))?;
    let min_connections_gauge = IntGauge::new("min_connections", "Connection pool minimum").map_err(|err| std::io::Error::other(format!("Failed to create min_connections gauge: {err}")))?;
    let active_connections_gauge = IntGauge::new("active_connections", "Connection pool active").map_err(|err| std::io::Error::other(format!("Failed to create active_connections gauge: {err}")))?;
    let idle_connections_gauge = IntGauge::new("idle_connections", "Connection pool idle").map_err(|err| std::io::Error::other(format!("Failed to create idle_connections gauge: {err}")))?;
    register_prometheus_metrics(&prometheus, &max_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &min_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &active_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &idle_connections_gauge)?;

    gather_db_metrics(max_connections_gauge, min_connections_gauge, active_connections_gauge, idle_connections_gauge, connection_pool);

    let server_init = HttpServer::new(move || App::new().wrap(prometheus.clone()).wrap(from_fn(timing_middleware)).app_data(state.clone()).configure(configure));

    if config.server.http_port.is_none() && config.server.https_config.is_none() {
        return Err(std::io::Error::other("Neither httpPort nor httpsConfig is configured"));
    }
    let bind_address = config.server.bind_address.as_str();
    let server_init = if let Some(http_port) = config.server.http_port {
        info!("Listening for http on {bind_address}:{http_port}");
        server_init.bind((bind_address, http_port))?
    } else {
        server_init
    };
    let server_init = if let Some(https_config) = &config.server.https_config {
        let ssl_builder = ssl_builder(https_config).map_err(|err| std::io::Error::other(format!("Failed to create SSL/TLS configuration: {err}")))?;
        info!("Listening for https on {bind_address}:{}", https_config.port);
        server_init.bind_rustls_0_23((bind_address, https_config.port), ssl_builder).map_err(|err| std::io::Error::other(format!("Failed to bind HTTPS server: {err}")))?
    } else {
        server_init
    };

    server_init.workers(config.server.workers).run().await
}

/**
 * Initializes logging for the application.
 *
 * #Arguments
 * `logging`: What to include in each log line, and additional filter directives.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
fn init_tracing(logging: &LoggingConfig) -> Result<(), std::io::Error> {
    let mut env_filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    for directive in &logging.directives {
        env_filter = env_filter.add_directive(directive.parse().map_err(|err| std::io::Error::other(format!("Invalid logging directive {directive}: {err}")))?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(logging.target)
        .with_thread_ids(logging.thread_ids)
        .with_thread_names(logging.thread_names)
        .with_line_number(logging.line_number)
        .with_level(logging.level)
        .with_ansi(logging.ansi)
        .with_file(logging.file)
        .try_init()
        .map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))
}

/**
 * Creates the database connection pool.
 *
 * #Arguments
 * `db_type`: The database configuration.
 *
 * #Returns
 * The connected pool.
 */
async fn create_connection_pool(db_type: &DatabaseType) -> Result<Pool<Postgres>, std::io::Error> {
    match db_type {
        DatabaseType::Postgresql { connection_string, max_connections, min_connections, acquire_timeout, acquire_slow_threshold, idle_timeout, max_lifetime } => pool::PoolOptions::new()
            .max_connections(*max_connections)
            .min_connections(*min_connections)
            .acquire_timeout(Duration::from_millis(*acquire_timeout))
            .acquire_slow_threshold(Duration::from_millis(*acquire_slow_threshold))
            .idle_timeout(Duration::from_millis(*idle_timeout))
            .max_lifetime(Duration::from_millis(*max_lifetime))
            .connect(connection_string.as_str())
            .await
            .map_err(|err| std::io::Error::other(format!("Failed to create database pool: {err}"))),
    }
}

/**
 * Registers custom Prometheus metrics.
 *
 * #Arguments
 * `prometheus_metrics`: The Prometheus metrics instance to register the gauge with.
 * `gauge`: The gauge to register.
 */
fn register_prometheus_metrics(prometheus_metrics: &PrometheusMetrics, gauge: &IntGauge) -> Result<(), std::io::Error> {
    prometheus_metrics.registry.register(Box::new(gauge.clone())).map_err(|err| std::io::Error::other(format!("Failed to register Prometheus gauge: {err}")))?;
    Ok(())
}

/**
 * Updates the connection pool gauges once a second.
 */
fn gather_db_metrics(max_connections_gauge: IntGauge, min_connections_gauge: IntGauge, active_connections_gauge: IntGauge, idle_connections_gauge: IntGauge, connection_pool: Pool<Postgres>) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            max_connections_gauge.set(i64::from(connection_pool.options().get_max_connections()));
            min_connections_gauge.set(i64::from(connection_pool.options().get_min_connections()));
            active_connections_gauge.set(i64::from(connection_pool.size()));
            #[allow(clippy::cast_possible_wrap)]
            idle_connections_gauge.set(connection_pool.num_idle() as i64);
        }
    });
}

/**
 * Initializes the SSL/TLS configuration for the server.
 *
 * #Arguments
 * `https_config`: The HTTPS configuration containing the certificate and private key files.
 *
 * #Returns
 * A `Result` containing the initialized `ServerConfig` or an `ApplicationError` if initialization fails.
 */
fn ssl_builder(https_config: &HttpsConfig) -> Result<ServerConfig, ApplicationError> {
    let config_builder = ServerConfig::builder_with_protocol_versions(&get_protocol_versions());
    let cert_file = &mut std::io::BufReader::new(
        std::fs::File::open(&https_config.certificate_file).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to read certificate file: {err}")))?,
    );
    let key_file = &mut std::io::BufReader::new(
        std::fs::File::open(&https_config.private_key_file).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to read private key file: {err}")))?,
    );
    let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>().map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to convert certificate to der: {err}")))?;
    let mut keys = pkcs8_private_keys(key_file)
        .map(|key| key.map(PrivateKeyDer::Pkcs8))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to convert private key to der: {err}")))?;
    if keys.is_empty() {
        return Err(ApplicationError::new(ErrorType::Initialization, "No PKCS8 private key found".to_string()));
    }
    let config = config_builder
        .with_no_client_auth()
        .with_single_cert(cert_chain, keys.remove(0))
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create server config: {err}")))?;
    Ok(config)
}

/**
 * Returns the supported TLS protocol versions.
 */
fn get_protocol_versions() -> Vec<&'static SupportedProtocolVersion> {
    vec![&rustls::version::TLS13]
}

/**
 * Reads the configuration from the specified file.
 *
 * #Arguments
 * `config_file`: The path to the configuration file.
 *
 * #Returns
 * A `Result` containing the parsed `Config` or an `std::io::Error` if reading or parsing fails.
*/
fn get_config(config_file: &str) -> Result<Config, std::io::Error> {
    let config_str: String = std::fs::read_to_string(config_file).map_err(|err| std::io::Error::other(format!("Failed to read config file: {err}")))?;
    let config: Config = toml::from_str(&config_str).map_err(|err| std::io::Error::other(format!("Failed to parse config file: {err}")))?;
    Ok(config)
}

/**
 * Initializes the JWT security service from the configured key file.
 *
 * #Arguments
 * `app_security`: Path of the verification key and the JWT algorithm.
 *
 * #Returns
 * The security service or an `std::io::Error` if the key cannot be read or used.
 */
fn get_security_service(app_security: &AppSecurity) -> Result<JwtSecurityService, std::io::Error> {
    let key = std::fs::read_to_string(&app_security.jwt_key_file).map_err(|err| std::io::Error::other(format!("Failed to read JWT key file: {err}")))?;
    JwtSecurityService::new(key.trim_end(), &app_security.jwt_algorithm).map_err(std::io::Error::other)
}
