use std::str::FromStr;

use actix_web::{FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Claims read from the bearer token of administrative requests.
 */
#[derive(Debug, Deserialize)]
struct Claim {
    sub: Option<String>,
    name: Option<String>,
}

/**
 * JWT Security Service guarding the endpoints that change regions, metric types and scores.
 */
#[derive(Clone)]
pub struct JwtSecurityService {
    /**
     * The decoding key used to verify JWT tokens.
     */
    decoding_key: DecodingKey,
    /**
     * The validation rules for JWT tokens.
     */
    validation: Validation,
}

impl JwtSecurityService {
    /**
     * Creates a new instance of JwtSecurityService.
     *
     * # Arguments
     * `key`: PEM public key, or the shared secret for HMAC algorithms.
     * `algorithm`: The algorithm used for JWT token validation.
     *
     * # Returns
     * A Result containing the JwtSecurityService or an ApplicationError if initialization fails.
     */
    pub fn new(key: &str, algorithm: &str) -> Result<Self, ApplicationError> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid algorithm: {err}")))?;
        let decoding_key = match algorithm {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => DecodingKey::from_rsa_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => DecodingKey::from_secret(key.as_bytes()),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes()).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create decoding key: {err}")))?,
            _ => return Err(ApplicationError::new(ErrorType::Initialization, "Unsupported algorithm".to_string())),
        };
        let validation = Validation::new(algorithm);
        Ok(JwtSecurityService { decoding_key, validation })
    }

    /**
     * Validates the JWT token from the HTTP request.
     *
     * # Arguments
     * `http_request`: The HTTP request containing the JWT token in the Authorization header.
     *
     * # Returns
     * The name of the caller (`name` claim, else `sub`) or an ApplicationError if validation fails.
     */
    pub fn validate(&self, http_request: &HttpRequest) -> Result<String, ApplicationError> {
        let credentials = BearerAuth::from_request(http_request, &mut actix_web::dev::Payload::None).into_inner().ok();
        let Some(credentials) = credentials else {
            return Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()));
        };
        let token_data = match jsonwebtoken::decode::<Claim>(credentials.token(), &self.decoding_key, &self.validation) {
            Ok(token_data) => token_data,
            Err(err) => {
                tracing::warn!("JWT validation error: {err}");
                return Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()));
            }
        };
        Ok(token_data.claims.name.or(token_data.claims.sub).unwrap_or_else(|| "unknown".to_string()))
    }
}
