use crate::{api::security::JwtSecurityService, service::regions::RegionService};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The JWT security service guarding the administrative endpoints.
     */
    pub jwt_service: JwtSecurityService,
    /**
     * The region service for map, detail and administrative operations.
     */
    pub region_service: RegionService,
}

impl AppState {
    /**
     * Creates a new instance of `AppState`.
     *
     * # Arguments
     * `jwt_service`: The JWT security service guarding the administrative endpoints.
     * `region_service`: The region service for map, detail and administrative operations.
     */
    pub fn new(jwt_service: JwtSecurityService, region_service: RegionService) -> Self {
        AppState { jwt_service, region_service }
    }
}
