use std::sync::Arc;

use super::auth::JwtVerifier;
use crate::transfer::LedgerService;

/// Gateway shared state
pub struct AppState {
    pub service: LedgerService,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(service: LedgerService, jwt_secret: &str) -> Arc<Self> {
        Arc::new(Self {
            service,
            jwt: JwtVerifier::new(jwt_secret),
        })
    }
}
