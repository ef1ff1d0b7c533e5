use std::sync::Arc;

use crate::web::repository::PostalCodeRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PostalCodeRepository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn PostalCodeRepository>) -> Self {
        Self { repo }
    }
}
