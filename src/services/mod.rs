//! Business logic services

pub mod catalog;

use std::sync::Arc;

use crate::{config::PaginationConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    repository: Arc<dyn Repository>,
}

impl Services {
    /// Create all services on top of the given repository
    pub fn new(repository: Arc<dyn Repository>, pagination: PaginationConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), pagination),
            repository,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
