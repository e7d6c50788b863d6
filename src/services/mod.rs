//! Business logic services

pub mod catalog;
pub mod catalog_import;
pub mod challenges;
pub mod circulation;
pub mod clock;
pub mod email;
pub mod inventory;
pub mod overdue;
pub mod redis;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

use self::{clock::Clock, overdue::Notifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub inventory: inventory::InventoryService,
    pub circulation: circulation::CirculationService,
    pub overdue: overdue::OverdueService,
    pub catalog_import: catalog_import::CatalogImportService,
    pub challenges: challenges::ChallengeStore,
    pub clock: Arc<dyn Clock>,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository and collaborators
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        redis_service: redis::RedisService,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            inventory: inventory::InventoryService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                clock.clone(),
                config.circulation.default_loan_days,
            ),
            overdue: overdue::OverdueService::new(Arc::new(repository.clone()), notifier, clock.clone()),
            catalog_import: catalog_import::CatalogImportService::new(repository.clone()),
            challenges: challenges::ChallengeStore::new(redis_service, config.challenges.clone(), clock.clone()),
            clock,
            repository,
        }
    }
}
