pub mod common;
pub mod materials;
pub mod reference;

use crate::{db::DbPool, reference::ReferenceData, services::materials::MaterialService};
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, reference: Arc<ReferenceData>) -> Self {
        Self {
            materials: Arc::new(MaterialService::new(db_pool, reference)),
        }
    }
}
