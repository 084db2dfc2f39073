use std::sync::Arc;

use crate::{
    import::QuizImporter,
    model::ModelManager,
    storage::ObjectStore,
    upload::UploadOrchestrator,
};

#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
    storage: Arc<dyn ObjectStore>,
    importer: QuizImporter,
    uploads: UploadOrchestrator,
}

impl AppState {
    pub fn new(
        mm: ModelManager,
        storage: Arc<dyn ObjectStore>,
        importer: QuizImporter,
        uploads: UploadOrchestrator,
    ) -> Self {
        Self {
            mm,
            storage,
            importer,
            uploads,
        }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    pub fn importer(&self) -> &QuizImporter {
        &self.importer
    }

    pub fn uploads(&self) -> &UploadOrchestrator {
        &self.uploads
    }
}
