// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    content::ContentTree,
    enrollment::Roster,
    grading::ExamEngine,
    services::{blob::BlobStorage, directory::UserDirectory, notify::Notifier},
    store::Store,
};

/// Shared handles injected into every handler. Collaborators sit behind traits
/// so tests can swap in in-memory versions.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub directory: Arc<dyn UserDirectory>,
    pub blobs: Arc<dyn BlobStorage>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn content(&self) -> ContentTree {
        ContentTree::new(self.store.clone(), self.blobs.clone())
    }

    pub fn exams(&self) -> ExamEngine {
        ExamEngine::new(
            self.store.clone(),
            self.directory.clone(),
            self.notifier.clone(),
        )
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.store.clone(), self.directory.clone())
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
