//! One [`JobController`] per job kind, sharing a single service client.
//!
//! The controllers are fully independent; the tracker only owns them so
//! callers can look them up by kind and tear them all down together.

use std::sync::Arc;

use jobwatch_core::JobKind;
use jobwatch_remote::JobService;

use crate::controller::{ControllerConfig, JobController};

pub struct JobTracker {
    generation: JobController,
    upload: JobController,
}

impl JobTracker {
    pub fn new(service: Arc<dyn JobService>, config: ControllerConfig) -> Self {
        Self {
            generation: JobController::new(
                JobKind::Generation,
                Arc::clone(&service),
                config.clone(),
            ),
            upload: JobController::new(JobKind::Upload, service, config),
        }
    }

    pub fn controller(&self, kind: JobKind) -> &JobController {
        match kind {
            JobKind::Generation => &self.generation,
            JobKind::Upload => &self.upload,
        }
    }

    pub fn controllers(&self) -> impl Iterator<Item = &JobController> {
        JobKind::ALL.into_iter().map(|kind| self.controller(kind))
    }

    /// Adopt any runs already in progress on the remote.
    pub async fn attach_all(&self) {
        for controller in self.controllers() {
            controller.attach().await;
        }
    }

    /// Whether any tracked job is still running or being polled.
    pub async fn any_active(&self) -> bool {
        for controller in self.controllers() {
            if controller.is_running().await || controller.is_polling().await {
                return true;
            }
        }
        false
    }

    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");
        for controller in self.controllers() {
            controller.shutdown().await;
        }
    }
}
