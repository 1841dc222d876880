//! Processing-job coordinator.
//!
//! For a given file id, flips the in-flight flag, fans out one ffmpeg run
//! per enabled resolution, waits for all of them, then flips the flag back
//! and marks the file processed. Concurrent jobs across files are bounded
//! by a semaphore; a second job for the same file id is rejected while one
//! is in flight.

use crate::encode::{run_ffmpeg, Resolution, TranscodeParams};
use crate::registry::SharedRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Result of asking the coordinator to start a job.
///
/// The HTTP boundary acknowledges every outcome the same way; the variants
/// exist so callers and tests can observe what actually happened.
#[derive(Debug)]
pub enum StartOutcome {
    /// The job was started; the handle resolves when the pass completes
    Started(JoinHandle<()>),
    /// A pass for this file id is already in flight
    AlreadyProcessing,
    /// No record exists for this file id; status flags were left untouched
    UnknownFile,
}

/// Coordinates processing jobs against the registry.
pub struct JobCoordinator {
    registry: SharedRegistry,
    resolutions: Vec<Resolution>,
    upload_dir: PathBuf,
    video_store_dir: PathBuf,
    semaphore: Arc<Semaphore>,
}

impl JobCoordinator {
    /// Create a new coordinator
    ///
    /// # Arguments
    /// * `registry` - shared file-state registry
    /// * `resolutions` - enabled entries from the resolution table
    /// * `upload_dir` - directory holding accumulated upload files
    /// * `video_store_dir` - directory for encoder outputs
    /// * `max_concurrent_jobs` - bound on simultaneously running jobs
    pub fn new(
        registry: SharedRegistry,
        resolutions: Vec<Resolution>,
        upload_dir: PathBuf,
        video_store_dir: PathBuf,
        max_concurrent_jobs: u32,
    ) -> Self {
        Self {
            registry,
            resolutions,
            upload_dir,
            video_store_dir,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs as usize)),
        }
    }

    /// Number of job slots currently free
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// The enabled resolutions this coordinator fans out to
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Start a processing pass for `file_id`.
    ///
    /// The record is validated and `is_processing` is flipped synchronously,
    /// so a poll issued after this call returns observes the in-flight flag.
    /// The encoder fan-out runs in a spawned task; encoder failures are
    /// logged and do not prevent the file from being marked processed.
    pub fn start_job(&self, file_id: &str) -> StartOutcome {
        let Some(record) = self.registry.lookup(file_id) else {
            warn!(file_id, "process requested for file id that is not present");
            return StartOutcome::UnknownFile;
        };

        match self.registry.mark_processing_start(file_id) {
            Ok(true) => {}
            Ok(false) => {
                warn!(file_id, "processing already in flight, rejecting second job");
                return StartOutcome::AlreadyProcessing;
            }
            Err(e) => {
                // Records are never removed, so this cannot happen after a
                // successful lookup.
                error!(file_id, error = %e, "status flip failed for a record that was just looked up");
                return StartOutcome::UnknownFile;
            }
        }

        let registry = self.registry.clone();
        let semaphore = self.semaphore.clone();
        let resolutions = self.resolutions.clone();
        let input_path = self
            .upload_dir
            .join(format!("{}_{}", file_id, record.file_name));
        let output_dir = self.video_store_dir.clone();
        let file_id = file_id.to_string();

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("job semaphore should not be closed");

            info!(%file_id, input = %input_path.display(), "started processing");

            let mut runs = JoinSet::new();
            for resolution in resolutions {
                let params =
                    TranscodeParams::new(input_path.clone(), resolution, output_dir.clone());
                runs.spawn_blocking(move || run_ffmpeg(&params));
            }

            while let Some(joined) = runs.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(%file_id, error = %e, "transcode failed"),
                    Err(e) => error!(%file_id, error = %e, "transcode task panicked"),
                }
            }

            if let Err(e) = registry.mark_processing_end(&file_id) {
                error!(%file_id, error = %e, "failed to clear in-flight flag");
            }
            if let Err(e) = registry.mark_processed(&file_id) {
                error!(%file_id, error = %e, "failed to mark file processed");
            }

            info!(%file_id, "finished processing");
        });

        StartOutcome::Started(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::resolution_for_label;
    use crate::registry::FileRegistry;
    use tempfile::TempDir;

    fn test_coordinator(registry: SharedRegistry, dir: &TempDir) -> JobCoordinator {
        JobCoordinator::new(
            registry,
            vec![resolution_for_label("144p").unwrap()],
            dir.path().join("upload"),
            dir.path().join("videostore"),
            2,
        )
    }

    #[tokio::test]
    async fn test_unknown_file_id_leaves_registry_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        let coordinator = test_coordinator(registry.clone(), &temp_dir);

        let outcome = coordinator.start_job("ghost");

        assert!(matches!(outcome, StartOutcome::UnknownFile));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_flag_is_set_before_start_job_returns() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        registry.ensure("abc", "clip.mp4");
        let coordinator = test_coordinator(registry.clone(), &temp_dir);

        let outcome = coordinator.start_job("abc");

        // No await between start_job and this lookup: the flip is synchronous
        assert!(registry.lookup("abc").unwrap().is_processing);
        assert!(matches!(outcome, StartOutcome::Started(_)));
    }

    #[tokio::test]
    async fn test_completed_job_ends_processed_and_not_processing() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        registry.ensure("abc", "clip.mp4");
        let coordinator = test_coordinator(registry.clone(), &temp_dir);

        let StartOutcome::Started(handle) = coordinator.start_job("abc") else {
            panic!("job should start");
        };

        // The encoder run fails here (no such input file), which must not
        // prevent the terminal status flips.
        handle.await.unwrap();

        let record = registry.lookup("abc").unwrap();
        assert!(!record.is_processing);
        assert!(record.is_processed);
    }

    #[tokio::test]
    async fn test_second_job_for_same_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        registry.ensure("abc", "clip.mp4");
        let coordinator = test_coordinator(registry.clone(), &temp_dir);

        // Simulate an in-flight pass
        assert_eq!(registry.mark_processing_start("abc"), Ok(true));

        let outcome = coordinator.start_job("abc");
        assert!(matches!(outcome, StartOutcome::AlreadyProcessing));

        // The rejected call must not clear the in-flight flag
        assert!(registry.lookup("abc").unwrap().is_processing);
    }

    #[tokio::test]
    async fn test_rerun_of_processed_file_converges_to_done() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        registry.ensure("abc", "clip.mp4");
        let coordinator = test_coordinator(registry.clone(), &temp_dir);

        let StartOutcome::Started(first) = coordinator.start_job("abc") else {
            panic!("first job should start");
        };
        first.await.unwrap();

        let StartOutcome::Started(second) = coordinator.start_job("abc") else {
            panic!("re-run should start");
        };

        // Redo state: in flight again with the processed flag held
        let record = registry.lookup("abc").unwrap();
        assert!(record.is_processing);
        assert!(record.is_processed);

        second.await.unwrap();
        let record = registry.lookup("abc").unwrap();
        assert!(!record.is_processing);
        assert!(record.is_processed);
    }

    #[tokio::test]
    async fn test_coordinator_exposes_job_slots() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::shared();
        let coordinator = test_coordinator(registry, &temp_dir);

        assert_eq!(coordinator.available_permits(), 2);
        assert_eq!(coordinator.resolutions().len(), 1);
    }
}
