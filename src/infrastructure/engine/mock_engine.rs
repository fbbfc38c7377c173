use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::application::ports::{EngineError, EngineRequest, EngineRun, TranscriptionEngine};

/// Fail every attempt, forever.
pub const ALWAYS_FAIL: i64 = -1;

/// Scriptable stand-in for the sandboxed engine: writes a fixed output
/// document on success, fails a configured number of attempts first, and
/// tracks how many runs were ever in flight at once.
pub struct MockEngine {
    output_root: PathBuf,
    document: String,
    failures: AtomicI64,
    delay: Duration,
    write_info_file: bool,
    running: AtomicUsize,
    max_observed: AtomicUsize,
}

impl MockEngine {
    pub fn new(output_root: PathBuf, document: impl Into<String>) -> Self {
        Self {
            output_root,
            document: document.into(),
            failures: AtomicI64::new(0),
            delay: Duration::ZERO,
            write_info_file: false,
            running: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
        }
    }

    /// Fail the first `failures` attempts (or every attempt with
    /// [`ALWAYS_FAIL`]) before succeeding.
    pub fn with_failures(self, failures: i64) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Also leave an `<basename>.info.json` next to the output.
    pub fn with_info_file(mut self) -> Self {
        self.write_info_file = true;
        self
    }

    pub fn max_concurrent_observed(&self) -> usize {
        self.max_observed.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let mut current = self.failures.load(Ordering::SeqCst);
        loop {
            if current < 0 {
                return true;
            }
            if current == 0 {
                return false;
            }
            match self.failures.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[async_trait]
impl TranscriptionEngine for MockEngine {
    async fn probe(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn run(
        &self,
        request: &EngineRequest,
        progress: watch::Sender<u8>,
    ) -> Result<EngineRun, EngineError> {
        let started = Instant::now();
        let concurrent = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(concurrent, Ordering::SeqCst);

        let _ = progress.send(25);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let _ = progress.send(75);

        let result = if self.should_fail() {
            Err(EngineError::ExitFailure {
                code: 1,
                stderr: "mock engine failure".to_string(),
            })
        } else {
            let output_dir = self.output_root.join(request.target_lang.as_str());
            let basename = Path::new(&request.relative_audio)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| request.relative_audio.clone());

            tokio::fs::create_dir_all(&output_dir)
                .await
                .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
            let output_path = output_dir.join(format!("{}.json", basename));
            tokio::fs::write(&output_path, &self.document)
                .await
                .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

            let info_path = if self.write_info_file {
                let info_path = output_dir.join(format!("{}.info.json", basename));
                tokio::fs::write(&info_path, b"{}")
                    .await
                    .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
                Some(info_path)
            } else {
                None
            };

            let _ = progress.send(100);
            Ok(EngineRun {
                output_path,
                info_path,
                duration: started.elapsed(),
            })
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
