use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::application::ports::{EngineError, EngineRequest, EngineRun, TranscriptionEngine};
use crate::domain::Language;

use super::progress::ProgressMapper;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Container runtime binary, e.g. `docker` or `podman`.
    pub runtime: String,
    pub image: String,
    /// Host directory with the source audio, mounted read-only.
    pub input_dir: PathBuf,
    /// Host root for per-target-language output directories.
    pub output_root: PathBuf,
    /// Wall-clock budget for one subprocess.
    pub timeout: Duration,
}

/// Runs the transcription engine as a sandboxed container per job. Stdout
/// is drained line by line into the progress mapper while the process
/// runs; stderr is buffered for diagnostics.
pub struct DockerEngine {
    config: EngineConfig,
}

impl DockerEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn output_dir(&self, target: Language) -> PathBuf {
        self.config.output_root.join(target.as_str())
    }
}

#[async_trait]
impl TranscriptionEngine for DockerEngine {
    async fn probe(&self) -> Result<(), EngineError> {
        let output = Command::new(&self.config.runtime)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::RuntimeUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::RuntimeUnavailable(format!(
                "{} --version exited with {}",
                self.config.runtime, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::info!(runtime = %version.trim(), "Sandbox runtime available");
        Ok(())
    }

    async fn run(
        &self,
        request: &EngineRequest,
        progress: watch::Sender<u8>,
    ) -> Result<EngineRun, EngineError> {
        let started = Instant::now();
        let output_dir = self.output_dir(request.target_lang);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

        let mut command = Command::new(&self.config.runtime);
        command
            .arg("run")
            .arg("--rm")
            .arg("-v")
            .arg(format!("{}:/data/input:ro", self.config.input_dir.display()))
            .arg("-v")
            .arg(format!(
                "{}:/data/output/{}",
                output_dir.display(),
                request.target_lang
            ))
            .arg(&self.config.image)
            .arg(&request.relative_audio)
            .arg("--source-lang")
            .arg(request.source_lang.as_str())
            .arg("--target-lang")
            .arg(request.target_lang.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            video_id = %request.video_id,
            audio = %request.relative_audio,
            source = %request.source_lang,
            target = %request.target_lang,
            "Launching engine"
        );

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::SpawnFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::SpawnFailed("stderr not captured".to_string()))?;

        let stdout_task = tokio::spawn(async move {
            let mut mapper = ProgressMapper::new();
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(line = %line.trim_end(), "Engine stdout");
                if let Some(percent) = mapper.observe(&line) {
                    let _ = progress.send(percent);
                }
            }
            progress
        });
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                buffer.push_str(&line);
                buffer.push('\n');
            }
            buffer
        });

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(EngineError::SpawnFailed(e.to_string())),
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(EngineError::TimedOut {
                    timeout: self.config.timeout,
                });
            }
        };

        let progress = stdout_task
            .await
            .map_err(|e| EngineError::SpawnFailed(format!("stdout reader: {}", e)))?;
        let stderr_buffer = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(match status.code() {
                Some(code) => EngineError::ExitFailure {
                    code,
                    stderr: stderr_buffer.trim().to_string(),
                },
                None => EngineError::Killed(stderr_buffer.trim().to_string()),
            });
        }

        let basename = Path::new(&request.relative_audio)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.relative_audio.clone());
        let output_path = output_dir.join(format!("{}.json", basename));
        if tokio::fs::metadata(&output_path).await.is_err() {
            return Err(EngineError::MissingOutput(output_path));
        }
        let _ = progress.send(100);

        let info_path = output_dir.join(format!("{}.info.json", basename));
        let info_path = tokio::fs::metadata(&info_path)
            .await
            .is_ok()
            .then_some(info_path);

        Ok(EngineRun {
            output_path,
            info_path,
            duration: started.elapsed(),
        })
    }
}
