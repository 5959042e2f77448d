//! Job workspaces
//!
//! Every job owns a directory under the results root:
//!
//! ```text
//! {root}/{job_id}/
//!     datasets/{name}/     dataset checkout
//!     models/{name}/       model checkout
//!     uploads/             user uploaded files
//!     {result_id}/         stdout.log, error.txt and task artifacts
//! ```
//!
//! Runners share this tree, so paths handed to them are absolute.

use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const LOG_FILE: &str = "stdout.log";
pub const ERROR_FILE: &str = "error.txt";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    pub fn dataset_dir(&self, job_id: Uuid, dataset_name: &str) -> PathBuf {
        self.job_dir(job_id).join("datasets").join(dataset_name)
    }

    pub fn model_dir(&self, job_id: Uuid, model_name: &str) -> PathBuf {
        self.job_dir(job_id).join("models").join(model_name)
    }

    pub fn uploads_dir(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join("uploads")
    }

    pub fn result_dir(&self, job_id: Uuid, result_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join(result_id.to_string())
    }

    /// Resolves an upload path inside the job's uploads area
    ///
    /// Returns `None` for absolute paths and paths leaving the area.
    pub fn upload_path(&self, job_id: Uuid, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let mut components = relative.components().peekable();
        components.peek()?;
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.uploads_dir(job_id).join(relative))
    }

    /// Creates the directory of a result
    pub async fn create_result_dir(&self, job_id: Uuid, result_id: Uuid) -> io::Result<PathBuf> {
        let dir = self.result_dir(job_id, result_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Opens the result's output log for appending
    pub async fn open_log(&self, job_id: Uuid, result_id: Uuid) -> io::Result<TaskLog> {
        let path = self.result_dir(job_id, result_id).join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(TaskLog { file })
    }

    /// Stores an artifact of a result
    ///
    /// # Returns
    /// The file name the artifact was stored under
    pub async fn write_artifact(
        &self,
        job_id: Uuid,
        result_id: Uuid,
        name: &str,
        contents: &[u8],
    ) -> io::Result<String> {
        let file_name = sanitize_file_name(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact name: {:?}", name),
            )
        })?;
        let path = self.result_dir(job_id, result_id).join(&file_name);
        fs::write(&path, contents).await?;
        Ok(file_name)
    }

    /// Appends a diagnostic message to the result's `error.txt`
    pub async fn write_error(&self, job_id: Uuid, result_id: Uuid, message: &str) -> io::Result<()> {
        let dir = self.create_result_dir(job_id, result_id).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(ERROR_FILE))
            .await?;
        file.write_all(message.as_bytes()).await?;
        if !message.ends_with('\n') {
            file.write_all(b"\n").await?;
        }
        file.flush().await
    }
}

/// Append handle on a result's output log
pub struct TaskLog {
    file: File,
}

impl TaskLog {
    /// Appends output exactly as the runner captured it and flushes it so
    /// readers see progress live
    pub async fn append(&mut self, output: &str) -> io::Result<()> {
        self.file.write_all(output.as_bytes()).await?;
        self.file.flush().await
    }
}

/// Reduces a runner supplied file name to one safe path component
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let last = normalized.rsplit('/').find(|part| !part.is_empty())?;
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("model.pt").as_deref(), Some("model.pt"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("out\\plots\\loss.png").as_deref(), Some("loss.png"));
        assert_eq!(sanitize_file_name("checkpoints/"), Some("checkpoints".to_string()));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("///"), None);
    }

    #[test]
    fn test_upload_path_stays_inside_uploads() {
        let ws = Workspace::new("/data/results");
        let job = Uuid::nil();

        assert_eq!(
            ws.upload_path(job, "eval/holdout.csv"),
            Some(PathBuf::from(format!("/data/results/{}/uploads/eval/holdout.csv", job)))
        );
        assert_eq!(ws.upload_path(job, "../secrets.csv"), None);
        assert_eq!(ws.upload_path(job, "/etc/passwd"), None);
        assert_eq!(ws.upload_path(job, ""), None);
    }

    #[tokio::test]
    async fn test_log_output_is_appended_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::new(root.path());
        let (job, result) = (Uuid::new_v4(), Uuid::new_v4());
        ws.create_result_dir(job, result).await.unwrap();

        let mut log = ws.open_log(job, result).await.unwrap();
        log.append("epoch 1\n").await.unwrap();
        log.append("progress 50%\r").await.unwrap();
        log.append("progress 100%").await.unwrap();

        let contents = std::fs::read_to_string(ws.result_dir(job, result).join(LOG_FILE)).unwrap();
        assert_eq!(contents, "epoch 1\nprogress 50%\rprogress 100%");
    }

    #[tokio::test]
    async fn test_artifacts_and_errors() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::new(root.path());
        let (job, result) = (Uuid::new_v4(), Uuid::new_v4());
        ws.create_result_dir(job, result).await.unwrap();

        let name = ws
            .write_artifact(job, result, "../weights.bin", b"\x00\x01")
            .await
            .unwrap();
        assert_eq!(name, "weights.bin");
        assert!(ws.write_artifact(job, result, "..", b"x").await.is_err());

        ws.write_error(job, result, "first").await.unwrap();
        ws.write_error(job, result, "second").await.unwrap();
        let errors = std::fs::read_to_string(ws.result_dir(job, result).join(ERROR_FILE)).unwrap();
        assert_eq!(errors, "first\nsecond\n");
    }
}
