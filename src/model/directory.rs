use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ValidationStrictness;
use crate::error::{BridgeError, Result};

/// Files every model directory must contain
pub const REQUIRED_MODEL_FILES: &[&str] = &["genai_config.json", "tokenizer.json"];

/// Additional files required under [`ValidationStrictness::Strict`]
pub const STRICT_MODEL_FILES: &[&str] = &["tokenizer_config.json", "special_tokens_map.json"];

/// A model directory that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDirectory {
    path: PathBuf,
}

impl ModelDirectory {
    /// Check that `path` is a directory holding every required file.
    ///
    /// Files are checked in a fixed order and the first missing one is reported.
    pub async fn validate(path: impl Into<PathBuf>, strictness: ValidationStrictness) -> Result<Self> {
        let path = path.into();

        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(BridgeError::ModelNotFound { path });
        }

        log_contents(&path).await;

        for file in required_files(strictness) {
            if !tokio::fs::try_exists(path.join(file)).await.unwrap_or(false) {
                return Err(BridgeError::ModelFilesMissing {
                    path,
                    file: file.to_string(),
                });
            }
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The file names checked for the given strictness, in checking order
pub fn required_files(strictness: ValidationStrictness) -> impl Iterator<Item = &'static str> {
    let strict: &[&str] = match strictness {
        ValidationStrictness::Minimal => &[],
        ValidationStrictness::Strict => STRICT_MODEL_FILES,
    };
    REQUIRED_MODEL_FILES.iter().chain(strict).copied()
}

async fn log_contents(path: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(path).await else {
        return;
    };
    debug!(model_path = %path.display(), "Model directory contents");
    while let Ok(Some(entry)) = entries.next_entry().await {
        let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
        debug!(file = %entry.file_name().to_string_lossy(), bytes = size, "  model file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::tempdir;

    fn populate(dir: &Path, files: &[&str]) {
        for file in files {
            std::fs::write(dir.join(file), "{}").unwrap();
        }
    }

    #[tokio::test]
    async fn test_valid_directory() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &[
            "genai_config.json",
            "tokenizer.json",
            "tokenizer_config.json",
            "special_tokens_map.json",
        ]);

        let model = ModelDirectory::validate(dir.path(), ValidationStrictness::Strict)
            .await
            .unwrap();
        assert_eq!(model.path(), dir.path());
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = ModelDirectory::validate(dir.path().join("nope"), ValidationStrictness::Minimal)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModelNotFound);
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["genai_config.json"]);
        let err = ModelDirectory::validate(
            dir.path().join("genai_config.json"),
            ValidationStrictness::Minimal,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ModelNotFound);
    }

    #[tokio::test]
    async fn test_each_missing_file_is_named() {
        let all: Vec<&str> = required_files(ValidationStrictness::Strict).collect();
        for missing in &all {
            let dir = tempdir().unwrap();
            let present: Vec<&str> = all.iter().copied().filter(|f| f != missing).collect();
            populate(dir.path(), &present);

            let err = ModelDirectory::validate(dir.path(), ValidationStrictness::Strict)
                .await
                .unwrap_err();
            match err {
                BridgeError::ModelFilesMissing { file, .. } => assert_eq!(&file, missing),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_minimal_skips_tokenizer_extras() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["genai_config.json", "tokenizer.json"]);

        assert!(ModelDirectory::validate(dir.path(), ValidationStrictness::Minimal)
            .await
            .is_ok());
        assert!(ModelDirectory::validate(dir.path(), ValidationStrictness::Strict)
            .await
            .is_err());
    }
}
