//! 색인 매니페스트 - 이미 벡터 저장소에 들어간 파일명 목록
//!
//! JSON 배열 하나로 저장됩니다. 예: `["Leave Policy.pdf","Timesheets.pdf"]`
//! 저장은 임시 파일에 쓴 뒤 rename 하므로 중간에 끊겨도
//! 이전 매니페스트가 남습니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 색인된 파일 목록
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    files: Vec<String>,
}

impl Manifest {
    pub fn new(files: Vec<String>) -> Self {
        let mut manifest = Self::default();
        manifest.extend(files);
        manifest
    }

    /// 파일에서 로드 (없으면 빈 매니페스트)
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No manifest at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let files: Vec<String> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {:?}", path))?;

        Ok(Self::new(files))
    }

    /// 파일에 저장 (임시 파일 + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }

        let json = serde_json::to_string(&self.files).context("Failed to serialize manifest")?;
        let tmp = temp_path(path);

        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move manifest into place: {:?}", path))?;

        tracing::debug!("Saved manifest with {} files to {:?}", self.files.len(), path);
        Ok(())
    }

    /// 파일명 목록 (삽입 순서)
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 뒤에 추가 (중복은 무시)
    pub fn extend<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: HashSet<String> = self.files.iter().cloned().collect();
        for file in files {
            if seen.insert(file.clone()) {
                self.files.push(file);
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::load(&temp.path().join("indexed_files.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_is_flat_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store").join("indexed_files.json");

        let manifest = Manifest::new(vec!["b.pdf".into(), "a.pdf".into()]);
        manifest.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"["b.pdf","a.pdf"]"#);
        assert!(!temp_path(&path).exists());
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_extend_appends_without_duplicates() {
        let mut manifest = Manifest::new(vec!["a.pdf".into()]);
        manifest.extend(vec!["b.pdf".into(), "a.pdf".into(), "c.pdf".into()]);
        assert_eq!(manifest.files(), ["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("indexed_files.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Manifest::load(&path).is_err());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/x/indexed_files.json")),
            PathBuf::from("/x/indexed_files.json.tmp")
        );
    }
}
