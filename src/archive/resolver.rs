use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::ArchiveError;
use super::naming;

/// Folder for records that cannot be routed to their project directory.
pub const FALLBACK_DIR_NAME: &str = "RecoveredUploads";

/// Subfolder used when the record carries no project number at all.
pub const UNASSIGNED_DIR_NAME: &str = "unassigned";

const FIELD_DOCS_DIR: &str = "Field Docs";
const PHOTOS_DIR: &str = "Photos";

/// Maps `(branch, project number)` onto a folder of the archive tree:
/// `<root>/<branch>/<project dir>/Field Docs/Photos`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    fallback_root: PathBuf,
}

impl PathResolver {
    pub fn new(root: PathBuf, fallback_root: Option<PathBuf>) -> Self {
        let fallback_root = fallback_root.unwrap_or_else(|| root.join(FALLBACK_DIR_NAME));
        Self {
            root,
            fallback_root,
        }
    }

    /// Resolve (and create if needed) the photos folder for a project.
    ///
    /// Unknown branches and unmatched project numbers route to the fallback
    /// folder rather than failing.
    pub async fn resolve_archive_folder(
        &self,
        branch: Option<&str>,
        project_number: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let project_number = project_number.trim();
        if project_number.is_empty() {
            tracing::warn!("Record has no project number, using fallback folder");
            return self.fallback_folder(project_number).await;
        }

        let branch = match branch.map(str::trim).filter(|b| is_safe_segment(b)) {
            Some(branch) => branch,
            None => {
                tracing::warn!(
                    branch = branch.unwrap_or(""),
                    project_number,
                    "Branch missing or invalid, using fallback folder"
                );
                return self.fallback_folder(project_number).await;
            }
        };

        let branch_dir = self.root.join(branch);
        if !is_dir(&branch_dir).await {
            tracing::warn!(
                branch,
                project_number,
                path = %branch_dir.display(),
                "Branch folder not found, using fallback folder"
            );
            return self.fallback_folder(project_number).await;
        }

        let candidates = matching_project_dirs(&branch_dir, project_number).await?;
        let project_dir = match candidates.as_slice() {
            [] => {
                tracing::warn!(
                    branch,
                    project_number,
                    "No project folder matches, using fallback folder"
                );
                return self.fallback_folder(project_number).await;
            }
            [only] => only.clone(),
            [first, ..] => {
                let names: Vec<String> = candidates
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                tracing::warn!(
                    branch,
                    project_number,
                    candidates = ?names,
                    chosen = %first.display(),
                    "Several project folders match, using the first"
                );
                first.clone()
            }
        };

        let field_docs = project_dir.join(FIELD_DOCS_DIR);
        ensure_dir(&field_docs).await?;
        let photos = field_docs.join(PHOTOS_DIR);
        ensure_dir(&photos).await?;
        Ok(photos)
    }

    async fn fallback_folder(&self, project_number: &str) -> Result<PathBuf, ArchiveError> {
        let name = if project_number.is_empty() {
            UNASSIGNED_DIR_NAME.to_string()
        } else {
            naming::sanitize_stem(project_number)
        };
        let path = self.fallback_root.join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ArchiveError::CreateDir {
                path: path.clone(),
                source,
            })?;
        if !is_dir(&path).await {
            return Err(ArchiveError::NotADirectory(path));
        }
        Ok(path)
    }
}

/// A single, non-traversing path segment.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.contains(['/', '\\'])
        && !segment.contains("..")
        && segment != "."
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Immediate child directories of `parent` whose name starts with `prefix`,
/// in directory-listing order.
async fn matching_project_dirs(parent: &Path, prefix: &str) -> Result<Vec<PathBuf>, ArchiveError> {
    let list_err = |source| ArchiveError::ListDir {
        path: parent.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(parent).await.map_err(list_err)?;
    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        if is_dir(&path).await {
            matches.push(path);
        }
    }
    Ok(matches)
}

/// Create `path` if absent. An existing non-directory is an error.
async fn ensure_dir(path: &Path) -> Result<(), ArchiveError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => return Err(ArchiveError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ArchiveError::CreateDir {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    match tokio::fs::create_dir(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Created folder");
            Ok(())
        }
        // Lost a race with another writer.
        Err(e) if e.kind() == ErrorKind::AlreadyExists && is_dir(path).await => Ok(()),
        Err(source) => Err(ArchiveError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}
