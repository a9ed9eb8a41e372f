use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::ArchiveError;
use super::naming;
use crate::fulcrum::metadata::{self, PhotoMetadata};

/// Upper bound on `name(n).ext` probing before giving up on a folder.
const MAX_COPY_NUMBER: u32 = 10_000;

/// Result of placing one staged file into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was written to this path.
    Copied(PathBuf),
    /// An existing file at this path was kept; nothing was written.
    AlreadyArchived(PathBuf),
}

/// Copies staged downloads into archive folders under derived names.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveWriter {
    /// Photos whose derived name is taken get `name(1).ext`, `name(2).ext`, ...
    /// When false the existing file wins. Reports always keep the existing file.
    allow_duplicates: bool,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self {
            allow_duplicates: true,
        }
    }
}

impl ArchiveWriter {
    pub fn new(allow_duplicates: bool) -> Self {
        Self { allow_duplicates }
    }

    /// Archive name of a record's report inside `folder`.
    pub fn report_destination(
        folder: &Path,
        project_number: &str,
        field_visit_notes: Option<&str>,
    ) -> PathBuf {
        let stem = naming::report_stem(project_number, field_visit_notes);
        folder.join(naming::with_extension(&stem, "pdf"))
    }

    /// Copy `staged` into `destination`.
    ///
    /// Photos are named after the caption recorded for their access key (the
    /// staged file stem); PDFs after the project number and visit notes.
    pub async fn copy(
        &self,
        staged: &Path,
        destination: &Path,
        photos: &[PhotoMetadata],
        project_number: &str,
        field_visit_notes: Option<&str>,
    ) -> Result<CopyOutcome, ArchiveError> {
        if !exists(staged).await {
            return Err(ArchiveError::SourceMissing(staged.to_path_buf()));
        }
        check_destination(destination).await?;

        let extension = staged
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let is_report = extension == "pdf";

        let target = if is_report {
            Self::report_destination(destination, project_number, field_visit_notes)
        } else {
            let access_key = staged
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = naming::photo_stem(metadata::caption_for(photos, &access_key));
            destination.join(naming::with_extension(&stem, &extension))
        };

        let target = if !exists(&target).await {
            target
        } else if is_report || !self.allow_duplicates {
            tracing::debug!(path = %target.display(), "Already archived, keeping existing file");
            return Ok(CopyOutcome::AlreadyArchived(target));
        } else {
            next_free_name(&target).await?
        };

        // The fetch phase may have been slow; the staged file can be gone by now.
        if !exists(staged).await {
            return Err(ArchiveError::SourceVanished(staged.to_path_buf()));
        }

        tracing::debug!(
            from = %staged.display(),
            to = %target.display(),
            "Copying into archive"
        );
        copy_via_partial(staged, &target).await?;
        tracing::info!(path = %target.display(), "Archived");
        Ok(CopyOutcome::Copied(target))
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn check_destination(destination: &Path) -> Result<(), ArchiveError> {
    let unavailable = |reason: String| ArchiveError::DestinationUnavailable {
        path: destination.to_path_buf(),
        reason,
    };
    match tokio::fs::metadata(destination).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(unavailable("not a directory".to_string())),
        Err(e) => Err(unavailable(e.to_string())),
    }
}

/// First `name(n).ext` next to `taken` that does not exist yet.
async fn next_free_name(taken: &Path) -> Result<PathBuf, ArchiveError> {
    let folder = taken.parent().unwrap_or_else(|| Path::new("."));
    let filename = taken
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    for n in 1..=MAX_COPY_NUMBER {
        let candidate = folder.join(naming::numbered(&filename, n));
        if !exists(&candidate).await {
            return Ok(candidate);
        }
    }
    Err(ArchiveError::DestinationUnavailable {
        path: folder.to_path_buf(),
        reason: format!("more than {} copies of {}", MAX_COPY_NUMBER, filename),
    })
}

/// Copy to a hidden `.part` sibling, then rename into place.
async fn copy_via_partial(source: &Path, target: &Path) -> Result<(), ArchiveError> {
    let folder = target.parent().unwrap_or_else(|| Path::new("."));
    let filename = target
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = folder.join(naming::partial_name(&filename));

    if let Err(e) = tokio::fs::copy(source, &part).await {
        let _ = tokio::fs::remove_file(&part).await;
        if e.kind() == ErrorKind::NotFound && !exists(source).await {
            return Err(ArchiveError::SourceVanished(source.to_path_buf()));
        }
        return Err(ArchiveError::Copy {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = tokio::fs::rename(&part, target).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(ArchiveError::Copy {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        staging: PathBuf,
        dest: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let dest = dir.path().join("dest");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&dest).unwrap();
        Fixture {
            _dir: dir,
            staging,
            dest,
        }
    }

    fn stage(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, bytes).unwrap();
        p
    }

    fn meta(id: &str, caption: &str) -> Vec<PhotoMetadata> {
        vec![PhotoMetadata {
            photo_id: id.to_string(),
            caption: Some(caption.to_string()),
        }]
    }

    #[tokio::test]
    async fn test_photo_named_after_sanitized_caption() {
        let fx = fixture();
        let staged = stage(&fx.staging, "key-1.jpg", b"jpeg");
        let outcome = ArchiveWriter::default()
            .copy(&staged, &fx.dest, &meta("key-1", "Roof/Flashing\nIssue"), "24-1", None)
            .await
            .unwrap();
        let expected = fx.dest.join("Roof-Flashing-Issue.jpg");
        assert_eq!(outcome, CopyOutcome::Copied(expected.clone()));
        assert_eq!(fs::read(&expected).unwrap(), b"jpeg");
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn test_photo_without_caption_uses_placeholder() {
        let fx = fixture();
        let staged = stage(&fx.staging, "key-2.jpg", b"jpeg");
        let outcome = ArchiveWriter::default()
            .copy(&staged, &fx.dest, &meta("other", "Not mine"), "24-1", None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CopyOutcome::Copied(fx.dest.join(format!("{}.jpg", naming::PHOTO_PLACEHOLDER)))
        );
    }

    #[tokio::test]
    async fn test_duplicate_photo_gets_numbered_name() {
        let fx = fixture();
        fs::write(fx.dest.join("Gutter.jpg"), b"first").unwrap();
        fs::write(fx.dest.join("Gutter(1).jpg"), b"second").unwrap();
        let staged = stage(&fx.staging, "k.jpg", b"third");

        let outcome = ArchiveWriter::new(true)
            .copy(&staged, &fx.dest, &meta("k", "Gutter"), "24-1", None)
            .await
            .unwrap();
        let expected = fx.dest.join("Gutter(2).jpg");
        assert_eq!(outcome, CopyOutcome::Copied(expected.clone()));
        assert_eq!(fs::read(expected).unwrap(), b"third");
        assert_eq!(fs::read(fx.dest.join("Gutter.jpg")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_duplicate_photo_kept_when_duplicates_disallowed() {
        let fx = fixture();
        fs::write(fx.dest.join("Gutter.jpg"), b"first").unwrap();
        let staged = stage(&fx.staging, "k.jpg", b"second");

        let outcome = ArchiveWriter::new(false)
            .copy(&staged, &fx.dest, &meta("k", "Gutter"), "24-1", None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CopyOutcome::AlreadyArchived(fx.dest.join("Gutter.jpg"))
        );
        assert_eq!(fs::read(fx.dest.join("Gutter.jpg")).unwrap(), b"first");
        assert!(!fx.dest.join("Gutter(1).jpg").exists());
    }

    #[tokio::test]
    async fn test_report_named_after_project_and_notes() {
        let fx = fixture();
        let staged = stage(&fx.staging, "report_rec-1.pdf", b"%PDF");
        let outcome = ArchiveWriter::default()
            .copy(&staged, &fx.dest, &[], "24-1031", Some("Roof inspection"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CopyOutcome::Copied(fx.dest.join("Project #24-1031, Roof inspection.pdf"))
        );
    }

    #[tokio::test]
    async fn test_existing_report_always_wins() {
        let fx = fixture();
        let existing = fx.dest.join("Project #24-1, Project Report.pdf");
        fs::write(&existing, b"old").unwrap();
        let staged = stage(&fx.staging, "report_rec-1.pdf", b"new");

        let outcome = ArchiveWriter::new(true)
            .copy(&staged, &fx.dest, &[], "24-1", None)
            .await
            .unwrap();
        assert_eq!(outcome, CopyOutcome::AlreadyArchived(existing.clone()));
        assert_eq!(fs::read(existing).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let fx = fixture();
        let err = ArchiveWriter::default()
            .copy(&fx.staging.join("gone.jpg"), &fx.dest, &[], "1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_unavailable_destination() {
        let fx = fixture();
        let staged = stage(&fx.staging, "k.jpg", b"x");

        let missing = fx.dest.join("nope");
        let err = ArchiveWriter::default()
            .copy(&staged, &missing, &[], "1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DestinationUnavailable { .. }));

        let file_dest = stage(&fx.staging, "plain-file", b"x");
        let err = ArchiveWriter::default()
            .copy(&staged, &file_dest, &[], "1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DestinationUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_no_partial_file_left_behind() {
        let fx = fixture();
        let staged = stage(&fx.staging, "k.jpg", b"x");
        ArchiveWriter::default()
            .copy(&staged, &fx.dest, &meta("k", "Porch"), "1", None)
            .await
            .unwrap();
        let names: Vec<String> = fs::read_dir(&fx.dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Porch.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_copy_from_vanished_source() {
        let fx = fixture();
        let dir = fx.staging.join("gone-dir");
        fs::create_dir_all(&dir).unwrap();
        let err = copy_via_partial(&dir.join("k.jpg"), &fx.dest.join("k.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::SourceVanished(_)));
        assert!(!fx.dest.join(".k.jpg.part").exists());
    }
}
