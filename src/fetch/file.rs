use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use crate::fulcrum::ByteStream;

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Stream `body` into `path` via a `.part` sibling.
///
/// A zero-byte body is rejected and leaves nothing behind. Returns the number
/// of bytes written.
pub async fn stream_to_file(mut body: ByteStream, path: &Path) -> Result<u64, DownloadError> {
    let part = part_path(path);
    let _ = fs::remove_file(&part).await;

    let result = async {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&part)
            .await?;

        let mut bytes_written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if bytes_written == 0 {
            return Err(DownloadError::Empty(path.to_path_buf()));
        }
        fs::rename(&part, path).await?;
        Ok::<u64, DownloadError>(bytes_written)
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&part).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulcrum::ApiError;
    use futures_util::stream;

    fn body(chunks: Vec<Result<Vec<u8>, ApiError>>) -> ByteStream {
        stream::iter(chunks).boxed()
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/s/abc.jpg")),
            PathBuf::from("/s/abc.jpg.part")
        );
    }

    #[tokio::test]
    async fn test_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.jpg");
        let written = stream_to_file(
            body(vec![Ok(b"hello ".to_vec()), Ok(b"world".to_vec())]),
            &path,
        )
        .await
        .unwrap();
        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn test_empty_body_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        let err = stream_to_file(body(vec![Ok(Vec::new())]), &path)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Empty(_)));
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn test_stream_error_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        let err = stream_to_file(
            body(vec![
                Ok(b"partial".to_vec()),
                Err(ApiError::unexpected("photo media", "connection reset")),
            ]),
            &path,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::Api(_)));
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }
}
