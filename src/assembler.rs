use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::AssemblyError;
use crate::state::SegmentResult;

/// Concatenates completed segments into `destination` in range order.
///
/// Each segment file is removed right after it has been appended. On error
/// the bytes already written stay in place and the remaining segments are
/// left untouched.
pub async fn assemble(destination: &Path, mut segments: Vec<SegmentResult>) -> Result<u64, AssemblyError> {
    segments.sort_by_key(|s| s.range.index);

    let io_err = |range, source| AssemblyError::Io {
        range,
        path: destination.to_path_buf(),
        source,
    };

    let file = File::create(destination).await.map_err(|e| io_err(None, e))?;
    let mut writer = BufWriter::new(file);
    let mut total: u64 = 0;

    for segment in segments {
        let range = segment.range;
        if !segment.is_complete() {
            return Err(AssemblyError::Incomplete { range });
        }

        let metadata = match fs::metadata(&segment.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssemblyError::MissingSegment {
                    range,
                    path: segment.path,
                });
            }
            Err(e) => return Err(io_err(Some(range), e)),
        };
        if metadata.len() != range.len() {
            return Err(AssemblyError::SizeMismatch {
                range,
                actual: metadata.len(),
            });
        }

        let mut part = File::open(&segment.path)
            .await
            .map_err(|e| io_err(Some(range), e))?;
        let copied = io::copy(&mut part, &mut writer)
            .await
            .map_err(|e| io_err(Some(range), e))?;
        writer.flush().await.map_err(|e| io_err(Some(range), e))?;
        drop(part);

        fs::remove_file(&segment.path)
            .await
            .map_err(|e| io_err(Some(range), e))?;

        debug!(part = range.index + 1, bytes = copied, "segment appended");
        total += copied;
    }

    writer.flush().await.map_err(|e| io_err(None, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| io_err(None, e))?;

    Ok(total)
}
