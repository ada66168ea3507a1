//! Chunked read/write for large files.
//!
//! Reads split lines across chunk boundaries; writes go to a sibling temp
//! file in fixed-size chunks, yielding to the runtime every few chunks, and
//! then replace the target with a rename.

use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::endings::LineEnding;
use crate::error::{ToolError, ToolResult};

#[derive(Debug)]
pub struct ChunkedFile {
    /// Bytes exactly as read, for undo.
    pub original: Vec<u8>,
    /// Lines without separators; a trailing separator yields a final "".
    pub lines: Vec<String>,
    pub ending: LineEnding,
}

fn decode_line(bytes: &[u8], path: &str) -> ToolResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ToolError::Unsupported(format!("{} is not valid UTF-8 text", path)))
}

pub async fn read_lines_chunked(
    path: &Path,
    label: &str,
    chunk_size: usize,
    yield_every: usize,
) -> ToolResult<ChunkedFile> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ToolError::from_io(e, label))?;
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut original = Vec::new();
    let mut carry: Vec<u8> = Vec::new();
    let mut lines = Vec::new();
    let mut crlf = false;
    let mut chunks = 0;

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| ToolError::from_io(e, label))?;
        if n == 0 {
            break;
        }
        chunks += 1;
        original.extend_from_slice(&buf[..n]);
        carry.extend_from_slice(&buf[..n]);

        let mut start = 0;
        while let Some(pos) = carry[start..].iter().position(|b| *b == b'\n') {
            let mut end = start + pos;
            if end > start && carry[end - 1] == b'\r' {
                end -= 1;
                crlf = true;
            }
            lines.push(decode_line(&carry[start..end], label)?);
            start += pos + 1;
        }
        carry.drain(..start);

        if yield_every > 0 && chunks % yield_every == 0 {
            tokio::task::yield_now().await;
        }
    }
    lines.push(decode_line(&carry, label)?);
    debug!(path = %label, chunks, lines = lines.len(), "chunked read complete");

    Ok(ChunkedFile {
        original,
        lines,
        ending: if crlf { LineEnding::CrLf } else { LineEnding::Lf },
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.toolsmith-tmp", name))
}

/// Write `content` in `chunk_size` pieces, then rename over `path`.
/// Returns the number of chunks written.
pub async fn write_chunked(
    path: &Path,
    label: &str,
    content: &[u8],
    chunk_size: usize,
    yield_every: usize,
) -> ToolResult<usize> {
    let tmp = temp_path(path);
    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        let mut written = 0;
        for chunk in content.chunks(chunk_size.max(1)) {
            file.write_all(chunk).await?;
            written += 1;
            if yield_every > 0 && written % yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await?;
        Ok::<usize, std::io::Error>(written)
    }
    .await;

    match result {
        Ok(chunks) => Ok(chunks),
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(ToolError::from_io(e, label))
        }
    }
}
