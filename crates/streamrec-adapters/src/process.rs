//! Helpers shared by the subprocess adapters.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Forwards every line of `reader` to the debug log, tagged with `tool`.
///
/// Reads until EOF whatever the bytes are. Stopping early would close the
/// pipe and kill the child on its next write.
pub(crate) async fn forward_lines<R>(reader: Option<R>, tool: &str)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!("[{}] {}", tool, line);
                }
            }
            Err(e) => {
                debug!("Stopped reading {} output: {}", tool, e);
                break;
            }
        }
    }
}

/// Short display name for a program path (`/usr/bin/ffmpeg` -> `ffmpeg`).
pub(crate) fn tool_name(program: &str) -> String {
    std::path::Path::new(program)
        .file_name()
        .map_or_else(|| program.to_string(), |n| n.to_string_lossy().into_owned())
}
