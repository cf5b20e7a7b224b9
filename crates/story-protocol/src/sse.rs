/// One decoded server-sent event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the frame carried one.
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Bytes are buffered until a blank-line delimiter (`\n\n` or `\r\n\r\n`) is
/// seen, so a frame split across any number of transport chunks is decoded
/// exactly once and a multi-byte character is never cut in half.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Offset below which `buf` is known to hold no delimiter.
    scanned: usize,
}

impl SseDecoder {
    /// Appends a transport chunk and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf, self.scanned) {
            let frame_bytes = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            self.scanned = 0;
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        // A delimiter is at most 4 bytes, so its start may sit in the last 3.
        self.scanned = self.buf.len().saturating_sub(3);
        frames
    }

    /// Returns the number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Flushes a trailing frame the server closed without a blank line.
    pub fn finish(self) -> Option<SseFrame> {
        parse_sse_frame(&self.buf)
    }
}

fn find_frame_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<String> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}
