/// Marker that precedes the story text in the streamed JSON document.
pub const HISTORY_MARKER: &str = "\"history\": \"";

/// Projects the readable story text out of an incomplete JSON document.
///
/// Everything after the first [`HISTORY_MARKER`] is kept, then blank-line
/// pairs, remaining newlines, double quotes and closing braces are removed,
/// in that order. Returns an empty string while the marker is absent.
///
/// This is a display approximation. It never feeds the parsed result.
pub fn project_history(buffer: &str) -> String {
    let Some(index) = buffer.find(HISTORY_MARKER) else {
        return String::new();
    };
    buffer[index + HISTORY_MARKER.len()..]
        .replace("\n\n", "")
        .replace('\n', "")
        .replace('"', "")
        .replace('}', "")
}

/// Renders a projection for a terminal, turning escaped newlines into spaces.
///
/// Upstream JSON carries paragraph breaks as `\n` escapes, which the
/// projection leaves in place.
pub fn display_partial(projection: &str) -> String {
    projection.replace("\\n\\n", " ").replace("\\n", " ")
}
