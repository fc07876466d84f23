//! Filesystem-safe filename sanitization.

const NAME_MAX: usize = 255;

/// Replaces separators, NUL and control characters with `_`, trims leading
/// and trailing dots/whitespace, and caps the name at 255 bytes on a char
/// boundary. Interior spaces are kept.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
