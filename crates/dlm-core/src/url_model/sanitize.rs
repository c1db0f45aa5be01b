//! Linux-safe filename sanitization.

/// Linux NAME_MAX in bytes.
const NAME_MAX: usize = 255;

fn is_forbidden(c: char) -> bool {
    c == '/' || c == '\\' || c.is_control() || c.is_whitespace()
}

/// Makes `name` safe to create inside the download directory.
///
/// Path separators, control characters and whitespace become `_` (runs of them
/// collapse to one), leading/trailing dots and underscores are stripped so the
/// result can never be `.`/`..` or a hidden file, and the result is cut to
/// NAME_MAX bytes on a char boundary. May return an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
