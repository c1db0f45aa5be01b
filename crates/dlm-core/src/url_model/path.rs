//! Filename hint from the URL path.

use url::Url;

/// Returns the text after the last `/` of the URL path, ignoring query and fragment.
///
/// `None` for cannot-be-a-base URLs or when the path ends in `/` (empty segment).
pub fn last_path_segment(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(s: &str) -> Option<String> {
        last_path_segment(&Url::parse(s).unwrap())
    }

    #[test]
    fn normal() {
        assert_eq!(seg("https://example.com/a/b/file.deb").as_deref(), Some("file.deb"));
        assert_eq!(seg("https://example.com/single").as_deref(), Some("single"));
    }

    #[test]
    fn trailing_slash_or_root() {
        assert_eq!(seg("https://example.com/"), None);
        assert_eq!(seg("https://example.com"), None);
        assert_eq!(seg("https://example.com/a/b/"), None);
    }

    #[test]
    fn query_and_fragment_ignored() {
        assert_eq!(seg("https://example.com/file.zip?token=abc").as_deref(), Some("file.zip"));
        assert_eq!(seg("https://example.com/notes.txt#top").as_deref(), Some("notes.txt"));
    }
}
