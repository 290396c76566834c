use std::fmt;

/// A request path reduced to its segments.
///
/// `.` segments are dropped and `..` pops the previous segment; a `..` at
/// the root is absorbed. A trailing `/` is kept as the `directory` flag so
/// that `/docs/` and `/docs` stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedPath {
    segments: Vec<String>,
    directory: bool,
}

impl NormalizedPath {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");

        let mut segments: Vec<String> = Vec::new();
        let mut directory = true;
        for raw in path.split('/') {
            match raw {
                "" | "." => directory = true,
                ".." => {
                    segments.pop();
                    directory = true;
                }
                segment => {
                    segments.push(segment.to_string());
                    directory = false;
                }
            }
        }

        Self {
            segments,
            directory,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    /// True when the path addresses a collection (ends with `/`).
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        f.write_str(&self.segments.join("/"))?;
        if self.directory && !self.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_dot_pops_previous_segment() {
        assert_eq!(NormalizedPath::parse("/a/../b"), NormalizedPath::parse("/b"));
        assert_eq!(NormalizedPath::parse("/a/../b").to_string(), "/b");
    }

    #[test]
    fn dot_segments_removed_and_trailing_slash_kept() {
        let path = NormalizedPath::parse("/a/./b/");
        assert_eq!(path, NormalizedPath::parse("/a/b/"));
        assert!(path.is_directory());
        assert_eq!(path.to_string(), "/a/b/");
        assert_ne!(path, NormalizedPath::parse("/a/b"));
    }

    #[test]
    fn stray_dot_dot_is_absorbed_at_root() {
        let path = NormalizedPath::parse("/../../etc/passwd");
        assert_eq!(path.segments(), &["etc".to_string(), "passwd".to_string()]);
        assert!(!path.is_directory());
    }

    #[test]
    fn root_and_empty_segments() {
        assert!(NormalizedPath::parse("/").is_root());
        assert!(NormalizedPath::parse("/").is_directory());
        assert_eq!(NormalizedPath::parse("//a//b").to_string(), "/a/b");
    }

    #[test]
    fn query_is_ignored() {
        assert_eq!(NormalizedPath::parse("/a/b?x=/c").to_string(), "/a/b");
    }
}
