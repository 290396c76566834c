use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::handlers::HandlerKind;

/// Coarse resource category selected by the leading path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Filesystem-backed resources.
    Static,
    /// Programmatic pages.
    #[default]
    Dynamic,
    /// Assets embedded in the binary.
    Resource,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Static,
        ResourceClass::Dynamic,
        ResourceClass::Resource,
    ];

    /// Reserved path segment naming this class.
    pub fn segment(&self) -> &'static str {
        match self {
            ResourceClass::Static => "static",
            ResourceClass::Dynamic => "dynamic",
            ResourceClass::Resource => "resource",
        }
    }

    pub fn from_segment(segment: &str, case_sensitive: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|class| {
            if case_sensitive {
                class.segment() == segment
            } else {
                class.segment().eq_ignore_ascii_case(segment)
            }
        })
    }

    /// The handler family allowed beneath this class.
    pub fn handler_kind(&self) -> HandlerKind {
        match self {
            ResourceClass::Static => HandlerKind::StaticFile,
            ResourceClass::Dynamic => HandlerKind::Dynamic,
            ResourceClass::Resource => HandlerKind::Embedded,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_segment(s, false).ok_or_else(|| format!("unknown resource class {:?}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_lookup_honors_case_policy() {
        assert_eq!(
            ResourceClass::from_segment("STATIC", false),
            Some(ResourceClass::Static)
        );
        assert_eq!(ResourceClass::from_segment("STATIC", true), None);
        assert_eq!(
            ResourceClass::from_segment("resource", true),
            Some(ResourceClass::Resource)
        );
        assert_eq!(ResourceClass::from_segment("other", false), None);
    }
}
