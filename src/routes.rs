//! Page locations.
//!
//! Every location this crate hands back is built from masked tokens only.

use std::fmt;

const LIST_PATH: &str = "/projects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Default list view; the safe fallback for anything unresolvable.
    ProjectList,
    Session { session: String },
    Project { session: String, project: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::ProjectList => write!(f, "{}", LIST_PATH),
            Location::Session { session } => write!(f, "{}/{}", LIST_PATH, session),
            Location::Project { session, project } => {
                write!(f, "{}/{}/{}", LIST_PATH, session, project)
            }
        }
    }
}

/// URL segments of a requested page, not yet resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedPath {
    pub session: Option<String>,
    pub project: Option<String>,
}

impl RequestedPath {
    /// Split a request path. Anything outside `/projects[/s[/p]]` parses to
    /// no segments, which sends the caller to the list view.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut parts = path.split('/').filter(|p| !p.is_empty());

        if parts.next() != Some("projects") {
            return Self::default();
        }

        let session = parts.next().map(str::to_string);
        let project = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Self::default();
        }

        Self { session, project }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/projects", None, None)]
    #[case("/projects/", None, None)]
    #[case("/projects/7f3a9c2d", Some("7f3a9c2d"), None)]
    #[case("/projects/7f3a9c2d/p1a2b3c4d?tab=train", Some("7f3a9c2d"), Some("p1a2b3c4d"))]
    #[case("/admin/7f3a9c2d", None, None)]
    #[case("/projects/a/b/c", None, None)]
    fn test_parse(
        #[case] path: &str,
        #[case] session: Option<&str>,
        #[case] project: Option<&str>,
    ) {
        let parsed = RequestedPath::parse(path);
        assert_eq!(parsed.session.as_deref(), session);
        assert_eq!(parsed.project.as_deref(), project);
    }

    #[test]
    fn test_display() {
        assert_eq!(Location::ProjectList.to_string(), "/projects");
        assert_eq!(
            Location::Project {
                session: "7f3a9c2d".into(),
                project: "p1a2b3c4d".into()
            }
            .to_string(),
            "/projects/7f3a9c2d/p1a2b3c4d"
        );
    }
}
