//! Key layout in the shared key/value store.
//!
//! ```text
//! {prefix}:session_id
//! {prefix}:session_created_at
//! {prefix}:session_expires_at
//! {prefix}:session_last_activity
//! {prefix}:masked:{token}            -> internal session id
//! {prefix}:current_masked_id         -> session token
//! {prefix}:project_masked:{token}    -> internal project id
//! {prefix}:model:{session}:{project} -> TrainedModel (JSON)
//! ```

use guestlab_mask::IdKind;

#[derive(Debug, Clone)]
pub struct Keys {
    prefix: String,
}

impl Keys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    pub fn session_id(&self) -> String {
        self.key("session_id")
    }

    pub fn session_created_at(&self) -> String {
        self.key("session_created_at")
    }

    pub fn session_expires_at(&self) -> String {
        self.key("session_expires_at")
    }

    pub fn session_last_activity(&self) -> String {
        self.key("session_last_activity")
    }

    pub fn current_masked_id(&self) -> String {
        self.key("current_masked_id")
    }

    /// Prefix under which all mappings of a kind live.
    pub fn mapping_prefix(&self, kind: IdKind) -> String {
        match kind {
            IdKind::Session => self.key("masked:"),
            IdKind::Project => self.key("project_masked:"),
        }
    }

    pub fn mapping(&self, kind: IdKind, token: &str) -> String {
        format!("{}{}", self.mapping_prefix(kind), token)
    }

    pub fn model(&self, session_id: &str, project_id: &str) -> String {
        format!("{}{}", self.model_prefix(session_id), project_id)
    }

    pub fn model_prefix(&self, session_id: &str) -> String {
        self.key(&format!("model:{}:", session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let keys = Keys::new("guestlab");
        assert_eq!(keys.session_id(), "guestlab:session_id");
        assert_eq!(keys.mapping(IdKind::Session, "7f3a9c2d"), "guestlab:masked:7f3a9c2d");
        assert_eq!(
            keys.mapping(IdKind::Project, "p7f3a9c2d"),
            "guestlab:project_masked:p7f3a9c2d"
        );
        assert_eq!(keys.model("s1", "p1"), "guestlab:model:s1:p1");
        assert!(keys.model("s1", "p1").starts_with(&keys.model_prefix("s1")));
    }

    #[test]
    fn test_kind_prefixes_do_not_nest() {
        let keys = Keys::new("guestlab");
        let session = keys.mapping_prefix(IdKind::Session);
        let project = keys.mapping_prefix(IdKind::Project);
        assert!(!project.starts_with(&session));
        assert!(!session.starts_with(&project));
    }
}
