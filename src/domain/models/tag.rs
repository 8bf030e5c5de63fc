//! Tag: a materialized-path tree of user/rule-assigned labels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Materialized path, e.g. `/1/5/12` (ids separated by `/`).
    pub path: String,
    pub level: u32,
}

impl Tag {
    pub fn root(name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            parent_id: None,
            path: format!("/{id}"),
            level: 0,
        }
    }

    pub fn child_of(parent: &Tag, name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            parent_id: Some(parent.id),
            path: format!("{}/{}", parent.path, id),
            level: parent.level + 1,
        }
    }

    pub fn is_descendant_of(&self, ancestor: &Tag) -> bool {
        self.path.starts_with(&ancestor.path) && self.id != ancestor.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_extends_parent_path() {
        let root = Tag::root("infra");
        let child = Tag::child_of(&root, "prod");
        assert!(child.path.starts_with(&root.path));
        assert_eq!(child.level, 1);
        assert!(child.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&child));
    }
}
