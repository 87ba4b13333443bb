//! Group membership checks backing `t-groups` and `groups="..."`.

use std::collections::HashSet;
use std::fmt::Debug;

pub trait GroupChecker: Send + Sync + Debug {
    /// Evaluates a comma-separated group list such as `"base.group_user,!base.group_portal"`.
    ///
    /// A `!` prefix negates a group. Any negated group the user belongs to
    /// denies access; otherwise the user needs at least one of the positive
    /// groups, and a list with no positive groups grants access.
    fn user_has_groups(&self, groups: &str) -> bool {
        let mut has_positive = false;
        let mut matched_positive = false;
        for group in groups.split(',').map(str::trim).filter(|g| !g.is_empty()) {
            match group.strip_prefix('!') {
                Some(negated) => {
                    if self.has_group(negated.trim()) {
                        return false;
                    }
                }
                None => {
                    has_positive = true;
                    matched_positive |= self.has_group(group);
                }
            }
        }
        !has_positive || matched_positive
    }

    fn has_group(&self, group: &str) -> bool;
}

/// A fixed set of group memberships.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    groups: HashSet<String>,
}

impl StaticGroups {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl GroupChecker for StaticGroups {
    fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_groups_need_any_match() {
        let user = StaticGroups::new(["base.group_user"]);
        assert!(user.user_has_groups("base.group_user"));
        assert!(user.user_has_groups("base.group_system, base.group_user"));
        assert!(!user.user_has_groups("base.group_system"));
    }

    #[test]
    fn test_negated_group_vetoes() {
        let user = StaticGroups::new(["base.group_user", "base.group_portal"]);
        assert!(!user.user_has_groups("base.group_user,!base.group_portal"));
        assert!(!user.user_has_groups("!base.group_portal"));
    }

    #[test]
    fn test_only_negations_grant_when_absent() {
        let user = StaticGroups::new(["base.group_user"]);
        assert!(user.user_has_groups("!base.group_portal"));
        assert!(user.user_has_groups(""));
    }
}
