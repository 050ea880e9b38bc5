//! Action profiles: shared member and group pools for indirect tables.
//!
//! An action profile owns a pool of members (action bindings) and, when
//! created with selector support, groups of members. Indirect table entries
//! reference members; indirect-ws entries may reference groups, and the
//! data plane resolves a group to one member through the profile's
//! [`GroupSelector`] policy.

use std::fmt;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::table::{ActionData, MatchError};

/// Opaque handle to an action-profile member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberHandle(pub u32);

impl fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberHandle({})", self.0)
    }
}

/// Opaque handle to an action-profile group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupHandle(pub u32);

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupHandle({})", self.0)
    }
}

/// One member: an action binding shared by any number of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member handle.
    pub handle: MemberHandle,
    /// Bound action name.
    pub action: String,
    /// Bound action arguments.
    pub data: ActionData,
}

/// One group: an ordered set of member handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group handle.
    pub handle: GroupHandle,
    /// Members of the group, in insertion order.
    pub members: Vec<MemberHandle>,
}

/// Policy that picks one member out of a group for a data-plane hash.
///
/// The default policy hashes round-robin over the member list; targets
/// replace it per profile when they need resilient or weighted selection.
pub trait GroupSelector: Send + Sync {
    /// Picks a member for the given hash. `None` on an empty group.
    fn pick(&self, members: &[MemberHandle], hash: u64) -> Option<MemberHandle>;
}

/// Default selection policy: hash modulo group size.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashModuloSelector;

impl GroupSelector for HashModuloSelector {
    #[allow(clippy::cast_possible_truncation)]
    fn pick(&self, members: &[MemberHandle], hash: u64) -> Option<MemberHandle> {
        if members.is_empty() {
            return None;
        }
        Some(members[(hash % members.len() as u64) as usize])
    }
}

struct ProfileState {
    members: FxHashMap<u32, Member>,
    groups: FxHashMap<u32, Group>,
    next_member: u32,
    next_group: u32,
    selector: Arc<dyn GroupSelector>,
}

/// A named action profile with interior-mutable member/group state.
pub struct ActionProfile {
    name: String,
    actions: Vec<String>,
    with_selector: bool,
    state: Mutex<ProfileState>,
}

impl fmt::Debug for ActionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionProfile")
            .field("name", &self.name)
            .field("with_selector", &self.with_selector)
            .finish_non_exhaustive()
    }
}

impl ActionProfile {
    /// Creates an empty profile with the given bindable actions.
    #[must_use]
    pub fn new(name: String, actions: Vec<String>, with_selector: bool) -> Self {
        ActionProfile {
            name,
            actions,
            with_selector,
            state: Mutex::new(ProfileState {
                members: FxHashMap::default(),
                groups: FxHashMap::default(),
                next_member: 0,
                next_group: 0,
                selector: Arc::new(HashModuloSelector),
            }),
        }
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the profile supports groups.
    #[must_use]
    pub fn with_selector(&self) -> bool {
        self.with_selector
    }

    fn check_action(&self, action: &str) -> Result<(), MatchError> {
        if self.actions.iter().any(|a| a == action) {
            Ok(())
        } else {
            Err(MatchError::ActionNotFound(action.to_string()))
        }
    }

    /// Adds a member bound to the given action.
    ///
    /// # Errors
    ///
    /// `ActionNotFound` for an unbound action.
    pub fn add_member(&self, action: &str, data: ActionData) -> Result<MemberHandle, MatchError> {
        self.check_action(action)?;
        let mut st = self.state.lock();
        let handle = MemberHandle(st.next_member);
        st.next_member += 1;
        st.members.insert(
            handle.0,
            Member {
                handle,
                action: action.to_string(),
                data,
            },
        );
        Ok(handle)
    }

    /// Deletes a member.
    ///
    /// # Errors
    ///
    /// `InvalidMember` when absent, `MemberInUse` while any group still
    /// references it.
    pub fn delete_member(&self, member: MemberHandle) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        if !st.members.contains_key(&member.0) {
            return Err(MatchError::InvalidMember(member.0));
        }
        if st.groups.values().any(|g| g.members.contains(&member)) {
            return Err(MatchError::MemberInUse(member.0));
        }
        st.members.remove(&member.0);
        Ok(())
    }

    /// Rebinds a member to another action.
    ///
    /// # Errors
    ///
    /// `ActionNotFound` or `InvalidMember`.
    pub fn modify_member(
        &self,
        member: MemberHandle,
        action: &str,
        data: ActionData,
    ) -> Result<(), MatchError> {
        self.check_action(action)?;
        let mut st = self.state.lock();
        let m = st
            .members
            .get_mut(&member.0)
            .ok_or(MatchError::InvalidMember(member.0))?;
        m.action = action.to_string();
        m.data = data;
        Ok(())
    }

    /// Creates an empty group.
    #[must_use]
    pub fn create_group(&self) -> GroupHandle {
        let mut st = self.state.lock();
        let handle = GroupHandle(st.next_group);
        st.next_group += 1;
        st.groups.insert(
            handle.0,
            Group {
                handle,
                members: Vec::new(),
            },
        );
        handle
    }

    /// Deletes a group.
    ///
    /// # Errors
    ///
    /// `InvalidGroup` when absent.
    pub fn delete_group(&self, group: GroupHandle) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        st.groups
            .remove(&group.0)
            .map(|_| ())
            .ok_or(MatchError::InvalidGroup(group.0))
    }

    /// Adds a member to a group. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidMember` or `InvalidGroup`.
    pub fn add_member_to_group(
        &self,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        if !st.members.contains_key(&member.0) {
            return Err(MatchError::InvalidMember(member.0));
        }
        let g = st
            .groups
            .get_mut(&group.0)
            .ok_or(MatchError::InvalidGroup(group.0))?;
        if !g.members.contains(&member) {
            g.members.push(member);
        }
        Ok(())
    }

    /// Removes a member from a group.
    ///
    /// # Errors
    ///
    /// `InvalidMember` when the group does not hold it, `InvalidGroup` when
    /// the group is absent.
    pub fn remove_member_from_group(
        &self,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        let g = st
            .groups
            .get_mut(&group.0)
            .ok_or(MatchError::InvalidGroup(group.0))?;
        let before = g.members.len();
        g.members.retain(|m| *m != member);
        if g.members.len() == before {
            return Err(MatchError::InvalidMember(member.0));
        }
        Ok(())
    }

    /// All members, in handle order.
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        let st = self.state.lock();
        let mut out: Vec<Member> = st.members.values().cloned().collect();
        out.sort_by_key(|m| m.handle.0);
        out
    }

    /// Reads one member.
    ///
    /// # Errors
    ///
    /// `InvalidMember` when absent.
    pub fn member(&self, member: MemberHandle) -> Result<Member, MatchError> {
        self.state
            .lock()
            .members
            .get(&member.0)
            .cloned()
            .ok_or(MatchError::InvalidMember(member.0))
    }

    /// All groups, in handle order.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        let st = self.state.lock();
        let mut out: Vec<Group> = st.groups.values().cloned().collect();
        out.sort_by_key(|g| g.handle.0);
        out
    }

    /// Reads one group.
    ///
    /// # Errors
    ///
    /// `InvalidGroup` when absent.
    pub fn group(&self, group: GroupHandle) -> Result<Group, MatchError> {
        self.state
            .lock()
            .groups
            .get(&group.0)
            .cloned()
            .ok_or(MatchError::InvalidGroup(group.0))
    }

    /// Replaces the group-selection policy.
    pub fn set_group_selector(&self, selector: Arc<dyn GroupSelector>) {
        self.state.lock().selector = selector;
    }

    /// Resolves a group to one member using the installed policy.
    ///
    /// # Errors
    ///
    /// `InvalidGroup` when the group is absent or empty.
    pub fn select_from_group(
        &self,
        group: GroupHandle,
        hash: u64,
    ) -> Result<MemberHandle, MatchError> {
        let st = self.state.lock();
        let g = st
            .groups
            .get(&group.0)
            .ok_or(MatchError::InvalidGroup(group.0))?;
        st.selector
            .pick(&g.members, hash)
            .ok_or(MatchError::InvalidGroup(group.0))
    }

    /// Drops all members and groups.
    pub fn reset_state(&self) {
        let mut st = self.state.lock();
        st.members.clear();
        st.groups.clear();
        st.next_member = 0;
        st.next_group = 0;
    }

    /// Copies the profile, state included.
    #[must_use]
    pub fn duplicate(&self) -> ActionProfile {
        let st = self.state.lock();
        ActionProfile {
            name: self.name.clone(),
            actions: self.actions.clone(),
            with_selector: self.with_selector,
            state: Mutex::new(ProfileState {
                members: st.members.clone(),
                groups: st.groups.clone(),
                next_member: st.next_member,
                next_group: st.next_group,
                selector: Arc::clone(&st.selector),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ActionProfile {
        ActionProfile::new(
            "ecmp".to_string(),
            vec!["set_nhop".to_string()],
            true,
        )
    }

    #[test]
    fn member_lifecycle() {
        let p = profile();
        let m = p.add_member("set_nhop", ActionData::default()).unwrap();
        assert_eq!(p.members().len(), 1);
        p.modify_member(m, "set_nhop", ActionData(vec![vec![1]]))
            .unwrap();
        assert_eq!(p.member(m).unwrap().data, ActionData(vec![vec![1]]));
        p.delete_member(m).unwrap();
        assert!(matches!(
            p.member(m).unwrap_err(),
            MatchError::InvalidMember(_)
        ));
    }

    #[test]
    fn member_in_group_cannot_be_deleted() {
        let p = profile();
        let m = p.add_member("set_nhop", ActionData::default()).unwrap();
        let g = p.create_group();
        p.add_member_to_group(m, g).unwrap();
        assert_eq!(p.delete_member(m).unwrap_err(), MatchError::MemberInUse(m.0));
        p.remove_member_from_group(m, g).unwrap();
        p.delete_member(m).unwrap();
    }

    #[test]
    fn selection_uses_installed_policy() {
        let p = profile();
        let m0 = p.add_member("set_nhop", ActionData::default()).unwrap();
        let m1 = p.add_member("set_nhop", ActionData::default()).unwrap();
        let g = p.create_group();
        p.add_member_to_group(m0, g).unwrap();
        p.add_member_to_group(m1, g).unwrap();

        assert_eq!(p.select_from_group(g, 0).unwrap(), m0);
        assert_eq!(p.select_from_group(g, 1).unwrap(), m1);

        struct AlwaysFirst;
        impl GroupSelector for AlwaysFirst {
            fn pick(&self, members: &[MemberHandle], _hash: u64) -> Option<MemberHandle> {
                members.first().copied()
            }
        }
        p.set_group_selector(Arc::new(AlwaysFirst));
        assert_eq!(p.select_from_group(g, 1).unwrap(), m0);
    }

    #[test]
    fn unknown_action_rejected() {
        let p = profile();
        assert!(matches!(
            p.add_member("nope", ActionData::default()).unwrap_err(),
            MatchError::ActionNotFound(_)
        ));
    }
}
