//! Match tables with stable entry handles.
//!
//! A [`MatchTable`] is the state behind one table node in a pipeline. Tables
//! come in three kinds: [`TableKind::Direct`] entries carry their own action,
//! [`TableKind::Indirect`] entries point at an action-profile member, and
//! [`TableKind::IndirectWs`] entries may point at a member *or* a group whose
//! member is picked by the profile's selector.
//!
//! Entry state lives behind a per-table mutex so that entry-level operations
//! can run under the owning context's *shared* lock, concurrent with data
//! plane lookups. Graph topology (the table's successor edges) lives on the
//! node, not here, and only changes under the exclusive lock.
//!
//! Entry handles are stable for the life of the entry within one
//! configuration. They are never reused within a table and never survive a
//! full config swap: the swapped-in graph starts from fresh tables, so a
//! stale handle simply fails with [`MatchError::InvalidHandle`].

use std::fmt;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::action_profile::{GroupHandle, MemberHandle};
use crate::lookup::{LookupFactory, LookupStructure};
use crate::register::RateConfig;

/// Opaque handle to a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryHandle(pub u64);

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHandle({})", self.0)
    }
}

/// Errors from match-table and action-profile operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    /// No table with this name in the live configuration.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The action is not one of the table's (or profile's) bound actions.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// The handle does not reference a live entry of this configuration.
    #[error("invalid entry handle: {0}")]
    InvalidHandle(EntryHandle),

    /// An entry with the same match key (and priority) already exists.
    #[error("duplicate match entry")]
    DuplicateEntry,

    /// The table's match kind requires a priority and none was given.
    #[error("priority required for this match kind")]
    PriorityRequired,

    /// The operation applies to a different table kind.
    #[error("wrong table kind for operation on '{0}'")]
    WrongTableKind(String),

    /// The table was configured without direct counters.
    #[error("direct counters disabled on '{0}'")]
    CountersDisabled(String),

    /// The table was configured without direct meters.
    #[error("direct meters disabled on '{0}'")]
    MetersDisabled(String),

    /// The table has no default entry set.
    #[error("no default entry")]
    NoDefaultEntry,

    /// No entry matches the given key.
    #[error("no entry for match key")]
    BadMatchKey,

    /// No action profile with this name in the live configuration.
    #[error("action profile not found: {0}")]
    ProfileNotFound(String),

    /// The member handle does not reference a live member.
    #[error("invalid member handle: {0}")]
    InvalidMember(u32),

    /// The group handle does not reference a live group.
    #[error("invalid group handle: {0}")]
    InvalidGroup(u32),

    /// The member is still referenced by a group.
    #[error("member {0} still referenced by a group")]
    MemberInUse(u32),
}

/// Table kind, mirrored by which entry operations are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Entries carry an action name plus action data.
    Direct,
    /// Entries reference an action-profile member.
    Indirect,
    /// Entries reference an action-profile member or group (with selector).
    IndirectWs,
}

/// Match kind of the table's key. Ternary and range matching are
/// priority-ordered; exact and LPM are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Exact key match.
    Exact,
    /// Longest-prefix match.
    Lpm,
    /// Ternary (value/mask) match.
    Ternary,
    /// Range match.
    Range,
}

impl MatchKind {
    /// Whether entries of this kind must carry a priority.
    #[must_use]
    pub fn needs_priority(self) -> bool {
        matches!(self, MatchKind::Ternary | MatchKind::Range)
    }
}

/// One parameter of a match key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKeyParam {
    /// Exact bytes.
    Exact(Vec<u8>),
    /// Prefix bytes plus prefix length in bits.
    Lpm(Vec<u8>, u32),
    /// Value and mask bytes.
    Ternary(Vec<u8>, Vec<u8>),
    /// Low and high bound bytes.
    Range(Vec<u8>, Vec<u8>),
    /// Header validity bit.
    Valid(bool),
}

/// Action arguments, opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionData(pub Vec<Vec<u8>>);

impl From<Vec<Vec<u8>>> for ActionData {
    fn from(args: Vec<Vec<u8>>) -> Self {
        ActionData(args)
    }
}

/// What an entry resolves to when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryTarget {
    /// A direct action with its data.
    Action {
        /// Action name.
        name: String,
        /// Action arguments.
        data: ActionData,
    },
    /// An action-profile member.
    Member(MemberHandle),
    /// An action-profile group.
    Group(GroupHandle),
}

/// A table entry, as returned by the read operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Handle, stable for the life of the entry in this configuration.
    pub handle: EntryHandle,
    /// Match key parameters.
    pub key: Vec<MatchKeyParam>,
    /// Priority; `None` for match kinds that are not priority-ordered.
    pub priority: Option<i32>,
    /// Resolution target.
    pub target: EntryTarget,
    /// Direct counter: bytes seen.
    pub bytes: u64,
    /// Direct counter: packets seen.
    pub packets: u64,
    /// Direct meter rates; empty when unset.
    pub rates: Vec<RateConfig>,
    /// Entry TTL in milliseconds, when ageing is armed for this entry.
    pub ttl_ms: Option<u32>,
}

/// Static table description, fixed at load time.
#[derive(Debug, Clone)]
pub struct TableDecl {
    /// Table name, globally unique within a configuration.
    pub name: String,
    /// Table kind.
    pub kind: TableKind,
    /// Match kind of the key.
    pub match_kind: MatchKind,
    /// Actions the table may bind (direct tables).
    pub actions: Vec<String>,
    /// Owning action profile (indirect kinds).
    pub profile: Option<String>,
    /// Whether the table has direct counters.
    pub with_counters: bool,
    /// Whether the table has direct meters.
    pub with_meters: bool,
}

struct TableState {
    entries: FxHashMap<u64, Entry>,
    lookup: Box<dyn LookupStructure>,
    next_handle: u64,
    default_target: Option<EntryTarget>,
}

/// A match table: static declaration plus interior-mutable entry state.
pub struct MatchTable {
    decl: TableDecl,
    state: Mutex<TableState>,
}

impl fmt::Debug for MatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTable")
            .field("name", &self.decl.name)
            .field("kind", &self.decl.kind)
            .field("match_kind", &self.decl.match_kind)
            .finish_non_exhaustive()
    }
}

/// Serializes a match key (and priority, when the match kind is
/// priority-ordered) into the canonical byte form handed to the lookup
/// structure.
fn canonical_key(key: &[MatchKeyParam], priority: Option<i32>) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    for param in key {
        match param {
            MatchKeyParam::Exact(v) => {
                out.push(0);
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                out.extend_from_slice(v);
            }
            MatchKeyParam::Lpm(v, len) => {
                out.push(1);
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                out.extend_from_slice(v);
                out.extend_from_slice(&len.to_le_bytes());
            }
            MatchKeyParam::Ternary(v, m) => {
                out.push(2);
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                out.extend_from_slice(v);
                out.extend_from_slice(&(m.len() as u32).to_le_bytes());
                out.extend_from_slice(m);
            }
            MatchKeyParam::Range(lo, hi) => {
                out.push(3);
                out.extend_from_slice(&(lo.len() as u32).to_le_bytes());
                out.extend_from_slice(lo);
                out.extend_from_slice(&(hi.len() as u32).to_le_bytes());
                out.extend_from_slice(hi);
            }
            MatchKeyParam::Valid(b) => {
                out.push(4);
                out.push(u8::from(*b));
            }
        }
    }
    if let Some(p) = priority {
        out.extend_from_slice(&p.to_le_bytes());
    }
    out
}

impl MatchTable {
    /// Creates an empty table from its declaration, building the lookup
    /// structure through the factory.
    #[must_use]
    pub fn new(decl: TableDecl, factory: &dyn LookupFactory) -> Self {
        let lookup = factory.build(decl.match_kind);
        MatchTable {
            decl,
            state: Mutex::new(TableState {
                entries: FxHashMap::default(),
                lookup,
                next_handle: 0,
                default_target: None,
            }),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Table kind.
    #[must_use]
    pub fn kind(&self) -> TableKind {
        self.decl.kind
    }

    /// Match kind of the key.
    #[must_use]
    pub fn match_kind(&self) -> MatchKind {
        self.decl.match_kind
    }

    /// Static declaration.
    #[must_use]
    pub fn decl(&self) -> &TableDecl {
        &self.decl
    }

    /// Number of live entries.
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Removes every entry; also clears the default entry when asked.
    pub fn clear_entries(&self, reset_default_entry: bool) {
        let mut st = self.state.lock();
        st.entries.clear();
        st.lookup.clear();
        if reset_default_entry {
            st.default_target = None;
        }
    }

    fn effective_priority(&self, priority: Option<i32>) -> Result<Option<i32>, MatchError> {
        if self.decl.match_kind.needs_priority() {
            match priority {
                Some(p) => Ok(Some(p)),
                None => Err(MatchError::PriorityRequired),
            }
        } else {
            Ok(None)
        }
    }

    fn insert_entry(
        &self,
        key: Vec<MatchKeyParam>,
        priority: Option<i32>,
        target: EntryTarget,
    ) -> Result<EntryHandle, MatchError> {
        let priority = self.effective_priority(priority)?;
        let canon = canonical_key(&key, priority);
        let mut st = self.state.lock();
        if st.lookup.find(&canon).is_some() {
            return Err(MatchError::DuplicateEntry);
        }
        let raw = st.next_handle;
        st.next_handle += 1;
        st.lookup.insert(canon, raw);
        st.entries.insert(
            raw,
            Entry {
                handle: EntryHandle(raw),
                key,
                priority,
                target,
                bytes: 0,
                packets: 0,
                rates: Vec::new(),
                ttl_ms: None,
            },
        );
        Ok(EntryHandle(raw))
    }

    fn check_action(&self, action_name: &str) -> Result<(), MatchError> {
        if self.decl.actions.iter().any(|a| a == action_name) {
            Ok(())
        } else {
            Err(MatchError::ActionNotFound(action_name.to_string()))
        }
    }

    fn check_kind(&self, kind: TableKind) -> Result<(), MatchError> {
        if self.decl.kind == kind {
            Ok(())
        } else {
            Err(MatchError::WrongTableKind(self.decl.name.clone()))
        }
    }

    /// Adds a direct entry.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` on indirect tables, `ActionNotFound` for an unbound
    /// action, `PriorityRequired` for priority-ordered kinds without one,
    /// `DuplicateEntry` when the key is already present.
    pub fn add_entry(
        &self,
        key: Vec<MatchKeyParam>,
        action_name: &str,
        data: ActionData,
        priority: Option<i32>,
    ) -> Result<EntryHandle, MatchError> {
        self.check_kind(TableKind::Direct)?;
        self.check_action(action_name)?;
        self.insert_entry(
            key,
            priority,
            EntryTarget::Action {
                name: action_name.to_string(),
                data,
            },
        )
    }

    /// Sets the default action of a direct table.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` on indirect tables, `ActionNotFound` for an unbound
    /// action.
    pub fn set_default_action(&self, action_name: &str, data: ActionData) -> Result<(), MatchError> {
        self.check_kind(TableKind::Direct)?;
        self.check_action(action_name)?;
        self.state.lock().default_target = Some(EntryTarget::Action {
            name: action_name.to_string(),
            data,
        });
        Ok(())
    }

    /// Clears the default entry.
    pub fn reset_default_entry(&self) {
        self.state.lock().default_target = None;
    }

    /// Deletes an entry by handle.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` when the handle references no live entry.
    pub fn delete_entry(&self, handle: EntryHandle) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        let entry = st
            .entries
            .remove(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        let canon = canonical_key(&entry.key, entry.priority);
        st.lookup.remove(&canon);
        Ok(())
    }

    /// Rebinds a direct entry to a new action.
    ///
    /// # Errors
    ///
    /// `WrongTableKind`, `ActionNotFound`, or `InvalidHandle`.
    pub fn modify_entry(
        &self,
        handle: EntryHandle,
        action_name: &str,
        data: ActionData,
    ) -> Result<(), MatchError> {
        self.check_kind(TableKind::Direct)?;
        self.check_action(action_name)?;
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.target = EntryTarget::Action {
            name: action_name.to_string(),
            data,
        };
        Ok(())
    }

    /// Arms ageing for an entry.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` when the handle references no live entry.
    pub fn set_entry_ttl(&self, handle: EntryHandle, ttl_ms: u32) -> Result<(), MatchError> {
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.ttl_ms = Some(ttl_ms);
        Ok(())
    }

    /// Reads the direct counter of an entry as `(bytes, packets)`.
    ///
    /// # Errors
    ///
    /// `CountersDisabled` when the table has no direct counters,
    /// `InvalidHandle` otherwise.
    pub fn read_counters(&self, handle: EntryHandle) -> Result<(u64, u64), MatchError> {
        if !self.decl.with_counters {
            return Err(MatchError::CountersDisabled(self.decl.name.clone()));
        }
        let st = self.state.lock();
        let entry = st
            .entries
            .get(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        Ok((entry.bytes, entry.packets))
    }

    /// Zeroes every entry's direct counter.
    ///
    /// # Errors
    ///
    /// `CountersDisabled` when the table has no direct counters.
    pub fn reset_counters(&self) -> Result<(), MatchError> {
        if !self.decl.with_counters {
            return Err(MatchError::CountersDisabled(self.decl.name.clone()));
        }
        let mut st = self.state.lock();
        for entry in st.entries.values_mut() {
            entry.bytes = 0;
            entry.packets = 0;
        }
        Ok(())
    }

    /// Overwrites the direct counter of an entry.
    ///
    /// # Errors
    ///
    /// `CountersDisabled` or `InvalidHandle`.
    pub fn write_counters(
        &self,
        handle: EntryHandle,
        bytes: u64,
        packets: u64,
    ) -> Result<(), MatchError> {
        if !self.decl.with_counters {
            return Err(MatchError::CountersDisabled(self.decl.name.clone()));
        }
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.bytes = bytes;
        entry.packets = packets;
        Ok(())
    }

    /// Data-plane hit accounting: bumps the entry's direct counter.
    /// A miss on the handle is ignored; the entry may have been deleted
    /// between lookup and accounting.
    pub fn count_hit(&self, handle: EntryHandle, bytes: u64) {
        if !self.decl.with_counters {
            return;
        }
        let mut st = self.state.lock();
        if let Some(entry) = st.entries.get_mut(&handle.0) {
            entry.bytes += bytes;
            entry.packets += 1;
        }
    }

    /// Sets the direct meter rates of an entry.
    ///
    /// # Errors
    ///
    /// `MetersDisabled` or `InvalidHandle`.
    pub fn set_meter_rates(
        &self,
        handle: EntryHandle,
        rates: Vec<RateConfig>,
    ) -> Result<(), MatchError> {
        if !self.decl.with_meters {
            return Err(MatchError::MetersDisabled(self.decl.name.clone()));
        }
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.rates = rates;
        Ok(())
    }

    /// Reads the direct meter rates of an entry.
    ///
    /// # Errors
    ///
    /// `MetersDisabled` or `InvalidHandle`.
    pub fn get_meter_rates(&self, handle: EntryHandle) -> Result<Vec<RateConfig>, MatchError> {
        if !self.decl.with_meters {
            return Err(MatchError::MetersDisabled(self.decl.name.clone()));
        }
        let st = self.state.lock();
        let entry = st
            .entries
            .get(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        Ok(entry.rates.clone())
    }

    /// Clears the direct meter rates of an entry.
    ///
    /// # Errors
    ///
    /// `MetersDisabled` or `InvalidHandle`.
    pub fn reset_meter_rates(&self, handle: EntryHandle) -> Result<(), MatchError> {
        if !self.decl.with_meters {
            return Err(MatchError::MetersDisabled(self.decl.name.clone()));
        }
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.rates.clear();
        Ok(())
    }

    /// All live entries, in unspecified order.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().entries.values().cloned().collect()
    }

    /// Reads one entry by handle.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` when the handle references no live entry.
    pub fn entry(&self, handle: EntryHandle) -> Result<Entry, MatchError> {
        self.state
            .lock()
            .entries
            .get(&handle.0)
            .cloned()
            .ok_or(MatchError::InvalidHandle(handle))
    }

    /// Reads the default entry target.
    ///
    /// # Errors
    ///
    /// `NoDefaultEntry` when none is set.
    pub fn default_entry(&self) -> Result<EntryTarget, MatchError> {
        self.state
            .lock()
            .default_target
            .clone()
            .ok_or(MatchError::NoDefaultEntry)
    }

    /// Looks an entry up by its exact match key (and priority, where the
    /// match kind is priority-ordered).
    ///
    /// # Errors
    ///
    /// `PriorityRequired` or `BadMatchKey`.
    pub fn entry_from_key(
        &self,
        key: &[MatchKeyParam],
        priority: Option<i32>,
    ) -> Result<Entry, MatchError> {
        let priority = self.effective_priority(priority)?;
        let canon = canonical_key(key, priority);
        let st = self.state.lock();
        let raw = st.lookup.find(&canon).ok_or(MatchError::BadMatchKey)?;
        st.entries
            .get(&raw)
            .cloned()
            .ok_or(MatchError::BadMatchKey)
    }

    /// Adds an indirect entry pointing at a member.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` on direct tables, plus the `add_entry` errors.
    pub fn indirect_add_entry(
        &self,
        key: Vec<MatchKeyParam>,
        member: MemberHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle, MatchError> {
        if self.decl.kind == TableKind::Direct {
            return Err(MatchError::WrongTableKind(self.decl.name.clone()));
        }
        self.insert_entry(key, priority, EntryTarget::Member(member))
    }

    /// Repoints an indirect entry at another member.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` or `InvalidHandle`.
    pub fn indirect_modify_entry(
        &self,
        handle: EntryHandle,
        member: MemberHandle,
    ) -> Result<(), MatchError> {
        if self.decl.kind == TableKind::Direct {
            return Err(MatchError::WrongTableKind(self.decl.name.clone()));
        }
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.target = EntryTarget::Member(member);
        Ok(())
    }

    /// Sets the default member of an indirect table.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` on direct tables.
    pub fn indirect_set_default_member(&self, member: MemberHandle) -> Result<(), MatchError> {
        if self.decl.kind == TableKind::Direct {
            return Err(MatchError::WrongTableKind(self.decl.name.clone()));
        }
        self.state.lock().default_target = Some(EntryTarget::Member(member));
        Ok(())
    }

    /// Adds an indirect-ws entry pointing at a group.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` unless the table is indirect-with-selector, plus the
    /// `add_entry` errors.
    pub fn ws_add_entry(
        &self,
        key: Vec<MatchKeyParam>,
        group: GroupHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle, MatchError> {
        self.check_kind(TableKind::IndirectWs)?;
        self.insert_entry(key, priority, EntryTarget::Group(group))
    }

    /// Repoints an indirect-ws entry at another group.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` or `InvalidHandle`.
    pub fn ws_modify_entry(&self, handle: EntryHandle, group: GroupHandle) -> Result<(), MatchError> {
        self.check_kind(TableKind::IndirectWs)?;
        let mut st = self.state.lock();
        let entry = st
            .entries
            .get_mut(&handle.0)
            .ok_or(MatchError::InvalidHandle(handle))?;
        entry.target = EntryTarget::Group(group);
        Ok(())
    }

    /// Sets the default group of an indirect-ws table.
    ///
    /// # Errors
    ///
    /// `WrongTableKind` unless the table is indirect-with-selector.
    pub fn ws_set_default_group(&self, group: GroupHandle) -> Result<(), MatchError> {
        self.check_kind(TableKind::IndirectWs)?;
        self.state.lock().default_target = Some(EntryTarget::Group(group));
        Ok(())
    }

    /// Copies this table into a fresh one with identical declaration and
    /// entry state, rebuilding the lookup structure through the factory.
    /// Used when reconfiguration copies a staged table into the live graph.
    #[must_use]
    pub fn duplicate(&self, factory: &dyn LookupFactory) -> MatchTable {
        let st = self.state.lock();
        let mut lookup = factory.build(self.decl.match_kind);
        for entry in st.entries.values() {
            lookup.insert(canonical_key(&entry.key, entry.priority), entry.handle.0);
        }
        MatchTable {
            decl: self.decl.clone(),
            state: Mutex::new(TableState {
                entries: st.entries.clone(),
                lookup,
                next_handle: st.next_handle,
                default_target: st.default_target.clone(),
            }),
        }
    }

    /// Renames the table. Only used by reconfiguration when a staged table's
    /// name collides in the live graph.
    pub(crate) fn set_name(&mut self, name: String) {
        self.decl.name = name;
    }

    /// Snapshot of the mutable state for persistence: every entry plus the
    /// default target.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<Entry>, Option<EntryTarget>) {
        let st = self.state.lock();
        let mut entries: Vec<Entry> = st.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.handle.0);
        (entries, st.default_target.clone())
    }

    /// Replaces the mutable state from a snapshot, rebuilding the lookup
    /// structure in place.
    pub fn restore(&self, entries: Vec<Entry>, default_target: Option<EntryTarget>) {
        let mut st = self.state.lock();
        st.entries.clear();
        st.lookup.clear();
        let mut next = 0;
        for entry in entries {
            st.lookup
                .insert(canonical_key(&entry.key, entry.priority), entry.handle.0);
            next = next.max(entry.handle.0 + 1);
            st.entries.insert(entry.handle.0, entry);
        }
        st.next_handle = next;
        st.default_target = default_target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::DefaultLookupFactory;

    fn direct_table() -> MatchTable {
        MatchTable::new(
            TableDecl {
                name: "ipv4_lpm".to_string(),
                kind: TableKind::Direct,
                match_kind: MatchKind::Exact,
                actions: vec!["fwd".to_string(), "drop".to_string()],
                profile: None,
                with_counters: true,
                with_meters: true,
            },
            &DefaultLookupFactory,
        )
    }

    fn key(b: u8) -> Vec<MatchKeyParam> {
        vec![MatchKeyParam::Exact(vec![b])]
    }

    #[test]
    fn add_and_read_entry() {
        let t = direct_table();
        let h = t
            .add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
        assert_eq!(t.num_entries(), 1);
        let e = t.entry(h).unwrap();
        assert!(matches!(e.target, EntryTarget::Action { ref name, .. } if name == "fwd"));
        let again = t.entry_from_key(&key(1), None).unwrap();
        assert_eq!(again.handle, h);
    }

    #[test]
    fn duplicate_key_rejected() {
        let t = direct_table();
        t.add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
        let err = t
            .add_entry(key(1), "drop", ActionData::default(), None)
            .unwrap_err();
        assert_eq!(err, MatchError::DuplicateEntry);
    }

    #[test]
    fn unknown_action_rejected() {
        let t = direct_table();
        let err = t
            .add_entry(key(1), "mystery", ActionData::default(), None)
            .unwrap_err();
        assert!(matches!(err, MatchError::ActionNotFound(_)));
    }

    #[test]
    fn ternary_requires_priority() {
        let t = MatchTable::new(
            TableDecl {
                name: "acl".to_string(),
                kind: TableKind::Direct,
                match_kind: MatchKind::Ternary,
                actions: vec!["permit".to_string()],
                profile: None,
                with_counters: false,
                with_meters: false,
            },
            &DefaultLookupFactory,
        );
        let k = vec![MatchKeyParam::Ternary(vec![1], vec![0xff])];
        let err = t
            .add_entry(k.clone(), "permit", ActionData::default(), None)
            .unwrap_err();
        assert_eq!(err, MatchError::PriorityRequired);
        t.add_entry(k, "permit", ActionData::default(), Some(10))
            .unwrap();
    }

    #[test]
    fn delete_invalidates_handle() {
        let t = direct_table();
        let h = t
            .add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
        t.delete_entry(h).unwrap();
        assert_eq!(t.entry(h).unwrap_err(), MatchError::InvalidHandle(h));
        // key is free again
        t.add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
    }

    #[test]
    fn handles_not_reused() {
        let t = direct_table();
        let h1 = t
            .add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
        t.delete_entry(h1).unwrap();
        let h2 = t
            .add_entry(key(2), "fwd", ActionData::default(), None)
            .unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn counters_round_trip() {
        let t = direct_table();
        let h = t
            .add_entry(key(1), "fwd", ActionData::default(), None)
            .unwrap();
        t.count_hit(h, 64);
        t.count_hit(h, 128);
        assert_eq!(t.read_counters(h).unwrap(), (192, 2));
        t.write_counters(h, 5, 1).unwrap();
        assert_eq!(t.read_counters(h).unwrap(), (5, 1));
        t.reset_counters().unwrap();
        assert_eq!(t.read_counters(h).unwrap(), (0, 0));
    }

    #[test]
    fn indirect_ops_rejected_on_direct_table() {
        let t = direct_table();
        let err = t
            .indirect_add_entry(key(1), MemberHandle(0), None)
            .unwrap_err();
        assert!(matches!(err, MatchError::WrongTableKind(_)));
    }

    #[test]
    fn default_entry_lifecycle() {
        let t = direct_table();
        assert_eq!(t.default_entry().unwrap_err(), MatchError::NoDefaultEntry);
        t.set_default_action("drop", ActionData::default()).unwrap();
        assert!(matches!(
            t.default_entry().unwrap(),
            EntryTarget::Action { ref name, .. } if name == "drop"
        ));
        t.reset_default_entry();
        assert_eq!(t.default_entry().unwrap_err(), MatchError::NoDefaultEntry);
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let t = direct_table();
        let h = t
            .add_entry(key(7), "fwd", ActionData(vec![vec![9]]), None)
            .unwrap();
        t.set_default_action("drop", ActionData::default()).unwrap();
        t.write_counters(h, 10, 2).unwrap();

        let (entries, default_target) = t.snapshot();
        let fresh = direct_table();
        fresh.restore(entries, default_target);

        assert_eq!(fresh.num_entries(), 1);
        assert_eq!(fresh.read_counters(h).unwrap(), (10, 2));
        assert_eq!(fresh.entry_from_key(&key(7), None).unwrap().handle, h);
        // handle counter resumes past restored entries
        let h2 = fresh
            .add_entry(key(8), "fwd", ActionData::default(), None)
            .unwrap();
        assert!(h2.0 > h.0);
    }
}
