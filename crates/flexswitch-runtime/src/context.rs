//! A switch within the switch.
//!
//! A [`Context`] owns one live [`ConfigGraph`], an optional staged
//! replacement, and an optional in-progress edit session, all behind one
//! reader-writer lock. Data-plane lookups and entry-level control-plane
//! operations take the shared side; structure edits, swaps, and state
//! restores take the exclusive side.
//!
//! Contexts are independent: each can be programmed, swapped, and edited on
//! its own. The only cross-context machinery is the switch-level
//! packet-inflight barrier that full swaps take.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fxhash::FxHashSet;
use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock, RwLockReadGuard};

use flexswitch_core::action_profile::{Group, GroupHandle, GroupSelector, Member, MemberHandle};
use flexswitch_core::crc::CrcParams;
use flexswitch_core::graph::{
    load_config, ArithSpec, ConfigGraph, ExternInstance, FieldList,
};
use flexswitch_core::lookup::{DefaultLookupFactory, LookupFactory};
use flexswitch_core::reconfig::{
    apply_plan, parse_plan, EditSession, ReconfigError, RegisterChange,
};
use flexswitch_core::register::RateConfig;
use flexswitch_core::table::{
    ActionData, Entry, EntryHandle, EntryTarget, MatchError, MatchKeyParam, MatchTable, TableKind,
};

use crate::notify::{NotificationTransport, SwapNotification, SwapStatus};
use crate::registry::ComponentRegistry;
use crate::snapshot::StateSnapshot;
use crate::switch::SwapError;
use crate::{Error, Result};

/// Dense context id, assigned at switch construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

/// Device id of the switch a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// The three configuration slots, guarded by the context lock.
pub(crate) struct Slots {
    pub(crate) live: ConfigGraph,
    pub(crate) staged: Option<ConfigGraph>,
    pub(crate) edit: Option<EditSession>,
}

/// Loader inputs a context needs from its owning switch.
pub(crate) struct LoadEnv<'a> {
    pub(crate) required_fields: &'a FxHashSet<(String, String)>,
    pub(crate) arith: &'a ArithSpec,
    pub(crate) factory: &'a Arc<dyn LookupFactory>,
}

/// A lightweight view of a pipeline of the live configuration.
///
/// Views are data copies; they become stale (not dangling) after a full
/// swap, and the contract requires callers to re-acquire them then.
#[derive(Debug, Clone)]
pub struct PipelineView {
    /// Pipeline name.
    pub name: String,
    /// Init node name.
    pub init: Option<String>,
    /// Names of every node.
    pub nodes: Vec<String>,
}

/// Scoped access to an extern instance.
///
/// The lease holds the context's shared lock for as long as it exists, so a
/// full swap cannot replace the live graph underneath the caller. Dropping
/// the lease releases the lock on every exit path.
pub struct ExternLease {
    name: String,
    guard: ArcRwLockReadGuard<RawRwLock, Slots>,
}

impl ExternLease {
    /// The extern instance the lease was acquired for.
    #[must_use]
    pub fn instance(&self) -> &ExternInstance {
        // name validated at acquisition; the held lock keeps the graph alive
        self.guard
            .live
            .extern_instance(&self.name)
            .expect("extern validated at lease acquisition")
    }
}

/// A shared-lock view of the live configuration graph.
///
/// Hold it only for the duration of one packet or one read; a full swap
/// blocks while any view is outstanding.
pub struct LiveView<'a>(RwLockReadGuard<'a, Slots>);

impl std::ops::Deref for LiveView<'_> {
    type Target = ConfigGraph;

    fn deref(&self) -> &ConfigGraph {
        &self.0.live
    }
}

/// One live forwarding configuration plus the machinery to swap or edit it.
pub struct Context {
    id: ContextId,
    device_id: AtomicU64,
    slots: Arc<RwLock<Slots>>,
    swap_ordered: AtomicBool,
    transport: Arc<dyn NotificationTransport>,
    components: ComponentRegistry,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("swap_ordered", &self.swap_ordered.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// the runtime ops are thin dispatches; their error surfaces are the
// underlying object errors, documented on the core types
#[allow(clippy::missing_errors_doc)]
impl Context {
    pub(crate) fn new(id: ContextId, transport: Arc<dyn NotificationTransport>) -> Self {
        let factory: Arc<dyn LookupFactory> = Arc::new(DefaultLookupFactory);
        Context {
            id,
            device_id: AtomicU64::new(0),
            slots: Arc::new(RwLock::new(Slots {
                live: ConfigGraph::empty(factory),
                staged: None,
                edit: None,
            })),
            swap_ordered: AtomicBool::new(false),
            transport,
            components: ComponentRegistry::new(),
        }
    }

    /// Context id.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn set_device_id(&self, device_id: DeviceId) {
        self.device_id.store(device_id.0, Ordering::SeqCst);
    }

    /// Per-context component registry.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Shared-lock view of the live graph, for data-plane walks and tests.
    #[must_use]
    pub fn live(&self) -> LiveView<'_> {
        LiveView(self.slots.read())
    }

    /// Whether a swap has been ordered and not yet committed.
    #[must_use]
    pub fn swap_requested(&self) -> bool {
        self.swap_ordered.load(Ordering::SeqCst)
    }

    fn notify(&self, status: SwapStatus) {
        let note = SwapNotification {
            device_id: self.device_id.load(Ordering::SeqCst),
            context_id: self.id.0,
            status,
        };
        if let Err(e) = self.transport.send(&note) {
            tracing::warn!("dropping swap notification for {}: {e}", self.id);
        }
    }

    // ---------- object views ----------

    /// View of a pipeline of the live graph, or `None` if absent.
    #[must_use]
    pub fn get_pipeline(&self, name: &str) -> Option<PipelineView> {
        let slots = self.slots.read();
        let pipeline = slots.live.pipeline(name)?;
        Some(PipelineView {
            name: pipeline.name().to_string(),
            init: pipeline.init().map(str::to_string),
            nodes: pipeline.nodes().map(|n| n.name().to_string()).collect(),
        })
    }

    /// The parser's name back, or `None` if the live graph declares no such
    /// parser.
    #[must_use]
    pub fn get_parser(&self, name: &str) -> Option<String> {
        let slots = self.slots.read();
        slots.live.has_parser(name).then(|| name.to_string())
    }

    /// The deparser's name back, or `None` if absent.
    #[must_use]
    pub fn get_deparser(&self, name: &str) -> Option<String> {
        let slots = self.slots.read();
        slots.live.has_deparser(name).then(|| name.to_string())
    }

    /// A field list of the live graph, or `None` if absent.
    #[must_use]
    pub fn get_field_list(&self, id: u32) -> Option<FieldList> {
        self.slots.read().live.field_list(id).cloned()
    }

    /// Scoped access to an extern instance, or `None` if absent.
    ///
    /// The returned lease holds the context's shared lock; a swap is
    /// blocked while any lease is outstanding.
    #[must_use]
    pub fn get_extern_instance(&self, name: &str) -> Option<ExternLease> {
        let guard = RwLock::read_arc(&self.slots);
        if guard.live.extern_instance(name).is_none() {
            return None;
        }
        Some(ExternLease {
            name: name.to_string(),
            guard,
        })
    }

    /// Target-specific options of the live configuration.
    #[must_use]
    pub fn config_options(&self) -> Vec<(String, String)> {
        let slots = self.slots.read();
        let mut options: Vec<(String, String)> = slots
            .live
            .config_options()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        options.sort();
        options
    }

    /// Whether `header.field` exists in the live configuration.
    #[must_use]
    pub fn field_exists(&self, header: &str, field: &str) -> bool {
        self.slots.read().live.field_exists(header, field)
    }

    // ---------- runtime interfaces ----------

    fn with_table<R>(
        &self,
        name: &str,
        f: impl FnOnce(&MatchTable) -> std::result::Result<R, MatchError>,
    ) -> Result<R> {
        let slots = self.slots.read();
        let table = slots
            .live
            .table(name)
            .ok_or_else(|| MatchError::TableNotFound(name.to_string()))?;
        f(table).map_err(Error::from)
    }

    fn with_profile<R>(
        &self,
        name: &str,
        f: impl FnOnce(&flexswitch_core::action_profile::ActionProfile) -> std::result::Result<R, MatchError>,
    ) -> Result<R> {
        let slots = self.slots.read();
        let profile = slots
            .live
            .action_profile(name)
            .ok_or_else(|| MatchError::ProfileNotFound(name.to_string()))?;
        f(profile).map_err(Error::from)
    }

    /// Number of entries in a table.
    pub fn mt_get_num_entries(&self, table: &str) -> Result<usize> {
        self.with_table(table, |t| Ok(t.num_entries()))
    }

    /// Removes every entry of a table.
    pub fn mt_clear_entries(&self, table: &str, reset_default_entry: bool) -> Result<()> {
        self.with_table(table, |t| {
            t.clear_entries(reset_default_entry);
            Ok(())
        })
    }

    /// Adds a direct entry.
    pub fn mt_add_entry(
        &self,
        table: &str,
        key: Vec<MatchKeyParam>,
        action: &str,
        data: ActionData,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.with_table(table, |t| t.add_entry(key, action, data, priority))
    }

    /// Sets a table's default action.
    pub fn mt_set_default_action(
        &self,
        table: &str,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.with_table(table, |t| t.set_default_action(action, data))
    }

    /// Clears a table's default entry.
    pub fn mt_reset_default_entry(&self, table: &str) -> Result<()> {
        self.with_table(table, |t| {
            t.reset_default_entry();
            Ok(())
        })
    }

    /// Deletes an entry by handle.
    pub fn mt_delete_entry(&self, table: &str, handle: EntryHandle) -> Result<()> {
        self.with_table(table, |t| t.delete_entry(handle))
    }

    /// Rebinds an entry to a new action.
    pub fn mt_modify_entry(
        &self,
        table: &str,
        handle: EntryHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.with_table(table, |t| t.modify_entry(handle, action, data))
    }

    /// Arms ageing for an entry.
    pub fn mt_set_entry_ttl(&self, table: &str, handle: EntryHandle, ttl_ms: u32) -> Result<()> {
        self.with_table(table, |t| t.set_entry_ttl(handle, ttl_ms))
    }

    /// Reads an entry's direct counter.
    pub fn mt_read_counters(&self, table: &str, handle: EntryHandle) -> Result<(u64, u64)> {
        self.with_table(table, |t| t.read_counters(handle))
    }

    /// Zeroes a table's direct counters.
    pub fn mt_reset_counters(&self, table: &str) -> Result<()> {
        self.with_table(table, MatchTable::reset_counters)
    }

    /// Overwrites an entry's direct counter.
    pub fn mt_write_counters(
        &self,
        table: &str,
        handle: EntryHandle,
        bytes: u64,
        packets: u64,
    ) -> Result<()> {
        self.with_table(table, |t| t.write_counters(handle, bytes, packets))
    }

    /// Sets an entry's direct meter rates.
    pub fn mt_set_meter_rates(
        &self,
        table: &str,
        handle: EntryHandle,
        rates: Vec<RateConfig>,
    ) -> Result<()> {
        self.with_table(table, |t| t.set_meter_rates(handle, rates))
    }

    /// Reads an entry's direct meter rates.
    pub fn mt_get_meter_rates(&self, table: &str, handle: EntryHandle) -> Result<Vec<RateConfig>> {
        self.with_table(table, |t| t.get_meter_rates(handle))
    }

    /// Clears an entry's direct meter rates.
    pub fn mt_reset_meter_rates(&self, table: &str, handle: EntryHandle) -> Result<()> {
        self.with_table(table, |t| t.reset_meter_rates(handle))
    }

    /// A table's kind.
    pub fn mt_get_type(&self, table: &str) -> Result<TableKind> {
        self.with_table(table, |t| Ok(t.kind()))
    }

    /// Every entry of a table.
    pub fn mt_get_entries(&self, table: &str) -> Result<Vec<Entry>> {
        self.with_table(table, |t| Ok(t.entries()))
    }

    /// One entry by handle.
    pub fn mt_get_entry(&self, table: &str, handle: EntryHandle) -> Result<Entry> {
        self.with_table(table, |t| t.entry(handle))
    }

    /// A table's default entry target.
    pub fn mt_get_default_entry(&self, table: &str) -> Result<EntryTarget> {
        self.with_table(table, MatchTable::default_entry)
    }

    /// An entry looked up by match key.
    pub fn mt_get_entry_from_key(
        &self,
        table: &str,
        key: &[MatchKeyParam],
        priority: Option<i32>,
    ) -> Result<Entry> {
        self.with_table(table, |t| t.entry_from_key(key, priority))
    }

    // action profiles

    /// Adds a member to an action profile.
    pub fn mt_act_prof_add_member(
        &self,
        profile: &str,
        action: &str,
        data: ActionData,
    ) -> Result<MemberHandle> {
        self.with_profile(profile, |p| p.add_member(action, data))
    }

    /// Deletes a member.
    pub fn mt_act_prof_delete_member(&self, profile: &str, member: MemberHandle) -> Result<()> {
        self.with_profile(profile, |p| p.delete_member(member))
    }

    /// Rebinds a member.
    pub fn mt_act_prof_modify_member(
        &self,
        profile: &str,
        member: MemberHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.with_profile(profile, |p| p.modify_member(member, action, data))
    }

    /// Creates a group.
    pub fn mt_act_prof_create_group(&self, profile: &str) -> Result<GroupHandle> {
        self.with_profile(profile, |p| Ok(p.create_group()))
    }

    /// Deletes a group.
    pub fn mt_act_prof_delete_group(&self, profile: &str, group: GroupHandle) -> Result<()> {
        self.with_profile(profile, |p| p.delete_group(group))
    }

    /// Adds a member to a group.
    pub fn mt_act_prof_add_member_to_group(
        &self,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.with_profile(profile, |p| p.add_member_to_group(member, group))
    }

    /// Removes a member from a group.
    pub fn mt_act_prof_remove_member_from_group(
        &self,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.with_profile(profile, |p| p.remove_member_from_group(member, group))
    }

    /// Every member of a profile.
    pub fn mt_act_prof_get_members(&self, profile: &str) -> Result<Vec<Member>> {
        self.with_profile(profile, |p| Ok(p.members()))
    }

    /// One member by handle.
    pub fn mt_act_prof_get_member(&self, profile: &str, member: MemberHandle) -> Result<Member> {
        self.with_profile(profile, |p| p.member(member))
    }

    /// Every group of a profile.
    pub fn mt_act_prof_get_groups(&self, profile: &str) -> Result<Vec<Group>> {
        self.with_profile(profile, |p| Ok(p.groups()))
    }

    /// One group by handle.
    pub fn mt_act_prof_get_group(&self, profile: &str, group: GroupHandle) -> Result<Group> {
        self.with_profile(profile, |p| p.group(group))
    }

    /// Replaces a profile's group-selection policy.
    pub fn set_group_selector(
        &self,
        profile: &str,
        selector: Arc<dyn GroupSelector>,
    ) -> Result<()> {
        self.with_profile(profile, |p| {
            p.set_group_selector(selector);
            Ok(())
        })
    }

    // indirect tables

    /// Adds an indirect entry pointing at a member.
    pub fn mt_indirect_add_entry(
        &self,
        table: &str,
        key: Vec<MatchKeyParam>,
        member: MemberHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.with_table(table, |t| t.indirect_add_entry(key, member, priority))
    }

    /// Repoints an indirect entry.
    pub fn mt_indirect_modify_entry(
        &self,
        table: &str,
        handle: EntryHandle,
        member: MemberHandle,
    ) -> Result<()> {
        self.with_table(table, |t| t.indirect_modify_entry(handle, member))
    }

    /// Deletes an indirect entry.
    pub fn mt_indirect_delete_entry(&self, table: &str, handle: EntryHandle) -> Result<()> {
        self.with_table(table, |t| t.delete_entry(handle))
    }

    /// Arms ageing for an indirect entry.
    pub fn mt_indirect_set_entry_ttl(
        &self,
        table: &str,
        handle: EntryHandle,
        ttl_ms: u32,
    ) -> Result<()> {
        self.with_table(table, |t| t.set_entry_ttl(handle, ttl_ms))
    }

    /// Sets an indirect table's default member.
    pub fn mt_indirect_set_default_member(&self, table: &str, member: MemberHandle) -> Result<()> {
        self.with_table(table, |t| t.indirect_set_default_member(member))
    }

    /// Clears an indirect table's default entry.
    pub fn mt_indirect_reset_default_entry(&self, table: &str) -> Result<()> {
        self.with_table(table, |t| {
            t.reset_default_entry();
            Ok(())
        })
    }

    /// Adds an indirect-ws entry pointing at a group.
    pub fn mt_indirect_ws_add_entry(
        &self,
        table: &str,
        key: Vec<MatchKeyParam>,
        group: GroupHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.with_table(table, |t| t.ws_add_entry(key, group, priority))
    }

    /// Repoints an indirect-ws entry at another group.
    pub fn mt_indirect_ws_modify_entry(
        &self,
        table: &str,
        handle: EntryHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.with_table(table, |t| t.ws_modify_entry(handle, group))
    }

    /// Sets an indirect-ws table's default group.
    pub fn mt_indirect_ws_set_default_group(&self, table: &str, group: GroupHandle) -> Result<()> {
        self.with_table(table, |t| t.ws_set_default_group(group))
    }

    // bare counters / meters / registers / parse vsets

    /// Reads a counter cell.
    pub fn read_counters(&self, counter: &str, idx: usize) -> Result<(u64, u64)> {
        let slots = self.slots.read();
        let array = slots
            .live
            .counter_array(counter)
            .ok_or_else(|| flexswitch_core::register::CounterError::NotFound(counter.to_string()))?;
        array.read(idx).map_err(Error::from)
    }

    /// Zeroes a counter array.
    pub fn reset_counters(&self, counter: &str) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .counter_array(counter)
            .ok_or_else(|| flexswitch_core::register::CounterError::NotFound(counter.to_string()))?;
        array.reset();
        Ok(())
    }

    /// Overwrites a counter cell.
    pub fn write_counters(
        &self,
        counter: &str,
        idx: usize,
        bytes: u64,
        packets: u64,
    ) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .counter_array(counter)
            .ok_or_else(|| flexswitch_core::register::CounterError::NotFound(counter.to_string()))?;
        array.write(idx, bytes, packets).map_err(Error::from)
    }

    /// Configures every meter cell of an array.
    pub fn meter_array_set_rates(&self, meter: &str, rates: &[RateConfig]) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .meter_array(meter)
            .ok_or_else(|| flexswitch_core::register::MeterError::NotFound(meter.to_string()))?;
        array.set_array_rates(rates).map_err(Error::from)
    }

    /// Configures one meter cell.
    pub fn meter_set_rates(&self, meter: &str, idx: usize, rates: &[RateConfig]) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .meter_array(meter)
            .ok_or_else(|| flexswitch_core::register::MeterError::NotFound(meter.to_string()))?;
        array.set_rates(idx, rates).map_err(Error::from)
    }

    /// Reads one meter cell's rates.
    pub fn meter_get_rates(&self, meter: &str, idx: usize) -> Result<Vec<RateConfig>> {
        let slots = self.slots.read();
        let array = slots
            .live
            .meter_array(meter)
            .ok_or_else(|| flexswitch_core::register::MeterError::NotFound(meter.to_string()))?;
        array.get_rates(idx).map_err(Error::from)
    }

    /// Clears one meter cell.
    pub fn meter_reset_rates(&self, meter: &str, idx: usize) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .meter_array(meter)
            .ok_or_else(|| flexswitch_core::register::MeterError::NotFound(meter.to_string()))?;
        array.reset_rates(idx).map_err(Error::from)
    }

    /// Reads a register cell.
    pub fn register_read(&self, register: &str, idx: usize) -> Result<u64> {
        let slots = self.slots.read();
        let array = slots
            .live
            .register_array(register)
            .ok_or_else(|| flexswitch_core::register::RegisterError::NotFound(register.to_string()))?;
        array.read(idx).map_err(Error::from)
    }

    /// Reads every register cell in one consistent pass.
    pub fn register_read_all(&self, register: &str) -> Result<Vec<u64>> {
        let slots = self.slots.read();
        let array = slots
            .live
            .register_array(register)
            .ok_or_else(|| flexswitch_core::register::RegisterError::NotFound(register.to_string()))?;
        Ok(array.read_all())
    }

    /// Writes a register cell.
    pub fn register_write(&self, register: &str, idx: usize, value: u64) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .register_array(register)
            .ok_or_else(|| flexswitch_core::register::RegisterError::NotFound(register.to_string()))?;
        array.write(idx, value).map_err(Error::from)
    }

    /// Writes a register range `[start, end)` to one value.
    pub fn register_write_range(
        &self,
        register: &str,
        start: usize,
        end: usize,
        value: u64,
    ) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .register_array(register)
            .ok_or_else(|| flexswitch_core::register::RegisterError::NotFound(register.to_string()))?;
        array.write_range(start, end, value).map_err(Error::from)
    }

    /// Zeroes a register array.
    pub fn register_reset(&self, register: &str) -> Result<()> {
        let slots = self.slots.read();
        let array = slots
            .live
            .register_array(register)
            .ok_or_else(|| flexswitch_core::register::RegisterError::NotFound(register.to_string()))?;
        array.reset();
        Ok(())
    }

    /// Adds a value to a parse value set.
    pub fn parse_vset_add(&self, vset: &str, value: Vec<u8>) -> Result<()> {
        let slots = self.slots.read();
        let set = slots
            .live
            .parse_vset(vset)
            .ok_or_else(|| flexswitch_core::register::VsetError::NotFound(vset.to_string()))?;
        set.add(value);
        Ok(())
    }

    /// Removes a value from a parse value set.
    pub fn parse_vset_remove(&self, vset: &str, value: &[u8]) -> Result<()> {
        let slots = self.slots.read();
        let set = slots
            .live
            .parse_vset(vset)
            .ok_or_else(|| flexswitch_core::register::VsetError::NotFound(vset.to_string()))?;
        set.remove(value);
        Ok(())
    }

    /// Every value of a parse value set.
    pub fn parse_vset_get(&self, vset: &str) -> Result<Vec<Vec<u8>>> {
        let slots = self.slots.read();
        let set = slots
            .live
            .parse_vset(vset)
            .ok_or_else(|| flexswitch_core::register::VsetError::NotFound(vset.to_string()))?;
        Ok(set.get())
    }

    /// Clears a parse value set.
    pub fn parse_vset_clear(&self, vset: &str) -> Result<()> {
        let slots = self.slots.read();
        let set = slots
            .live
            .parse_vset(vset)
            .ok_or_else(|| flexswitch_core::register::VsetError::NotFound(vset.to_string()))?;
        set.clear();
        Ok(())
    }

    /// Replaces a 16-bit CRC calculator's parameters.
    pub fn set_crc16_custom_parameters(&self, calc: &str, params: CrcParams<u16>) -> Result<()> {
        let slots = self.slots.read();
        let calculator = slots
            .live
            .crc_calculator(calc)
            .ok_or_else(|| flexswitch_core::crc::CrcError::CalcNotFound(calc.to_string()))?;
        calculator.set_crc16_params(params).map_err(Error::from)
    }

    /// Replaces a 32-bit CRC calculator's parameters.
    pub fn set_crc32_custom_parameters(&self, calc: &str, params: CrcParams<u32>) -> Result<()> {
        let slots = self.slots.read();
        let calculator = slots
            .live
            .crc_calculator(calc)
            .ok_or_else(|| flexswitch_core::crc::CrcError::CalcNotFound(calc.to_string()))?;
        calculator.set_crc32_params(params).map_err(Error::from)
    }

    // ---------- configuration lifecycle ----------

    pub(crate) fn init_objects(&self, env: &LoadEnv<'_>, bytes: &[u8]) -> Result<()> {
        let graph = load_config(bytes, env.required_fields, env.arith, env.factory)?;
        let mut slots = self.slots.write();
        slots.live = graph;
        Ok(())
    }

    pub(crate) fn load_new_config(&self, env: &LoadEnv<'_>, bytes: &[u8]) -> Result<()> {
        {
            let mut slots = self.slots.write();
            if slots.staged.is_some() {
                return Err(SwapError::OngoingSwap.into());
            }
            let graph = load_config(bytes, env.required_fields, env.arith, env.factory)?;
            slots.staged = Some(graph);
        }
        self.swap_ordered.store(true, Ordering::SeqCst);
        self.notify(SwapStatus::NewConfigLoaded);
        Ok(())
    }

    pub(crate) fn order_swap(&self) -> Result<()> {
        {
            let slots = self.slots.read();
            if slots.staged.is_none() {
                return Err(SwapError::NoOngoingSwap.into());
            }
        }
        self.swap_ordered.store(true, Ordering::SeqCst);
        self.notify(SwapStatus::SwapRequested);
        Ok(())
    }

    /// Commits an ordered swap. Returns whether a swap happened. The caller
    /// holds the packet-inflight barrier.
    pub(crate) fn do_swap(&self) -> bool {
        if !self.swap_ordered.load(Ordering::SeqCst) {
            return false;
        }
        {
            let mut slots = self.slots.write();
            let Some(new_live) = slots.staged.take() else {
                self.swap_ordered.store(false, Ordering::SeqCst);
                return false;
            };
            slots.live = new_live;
        }
        self.swap_ordered.store(false, Ordering::SeqCst);
        self.notify(SwapStatus::SwapCompleted);
        true
    }

    /// Discards all runtime state of the live graph. A pending staged
    /// configuration is dropped, cancelling the swap.
    pub fn reset_state(&self) {
        let cancelled = {
            let mut slots = self.slots.write();
            slots.live.reset_state();
            slots.staged.take().is_some()
        };
        if cancelled {
            self.swap_ordered.store(false, Ordering::SeqCst);
            self.notify(SwapStatus::SwapCancelled);
        }
    }

    /// Writes the live configuration's mutable state.
    pub fn serialize_state(&self, out: &mut dyn std::io::Write) -> Result<()> {
        let slots = self.slots.write();
        StateSnapshot::capture(&slots.live)
            .write(out)
            .map_err(Error::from)
    }

    /// Restores mutable state written by [`Context::serialize_state`].
    /// The live graph must be structurally equivalent to the one the
    /// snapshot was captured from.
    pub fn deserialize_state(&self, input: &mut dyn std::io::Read) -> Result<()> {
        let snapshot = StateSnapshot::read(input).map_err(Error::from)?;
        let slots = self.slots.write();
        snapshot.apply(&slots.live).map_err(Error::from)
    }

    // ---------- incremental reconfiguration ----------

    fn edit_parts(slots: &mut Slots) -> (&mut ConfigGraph, &mut EditSession) {
        if slots.edit.is_none() {
            let factory = Arc::clone(slots.live.factory());
            slots.edit = Some(EditSession::new(ConfigGraph::empty(factory)));
        }
        match slots.edit {
            Some(ref mut session) => (&mut slots.live, session),
            None => unreachable!("edit session ensured above"),
        }
    }

    /// Loads the staging graph `new_` material is drawn from, opening a
    /// fresh edit session.
    pub(crate) fn reconfig_init_staging(&self, env: &LoadEnv<'_>, bytes: &[u8]) -> Result<()> {
        let staging = load_config(bytes, env.required_fields, env.arith, env.factory)
            .map_err(ReconfigError::Staging)?;
        let mut slots = self.slots.write();
        slots.edit = Some(EditSession::new(staging));
        Ok(())
    }

    /// Copies a staged table into the live graph.
    pub fn reconfig_insert_table(&self, pipeline: &str, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session.insert_table(live, pipeline, id).map_err(Error::from)
    }

    /// Rewrites one labeled edge of a table.
    pub fn reconfig_change_table(
        &self,
        pipeline: &str,
        id: &str,
        label: &str,
        next_id: &str,
    ) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .change_table(live, pipeline, id, label, next_id)
            .map_err(Error::from)
    }

    /// Removes a table from the live graph.
    pub fn reconfig_delete_table(&self, pipeline: &str, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session.delete_table(live, pipeline, id).map_err(Error::from)
    }

    /// Copies a staged conditional into the live graph.
    pub fn reconfig_insert_conditional(&self, pipeline: &str, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .insert_conditional(live, pipeline, id)
            .map_err(Error::from)
    }

    /// Rewrites a conditional's true or false successor.
    pub fn reconfig_change_conditional(
        &self,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .change_branch(live, pipeline, id, true_branch, next_id)
            .map_err(Error::from)
    }

    /// Removes a conditional from the live graph.
    pub fn reconfig_delete_conditional(&self, pipeline: &str, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .delete_conditional(live, pipeline, id)
            .map_err(Error::from)
    }

    /// Creates a flex node with both successors.
    pub fn reconfig_insert_flex(
        &self,
        pipeline: &str,
        id: &str,
        true_id: &str,
        false_id: &str,
    ) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .insert_flex(live, pipeline, id, true_id, false_id)
            .map_err(Error::from)
    }

    /// Rewrites a flex node's true or false successor. Flex nodes share the
    /// conditional edge model.
    pub fn reconfig_change_flex(
        &self,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .change_branch(live, pipeline, id, true_branch, next_id)
            .map_err(Error::from)
    }

    /// Removes a flex node from the live graph.
    pub fn reconfig_delete_flex(&self, pipeline: &str, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session.delete_flex(live, pipeline, id).map_err(Error::from)
    }

    /// Creates a register array.
    pub fn reconfig_insert_register_array(
        &self,
        id: &str,
        size: usize,
        bitwidth: u32,
    ) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .insert_register_array(live, id, size, bitwidth)
            .map_err(Error::from)
    }

    /// Resizes (`change_type == 0`) or re-widths (`change_type == 1`) a
    /// register array.
    pub fn reconfig_change_register_array(
        &self,
        id: &str,
        change_type: u32,
        value: u32,
    ) -> Result<()> {
        let change = match change_type {
            0 => RegisterChange::Resize(value as usize),
            1 => RegisterChange::Bitwidth(value),
            other => {
                return Err(
                    ReconfigError::InvalidCommand(format!("register change type {other}")).into(),
                )
            }
        };
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .change_register_array(live, id, change)
            .map_err(Error::from)
    }

    /// Rebinds a register array's hash calculation.
    pub fn reconfig_change_register_hash(&self, id: &str, calc: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .change_register_hash(live, id, calc)
            .map_err(Error::from)
    }

    /// Removes a register array.
    pub fn reconfig_delete_register_array(&self, id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session
            .delete_register_array(live, id)
            .map_err(Error::from)
    }

    /// Repoints a pipeline's init node.
    pub fn reconfig_change_init(&self, pipeline: &str, next_id: &str) -> Result<()> {
        let mut guard = self.slots.write();
        let (live, session) = Self::edit_parts(&mut guard);
        session.change_init(live, pipeline, next_id).map_err(Error::from)
    }

    /// Arms (`on = true`) or disarms flex nodes. A negative `number` selects
    /// every flex node; a non-negative one only nodes with that mount-point
    /// tag. Arming ends the edit session: the staged edits are now live and
    /// the id map empties.
    pub fn reconfig_trigger(&self, on: bool, number: i32) {
        let filter = u32::try_from(number).ok();
        let mut slots = self.slots.write();
        slots.live.flex_trigger(on, filter);
        if on {
            slots.edit = None;
        }
    }

    /// Runs a whole plan: loads the staging graph, applies each command,
    /// and ends the edit session if the plan armed a trigger.
    pub(crate) fn run_reconfig_plan(
        &self,
        env: &LoadEnv<'_>,
        staging_bytes: &[u8],
        plan_text: &str,
    ) -> Result<()> {
        let commands = parse_plan(plan_text)?;
        let staging = load_config(staging_bytes, env.required_fields, env.arith, env.factory)
            .map_err(ReconfigError::Staging)?;
        let mut guard = self.slots.write();
        let slots = &mut *guard;
        slots.edit = Some(EditSession::new(staging));
        let (live, session) = Self::edit_parts(slots);
        let triggered_on = apply_plan(live, session, &commands)?;
        if triggered_on {
            slots.edit = None;
        }
        Ok(())
    }

    /// Whether an edit session is open (testing and diagnostics).
    #[must_use]
    pub fn edit_session_open(&self) -> bool {
        self.slots.read().edit.is_some()
    }
}
