//! The uniform control-plane facade.
//!
//! [`RuntimeControl`] is the complete operation surface an RPC layer (or a
//! CLI, or a test harness) programs the switch through. Every call names a
//! context first and delegates into it; a bad context id fails with the
//! out-of-range error before anything else is looked at.

use std::sync::Arc;

use flexswitch_core::action_profile::{Group, GroupHandle, GroupSelector, Member, MemberHandle};
use flexswitch_core::crc::CrcParams;
use flexswitch_core::register::RateConfig;
use flexswitch_core::table::{ActionData, Entry, EntryHandle, EntryTarget, MatchKeyParam, TableKind};

use crate::context::ContextId;
use crate::switch::SwitchCore;
use crate::Result;

/// The control-plane operation surface of a switch.
///
/// Implemented by [`SwitchCore`]; kept as a trait so RPC endpoints can be
/// written against the surface without a concrete switch in hand.
#[allow(clippy::missing_errors_doc)]
pub trait RuntimeControl {
    // match tables

    /// Number of entries in a table.
    fn mt_get_num_entries(&self, cxt: ContextId, table: &str) -> Result<usize>;
    /// Removes every entry of a table.
    fn mt_clear_entries(&self, cxt: ContextId, table: &str, reset_default_entry: bool) -> Result<()>;
    /// Adds a direct entry; returns its handle.
    fn mt_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        action: &str,
        data: ActionData,
        priority: Option<i32>,
    ) -> Result<EntryHandle>;
    /// Sets a table's default action.
    fn mt_set_default_action(
        &self,
        cxt: ContextId,
        table: &str,
        action: &str,
        data: ActionData,
    ) -> Result<()>;
    /// Clears a table's default entry.
    fn mt_reset_default_entry(&self, cxt: ContextId, table: &str) -> Result<()>;
    /// Deletes an entry.
    fn mt_delete_entry(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<()>;
    /// Rebinds an entry to a new action.
    fn mt_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()>;
    /// Arms ageing for an entry.
    fn mt_set_entry_ttl(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        ttl_ms: u32,
    ) -> Result<()>;
    /// Reads an entry's direct counter as `(bytes, packets)`.
    fn mt_read_counters(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<(u64, u64)>;
    /// Zeroes a table's direct counters.
    fn mt_reset_counters(&self, cxt: ContextId, table: &str) -> Result<()>;
    /// Overwrites an entry's direct counter.
    fn mt_write_counters(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        bytes: u64,
        packets: u64,
    ) -> Result<()>;
    /// Sets an entry's direct meter rates.
    fn mt_set_meter_rates(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        rates: Vec<RateConfig>,
    ) -> Result<()>;
    /// Reads an entry's direct meter rates.
    fn mt_get_meter_rates(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<Vec<RateConfig>>;
    /// Clears an entry's direct meter rates.
    fn mt_reset_meter_rates(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<()>;
    /// A table's kind.
    fn mt_get_type(&self, cxt: ContextId, table: &str) -> Result<TableKind>;
    /// Every entry of a table.
    fn mt_get_entries(&self, cxt: ContextId, table: &str) -> Result<Vec<Entry>>;
    /// One entry by handle.
    fn mt_get_entry(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<Entry>;
    /// A table's default entry target.
    fn mt_get_default_entry(&self, cxt: ContextId, table: &str) -> Result<EntryTarget>;
    /// An entry looked up by match key.
    fn mt_get_entry_from_key(
        &self,
        cxt: ContextId,
        table: &str,
        key: &[MatchKeyParam],
        priority: Option<i32>,
    ) -> Result<Entry>;

    // action profiles

    /// Adds a member to an action profile; returns its handle.
    fn mt_act_prof_add_member(
        &self,
        cxt: ContextId,
        profile: &str,
        action: &str,
        data: ActionData,
    ) -> Result<MemberHandle>;
    /// Deletes a member.
    fn mt_act_prof_delete_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
    ) -> Result<()>;
    /// Rebinds a member.
    fn mt_act_prof_modify_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()>;
    /// Creates a group; returns its handle.
    fn mt_act_prof_create_group(&self, cxt: ContextId, profile: &str) -> Result<GroupHandle>;
    /// Deletes a group.
    fn mt_act_prof_delete_group(
        &self,
        cxt: ContextId,
        profile: &str,
        group: GroupHandle,
    ) -> Result<()>;
    /// Adds a member to a group.
    fn mt_act_prof_add_member_to_group(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()>;
    /// Removes a member from a group.
    fn mt_act_prof_remove_member_from_group(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()>;
    /// Every member of a profile.
    fn mt_act_prof_get_members(&self, cxt: ContextId, profile: &str) -> Result<Vec<Member>>;
    /// One member by handle.
    fn mt_act_prof_get_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
    ) -> Result<Member>;
    /// Every group of a profile.
    fn mt_act_prof_get_groups(&self, cxt: ContextId, profile: &str) -> Result<Vec<Group>>;
    /// One group by handle.
    fn mt_act_prof_get_group(
        &self,
        cxt: ContextId,
        profile: &str,
        group: GroupHandle,
    ) -> Result<Group>;
    /// Replaces a profile's group-selection policy.
    fn set_group_selector(
        &self,
        cxt: ContextId,
        profile: &str,
        selector: Arc<dyn GroupSelector>,
    ) -> Result<()>;

    // indirect tables

    /// Adds an indirect entry pointing at a member.
    fn mt_indirect_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        member: MemberHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle>;
    /// Repoints an indirect entry.
    fn mt_indirect_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        member: MemberHandle,
    ) -> Result<()>;
    /// Deletes an indirect entry.
    fn mt_indirect_delete_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<()>;
    /// Arms ageing for an indirect entry.
    fn mt_indirect_set_entry_ttl(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        ttl_ms: u32,
    ) -> Result<()>;
    /// Sets an indirect table's default member.
    fn mt_indirect_set_default_member(
        &self,
        cxt: ContextId,
        table: &str,
        member: MemberHandle,
    ) -> Result<()>;
    /// Clears an indirect table's default entry.
    fn mt_indirect_reset_default_entry(&self, cxt: ContextId, table: &str) -> Result<()>;
    /// Adds an indirect-ws entry pointing at a group.
    fn mt_indirect_ws_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        group: GroupHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle>;
    /// Repoints an indirect-ws entry at another group.
    fn mt_indirect_ws_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        group: GroupHandle,
    ) -> Result<()>;
    /// Sets an indirect-ws table's default group.
    fn mt_indirect_ws_set_default_group(
        &self,
        cxt: ContextId,
        table: &str,
        group: GroupHandle,
    ) -> Result<()>;

    // bare counters / meters / registers / parse vsets

    /// Reads a counter cell.
    fn read_counters(&self, cxt: ContextId, counter: &str, idx: usize) -> Result<(u64, u64)>;
    /// Zeroes a counter array.
    fn reset_counters(&self, cxt: ContextId, counter: &str) -> Result<()>;
    /// Overwrites a counter cell.
    fn write_counters(
        &self,
        cxt: ContextId,
        counter: &str,
        idx: usize,
        bytes: u64,
        packets: u64,
    ) -> Result<()>;
    /// Configures every meter cell of an array.
    fn meter_array_set_rates(
        &self,
        cxt: ContextId,
        meter: &str,
        rates: &[RateConfig],
    ) -> Result<()>;
    /// Configures one meter cell.
    fn meter_set_rates(
        &self,
        cxt: ContextId,
        meter: &str,
        idx: usize,
        rates: &[RateConfig],
    ) -> Result<()>;
    /// Reads one meter cell's rates.
    fn meter_get_rates(&self, cxt: ContextId, meter: &str, idx: usize) -> Result<Vec<RateConfig>>;
    /// Clears one meter cell.
    fn meter_reset_rates(&self, cxt: ContextId, meter: &str, idx: usize) -> Result<()>;
    /// Reads a register cell.
    fn register_read(&self, cxt: ContextId, register: &str, idx: usize) -> Result<u64>;
    /// Reads every register cell in one consistent pass.
    fn register_read_all(&self, cxt: ContextId, register: &str) -> Result<Vec<u64>>;
    /// Writes a register cell.
    fn register_write(&self, cxt: ContextId, register: &str, idx: usize, value: u64) -> Result<()>;
    /// Writes a register range `[start, end)` to one value.
    fn register_write_range(
        &self,
        cxt: ContextId,
        register: &str,
        start: usize,
        end: usize,
        value: u64,
    ) -> Result<()>;
    /// Zeroes a register array.
    fn register_reset(&self, cxt: ContextId, register: &str) -> Result<()>;
    /// Adds a value to a parse value set.
    fn parse_vset_add(&self, cxt: ContextId, vset: &str, value: Vec<u8>) -> Result<()>;
    /// Removes a value from a parse value set.
    fn parse_vset_remove(&self, cxt: ContextId, vset: &str, value: &[u8]) -> Result<()>;
    /// Every value of a parse value set.
    fn parse_vset_get(&self, cxt: ContextId, vset: &str) -> Result<Vec<Vec<u8>>>;
    /// Clears a parse value set.
    fn parse_vset_clear(&self, cxt: ContextId, vset: &str) -> Result<()>;

    // crc customisation

    /// Replaces a 16-bit CRC calculator's parameters.
    fn set_crc16_custom_parameters(
        &self,
        cxt: ContextId,
        calc: &str,
        params: CrcParams<u16>,
    ) -> Result<()>;
    /// Replaces a 32-bit CRC calculator's parameters.
    fn set_crc32_custom_parameters(
        &self,
        cxt: ContextId,
        calc: &str,
        params: CrcParams<u32>,
    ) -> Result<()>;

    // incremental reconfiguration

    /// Loads the staging graph `new_` material is drawn from.
    fn reconfig_init_staging(&self, cxt: ContextId, bytes: &[u8]) -> Result<()>;
    /// Copies a staged table into the live graph.
    fn reconfig_insert_table(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()>;
    /// Rewrites one labeled edge of a table.
    fn reconfig_change_table(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        label: &str,
        next_id: &str,
    ) -> Result<()>;
    /// Removes a table from the live graph.
    fn reconfig_delete_table(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()>;
    /// Copies a staged conditional into the live graph.
    fn reconfig_insert_conditional(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()>;
    /// Rewrites a conditional's true or false successor.
    fn reconfig_change_conditional(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()>;
    /// Removes a conditional from the live graph.
    fn reconfig_delete_conditional(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()>;
    /// Creates a flex node with both successors.
    fn reconfig_insert_flex(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_id: &str,
        false_id: &str,
    ) -> Result<()>;
    /// Rewrites a flex node's true or false successor.
    fn reconfig_change_flex(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()>;
    /// Removes a flex node from the live graph.
    fn reconfig_delete_flex(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()>;
    /// Creates a register array.
    fn reconfig_insert_register_array(
        &self,
        cxt: ContextId,
        id: &str,
        size: usize,
        bitwidth: u32,
    ) -> Result<()>;
    /// Resizes (`change_type == 0`) or re-widths (`change_type == 1`) a
    /// register array.
    fn reconfig_change_register_array(
        &self,
        cxt: ContextId,
        id: &str,
        change_type: u32,
        value: u32,
    ) -> Result<()>;
    /// Removes a register array.
    fn reconfig_delete_register_array(&self, cxt: ContextId, id: &str) -> Result<()>;
    /// Repoints a pipeline's init node.
    fn reconfig_change_init(&self, cxt: ContextId, pipeline: &str, next_id: &str) -> Result<()>;
    /// Arms or disarms flex nodes; `number < 0` selects all of them.
    fn reconfig_trigger(&self, cxt: ContextId, on: bool, number: i32) -> Result<()>;
    /// Runs a whole reconfiguration plan.
    fn run_reconfig_plan(
        &self,
        cxt: ContextId,
        staging_bytes: &[u8],
        plan_text: &str,
    ) -> Result<()>;

    // configuration lifecycle

    /// Stages a new configuration on one context.
    fn load_new_config(&self, cxt: ContextId, bytes: &[u8]) -> Result<()>;
    /// Orders and commits a swap on one context.
    fn swap_configs(&self, cxt: ContextId) -> Result<()>;
    /// The raw text of the current configuration.
    fn get_config(&self) -> Result<String>;
    /// MD5 digest of the current configuration text.
    fn get_config_md5(&self) -> Result<[u8; 16]>;
    /// Resets one context's runtime state.
    fn reset_state(&self, cxt: ContextId) -> Result<()>;
    /// Writes one context's mutable state.
    fn serialize_state(&self, cxt: ContextId, out: &mut dyn std::io::Write) -> Result<()>;
    /// Restores one context's mutable state.
    fn deserialize_state(&self, cxt: ContextId, input: &mut dyn std::io::Read) -> Result<()>;
}

impl RuntimeControl for SwitchCore {
    fn mt_get_num_entries(&self, cxt: ContextId, table: &str) -> Result<usize> {
        self.context(cxt)?.mt_get_num_entries(table)
    }

    fn mt_clear_entries(&self, cxt: ContextId, table: &str, reset_default_entry: bool) -> Result<()> {
        self.context(cxt)?.mt_clear_entries(table, reset_default_entry)
    }

    fn mt_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        action: &str,
        data: ActionData,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.context(cxt)?.mt_add_entry(table, key, action, data, priority)
    }

    fn mt_set_default_action(
        &self,
        cxt: ContextId,
        table: &str,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.context(cxt)?.mt_set_default_action(table, action, data)
    }

    fn mt_reset_default_entry(&self, cxt: ContextId, table: &str) -> Result<()> {
        self.context(cxt)?.mt_reset_default_entry(table)
    }

    fn mt_delete_entry(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<()> {
        self.context(cxt)?.mt_delete_entry(table, handle)
    }

    fn mt_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.context(cxt)?.mt_modify_entry(table, handle, action, data)
    }

    fn mt_set_entry_ttl(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        ttl_ms: u32,
    ) -> Result<()> {
        self.context(cxt)?.mt_set_entry_ttl(table, handle, ttl_ms)
    }

    fn mt_read_counters(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<(u64, u64)> {
        self.context(cxt)?.mt_read_counters(table, handle)
    }

    fn mt_reset_counters(&self, cxt: ContextId, table: &str) -> Result<()> {
        self.context(cxt)?.mt_reset_counters(table)
    }

    fn mt_write_counters(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        bytes: u64,
        packets: u64,
    ) -> Result<()> {
        self.context(cxt)?.mt_write_counters(table, handle, bytes, packets)
    }

    fn mt_set_meter_rates(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        rates: Vec<RateConfig>,
    ) -> Result<()> {
        self.context(cxt)?.mt_set_meter_rates(table, handle, rates)
    }

    fn mt_get_meter_rates(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<Vec<RateConfig>> {
        self.context(cxt)?.mt_get_meter_rates(table, handle)
    }

    fn mt_reset_meter_rates(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<()> {
        self.context(cxt)?.mt_reset_meter_rates(table, handle)
    }

    fn mt_get_type(&self, cxt: ContextId, table: &str) -> Result<TableKind> {
        self.context(cxt)?.mt_get_type(table)
    }

    fn mt_get_entries(&self, cxt: ContextId, table: &str) -> Result<Vec<Entry>> {
        self.context(cxt)?.mt_get_entries(table)
    }

    fn mt_get_entry(&self, cxt: ContextId, table: &str, handle: EntryHandle) -> Result<Entry> {
        self.context(cxt)?.mt_get_entry(table, handle)
    }

    fn mt_get_default_entry(&self, cxt: ContextId, table: &str) -> Result<EntryTarget> {
        self.context(cxt)?.mt_get_default_entry(table)
    }

    fn mt_get_entry_from_key(
        &self,
        cxt: ContextId,
        table: &str,
        key: &[MatchKeyParam],
        priority: Option<i32>,
    ) -> Result<Entry> {
        self.context(cxt)?.mt_get_entry_from_key(table, key, priority)
    }

    fn mt_act_prof_add_member(
        &self,
        cxt: ContextId,
        profile: &str,
        action: &str,
        data: ActionData,
    ) -> Result<MemberHandle> {
        self.context(cxt)?.mt_act_prof_add_member(profile, action, data)
    }

    fn mt_act_prof_delete_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_act_prof_delete_member(profile, member)
    }

    fn mt_act_prof_modify_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        action: &str,
        data: ActionData,
    ) -> Result<()> {
        self.context(cxt)?
            .mt_act_prof_modify_member(profile, member, action, data)
    }

    fn mt_act_prof_create_group(&self, cxt: ContextId, profile: &str) -> Result<GroupHandle> {
        self.context(cxt)?.mt_act_prof_create_group(profile)
    }

    fn mt_act_prof_delete_group(
        &self,
        cxt: ContextId,
        profile: &str,
        group: GroupHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_act_prof_delete_group(profile, group)
    }

    fn mt_act_prof_add_member_to_group(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.context(cxt)?
            .mt_act_prof_add_member_to_group(profile, member, group)
    }

    fn mt_act_prof_remove_member_from_group(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.context(cxt)?
            .mt_act_prof_remove_member_from_group(profile, member, group)
    }

    fn mt_act_prof_get_members(&self, cxt: ContextId, profile: &str) -> Result<Vec<Member>> {
        self.context(cxt)?.mt_act_prof_get_members(profile)
    }

    fn mt_act_prof_get_member(
        &self,
        cxt: ContextId,
        profile: &str,
        member: MemberHandle,
    ) -> Result<Member> {
        self.context(cxt)?.mt_act_prof_get_member(profile, member)
    }

    fn mt_act_prof_get_groups(&self, cxt: ContextId, profile: &str) -> Result<Vec<Group>> {
        self.context(cxt)?.mt_act_prof_get_groups(profile)
    }

    fn mt_act_prof_get_group(
        &self,
        cxt: ContextId,
        profile: &str,
        group: GroupHandle,
    ) -> Result<Group> {
        self.context(cxt)?.mt_act_prof_get_group(profile, group)
    }

    fn set_group_selector(
        &self,
        cxt: ContextId,
        profile: &str,
        selector: Arc<dyn GroupSelector>,
    ) -> Result<()> {
        self.context(cxt)?.set_group_selector(profile, selector)
    }

    fn mt_indirect_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        member: MemberHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.context(cxt)?
            .mt_indirect_add_entry(table, key, member, priority)
    }

    fn mt_indirect_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        member: MemberHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_modify_entry(table, handle, member)
    }

    fn mt_indirect_delete_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_delete_entry(table, handle)
    }

    fn mt_indirect_set_entry_ttl(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        ttl_ms: u32,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_set_entry_ttl(table, handle, ttl_ms)
    }

    fn mt_indirect_set_default_member(
        &self,
        cxt: ContextId,
        table: &str,
        member: MemberHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_set_default_member(table, member)
    }

    fn mt_indirect_reset_default_entry(&self, cxt: ContextId, table: &str) -> Result<()> {
        self.context(cxt)?.mt_indirect_reset_default_entry(table)
    }

    fn mt_indirect_ws_add_entry(
        &self,
        cxt: ContextId,
        table: &str,
        key: Vec<MatchKeyParam>,
        group: GroupHandle,
        priority: Option<i32>,
    ) -> Result<EntryHandle> {
        self.context(cxt)?
            .mt_indirect_ws_add_entry(table, key, group, priority)
    }

    fn mt_indirect_ws_modify_entry(
        &self,
        cxt: ContextId,
        table: &str,
        handle: EntryHandle,
        group: GroupHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_ws_modify_entry(table, handle, group)
    }

    fn mt_indirect_ws_set_default_group(
        &self,
        cxt: ContextId,
        table: &str,
        group: GroupHandle,
    ) -> Result<()> {
        self.context(cxt)?.mt_indirect_ws_set_default_group(table, group)
    }

    fn read_counters(&self, cxt: ContextId, counter: &str, idx: usize) -> Result<(u64, u64)> {
        self.context(cxt)?.read_counters(counter, idx)
    }

    fn reset_counters(&self, cxt: ContextId, counter: &str) -> Result<()> {
        self.context(cxt)?.reset_counters(counter)
    }

    fn write_counters(
        &self,
        cxt: ContextId,
        counter: &str,
        idx: usize,
        bytes: u64,
        packets: u64,
    ) -> Result<()> {
        self.context(cxt)?.write_counters(counter, idx, bytes, packets)
    }

    fn meter_array_set_rates(
        &self,
        cxt: ContextId,
        meter: &str,
        rates: &[RateConfig],
    ) -> Result<()> {
        self.context(cxt)?.meter_array_set_rates(meter, rates)
    }

    fn meter_set_rates(
        &self,
        cxt: ContextId,
        meter: &str,
        idx: usize,
        rates: &[RateConfig],
    ) -> Result<()> {
        self.context(cxt)?.meter_set_rates(meter, idx, rates)
    }

    fn meter_get_rates(&self, cxt: ContextId, meter: &str, idx: usize) -> Result<Vec<RateConfig>> {
        self.context(cxt)?.meter_get_rates(meter, idx)
    }

    fn meter_reset_rates(&self, cxt: ContextId, meter: &str, idx: usize) -> Result<()> {
        self.context(cxt)?.meter_reset_rates(meter, idx)
    }

    fn register_read(&self, cxt: ContextId, register: &str, idx: usize) -> Result<u64> {
        self.context(cxt)?.register_read(register, idx)
    }

    fn register_read_all(&self, cxt: ContextId, register: &str) -> Result<Vec<u64>> {
        self.context(cxt)?.register_read_all(register)
    }

    fn register_write(&self, cxt: ContextId, register: &str, idx: usize, value: u64) -> Result<()> {
        self.context(cxt)?.register_write(register, idx, value)
    }

    fn register_write_range(
        &self,
        cxt: ContextId,
        register: &str,
        start: usize,
        end: usize,
        value: u64,
    ) -> Result<()> {
        self.context(cxt)?.register_write_range(register, start, end, value)
    }

    fn register_reset(&self, cxt: ContextId, register: &str) -> Result<()> {
        self.context(cxt)?.register_reset(register)
    }

    fn parse_vset_add(&self, cxt: ContextId, vset: &str, value: Vec<u8>) -> Result<()> {
        self.context(cxt)?.parse_vset_add(vset, value)
    }

    fn parse_vset_remove(&self, cxt: ContextId, vset: &str, value: &[u8]) -> Result<()> {
        self.context(cxt)?.parse_vset_remove(vset, value)
    }

    fn parse_vset_get(&self, cxt: ContextId, vset: &str) -> Result<Vec<Vec<u8>>> {
        self.context(cxt)?.parse_vset_get(vset)
    }

    fn parse_vset_clear(&self, cxt: ContextId, vset: &str) -> Result<()> {
        self.context(cxt)?.parse_vset_clear(vset)
    }

    fn set_crc16_custom_parameters(
        &self,
        cxt: ContextId,
        calc: &str,
        params: CrcParams<u16>,
    ) -> Result<()> {
        self.context(cxt)?.set_crc16_custom_parameters(calc, params)
    }

    fn set_crc32_custom_parameters(
        &self,
        cxt: ContextId,
        calc: &str,
        params: CrcParams<u32>,
    ) -> Result<()> {
        self.context(cxt)?.set_crc32_custom_parameters(calc, params)
    }

    fn reconfig_init_staging(&self, cxt: ContextId, bytes: &[u8]) -> Result<()> {
        SwitchCore::reconfig_init_staging(self, cxt, bytes)
    }

    fn reconfig_insert_table(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_insert_table(pipeline, id)
    }

    fn reconfig_change_table(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        label: &str,
        next_id: &str,
    ) -> Result<()> {
        self.context(cxt)?.reconfig_change_table(pipeline, id, label, next_id)
    }

    fn reconfig_delete_table(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_delete_table(pipeline, id)
    }

    fn reconfig_insert_conditional(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_insert_conditional(pipeline, id)
    }

    fn reconfig_change_conditional(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()> {
        self.context(cxt)?
            .reconfig_change_conditional(pipeline, id, true_branch, next_id)
    }

    fn reconfig_delete_conditional(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_delete_conditional(pipeline, id)
    }

    fn reconfig_insert_flex(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_id: &str,
        false_id: &str,
    ) -> Result<()> {
        self.context(cxt)?
            .reconfig_insert_flex(pipeline, id, true_id, false_id)
    }

    fn reconfig_change_flex(
        &self,
        cxt: ContextId,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<()> {
        self.context(cxt)?
            .reconfig_change_flex(pipeline, id, true_branch, next_id)
    }

    fn reconfig_delete_flex(&self, cxt: ContextId, pipeline: &str, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_delete_flex(pipeline, id)
    }

    fn reconfig_insert_register_array(
        &self,
        cxt: ContextId,
        id: &str,
        size: usize,
        bitwidth: u32,
    ) -> Result<()> {
        self.context(cxt)?.reconfig_insert_register_array(id, size, bitwidth)
    }

    fn reconfig_change_register_array(
        &self,
        cxt: ContextId,
        id: &str,
        change_type: u32,
        value: u32,
    ) -> Result<()> {
        self.context(cxt)?
            .reconfig_change_register_array(id, change_type, value)
    }

    fn reconfig_delete_register_array(&self, cxt: ContextId, id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_delete_register_array(id)
    }

    fn reconfig_change_init(&self, cxt: ContextId, pipeline: &str, next_id: &str) -> Result<()> {
        self.context(cxt)?.reconfig_change_init(pipeline, next_id)
    }

    fn reconfig_trigger(&self, cxt: ContextId, on: bool, number: i32) -> Result<()> {
        self.context(cxt)?.reconfig_trigger(on, number);
        Ok(())
    }

    fn run_reconfig_plan(
        &self,
        cxt: ContextId,
        staging_bytes: &[u8],
        plan_text: &str,
    ) -> Result<()> {
        SwitchCore::run_reconfig_plan(self, cxt, staging_bytes, plan_text)
    }

    fn load_new_config(&self, cxt: ContextId, bytes: &[u8]) -> Result<()> {
        SwitchCore::load_new_config(self, cxt, bytes)
    }

    fn swap_configs(&self, cxt: ContextId) -> Result<()> {
        SwitchCore::swap_configs(self, cxt)
    }

    fn get_config(&self) -> Result<String> {
        Ok(SwitchCore::get_config(self))
    }

    fn get_config_md5(&self) -> Result<[u8; 16]> {
        Ok(SwitchCore::get_config_md5(self))
    }

    fn reset_state(&self, cxt: ContextId) -> Result<()> {
        SwitchCore::reset_state(self, cxt)
    }

    fn serialize_state(&self, cxt: ContextId, out: &mut dyn std::io::Write) -> Result<()> {
        self.context(cxt)?.serialize_state(out)
    }

    fn deserialize_state(&self, cxt: ContextId, input: &mut dyn std::io::Read) -> Result<()> {
        self.context(cxt)?.deserialize_state(input)
    }
}
