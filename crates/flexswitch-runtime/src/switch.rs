//! The switch core: context fleet, packet-inflight barrier, and swap
//! orchestration.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fxhash::FxHashSet;
use md5::{Digest, Md5};
use parking_lot::{Condvar, Mutex, RwLock};

use flexswitch_core::graph::ArithSpec;
use flexswitch_core::lookup::{DefaultLookupFactory, LookupFactory};

use crate::context::{Context, ContextId, DeviceId, LoadEnv};
use crate::notify::NotificationTransport;
use crate::packet::{InflightBarrier, Packet};
use crate::registry::ComponentRegistry;
use crate::target::SwitchTarget;
use crate::Result;

/// Errors from context addressing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SwitchError {
    /// The context id does not name a context of this switch.
    #[error("context id {0} out of range")]
    ContextOutOfRange(u32),
}

/// Errors from the swap protocol.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SwapError {
    /// A staged configuration is already pending on this context.
    #[error("a config swap is already ongoing")]
    OngoingSwap,

    /// No staged configuration to swap.
    #[error("no config swap was ordered")]
    NoOngoingSwap,

    /// The switch was built without live-swap support.
    #[error("config swap disabled for this switch")]
    SwapDisabled,

    /// The target's swap callback failed after the swap committed.
    #[error("target swap notification failed: {0}")]
    NotifyFailed(String),
}

/// What a [`SwitchCore::do_swap`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// At least one context swapped its live configuration.
    Swapped,
    /// No context had a swap ordered; nothing changed.
    Nothing,
}

struct ConfigState {
    text: String,
    loaded: bool,
}

/// The single entry point for the control plane: owns the contexts, the
/// packet-inflight barrier, and switch-global components.
pub struct SwitchCore {
    contexts: Vec<Context>,
    enable_swap: AtomicBool,
    device_id: AtomicU64,
    packet_barrier: InflightBarrier,
    components: ComponentRegistry,
    required_fields: Mutex<FxHashSet<(String, String)>>,
    arith: Mutex<ArithSpec>,
    lookup_factory: Arc<dyn LookupFactory>,
    target: Box<dyn SwitchTarget>,
    config: Mutex<ConfigState>,
    config_loaded_cv: Condvar,
}

impl fmt::Debug for SwitchCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchCore")
            .field("contexts", &self.contexts.len())
            .field("enable_swap", &self.enable_swap.load(Ordering::SeqCst))
            .field("device_id", &self.device_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SwitchCore {
    /// Builds a switch with `num_contexts` empty contexts. Context ids
    /// `0..num_contexts` exist afterwards; no context has a configuration
    /// until [`SwitchCore::init_objects`] runs.
    #[must_use]
    pub fn new(
        num_contexts: usize,
        enable_swap: bool,
        target: Box<dyn SwitchTarget>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let contexts: Vec<Context> = (0..num_contexts)
            .map(|i| Context::new(ContextId(i as u32), Arc::clone(&transport)))
            .collect();
        SwitchCore {
            contexts,
            enable_swap: AtomicBool::new(enable_swap),
            device_id: AtomicU64::new(0),
            packet_barrier: Arc::new(RwLock::new(())),
            components: ComponentRegistry::new(),
            required_fields: Mutex::new(FxHashSet::default()),
            arith: Mutex::new(ArithSpec::default()),
            lookup_factory: Arc::new(DefaultLookupFactory),
            target,
            config: Mutex::new(ConfigState {
                text: String::from("{}"),
                loaded: false,
            }),
            config_loaded_cv: Condvar::new(),
        }
    }

    /// Replaces the lookup-structure factory. Call before `init_objects`;
    /// configurations already built keep the factory they were built with.
    pub fn set_lookup_factory(&mut self, factory: Arc<dyn LookupFactory>) {
        self.lookup_factory = factory;
    }

    /// Number of contexts.
    #[must_use]
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Device id of this switch.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId(self.device_id.load(Ordering::SeqCst))
    }

    /// Resolves a context id.
    ///
    /// # Errors
    ///
    /// `ContextOutOfRange` for an id outside `0..num_contexts`.
    pub fn context(&self, cxt: ContextId) -> Result<&Context> {
        self.contexts
            .get(cxt.0 as usize)
            .ok_or_else(|| SwitchError::ContextOutOfRange(cxt.0).into())
    }

    /// Switch-global component registry.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Enables live config swapping.
    pub fn enable_config_swap(&self) {
        self.enable_swap.store(true, Ordering::SeqCst);
    }

    /// Disables live config swapping.
    pub fn disable_config_swap(&self) {
        self.enable_swap.store(false, Ordering::SeqCst);
    }

    /// Registers a field every future configuration load must define.
    pub fn add_required_field(&self, header: &str, field: &str) {
        self.required_fields
            .lock()
            .insert((header.to_string(), field.to_string()));
    }

    /// Forces arithmetic capability on a field in future loads.
    pub fn force_arith_field(&self, header: &str, field: &str) {
        self.arith
            .lock()
            .fields
            .insert((header.to_string(), field.to_string()));
    }

    /// Forces arithmetic capability on every field of a header in future
    /// loads.
    pub fn force_arith_header(&self, header: &str) {
        self.arith.lock().headers.insert(header.to_string());
    }

    fn with_env<R>(&self, f: impl FnOnce(&LoadEnv<'_>) -> Result<R>) -> Result<R> {
        let required_fields = self.required_fields.lock().clone();
        let arith = self.arith.lock().clone();
        let env = LoadEnv {
            required_fields: &required_fields,
            arith: &arith,
            factory: &self.lookup_factory,
        };
        f(&env)
    }

    /// Loads the initial configuration into every context and releases
    /// anyone blocked in [`SwitchCore::start_and_return`].
    ///
    /// # Errors
    ///
    /// Loader errors, verbatim; no context is left partially configured
    /// ahead of the failure point.
    pub fn init_objects(&self, bytes: &[u8], device_id: DeviceId) -> Result<()> {
        self.device_id.store(device_id.0, Ordering::SeqCst);
        self.with_env(|env| {
            for context in &self.contexts {
                context.set_device_id(device_id);
                context.init_objects(env, bytes)?;
            }
            Ok(())
        })?;
        let mut state = self.config.lock();
        state.text = String::from_utf8_lossy(bytes).into_owned();
        state.loaded = true;
        self.config_loaded_cv.notify_all();
        tracing::info!(
            "switch initialized: {} context(s), device {}",
            self.contexts.len(),
            device_id.0
        );
        Ok(())
    }

    /// Blocks until a configuration is loaded, then invokes the target's
    /// start callback and returns.
    pub fn start_and_return(&self) {
        let mut state = self.config.lock();
        while !state.loaded {
            self.config_loaded_cv.wait(&mut state);
        }
        drop(state);
        self.target.start();
    }

    /// Hands a received frame to the target, verbatim.
    pub fn receive(&self, port: u32, buffer: &[u8]) {
        self.target.receive(port, buffer);
    }

    /// Constructs a packet for a context. The packet holds the inflight
    /// barrier's read side until dropped; construction blocks while a swap
    /// holds the write side.
    ///
    /// # Errors
    ///
    /// `ContextOutOfRange` for an unknown context.
    pub fn new_packet(
        &self,
        cxt: ContextId,
        ingress_port: u32,
        packet_id: u64,
        data: Vec<u8>,
    ) -> Result<Packet> {
        self.context(cxt)?;
        Ok(Packet::new(
            &self.packet_barrier,
            cxt,
            ingress_port,
            packet_id,
            data,
        ))
    }

    /// Whether any context has a swap ordered.
    #[must_use]
    pub fn swap_requested(&self) -> bool {
        self.contexts.iter().any(Context::swap_requested)
    }

    /// Commits ordered swaps under the packet-inflight barrier: blocks
    /// packet construction, waits for inflight packets to drain, swaps
    /// every pending context, then runs the target's swap callback.
    ///
    /// Returns [`SwapOutcome::Nothing`] when no context had a swap ordered.
    ///
    /// # Errors
    ///
    /// `NotifyFailed` when the target callback fails; the swap itself stays
    /// committed.
    pub fn do_swap(&self) -> Result<SwapOutcome> {
        if !self.swap_requested() {
            return Ok(SwapOutcome::Nothing);
        }
        let mut swapped = false;
        {
            let _barrier = self.packet_barrier.write();
            for context in &self.contexts {
                swapped |= context.do_swap();
            }
        }
        if !swapped {
            return Ok(SwapOutcome::Nothing);
        }
        if let Err(e) = self.target.swap_notify() {
            tracing::error!("target swap notification failed after commit: {e}");
            return Err(SwapError::NotifyFailed(e.to_string()).into());
        }
        Ok(SwapOutcome::Swapped)
    }

    /// Blocks until no packet instance exists anywhere in the switch, then
    /// returns. New packets can be constructed again immediately after.
    pub fn block_until_no_more_packets(&self) {
        drop(self.packet_barrier.write());
    }

    /// Loads a new configuration into one context's staged slot.
    ///
    /// # Errors
    ///
    /// `SwapDisabled` when the switch was built without swap support,
    /// `OngoingSwap` when a staged config is already pending, loader errors
    /// verbatim. The live configuration is untouched on failure.
    pub fn load_new_config(&self, cxt: ContextId, bytes: &[u8]) -> Result<()> {
        if !self.enable_swap.load(Ordering::SeqCst) {
            return Err(SwapError::SwapDisabled.into());
        }
        let context = self.context(cxt)?;
        self.with_env(|env| context.load_new_config(env, bytes))?;
        let mut state = self.config.lock();
        state.text = String::from_utf8_lossy(bytes).into_owned();
        state.loaded = true;
        self.config_loaded_cv.notify_all();
        Ok(())
    }

    /// Orders and drives a swap on one context: emits the request
    /// notification, then commits under the inflight barrier.
    ///
    /// # Errors
    ///
    /// `NoOngoingSwap` when nothing is staged, plus [`SwitchCore::do_swap`]
    /// errors.
    pub fn swap_configs(&self, cxt: ContextId) -> Result<()> {
        self.context(cxt)?.order_swap()?;
        self.do_swap()?;
        Ok(())
    }

    /// The raw text of the current configuration.
    #[must_use]
    pub fn get_config(&self) -> String {
        self.config.lock().text.clone()
    }

    /// MD5 digest of the current configuration text.
    #[must_use]
    pub fn get_config_md5(&self) -> [u8; 16] {
        let state = self.config.lock();
        Md5::digest(state.text.as_bytes()).into()
    }

    /// Resets one context's runtime state (and the target's, through its
    /// callback). A pending staged configuration is discarded.
    ///
    /// # Errors
    ///
    /// `ContextOutOfRange` for an unknown context.
    pub fn reset_state(&self, cxt: ContextId) -> Result<()> {
        self.context(cxt)?.reset_state();
        self.target.reset_state();
        Ok(())
    }

    /// Loads a reconfiguration staging graph for one context.
    ///
    /// # Errors
    ///
    /// `ContextOutOfRange` or staging loader errors.
    pub fn reconfig_init_staging(&self, cxt: ContextId, bytes: &[u8]) -> Result<()> {
        let context = self.context(cxt)?;
        self.with_env(|env| context.reconfig_init_staging(env, bytes))
    }

    /// Runs a whole reconfiguration plan against one context.
    ///
    /// # Errors
    ///
    /// `ContextOutOfRange`, staging loader errors, plan parse errors, or
    /// the first failing command.
    pub fn run_reconfig_plan(
        &self,
        cxt: ContextId,
        staging_bytes: &[u8],
        plan_text: &str,
    ) -> Result<()> {
        let context = self.context(cxt)?;
        self.with_env(|env| context.run_reconfig_plan(env, staging_bytes, plan_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullTransport;
    use crate::target::InertTarget;
    use crate::Error;

    fn switch(n: usize) -> SwitchCore {
        SwitchCore::new(n, true, Box::new(InertTarget), Arc::new(NullTransport))
    }

    #[test]
    fn context_ids_are_dense() {
        let sw = switch(3);
        assert_eq!(sw.num_contexts(), 3);
        for id in 0..3 {
            assert!(sw.context(ContextId(id)).is_ok());
        }
        let err = sw.context(ContextId(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::Switch(SwitchError::ContextOutOfRange(3))
        ));
    }

    #[test]
    fn config_md5_tracks_text() {
        let sw = switch(1);
        let before = sw.get_config_md5();
        sw.init_objects(b"{\"pipelines\": []}", DeviceId(1)).unwrap();
        let after = sw.get_config_md5();
        assert_ne!(before, after);
        assert_eq!(sw.get_config(), "{\"pipelines\": []}");
    }

    #[test]
    fn swap_with_nothing_staged_is_a_noop() {
        let sw = switch(2);
        sw.init_objects(b"{}", DeviceId(1)).unwrap();
        assert_eq!(sw.do_swap().unwrap(), SwapOutcome::Nothing);
        assert!(!sw.swap_requested());
    }

    #[test]
    fn load_new_config_requires_swap_support() {
        let sw = SwitchCore::new(1, false, Box::new(InertTarget), Arc::new(NullTransport));
        sw.init_objects(b"{}", DeviceId(1)).unwrap();
        let err = sw.load_new_config(ContextId(0), b"{}").unwrap_err();
        assert!(matches!(err, Error::Swap(SwapError::SwapDisabled)));
    }
}
