//! State persistence: the versioned envelope behind `serialize` /
//! `deserialize`.
//!
//! A snapshot captures every piece of *mutable* state of a live
//! configuration -- table entries and default targets, counters, meter
//! rates, register cells -- and nothing structural. Restoring requires a
//! structurally equivalent live graph on the target context; staged and
//! in-edit state are never part of a snapshot, so a restored context always
//! comes up idle.
//!
//! The envelope is self-describing JSON with a leading version field;
//! sections are sorted by object name so snapshots are byte-stable for a
//! given state.

use serde::{Deserialize, Serialize};

use flexswitch_core::graph::ConfigGraph;
use flexswitch_core::register::RateConfig;
use flexswitch_core::table::{Entry, EntryTarget, MatchKind, TableKind};

/// Envelope version written by this runtime.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors from state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The snapshot was produced against a structurally different
    /// configuration.
    #[error("state does not match live configuration: {0}")]
    Mismatch(String),

    /// The envelope version is not supported.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    /// Reading or writing the envelope failed.
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The envelope bytes did not decode (or state did not encode).
    #[error("snapshot codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct TableSection {
    name: String,
    kind: TableKind,
    match_kind: MatchKind,
    entries: Vec<Entry>,
    default_target: Option<EntryTarget>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterSection {
    name: String,
    cells: Vec<(u64, u64)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MeterSection {
    name: String,
    cells: Vec<Vec<RateConfig>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterSection {
    name: String,
    bitwidth: u32,
    cells: Vec<u64>,
}

/// The whole snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    version: u32,
    tables: Vec<TableSection>,
    counters: Vec<CounterSection>,
    meters: Vec<MeterSection>,
    registers: Vec<RegisterSection>,
}

impl StateSnapshot {
    /// Captures the mutable state of a live graph.
    #[must_use]
    pub fn capture(graph: &ConfigGraph) -> StateSnapshot {
        let mut tables: Vec<TableSection> = graph
            .tables()
            .map(|table| {
                let (entries, default_target) = table.snapshot();
                TableSection {
                    name: table.name().to_string(),
                    kind: table.kind(),
                    match_kind: table.match_kind(),
                    entries,
                    default_target,
                }
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut counters: Vec<CounterSection> = graph
            .counter_arrays()
            .map(|array| CounterSection {
                name: array.name().to_string(),
                cells: (0..array.size())
                    .map(|idx| array.read(idx).unwrap_or((0, 0)))
                    .collect(),
            })
            .collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));

        let mut meters: Vec<MeterSection> = graph
            .meter_arrays()
            .map(|array| MeterSection {
                name: array.name().to_string(),
                cells: (0..array.size())
                    .map(|idx| array.get_rates(idx).unwrap_or_default())
                    .collect(),
            })
            .collect();
        meters.sort_by(|a, b| a.name.cmp(&b.name));

        let mut registers: Vec<RegisterSection> = graph
            .register_arrays()
            .map(|array| RegisterSection {
                name: array.name().to_string(),
                bitwidth: array.bitwidth(),
                cells: array.read_all(),
            })
            .collect();
        registers.sort_by(|a, b| a.name.cmp(&b.name));

        StateSnapshot {
            version: SNAPSHOT_VERSION,
            tables,
            counters,
            meters,
            registers,
        }
    }

    /// Writes the envelope.
    ///
    /// # Errors
    ///
    /// `Codec` when encoding fails.
    pub fn write(&self, out: &mut dyn std::io::Write) -> Result<(), StateError> {
        serde_json::to_writer(out, self)?;
        Ok(())
    }

    /// Reads an envelope.
    ///
    /// # Errors
    ///
    /// `Codec` for malformed bytes, `UnsupportedVersion` for an envelope
    /// from a different runtime generation.
    pub fn read(input: &mut dyn std::io::Read) -> Result<StateSnapshot, StateError> {
        let snapshot: StateSnapshot = serde_json::from_reader(input)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Verifies structural equivalence and applies the snapshot onto a live
    /// graph.
    ///
    /// # Errors
    ///
    /// `Mismatch` naming the first structural difference found; nothing is
    /// applied on mismatch.
    pub fn apply(&self, graph: &ConfigGraph) -> Result<(), StateError> {
        self.check_structure(graph)?;

        for section in &self.tables {
            let table = graph
                .table(&section.name)
                .expect("structure verified above");
            table.restore(section.entries.clone(), section.default_target.clone());
        }
        for section in &self.counters {
            let array = graph
                .counter_array(&section.name)
                .expect("structure verified above");
            for (idx, (bytes, packets)) in section.cells.iter().enumerate() {
                let _ = array.write(idx, *bytes, *packets);
            }
        }
        for section in &self.meters {
            let array = graph
                .meter_array(&section.name)
                .expect("structure verified above");
            for (idx, rates) in section.cells.iter().enumerate() {
                if rates.is_empty() {
                    let _ = array.reset_rates(idx);
                } else {
                    let _ = array.set_rates(idx, rates);
                }
            }
        }
        for section in &self.registers {
            let array = graph
                .register_array(&section.name)
                .expect("structure verified above");
            for (idx, value) in section.cells.iter().enumerate() {
                let _ = array.write(idx, *value);
            }
        }
        Ok(())
    }

    fn check_structure(&self, graph: &ConfigGraph) -> Result<(), StateError> {
        let live_tables = graph.tables().count();
        if live_tables != self.tables.len() {
            return Err(StateError::Mismatch(format!(
                "table count {} != {}",
                self.tables.len(),
                live_tables
            )));
        }
        for section in &self.tables {
            let table = graph.table(&section.name).ok_or_else(|| {
                StateError::Mismatch(format!("table '{}' absent from live config", section.name))
            })?;
            if table.kind() != section.kind || table.match_kind() != section.match_kind {
                return Err(StateError::Mismatch(format!(
                    "table '{}' declaration differs",
                    section.name
                )));
            }
        }
        for section in &self.counters {
            let array = graph.counter_array(&section.name).ok_or_else(|| {
                StateError::Mismatch(format!("counter '{}' absent from live config", section.name))
            })?;
            if array.size() != section.cells.len() {
                return Err(StateError::Mismatch(format!(
                    "counter '{}' size differs",
                    section.name
                )));
            }
        }
        for section in &self.meters {
            let array = graph.meter_array(&section.name).ok_or_else(|| {
                StateError::Mismatch(format!("meter '{}' absent from live config", section.name))
            })?;
            if array.size() != section.cells.len() {
                return Err(StateError::Mismatch(format!(
                    "meter '{}' size differs",
                    section.name
                )));
            }
        }
        for section in &self.registers {
            let array = graph.register_array(&section.name).ok_or_else(|| {
                StateError::Mismatch(format!(
                    "register '{}' absent from live config",
                    section.name
                ))
            })?;
            if array.size() != section.cells.len() || array.bitwidth() != section.bitwidth {
                return Err(StateError::Mismatch(format!(
                    "register '{}' shape differs",
                    section.name
                )));
            }
        }
        Ok(())
    }
}
