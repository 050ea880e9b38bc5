//! Stateful arrays: registers, counters, meters, and parse value sets.
//!
//! All four are named, index-addressed, and interior-mutable so control
//! plane accesses can run under the owning context's shared lock. Registers
//! take a whole-array lock per operation (reads of `read_all` must not
//! interleave with a concurrent `write_range`); counters are per-cell
//! atomics; meters lock per cell.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Errors from register-array operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegisterError {
    /// No register array with this name.
    #[error("register array not found: {0}")]
    NotFound(String),

    /// Index (or range) outside the array.
    #[error("register index out of range")]
    InvalidIndex,
}

/// Errors from counter-array operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CounterError {
    /// No counter array with this name.
    #[error("counter array not found: {0}")]
    NotFound(String),

    /// Index outside the array.
    #[error("counter index out of range")]
    InvalidIndex,
}

/// Errors from meter-array operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeterError {
    /// No meter array with this name.
    #[error("meter array not found: {0}")]
    NotFound(String),

    /// Index outside the array.
    #[error("meter index out of range")]
    InvalidIndex,

    /// The rate configuration does not carry the declared number of bands.
    #[error("expected {expected} rate bands, got {got}")]
    BadRateCount {
        /// Bands declared at load time.
        expected: usize,
        /// Bands supplied by the caller.
        got: usize,
    },
}

/// Errors from parse-value-set operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VsetError {
    /// No parse value set with this name.
    #[error("parse value set not found: {0}")]
    NotFound(String),
}

/// One meter band: information rate plus burst size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    /// Information rate in units per microsecond.
    pub info_rate: f64,
    /// Burst size in units.
    pub burst_size: u32,
}

/// A register array: `size` cells of `bitwidth` bits each.
///
/// Cells are `u64` masked to the declared width. Resizing preserves the
/// prefix; re-widthing re-masks every cell in place.
pub struct RegisterArray {
    name: String,
    bitwidth: u32,
    hash_calc: Option<String>,
    cells: RwLock<Vec<u64>>,
}

impl fmt::Debug for RegisterArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterArray")
            .field("name", &self.name)
            .field("bitwidth", &self.bitwidth)
            .field("size", &self.cells.read().len())
            .finish()
    }
}

fn width_mask(bitwidth: u32) -> u64 {
    if bitwidth >= 64 {
        u64::MAX
    } else {
        (1u64 << bitwidth) - 1
    }
}

impl RegisterArray {
    /// Creates a zeroed array.
    #[must_use]
    pub fn new(name: String, size: usize, bitwidth: u32) -> Self {
        RegisterArray {
            name,
            bitwidth,
            hash_calc: None,
            cells: RwLock::new(vec![0; size]),
        }
    }

    /// Hash calculation bound to the array, when the data plane uses it as
    /// a hashed structure (sketches). Rehashing on resize is the executor's
    /// concern.
    #[must_use]
    pub fn hash_calc(&self) -> Option<&str> {
        self.hash_calc.as_deref()
    }

    /// Binds (or unbinds) the array's hash calculation.
    pub fn set_hash_calc(&mut self, calc: Option<String>) {
        self.hash_calc = calc;
    }

    /// Array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cells.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.read().len()
    }

    /// Cell width in bits.
    #[must_use]
    pub fn bitwidth(&self) -> u32 {
        self.bitwidth
    }

    /// Reads one cell.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn read(&self, idx: usize) -> Result<u64, RegisterError> {
        self.cells
            .read()
            .get(idx)
            .copied()
            .ok_or(RegisterError::InvalidIndex)
    }

    /// Reads every cell in one consistent pass.
    #[must_use]
    pub fn read_all(&self) -> Vec<u64> {
        self.cells.read().clone()
    }

    /// Writes one cell, masked to the declared width.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn write(&self, idx: usize, value: u64) -> Result<(), RegisterError> {
        let mut cells = self.cells.write();
        let cell = cells.get_mut(idx).ok_or(RegisterError::InvalidIndex)?;
        *cell = value & width_mask(self.bitwidth);
        Ok(())
    }

    /// Writes `[start, end)` to the same value in one consistent pass.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` when the range is inverted or runs past the array.
    pub fn write_range(&self, start: usize, end: usize, value: u64) -> Result<(), RegisterError> {
        let mut cells = self.cells.write();
        if start > end || end > cells.len() {
            return Err(RegisterError::InvalidIndex);
        }
        let masked = value & width_mask(self.bitwidth);
        for cell in &mut cells[start..end] {
            *cell = masked;
        }
        Ok(())
    }

    /// Zeroes every cell.
    pub fn reset(&self) {
        for cell in self.cells.write().iter_mut() {
            *cell = 0;
        }
    }

    /// Resizes the array, zero-filling growth and truncating shrinkage.
    pub fn resize(&self, new_size: usize) {
        self.cells.write().resize(new_size, 0);
    }

    /// Changes the cell width, re-masking existing values.
    pub fn set_bitwidth(&mut self, bitwidth: u32) {
        self.bitwidth = bitwidth;
        let mask = width_mask(bitwidth);
        for cell in self.cells.write().iter_mut() {
            *cell &= mask;
        }
    }

    /// Copies the array, values included.
    #[must_use]
    pub fn duplicate(&self) -> RegisterArray {
        RegisterArray {
            name: self.name.clone(),
            bitwidth: self.bitwidth,
            hash_calc: self.hash_calc.clone(),
            cells: RwLock::new(self.cells.read().clone()),
        }
    }
}

struct CounterCell {
    bytes: AtomicU64,
    packets: AtomicU64,
}

/// A counter array: per-cell byte and packet counts.
pub struct CounterArray {
    name: String,
    cells: Vec<CounterCell>,
}

impl fmt::Debug for CounterArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterArray")
            .field("name", &self.name)
            .field("size", &self.cells.len())
            .finish()
    }
}

impl CounterArray {
    /// Creates a zeroed array.
    #[must_use]
    pub fn new(name: String, size: usize) -> Self {
        let cells = (0..size)
            .map(|_| CounterCell {
                bytes: AtomicU64::new(0),
                packets: AtomicU64::new(0),
            })
            .collect();
        CounterArray { name, cells }
    }

    /// Array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cells.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Reads one cell as `(bytes, packets)`.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn read(&self, idx: usize) -> Result<(u64, u64), CounterError> {
        let cell = self.cells.get(idx).ok_or(CounterError::InvalidIndex)?;
        Ok((
            cell.bytes.load(Ordering::Relaxed),
            cell.packets.load(Ordering::Relaxed),
        ))
    }

    /// Overwrites one cell.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn write(&self, idx: usize, bytes: u64, packets: u64) -> Result<(), CounterError> {
        let cell = self.cells.get(idx).ok_or(CounterError::InvalidIndex)?;
        cell.bytes.store(bytes, Ordering::Relaxed);
        cell.packets.store(packets, Ordering::Relaxed);
        Ok(())
    }

    /// Data-plane increment of one cell. Out-of-range indexes are ignored.
    pub fn count(&self, idx: usize, bytes: u64) {
        if let Some(cell) = self.cells.get(idx) {
            cell.bytes.fetch_add(bytes, Ordering::Relaxed);
            cell.packets.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Zeroes every cell.
    pub fn reset(&self) {
        for cell in &self.cells {
            cell.bytes.store(0, Ordering::Relaxed);
            cell.packets.store(0, Ordering::Relaxed);
        }
    }

    /// Copies the array, counts included.
    #[must_use]
    pub fn duplicate(&self) -> CounterArray {
        let cells = self
            .cells
            .iter()
            .map(|c| CounterCell {
                bytes: AtomicU64::new(c.bytes.load(Ordering::Relaxed)),
                packets: AtomicU64::new(c.packets.load(Ordering::Relaxed)),
            })
            .collect();
        CounterArray {
            name: self.name.clone(),
            cells,
        }
    }
}

/// A meter array: per-cell rate bands.
pub struct MeterArray {
    name: String,
    rate_count: usize,
    cells: Vec<Mutex<Vec<RateConfig>>>,
}

impl fmt::Debug for MeterArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterArray")
            .field("name", &self.name)
            .field("rate_count", &self.rate_count)
            .field("size", &self.cells.len())
            .finish()
    }
}

impl MeterArray {
    /// Creates an array of unconfigured meters with `rate_count` bands each.
    #[must_use]
    pub fn new(name: String, size: usize, rate_count: usize) -> Self {
        let cells = (0..size).map(|_| Mutex::new(Vec::new())).collect();
        MeterArray {
            name,
            rate_count,
            cells,
        }
    }

    /// Array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cells.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Declared number of rate bands.
    #[must_use]
    pub fn rate_count(&self) -> usize {
        self.rate_count
    }

    fn check_rates(&self, rates: &[RateConfig]) -> Result<(), MeterError> {
        if rates.len() == self.rate_count {
            Ok(())
        } else {
            Err(MeterError::BadRateCount {
                expected: self.rate_count,
                got: rates.len(),
            })
        }
    }

    /// Configures every cell with the same rates.
    ///
    /// # Errors
    ///
    /// `BadRateCount` when the band count is off.
    pub fn set_array_rates(&self, rates: &[RateConfig]) -> Result<(), MeterError> {
        self.check_rates(rates)?;
        for cell in &self.cells {
            *cell.lock() = rates.to_vec();
        }
        Ok(())
    }

    /// Configures one cell.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` or `BadRateCount`.
    pub fn set_rates(&self, idx: usize, rates: &[RateConfig]) -> Result<(), MeterError> {
        self.check_rates(rates)?;
        let cell = self.cells.get(idx).ok_or(MeterError::InvalidIndex)?;
        *cell.lock() = rates.to_vec();
        Ok(())
    }

    /// Reads one cell's rates; empty when unconfigured.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn get_rates(&self, idx: usize) -> Result<Vec<RateConfig>, MeterError> {
        let cell = self.cells.get(idx).ok_or(MeterError::InvalidIndex)?;
        Ok(cell.lock().clone())
    }

    /// Clears one cell's rates.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` outside the array.
    pub fn reset_rates(&self, idx: usize) -> Result<(), MeterError> {
        let cell = self.cells.get(idx).ok_or(MeterError::InvalidIndex)?;
        cell.lock().clear();
        Ok(())
    }

    /// Clears every cell.
    pub fn reset(&self) {
        for cell in &self.cells {
            cell.lock().clear();
        }
    }

    /// Copies the array, rates included.
    #[must_use]
    pub fn duplicate(&self) -> MeterArray {
        let cells = self.cells.iter().map(|c| Mutex::new(c.lock().clone())).collect();
        MeterArray {
            name: self.name.clone(),
            rate_count: self.rate_count,
            cells,
        }
    }
}

/// A parse value set: runtime-populated values the parser branches on.
pub struct ParseValueSet {
    name: String,
    compressed_bitwidth: u32,
    values: Mutex<Vec<Vec<u8>>>,
}

impl fmt::Debug for ParseValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseValueSet")
            .field("name", &self.name)
            .field("compressed_bitwidth", &self.compressed_bitwidth)
            .finish_non_exhaustive()
    }
}

impl ParseValueSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new(name: String, compressed_bitwidth: u32) -> Self {
        ParseValueSet {
            name,
            compressed_bitwidth,
            values: Mutex::new(Vec::new()),
        }
    }

    /// Set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bit width values are compressed to.
    #[must_use]
    pub fn compressed_bitwidth(&self) -> u32 {
        self.compressed_bitwidth
    }

    /// Adds a value. Adding twice is a no-op.
    pub fn add(&self, value: Vec<u8>) {
        let mut values = self.values.lock();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Removes a value, if present.
    pub fn remove(&self, value: &[u8]) {
        self.values.lock().retain(|v| v != value);
    }

    /// All values, in insertion order.
    #[must_use]
    pub fn get(&self) -> Vec<Vec<u8>> {
        self.values.lock().clone()
    }

    /// Drops every value.
    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// Copies the set, values included.
    #[must_use]
    pub fn duplicate(&self) -> ParseValueSet {
        ParseValueSet {
            name: self.name.clone(),
            compressed_bitwidth: self.compressed_bitwidth,
            values: Mutex::new(self.values.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_masking_and_range() {
        let r = RegisterArray::new("r0".to_string(), 8, 8);
        r.write(0, 0x1ff).unwrap();
        assert_eq!(r.read(0).unwrap(), 0xff);
        r.write_range(2, 6, 7).unwrap();
        assert_eq!(r.read_all(), vec![0xff, 0, 7, 7, 7, 7, 0, 0]);
        assert_eq!(r.write(8, 1).unwrap_err(), RegisterError::InvalidIndex);
        assert_eq!(
            r.write_range(5, 3, 1).unwrap_err(),
            RegisterError::InvalidIndex
        );
    }

    #[test]
    fn register_resize_and_rewidth() {
        let mut r = RegisterArray::new("r0".to_string(), 4, 32);
        r.write(3, 0xabcd).unwrap();
        r.resize(2);
        assert_eq!(r.size(), 2);
        r.resize(4);
        assert_eq!(r.read(3).unwrap(), 0);
        r.write(0, 0xabcd).unwrap();
        r.set_bitwidth(8);
        assert_eq!(r.read(0).unwrap(), 0xcd);
    }

    #[test]
    fn counters_count_and_reset() {
        let c = CounterArray::new("c0".to_string(), 2);
        c.count(0, 100);
        c.count(0, 50);
        c.count(5, 1); // ignored
        assert_eq!(c.read(0).unwrap(), (150, 2));
        c.write(1, 9, 3).unwrap();
        assert_eq!(c.read(1).unwrap(), (9, 3));
        c.reset();
        assert_eq!(c.read(0).unwrap(), (0, 0));
    }

    #[test]
    fn meter_band_count_enforced() {
        let m = MeterArray::new("m0".to_string(), 2, 2);
        let one_band = vec![RateConfig {
            info_rate: 0.5,
            burst_size: 100,
        }];
        assert!(matches!(
            m.set_rates(0, &one_band).unwrap_err(),
            MeterError::BadRateCount { expected: 2, got: 1 }
        ));
        let two_bands = vec![
            RateConfig {
                info_rate: 0.5,
                burst_size: 100,
            },
            RateConfig {
                info_rate: 1.0,
                burst_size: 200,
            },
        ];
        m.set_array_rates(&two_bands).unwrap();
        assert_eq!(m.get_rates(1).unwrap().len(), 2);
        m.reset_rates(1).unwrap();
        assert!(m.get_rates(1).unwrap().is_empty());
    }

    #[test]
    fn vset_dedups() {
        let v = ParseValueSet::new("v0".to_string(), 12);
        v.add(vec![1, 2]);
        v.add(vec![1, 2]);
        assert_eq!(v.get().len(), 1);
        v.remove(&[1, 2]);
        assert!(v.get().is_empty());
    }
}
