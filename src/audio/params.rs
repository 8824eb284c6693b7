//! Effect parameters
//!
//! Each parameter is a single atomic cell holding the bit pattern of an
//! `f32`. The control thread stores, the audio thread loads once per block.
//! Values are clamped on the way in, so a cell never holds an out-of-range
//! value.

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Discrete parameter (rounded to the nearest integer after clamping)
    pub stepped: bool,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            stepped: false,
        }
    }

    pub const fn stepped(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            stepped: true,
        }
    }

    /// Clamp into the documented range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        let v = value.clamp(self.min, self.max);
        if self.stepped {
            v.round()
        } else {
            v
        }
    }
}

/// Lock-free f32 cell
#[derive(Debug)]
pub struct ParamCell(AtomicU32);

impl ParamCell {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// All parameters of one effect node
#[derive(Debug)]
pub struct ParamBank {
    specs: &'static [ParamSpec],
    cells: Vec<ParamCell>,
}

impl ParamBank {
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        Self {
            specs,
            cells: specs.iter().map(|s| ParamCell::new(s.default)).collect(),
        }
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    /// Index of a parameter by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Store a clamped value. Returns the stored value, or `None` for an
    /// unknown index. Infinities clamp to the nearest bound; NaN leaves the
    /// cell untouched.
    pub fn set(&self, index: usize, value: f32) -> Option<f32> {
        let spec = self.specs.get(index)?;
        let cell = &self.cells[index];
        if value.is_nan() {
            warn!("[Params] Ignoring NaN for '{}'", spec.name);
            return Some(cell.load());
        }
        let clamped = spec.clamp(value);
        cell.store(clamped);
        Some(clamped)
    }

    /// Load by index (audio path)
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.cells.get(index).map(ParamCell::load).unwrap_or(0.0)
    }

    /// Load by name
    pub fn value(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|i| self.get(i))
    }

    /// (name, value) pairs in declaration order
    pub fn values(&self) -> Vec<(&'static str, f32)> {
        self.specs
            .iter()
            .zip(&self.cells)
            .map(|(s, c)| (s.name, c.load()))
            .collect()
    }
}
