//! Module communication bus.
//!
//! A per-node key/value board that lets independent modules (energy model,
//! interfaces, applications) share numeric state without knowing each other.

use hashbrown::HashMap;

/// Bus key under which the energy model publishes the current energy.
pub const ENERGY_VALUE: &str = "Energy.value";

#[derive(Debug, Clone, Default)]
pub struct ModuleBus {
    properties: HashMap<String, f64>,
}

impl ModuleBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.properties.get(key).copied()
    }

    /// Set a property, replacing any previous value.
    pub fn update_property(&mut self, key: &str, value: f64) {
        match self.properties.get_mut(key) {
            Some(v) => *v = value,
            None => {
                self.properties.insert(key.to_owned(), value);
            }
        }
    }

    /// Add `delta` to a property (missing counts as zero). Returns the new value.
    pub fn update_double(&mut self, key: &str, delta: f64) -> f64 {
        let value = self.get(key).unwrap_or(0.0) + delta;
        self.update_property(key, value);
        value
    }

    pub fn reset(&mut self) {
        self.properties.clear();
    }
}
