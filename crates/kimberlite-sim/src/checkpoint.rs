//! Simulation checkpointing for fast-forward replay.
//!
//! This module provides snapshot and restore capabilities for VOPR simulations,
//! enabling efficient binary search through execution history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::SimRng;

// ============================================================================
// RNG State
// ============================================================================

/// RNG state for deterministic resumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngCheckpoint {
    /// Original seed.
    pub seed: u64,
    /// Number of random values generated so far.
    pub step_count: u64,
}

impl RngCheckpoint {
    /// Creates a checkpoint of current RNG state.
    pub fn from_rng(rng: &SimRng, seed: u64) -> Self {
        Self {
            seed,
            step_count: rng.step_count(),
        }
    }

    /// Restores RNG to this checkpoint.
    pub fn restore(&self) -> SimRng {
        // PRECONDITION: step_count must be reasonable
        const MAX_RNG_STEPS: u64 = 10_000_000; // 10M steps max
        assert!(
            self.step_count <= MAX_RNG_STEPS,
            "RNG step count {} exceeds maximum {}",
            self.step_count,
            MAX_RNG_STEPS
        );

        let mut rng = SimRng::new(self.seed);
        // Fast-forward to the checkpointed step count (now bounded)
        for _ in 0..self.step_count {
            let _ = rng.next_u64();
        }
        rng
    }
}

// ============================================================================
// Simulation Checkpoint
// ============================================================================

/// Full simulation state snapshot for fast-forward replay.
///
/// Note: This is a lightweight checkpoint focusing on RNG state and event count.
/// Full state restoration (including event queue and storage) would require
/// Event/EventKind to implement Serialize, which we can add if needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationCheckpoint {
    /// Event count at checkpoint.
    pub event_count: u64,
    /// Simulation time (ns).
    pub time_ns: u64,
    /// RNG state.
    pub rng_state: RngCheckpoint,
    /// Generic state data (for extensibility).
    pub state_data: HashMap<String, Vec<u8>>,
}

impl SimulationCheckpoint {
    /// Creates a new empty checkpoint.
    pub fn new(event_count: u64, time_ns: u64, rng_state: RngCheckpoint) -> Self {
        Self {
            event_count,
            time_ns,
            rng_state,
            state_data: HashMap::new(),
        }
    }

    /// Adds state data to the checkpoint.
    pub fn with_state_data(mut self, key: String, data: Vec<u8>) -> Self {
        self.state_data.insert(key, data);
        self
    }

    /// Serializes checkpoint to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Deserializes checkpoint from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(postcard::from_bytes(bytes)?)
    }

    /// Estimates memory usage in bytes.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .state_data
                .values()
                .map(|v| v.len())
                .sum::<usize>()
    }
}

// ============================================================================
// Checkpoint Manager
// ============================================================================

/// Manages simulation checkpoints for bisection.
pub struct CheckpointManager {
    /// Checkpoints indexed by event count.
    checkpoints: std::collections::BTreeMap<u64, SimulationCheckpoint>,
    /// Maximum checkpoints to keep.
    max_checkpoints: usize,
}

impl CheckpointManager {
    /// Creates a new checkpoint manager.
    pub fn new(max_checkpoints: usize) -> Self {
        Self {
            checkpoints: std::collections::BTreeMap::new(),
            max_checkpoints,
        }
    }

    /// Saves a checkpoint.
    pub fn save(&mut self, checkpoint: SimulationCheckpoint) {
        // PRECONDITION: event_count must be non-negative (u64 guarantees this)
        // Allow 0 for initial state checkpoints

        // Check monotonicity: new checkpoint should be after the last one
        if let Some(last_key) = self.checkpoints.keys().next_back() {
            if checkpoint.event_count <= *last_key {
                // Allow same event_count (replacement), but warn on going backwards
                debug_assert!(
                    checkpoint.event_count >= *last_key,
                    "checkpoint event_count not monotonic: last={}, new={}",
                    last_key,
                    checkpoint.event_count
                );
            }
        }

        let event_count = checkpoint.event_count;
        self.checkpoints.insert(event_count, checkpoint);

        // Evict oldest checkpoints if over limit
        while self.checkpoints.len() > self.max_checkpoints {
            if let Some(first_key) = self.checkpoints.keys().next().copied() {
                let evicted = self.checkpoints.remove(&first_key);

                // POSTCONDITION: evicted checkpoint should be oldest
                if let Some(evicted) = evicted {
                    if let Some(new_first) = self.checkpoints.keys().next() {
                        assert!(
                            evicted.event_count < *new_first,
                            "evicted checkpoint not oldest: evicted={}, first={}",
                            evicted.event_count,
                            new_first
                        );
                    }
                }
            }
        }

        // POSTCONDITION: checkpoints remain sorted (BTreeMap guarantees this)
        debug_assert!(
            self.checkpoints.len() <= self.max_checkpoints,
            "checkpoint count {} exceeds maximum {}",
            self.checkpoints.len(),
            self.max_checkpoints
        );
    }

    /// Finds the closest checkpoint before or at the given event count.
    pub fn find_closest(&self, max_event_count: u64) -> Option<&SimulationCheckpoint> {
        self.checkpoints
            .range(..=max_event_count)
            .next_back()
            .map(|(_, checkpoint)| checkpoint)
    }

    /// Returns the number of checkpoints stored.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Returns true if no checkpoints are stored.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Clears all checkpoints.
    pub fn clear(&mut self) {
        self.checkpoints.clear();
    }

    /// Returns total memory usage of all checkpoints.
    pub fn total_size_bytes(&self) -> usize {
        self.checkpoints
            .values()
            .map(|c| c.size_bytes())
            .sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
