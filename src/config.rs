//! Run-time configuration, loadable from TOML.
//!
//! ```toml
//! [evaluation]
//! max_steps = 10000
//! max_stack_depth = 64
//!
//! [generation]
//! max_depth = 6
//!
//! [evolution]
//! population = 200
//! ```
//!
//! Every field has a default, so any subset of the file may be given.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub evaluation: EvaluationConfig,
    pub generation: GenerationConfig,
    pub evolution: EvolutionConfig,
}

/// Resource limits applied to each top-level evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Total node evaluations allowed, including those inside subroutine calls.
    pub max_steps: u64,
    /// Maximum nesting of subroutine calls.
    pub max_stack_depth: usize,
}

/// Parameters for random tree generation and the structural operators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_depth: u32,
    pub int_min: i32,
    pub int_max: i32,
    pub float_min: f64,
    pub float_max: f64,
    pub max_array_len: usize,
    /// How many times crossover looks for a compatible pair of nodes before giving up.
    pub crossover_retries: usize,
}

/// Parameters for the evolutionary driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population: usize,
    /// Worker threads used for fitness evaluation. `0` uses one per logical CPU.
    pub threads: u32,
    pub random_weight: f32,
    pub mutate_weight: f32,
    pub crossover_weight: f32,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            max_steps: 10_000,
            max_stack_depth: 64,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            max_depth: 6,
            int_min: -10,
            int_max: 10,
            float_min: -1.0,
            float_max: 1.0,
            max_array_len: 8,
            crossover_retries: 16,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population: 200,
            threads: 0,
            random_weight: 0.1,
            mutate_weight: 0.2,
            crossover_weight: 0.5,
        }
    }
}
