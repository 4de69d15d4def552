//! Emulator configuration.
//!
//! Typed configuration with a bon builder and environment variable fallbacks.

use bon::bon;
use snafu::ensure;

use crate::error::{InvalidConfigSnafu, Result};

/// Default number of work-items per wavefront.
pub const DEFAULT_WAVEFRONT_SIZE: usize = 64;

/// Default active-mask stack capacity, in frames.
pub const DEFAULT_MAX_STACK_SIZE: usize = 32;

/// Largest accepted active-mask stack capacity, in frames.
pub const MAX_STACK_SIZE_LIMIT: usize = 1024;

/// Configuration shared by every ND-Range of an emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmuConfig {
    /// Work-items per wavefront.
    pub wavefront_size: usize,
    /// Active-mask stack frames per wavefront.
    pub max_stack_size: usize,
    /// Attach an opcode histogram to new ND-Ranges.
    pub inst_histogram: bool,
    /// Stop the driving loop after this many executed instructions.
    pub max_inst: Option<u64>,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            wavefront_size: DEFAULT_WAVEFRONT_SIZE,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            inst_histogram: false,
            max_inst: None,
        }
    }
}

#[bon]
impl EmuConfig {
    /// Create an emulator configuration with builder pattern.
    #[builder(finish_fn = build)]
    pub fn builder(
        #[builder(default = DEFAULT_WAVEFRONT_SIZE)] wavefront_size: usize,
        #[builder(default = DEFAULT_MAX_STACK_SIZE)] max_stack_size: usize,
        #[builder(default = false)] inst_histogram: bool,
        max_inst: Option<u64>,
    ) -> Self {
        Self { wavefront_size, max_stack_size, inst_histogram, max_inst }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `WAVESIM_WAVEFRONT_SIZE` - Work-items per wavefront (default: 64)
    /// * `WAVESIM_MAX_STACK_SIZE` - Active-mask stack frames (default: 32)
    /// * `WAVESIM_REPORT` - Collect opcode histograms if set
    /// * `WAVESIM_MAX_INST` - Instruction limit for the driving loop
    pub fn from_env() -> Self {
        let wavefront_size =
            std::env::var("WAVESIM_WAVEFRONT_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_WAVEFRONT_SIZE);
        let max_stack_size =
            std::env::var("WAVESIM_MAX_STACK_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_MAX_STACK_SIZE);
        let inst_histogram = std::env::var("WAVESIM_REPORT").is_ok();
        let max_inst = std::env::var("WAVESIM_MAX_INST").ok().and_then(|s| s.parse().ok());

        Self { wavefront_size, max_stack_size, inst_histogram, max_inst }
    }

    /// Reject sizes the layout and the active-mask stack cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.wavefront_size >= 1, InvalidConfigSnafu { reason: "wavefront size must be at least 1" });
        ensure!(
            self.max_stack_size >= 2,
            InvalidConfigSnafu { reason: format!("max stack size must be at least 2, got {}", self.max_stack_size) }
        );
        ensure!(
            self.max_stack_size <= MAX_STACK_SIZE_LIMIT,
            InvalidConfigSnafu {
                reason: format!("max stack size must be at most {MAX_STACK_SIZE_LIMIT}, got {}", self.max_stack_size)
            }
        );
        Ok(())
    }
}
