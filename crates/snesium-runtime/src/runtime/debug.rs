//! Step requests as seen by the runner.

use snesium_debug::{ProcessorContext, Region, StepKind};

use super::types::RuntimeError;

/// When to pause after resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum StepMode {
    #[default]
    None,
    /// Pause at the next fetch of `context` once `remaining` instructions ran.
    Instructions {
        context: ProcessorContext,
        remaining: u32,
    },
    /// Pause at the first fetch of `context` at or above `depth` after one
    /// instruction ran.
    Over {
        context: ProcessorContext,
        depth: u32,
        started: bool,
    },
    /// Pause at the first fetch of `context` below `depth`.
    Out {
        context: ProcessorContext,
        depth: u32,
    },
    /// Pause after `remaining` raster cycles.
    Dots { remaining: u32 },
    /// Pause at cycle 0 of `target`.
    Scanline { target: u16 },
}

impl StepMode {
    /// Builds the mode for a step request. `depth` is the context's current
    /// call depth.
    pub(crate) fn from_request(
        context: ProcessorContext,
        count: u32,
        kind: StepKind,
        depth: u32,
        region: Region,
    ) -> Result<Self, RuntimeError> {
        let count = count.max(1);
        Ok(match kind {
            StepKind::SingleStep => Self::Instructions {
                context,
                remaining: count,
            },
            StepKind::StepOver => Self::Over {
                context,
                depth,
                started: false,
            },
            // At the outermost level there is nothing to return from.
            StepKind::StepOut if depth == 0 => Self::Over {
                context,
                depth,
                started: false,
            },
            StepKind::StepOut => Self::Out { context, depth },
            StepKind::PpuStep => Self::Dots { remaining: count },
            StepKind::SpecificScanline => {
                let target = u16::try_from(count)
                    .ok()
                    .filter(|line| u32::from(*line) < region.scanlines_per_frame())
                    .ok_or_else(|| RuntimeError::Rejected {
                        op: "step",
                        reason: format!(
                            "scanline {count} out of range for {region} ({} lines)",
                            region.scanlines_per_frame()
                        ),
                    })?;
                Self::Scanline { target }
            }
        })
    }
}
