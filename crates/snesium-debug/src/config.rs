pub mod region;

use crate::engine::DebuggerFlags;

use self::region::Region;

/// User-facing debugger options.
///
/// Loading and saving these is the front end's business; the core only reads
/// them and forwards the engine-side subset through [`DebuggerConfig::engine_flags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig {
    /// Keep the engine paused on the first break after a view opens.
    pub break_on_open: bool,
    /// Break on the first PPU cycle after a game load or reset.
    pub break_on_power_cycle_reset: bool,
    /// Ask the front end to raise the view that owns a break.
    pub bring_to_front_on_break: bool,
    pub break_on_brk: bool,
    pub break_on_cop: bool,
    pub break_on_wdm: bool,
    pub break_on_stp: bool,
    pub break_on_uninit_read: bool,
    pub region: Region,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            break_on_open: false,
            break_on_power_cycle_reset: false,
            bring_to_front_on_break: true,
            break_on_brk: false,
            break_on_cop: false,
            break_on_wdm: false,
            break_on_stp: false,
            break_on_uninit_read: false,
            region: Region::Ntsc,
        }
    }
}

impl DebuggerConfig {
    /// Break conditions the engine evaluates itself.
    pub fn engine_flags(&self) -> DebuggerFlags {
        let mut flags = DebuggerFlags::empty();
        flags.set(DebuggerFlags::BREAK_ON_BRK, self.break_on_brk);
        flags.set(DebuggerFlags::BREAK_ON_COP, self.break_on_cop);
        flags.set(DebuggerFlags::BREAK_ON_WDM, self.break_on_wdm);
        flags.set(DebuggerFlags::BREAK_ON_STP, self.break_on_stp);
        flags.set(DebuggerFlags::BREAK_ON_UNINIT_READ, self.break_on_uninit_read);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_flags_mirror_break_options() {
        let config = DebuggerConfig {
            break_on_brk: true,
            break_on_stp: true,
            ..DebuggerConfig::default()
        };
        assert_eq!(
            config.engine_flags(),
            DebuggerFlags::BREAK_ON_BRK | DebuggerFlags::BREAK_ON_STP
        );
        assert!(DebuggerConfig::default().engine_flags().is_empty());
    }
}
