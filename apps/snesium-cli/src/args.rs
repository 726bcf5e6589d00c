use std::path::PathBuf;

use clap::Parser;
use snesium_debug::Region;
use tracing::Level;

/// Snesium debugger console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Command script to run instead of reading stdin
    pub script: Option<PathBuf>,

    /// Stay paused on the first break after a view opens
    #[arg(long)]
    pub break_on_open: bool,

    /// Break on the first PPU cycle after a load or reset
    #[arg(long)]
    pub break_on_reset: bool,

    /// Break on BRK and COP
    #[arg(long)]
    pub break_on_traps: bool,

    /// Break when uninitialized RAM is read
    #[arg(long)]
    pub break_on_uninit_read: bool,

    #[arg(long, default_value_t = Region::Ntsc)]
    pub region: Region,

    /// Run as fast as possible instead of at the region's frame rate
    #[arg(long)]
    pub unthrottled: bool,

    #[arg(long, default_value_t = Level::WARN)]
    pub log_level: Level,
}
