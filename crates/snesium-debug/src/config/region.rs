use core::{fmt, str::FromStr};

/// PPU dots per scanline. Identical for both display standards.
pub const CYCLES_PER_SCANLINE: u32 = 341;

/// Display standard used to size raster steps.
///
/// A "run one frame" request is `CYCLES_PER_SCANLINE * scanlines_per_frame()`
/// raster cycles, so the frame size must come from here instead of a
/// hard-coded NTSC constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    /// 60Hz timing, 262 scanlines per frame.
    #[default]
    Ntsc,
    /// 50Hz timing, 312 scanlines per frame.
    Pal,
}

impl Region {
    pub const fn scanlines_per_frame(self) -> u32 {
        match self {
            Region::Ntsc => 262,
            Region::Pal => 312,
        }
    }

    pub const fn cycles_per_scanline(self) -> u32 {
        CYCLES_PER_SCANLINE
    }

    pub const fn cycles_per_frame(self) -> u32 {
        self.cycles_per_scanline() * self.scanlines_per_frame()
    }

    /// Nominal frame rate, used by engines to pace frames.
    pub fn frames_per_second(self) -> f64 {
        match self {
            Region::Ntsc => 60.098_8,
            Region::Pal => 50.007,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Ntsc => "ntsc",
            Region::Pal => "pal",
        };
        f.write_str(s)
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ntsc" => Ok(Region::Ntsc),
            "pal" => Ok(Region::Pal),
            other => Err(format!("unknown region `{other}` (expected ntsc or pal)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_follows_region() {
        assert_eq!(Region::Ntsc.cycles_per_frame(), 341 * 262);
        assert_eq!(Region::Pal.cycles_per_frame(), 341 * 312);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("PAL".parse::<Region>(), Ok(Region::Pal));
        assert!("secam".parse::<Region>().is_err());
    }
}
