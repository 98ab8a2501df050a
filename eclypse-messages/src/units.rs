/// Frequency in Hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hertz(pub u64);

impl std::fmt::Display for Hertz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

impl Hertz {
    pub const fn khz(khz: u64) -> Self {
        Self(khz * 1_000)
    }

    pub const fn mhz(mhz: u64) -> Self {
        Self(mhz * 1_000_000)
    }

    pub const fn ghz(ghz: u64) -> Self {
        Self(ghz * 1_000_000_000)
    }

    pub const fn as_hz(self) -> u64 {
        self.0
    }
}

impl From<u64> for Hertz {
    fn from(hz: u64) -> Self {
        Self(hz)
    }
}

impl From<u32> for Hertz {
    fn from(hz: u32) -> Self {
        Self(u64::from(hz))
    }
}

impl From<Hertz> for u64 {
    fn from(hz: Hertz) -> Self {
        hz.0
    }
}

/// Local oscillator correction in parts per million.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Ppm(pub f64);

impl std::fmt::Display for Ppm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.3} ppm", self.0)
    }
}

impl Ppm {
    pub const ZERO: Ppm = Ppm(0.0);

    /// Multiplicative factor applied to a requested frequency:
    /// `1 + ppm * 1e-6`.
    pub fn factor(self) -> f64 {
        1.0 + 1e-6 * self.0
    }
}

impl From<f64> for Ppm {
    fn from(ppm: f64) -> Self {
        Self(ppm)
    }
}

impl From<Ppm> for f64 {
    fn from(ppm: Ppm) -> Self {
        ppm.0
    }
}
