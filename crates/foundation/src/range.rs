/// Half-open resolution interval `[min, max)`.
///
/// Resolution is map units per pixel, so larger values are further zoomed out.
/// `max` may be `f64::INFINITY`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolutionRange {
    pub min: f64,
    pub max: f64,
}

impl ResolutionRange {
    pub const fn new(min: f64, max: f64) -> Self {
        ResolutionRange { min, max }
    }

    /// Range starting at `min` with no upper bound.
    pub const fn at_least(min: f64) -> Self {
        ResolutionRange {
            min,
            max: f64::INFINITY,
        }
    }

    /// Includes `min`, excludes `max`. NaN is never contained.
    pub fn contains(&self, resolution: f64) -> bool {
        resolution >= self.min && resolution < self.max
    }
}
