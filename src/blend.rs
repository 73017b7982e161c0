//! Brightness blend curves
//!
//! Maps a normalized step time `x` and a control value `k` onto the mix
//! fraction between two source frames. Three base easings are cross-faded
//! along the control domain `[0, 2]`:
//!
//! ```text
//! k:  0 ── 0.1 ─────── 0.7 ─────── 1.3 ─────── 1.9 ── 2
//!     cos  │ cos→lin    │ lin→acos   │ acos→cos  │ cos
//! ```
//!
//! Both tails collapse onto the cosine curve, so the domain reads the same
//! from either end.

use std::f64::consts::PI;

use serde::Serialize;

/// Lower bound of the control domain.
pub const K_MIN: f64 = 0.0;
/// Upper bound of the control domain.
pub const K_MAX: f64 = 2.0;
/// Region seams along the control domain.
pub const SEAMS: [f64; 4] = [0.1, 0.7, 1.3, 1.9];
/// Width of every cross-fade region.
pub const FADE_WIDTH: f64 = 0.6;

/// One of the three base easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BaseCurve {
    Cosine,
    Linear,
    Arccos,
}

impl BaseCurve {
    pub const ALL: [BaseCurve; 3] = [BaseCurve::Cosine, BaseCurve::Linear, BaseCurve::Arccos];

    /// Evaluate the curve at `x`, clamped to `[0, 1]`.
    pub fn eval(self, x: f64) -> f64 {
        let x = clamp_or_low(x, 0.0, 1.0);
        match self {
            BaseCurve::Cosine => cosine(x),
            BaseCurve::Linear => linear(x),
            BaseCurve::Arccos => arccos(x),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseCurve::Cosine => "cosine",
            BaseCurve::Linear => "linear",
            BaseCurve::Arccos => "arccos",
        }
    }
}

/// Ease-in-out: `0.5 * (1 - cos(pi * x))`.
pub fn cosine(x: f64) -> f64 {
    0.5 * (1.0 - (PI * x).cos())
}

/// Identity ramp.
pub fn linear(x: f64) -> f64 {
    x
}

/// `acos(1 - 2x) / pi`, steep at both ends and flat through the middle.
pub fn arccos(x: f64) -> f64 {
    (-2.0 * x + 1.0).clamp(-1.0, 1.0).acos() / PI
}

/// Interval of the control domain a value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlendRegion {
    /// `k <= 0.1` or `k >= 1.9`
    CosineTail,
    /// `0.1 < k <= 0.7`
    CosineToLinear,
    /// `0.7 < k <= 1.3`
    LinearToArccos,
    /// `1.3 < k < 1.9`
    ArccosToCosine,
}

impl BlendRegion {
    /// Classify a control value after clamping it into `[0, 2]`.
    pub fn classify(k: f64) -> Self {
        let k = clamp_or_low(k, K_MIN, K_MAX);
        let [s0, s1, s2, s3] = SEAMS;
        if k <= s0 || k >= s3 {
            BlendRegion::CosineTail
        } else if k <= s1 {
            BlendRegion::CosineToLinear
        } else if k <= s2 {
            BlendRegion::LinearToArccos
        } else {
            BlendRegion::ArccosToCosine
        }
    }

    /// Curves faded from and to across this region.
    pub fn endpoints(self) -> (BaseCurve, BaseCurve) {
        match self {
            BlendRegion::CosineTail => (BaseCurve::Cosine, BaseCurve::Cosine),
            BlendRegion::CosineToLinear => (BaseCurve::Cosine, BaseCurve::Linear),
            BlendRegion::LinearToArccos => (BaseCurve::Linear, BaseCurve::Arccos),
            BlendRegion::ArccosToCosine => (BaseCurve::Arccos, BaseCurve::Cosine),
        }
    }

    /// Control value where the fade starts.
    fn start(self) -> f64 {
        match self {
            BlendRegion::CosineTail => K_MIN,
            BlendRegion::CosineToLinear => SEAMS[0],
            BlendRegion::LinearToArccos => SEAMS[1],
            BlendRegion::ArccosToCosine => SEAMS[2],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BlendRegion::CosineTail => "cosine",
            BlendRegion::CosineToLinear => "cosine-linear",
            BlendRegion::LinearToArccos => "linear-arccos",
            BlendRegion::ArccosToCosine => "arccos-cosine",
        }
    }
}

/// Cross-fade weight `t` in `[0, 1]` of the second endpoint for `k`.
///
/// Always `0` inside the cosine tails.
pub fn fade_weight(k: f64) -> f64 {
    let k = clamp_or_low(k, K_MIN, K_MAX);
    match BlendRegion::classify(k) {
        BlendRegion::CosineTail => 0.0,
        region => ((k - region.start()) / FADE_WIDTH).clamp(0.0, 1.0),
    }
}

/// Brightness mix fraction for step time `x` under control value `k`.
///
/// Out-of-domain inputs are clamped (`x` into `[0, 1]`, `k` into `[0, 2]`,
/// NaN to the lower bound). The result is continuous in both arguments and
/// pinned to `0` at `x = 0` and `1` at `x = 1`.
pub fn blend(x: f64, k: f64) -> f64 {
    let x = clamp_or_low(x, 0.0, 1.0);
    let region = BlendRegion::classify(k);
    let (from, to) = region.endpoints();
    let t = fade_weight(k);
    (1.0 - t) * from.eval(x) + t * to.eval(x)
}

/// One sampled point of a blend curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Sample `blend(x, k)` at `n` evenly spaced points over `[0, 1]`.
pub fn sample_curve(k: f64, n: usize) -> Vec<CurvePoint> {
    linspace(0.0, 1.0, n)
        .into_iter()
        .map(|x| CurvePoint { x, y: blend(x, k) })
        .collect()
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|idx| start + (end - start) * idx as f64 / denom)
                .collect()
        }
    }
}

fn clamp_or_low(value: f64, low: f64, high: f64) -> f64 {
    if value.is_nan() {
        low
    } else {
        value.clamp(low, high)
    }
}
