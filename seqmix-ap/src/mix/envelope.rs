//! Segment gain envelope
//!
//! Linear fade-in / hold / fade-out over one segment's time window. The same
//! shape is evaluated per frame by the renderer and scheduled as gain ramps
//! by the live scheduler.
//!
//! When `fade_in + fade_out` exceeds the segment duration, both fades are
//! scaled by `duration / (fade_in + fade_out)` so the ramps meet at full gain
//! instead of crossing.

use serde::Serialize;

/// Envelope of one placement, in absolute timeline seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    /// Window start (gain 0)
    pub start: f64,
    /// Window length
    pub duration: f64,
    /// Effective fade-in length after clamping
    pub fade_in: f64,
    /// Effective fade-out length after clamping
    pub fade_out: f64,
}

impl Envelope {
    /// Build an envelope, clamping the requested fades to fit `duration`
    pub fn new(start: f64, duration: f64, fade_in: f64, fade_out: f64) -> Self {
        let duration = duration.max(0.0);
        let (fade_in, fade_out) = effective_fades(duration, fade_in, fade_out);
        Self {
            start,
            duration,
            fade_in,
            fade_out,
        }
    }

    /// Window end (gain 0)
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Time the fade-in reaches full gain
    pub fn fade_in_end(&self) -> f64 {
        self.start + self.fade_in
    }

    /// Time the fade-out begins
    pub fn fade_out_start(&self) -> f64 {
        self.end() - self.fade_out
    }

    /// Gain at absolute time `t`
    ///
    /// 0 outside the window, linear inside the ramps, 1 on the hold.
    #[inline]
    pub fn gain_at(&self, t: f64) -> f32 {
        if t < self.start || t > self.end() {
            return 0.0;
        }
        let up = if self.fade_in > 0.0 {
            (t - self.start) / self.fade_in
        } else {
            1.0
        };
        let down = if self.fade_out > 0.0 {
            (self.end() - t) / self.fade_out
        } else {
            1.0
        };
        up.min(down).clamp(0.0, 1.0) as f32
    }
}

/// Fade lengths that fit within `duration`
///
/// Negative or non-finite fades count as 0; a combined length above
/// `duration` is scaled down proportionally.
pub fn effective_fades(duration: f64, fade_in: f64, fade_out: f64) -> (f64, f64) {
    let sanitize = |f: f64| if f.is_finite() && f > 0.0 { f } else { 0.0 };
    let (fade_in, fade_out) = (sanitize(fade_in), sanitize(fade_out));
    let total = fade_in + fade_out;
    if total <= duration || total == 0.0 {
        (fade_in, fade_out)
    } else {
        let scale = duration.max(0.0) / total;
        (fade_in * scale, fade_out * scale)
    }
}
