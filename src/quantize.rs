//! Frame quantizer
//!
//! Pure conversion of a continuous duration into an integer frame count plus
//! a carried sub-frame remainder. The carry is threaded through successive
//! calls on the same logical timeline so repeated short waits never
//! accumulate rounding drift: the total emitted frame time tracks the total
//! requested time with error bounded by one frame period.

use crate::error::{TimelineError, TimelineResult};

/// Sub-frame remainders smaller than this (in frame units) are treated as
/// exact, so divisions like `(1/24) * 24` stay exact under floating point.
const ROUND_EPS: f64 = 1e-9;

/// Result of quantizing a duration at a given frame rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantized {
    /// Number of whole frames to suspend.
    pub frames: u64,
    /// Leftover sub-frame time in seconds, within `[0, 1/frame_rate)`.
    /// Feed it back as `carry_in` on the next call.
    pub carry: f64,
}

/// Quantize `duration` seconds (plus `carry_in` seconds of leftover from a
/// previous call) into whole frames at `frame_rate` frames per second.
///
/// Rounds to the nearest frame, ties away from zero (`f64::round`). A
/// negative remainder after rounding is folded into one fewer frame so the
/// outgoing carry stays in `[0, 1/frame_rate)` and the conservation
/// invariant `frames / frame_rate + carry == duration + carry_in` holds to
/// floating-point tolerance.
///
/// `duration == 0.0` is valid and yields `round(carry_in * frame_rate)`
/// frames: accumulated carry alone can trigger a frame, and the emitted
/// frame consumes it.
pub fn quantize(duration: f64, frame_rate: f64, carry_in: f64) -> TimelineResult<Quantized> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(TimelineError::InvalidArgument(format!(
            "frame rate must be finite and positive, got {frame_rate}"
        )));
    }
    if !duration.is_finite() {
        return Err(TimelineError::InvalidArgument(format!(
            "duration must be finite, got {duration}"
        )));
    }
    if duration < 0.0 {
        return Err(TimelineError::InvalidDuration(duration));
    }
    if !carry_in.is_finite() || carry_in < 0.0 {
        return Err(TimelineError::InvalidArgument(format!(
            "carry must be finite and non-negative, got {carry_in}"
        )));
    }

    let exact = (duration + carry_in) * frame_rate;
    if !exact.is_finite() {
        return Err(TimelineError::InvalidArgument(format!(
            "frame count overflows: ({duration} + {carry_in}) * {frame_rate}"
        )));
    }
    let mut frames = exact.round();
    let mut rem = exact - frames; // frame units, in [-0.5, 0.5]

    if rem.abs() < ROUND_EPS {
        rem = 0.0;
    } else if rem < 0.0 {
        if duration > 0.0 {
            // Fold the rounded-up frame back so the carry stays non-negative
            // and no requested time is lost.
            frames -= 1.0;
            rem += 1.0;
        } else {
            // Zero-duration flush: the emitted frame consumes the carry.
            rem = 0.0;
        }
    }

    Ok(Quantized {
        frames: frames as u64,
        carry: rem / frame_rate,
    })
}
