// THEORY:
// The `smart_pixel` module is the smallest analytical unit of the diff engine. It
// compares one pixel from each image and quantifies how far apart they are. A
// single pixel means nothing on its own; its value is in the relationship.
//
// Key architectural principles:
// 1.  **Commutative Measure**: Each channel contributes `|a - b|`, so the result
//     never depends on which image is "before" and which is "after". Any
//     asymmetry in the final artifact comes from the renderer, not from here.
// 2.  **Cheap Arithmetic**: The magnitude is a plain sum of the three channel
//     deltas (0..=765). No color-space conversion, no gamma handling; this is a
//     fast, literal measure and it is meant to stay that way.

use image::Rgb;

pub type ChannelDelta = u8;
pub type Magnitude = u16;

/// The largest possible magnitude: every channel differs by 255.
pub const MAX_MAGNITUDE: Magnitude = 3 * 255;

/// Absolute per-channel difference between two RGB pixels.
#[inline]
pub fn channel_deltas(a: &Rgb<u8>, b: &Rgb<u8>) -> [ChannelDelta; 3] {
    [
        a.0[0].abs_diff(b.0[0]),
        a.0[1].abs_diff(b.0[1]),
        a.0[2].abs_diff(b.0[2]),
    ]
}

/// Sum of the three channel deltas.
#[inline]
pub fn magnitude(a: &Rgb<u8>, b: &Rgb<u8>) -> Magnitude {
    channel_deltas(a, b)
        .iter()
        .map(|&delta| delta as Magnitude)
        .sum()
}
