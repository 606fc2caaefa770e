//! Default bitrate model and bitrate ceilings

use crate::capabilities::Resolution;

/// Ceiling applied unless the user unlocks the bitrate limit.
pub const STANDARD_CEILING_KBPS: u32 = 150_000;

/// Ceiling applied when the bitrate limit is unlocked.
pub const UNLOCKED_CEILING_KBPS: u32 = 500_000;

/// Mbps at 30 fps for reference pixel counts.
const RESOLUTION_FACTORS: [(u64, f32); 6] = [
    (640 * 360, 1.0),
    (854 * 480, 2.0),
    (1280 * 720, 5.0),
    (1920 * 1080, 10.0),
    (2560 * 1440, 20.0),
    (3840 * 2160, 40.0),
];

fn resolution_factor(pixels: u64) -> f32 {
    let (first_pixels, first_factor) = RESOLUTION_FACTORS[0];
    if pixels <= first_pixels {
        return first_factor;
    }
    for pair in RESOLUTION_FACTORS.windows(2) {
        let (lo_pixels, lo_factor) = pair[0];
        let (hi_pixels, hi_factor) = pair[1];
        if pixels <= hi_pixels {
            let t = (pixels - lo_pixels) as f32 / (hi_pixels - lo_pixels) as f32;
            return lo_factor + t * (hi_factor - lo_factor);
        }
    }
    RESOLUTION_FACTORS[RESOLUTION_FACTORS.len() - 1].1
}

/// Frame rate scales linearly up to 60 fps and sub-linearly beyond. Rates
/// below 1 fps count as 1.
fn frame_rate_factor(fps: u32) -> f32 {
    let fps = fps.max(1) as f32;
    let effective = if fps <= 60.0 {
        fps
    } else {
        (fps / 60.0).sqrt() * 60.0
    };
    effective / 30.0
}

/// Default bitrate in kbps for a stream, rounded to whole Mbps and at least
/// 1 Mbps.
///
/// 4:4:4 doubles the raw chroma data and therefore the budget.
pub fn default_bitrate_kbps(resolution: Resolution, fps: u32, yuv444: bool) -> u32 {
    let mut factor = resolution_factor(resolution.pixels());
    if yuv444 {
        factor *= 2.0;
    }
    let mbps = ((factor * frame_rate_factor(fps)).round() as u32).max(1);
    mbps.saturating_mul(1000)
}

/// Bitrate ceiling for the given unlock state.
pub fn ceiling_kbps(unlocked: bool) -> u32 {
    if unlocked {
        UNLOCKED_CEILING_KBPS
    } else {
        STANDARD_CEILING_KBPS
    }
}
