//! Tray glyphs for each icon tier.
//!
//! Drawn at runtime as a sun: a filled disc plus eight rays whose length
//! and opacity grow with the tier, so no image files are needed.

use std::f32::consts::FRAC_PI_4;
use tauri::image::Image;

use crate::level::IconTier;

pub const ICON_SIZE: u32 = 32;

const SUN_COLOR: [u8; 3] = [255, 200, 64];
const DISC_RADIUS: f32 = 6.5;
const RAY_START: f32 = 9.0;
const RAY_HALF_WIDTH: f32 = 1.3;

struct TierStyle {
    ray_end: f32,
    alpha: u8,
}

fn style(tier: IconTier) -> TierStyle {
    match tier {
        IconTier::Low => TierStyle { ray_end: 11.0, alpha: 150 },
        IconTier::Mid => TierStyle { ray_end: 13.0, alpha: 210 },
        IconTier::High => TierStyle { ray_end: 15.5, alpha: 255 },
    }
}

/// raw rgba buffer, row major, `ICON_SIZE * ICON_SIZE * 4` bytes
pub fn render_rgba(tier: IconTier) -> Vec<u8> {
    let TierStyle { ray_end, alpha } = style(tier);
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let mut rgba = Vec::with_capacity((ICON_SIZE * ICON_SIZE * 4) as usize);

    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = dx.hypot(dy);

            let on_disc = dist <= DISC_RADIUS;
            let on_ray = (RAY_START..=ray_end).contains(&dist) && {
                // distance from the nearest of the eight ray axes
                let angle = dy.atan2(dx).rem_euclid(FRAC_PI_4);
                let off_axis = angle.min(FRAC_PI_4 - angle);
                dist * off_axis.sin() <= RAY_HALF_WIDTH
            };

            if on_disc || on_ray {
                rgba.extend_from_slice(&[SUN_COLOR[0], SUN_COLOR[1], SUN_COLOR[2], alpha]);
            } else {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    rgba
}

pub fn tier_icon(tier: IconTier) -> Image<'static> {
    Image::new_owned(render_rgba(tier), ICON_SIZE, ICON_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(rgba: &[u8], x: u32, y: u32) -> u8 {
        rgba[((y * ICON_SIZE + x) * 4 + 3) as usize]
    }

    fn opaque_pixels(rgba: &[u8]) -> usize {
        rgba.chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    #[test]
    fn buffer_has_expected_size() {
        for tier in [IconTier::Low, IconTier::Mid, IconTier::High] {
            assert_eq!(render_rgba(tier).len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        }
    }

    #[test]
    fn centre_is_drawn_and_corners_are_clear() {
        let rgba = render_rgba(IconTier::Mid);
        assert!(alpha_at(&rgba, 16, 16) > 0);
        assert_eq!(alpha_at(&rgba, 0, 0), 0);
        assert_eq!(alpha_at(&rgba, ICON_SIZE - 1, ICON_SIZE - 1), 0);
    }

    #[test]
    fn brighter_tiers_draw_longer_rays() {
        let low = opaque_pixels(&render_rgba(IconTier::Low));
        let mid = opaque_pixels(&render_rgba(IconTier::Mid));
        let high = opaque_pixels(&render_rgba(IconTier::High));
        assert!(low < mid, "low {low} mid {mid}");
        assert!(mid < high, "mid {mid} high {high}");
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render_rgba(IconTier::High), render_rgba(IconTier::High));
    }
}
