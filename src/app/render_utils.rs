use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::topology::DeviceClass;

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;
    let mix = |a: u8, b: u8| ((a as f32 * inverse) + (b as f32 * amount)) as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(17, 21, 28));

    let step = (48.0 * zoom.clamp(0.5, 2.0)).max(16.0);
    let origin = rect.center() + pan;
    let dot = Color32::from_rgba_unmultiplied(90, 100, 115, 90);

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
        while y < rect.bottom() {
            painter.circle_filled(Pos2::new(x, y), 1.1, dot);
            y += step;
        }
        x += step;
    }
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

/// Distance from `point` to the segment `start..end`.
pub(super) fn segment_distance(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let along = end - start;
    let length_sq = along.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }

    let t = ((point - start).dot(along) / length_sq).clamp(0.0, 1.0);
    point.distance(start + along * t)
}

/// Dash pieces of the segment `start..end`. `offset` shifts the pattern along the line so
/// that advancing it over time makes the dashes crawl.
pub(super) fn dash_pieces(start: Pos2, end: Pos2, dash: f32, gap: f32, offset: f32) -> Vec<[Pos2; 2]> {
    let along = end - start;
    let length = along.length();
    let period = dash + gap;
    if length <= f32::EPSILON || period <= f32::EPSILON {
        return Vec::new();
    }

    let direction = along / length;
    let mut pieces = Vec::new();
    let mut cursor = -offset.rem_euclid(period);
    while cursor < length {
        let from = cursor.max(0.0);
        let to = (cursor + dash).min(length);
        if to > from {
            pieces.push([start + direction * from, start + direction * to]);
        }
        cursor += period;
    }
    pieces
}

pub(super) fn draw_dashed(painter: &Painter, start: Pos2, end: Pos2, stroke: Stroke, offset: f32) {
    let dash = (stroke.width * 3.0).max(6.0);
    for [from, to] in dash_pieces(start, end, dash, dash * 0.8, offset) {
        painter.line_segment([from, to], stroke);
    }
}

/// Position of a pulse travelling from `start` to `end` that takes `duration_secs` per pass.
pub(super) fn pulse_point(start: Pos2, end: Pos2, time_secs: f64, duration_secs: f32) -> Pos2 {
    let duration = f64::from(duration_secs.max(f32::EPSILON));
    let progress = (time_secs.rem_euclid(duration) / duration) as f32;
    start + (end - start) * progress
}

/// Pulse duration for a data link: one second per 100 world units, never below one second.
pub(super) fn pulse_duration(world_length: f32) -> f32 {
    (world_length / 100.0).max(1.0)
}

pub(super) fn device_icon(class: &DeviceClass) -> &'static str {
    match class {
        DeviceClass::Host => "🖥",
        DeviceClass::Other(name) if name == "firewall" => "🛡",
        DeviceClass::Other(name) if name == "iot" => "📡",
        DeviceClass::Switch | DeviceClass::Other(_) => "🔀",
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    #[test]
    fn screen_and_world_round_trip() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0));
        let pan = vec2(30.0, -12.0);
        let world = vec2(150.0, 75.0);

        let screen = world_to_screen(rect, pan, 1.5, world);
        let back = screen_to_world(rect, pan, 1.5, screen);

        assert!((back - world).length() < 1e-3);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let start = pos2(0.0, 0.0);
        let end = pos2(10.0, 0.0);

        assert_eq!(segment_distance(pos2(5.0, 3.0), start, end), 3.0);
        assert_eq!(segment_distance(pos2(14.0, 3.0), start, end), 5.0);
        assert_eq!(segment_distance(pos2(1.0, 1.0), start, start), 2.0_f32.sqrt());
    }

    #[test]
    fn dashes_stay_on_the_segment() {
        let start = pos2(0.0, 0.0);
        let end = pos2(100.0, 0.0);

        let pieces = dash_pieces(start, end, 10.0, 5.0, 0.0);
        assert_eq!(pieces.len(), 7);
        assert_eq!(pieces[0], [pos2(0.0, 0.0), pos2(10.0, 0.0)]);

        let shifted = dash_pieces(start, end, 10.0, 5.0, 4.0);
        assert_eq!(shifted[0], [pos2(0.0, 0.0), pos2(6.0, 0.0)]);
        assert!(shifted.iter().all(|[from, to]| from.x >= 0.0 && to.x <= 100.0));
    }

    #[test]
    fn pulse_duration_has_a_floor() {
        assert_eq!(pulse_duration(40.0), 1.0);
        assert_eq!(pulse_duration(300.0), 3.0);

        let start = pos2(0.0, 0.0);
        let end = pos2(100.0, 0.0);
        assert_eq!(pulse_point(start, end, 1.5, 2.0), pos2(75.0, 0.0));
    }

    #[test]
    fn unknown_classes_fall_back_to_the_switch_icon() {
        assert_eq!(
            device_icon(&DeviceClass::Other("printer".to_owned())),
            device_icon(&DeviceClass::Switch)
        );
        assert_ne!(
            device_icon(&DeviceClass::Host),
            device_icon(&DeviceClass::Switch)
        );
    }
}
