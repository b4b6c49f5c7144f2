use std::collections::HashSet;

use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke, StrokeKind, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::topology::{IP_ADDRESS_KEY, LinkStatus};
use crate::util::{format_percent, truncate_label};

use super::super::render_utils::{
    blend_color, device_icon, draw_background, draw_dashed, pulse_duration, pulse_point,
};
use super::super::{CanvasDrag, EditorModel};

const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const MATCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
const DASH_SPEED: f32 = 18.0;

impl EditorModel {
    /// Ids of nodes whose label fuzzy-matches the search box.
    fn search_matches(&self) -> HashSet<String> {
        let query = self.search.trim();
        if query.is_empty() {
            return HashSet::new();
        }

        let matcher = SkimMatcherV2::default().ignore_case();
        self.session
            .snapshot()
            .nodes
            .iter()
            .filter(|node| matcher.fuzzy_match(node.label(), query).is_some())
            .map(|node| node.id.clone())
            .collect()
    }

    pub(in crate::app) fn draw_canvas(&mut self, ui: &mut Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, self.pan, self.zoom);

        self.handle_canvas_zoom(ui, rect, &response);

        let geometry = self.build_geometry(rect);
        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer));
        self.update_focus(&geometry, pointer);
        self.handle_canvas_pointer(ui, rect, &response, &geometry);

        // Positions may have moved during pointer handling.
        let geometry = self.build_geometry(rect);
        let matches = self.search_matches();
        let time = ui.input(|input| input.time);
        let zoom_sqrt = self.zoom.sqrt();
        let mut animating = false;

        let snapshot = self.session.snapshot();
        let derived = self.session.derived();
        let selected_edge = self.session.selected_edge().map(|edge| edge.id.as_str());
        let hovered_edge = pointer
            .filter(|pointer| geometry.node_at(*pointer).is_none())
            .and_then(|pointer| geometry.edge_at(pointer))
            .map(|edge| edge.id.as_str());

        for canvas_edge in &geometry.edges {
            let Some(view) = derived.edge(&canvas_edge.id) else {
                continue;
            };
            let is_selected = selected_edge == Some(canvas_edge.id.as_str());
            let is_hovered = hovered_edge == Some(canvas_edge.id.as_str());

            let mut color = view.style.color;
            if is_selected {
                color = SELECTED_COLOR;
            } else if is_hovered {
                color = blend_color(color, Color32::WHITE, 0.35);
            }
            let mut width = (view.style.width * zoom_sqrt).clamp(1.0, 8.0);
            if is_selected {
                width += 1.5;
            }
            let stroke = Stroke::new(width, color);

            if view.style.dashed {
                let offset = if view.animate {
                    animating = true;
                    (time as f32) * DASH_SPEED
                } else {
                    0.0
                };
                draw_dashed(&painter, canvas_edge.start, canvas_edge.end, stroke, offset);
            } else {
                painter.line_segment([canvas_edge.start, canvas_edge.end], stroke);
            }

            if view.style.pulse && view.animate {
                animating = true;
                let duration = pulse_duration(canvas_edge.world_length);
                let point = pulse_point(canvas_edge.start, canvas_edge.end, time, duration);
                painter.circle_filled(point, (4.0 * zoom_sqrt).clamp(2.5, 7.0), color);
            }

            if self.zoom > 0.6 || is_hovered || is_selected {
                let Some(edge) = snapshot.edge(&canvas_edge.id) else {
                    continue;
                };
                let mid = canvas_edge.start + (canvas_edge.end - canvas_edge.start) * 0.5;
                let text = if derived.heat_mode {
                    format!("{} · {}", edge.label(), format_percent(view.utilization))
                } else {
                    edge.label().to_owned()
                };
                painter.text(
                    mid + vec2(0.0, -8.0),
                    Align2::CENTER_BOTTOM,
                    text,
                    FontId::proportional(11.0),
                    if view.status == LinkStatus::Down {
                        Color32::from_gray(120)
                    } else {
                        Color32::from_gray(215)
                    },
                );
            }
        }

        if let Some(CanvasDrag::Connect { from }) = &self.drag
            && let (Some(source), Some(pointer)) = (geometry.node(from), pointer)
        {
            painter.line_segment(
                [source.rect.center(), pointer],
                Stroke::new(2.0, MATCH_COLOR),
            );
        }

        let selected_node = self.session.selected_node().map(|node| node.id.as_str());
        let focused = self.session.focused();
        let corner = 8.0 * self.zoom;

        for (index, canvas_node) in geometry.nodes.iter().enumerate() {
            let (Some(node), Some(view)) =
                (snapshot.nodes.get(index), derived.node(&canvas_node.id))
            else {
                continue;
            };
            let rect = canvas_node.rect;
            let is_selected = selected_node == Some(node.id.as_str());
            let is_focused = focused == Some(node.id.as_str());
            let is_match = matches.contains(&node.id);

            let mut fill = view.style.fill.gamma_multiply(view.style.opacity);
            if is_focused {
                fill = blend_color(fill, Color32::WHITE, 0.12);
            }
            let border = if is_selected {
                Stroke::new(2.5, SELECTED_COLOR)
            } else if is_match {
                Stroke::new(2.0, MATCH_COLOR)
            } else {
                Stroke::new(1.2, view.style.border.gamma_multiply(view.style.opacity))
            };

            painter.rect_filled(rect, corner, fill);
            painter.rect_stroke(rect, corner, border, StrokeKind::Inside);

            let text_color = Color32::from_gray(245).gamma_multiply(view.style.opacity.max(0.6));
            let icon_size = (20.0 * self.zoom).clamp(8.0, 40.0);
            painter.text(
                rect.left_center() + vec2(10.0 * self.zoom, 0.0),
                Align2::LEFT_CENTER,
                device_icon(&view.class),
                FontId::proportional(icon_size),
                text_color,
            );

            if self.zoom < 0.35 {
                continue;
            }
            let text_left = rect.left_center() + vec2(16.0 * self.zoom + icon_size, 0.0);
            painter.text(
                text_left - vec2(0.0, 7.0 * self.zoom),
                Align2::LEFT_CENTER,
                truncate_label(node.label(), 16),
                FontId::proportional((13.0 * self.zoom).clamp(8.0, 26.0)),
                text_color,
            );

            let address = node
                .attributes
                .get_present(IP_ADDRESS_KEY)
                .map(ToString::to_string)
                .or_else(|| view.address.clone());
            let subtitle = match address {
                Some(address) => format!("{} · {address}", view.class.as_str()),
                None => view.class.as_str().to_owned(),
            };
            painter.text(
                text_left + vec2(0.0, 9.0 * self.zoom),
                Align2::LEFT_CENTER,
                truncate_label(&subtitle, 24),
                FontId::proportional((10.0 * self.zoom).clamp(7.0, 20.0)),
                text_color.gamma_multiply(0.75),
            );
        }

        if let Some(id) = focused
            && let Some(node) = snapshot.node(id)
        {
            let edges = snapshot.incident_edges(id).count();
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  {edges} connections  |  Ctrl+D to duplicate", node.label()),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if focused.is_some() || hovered_edge.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        if animating || response.dragged() {
            ui.ctx().request_repaint();
        }
    }
}
