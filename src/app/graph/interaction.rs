use eframe::egui::{self, Context, Key, Modifiers, PointerButton, Pos2, Rect, Ui};

use crate::session::SessionState;
use crate::topology::Position;

use super::super::render_utils::screen_to_world;
use super::super::{CanvasDrag, EditorModel, StatusLine};
use super::build::CanvasGeometry;

impl EditorModel {
    pub(in crate::app) fn handle_canvas_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(0.15, 4.0);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    /// Escape closes whatever is open; Ctrl/Cmd+D duplicates the hovered device.
    pub(in crate::app) fn handle_shortcuts(&mut self, ctx: &Context) {
        if ctx.input(|input| input.key_pressed(Key::Escape)) {
            self.session.dismiss();
            self.drag = None;
            self.edit_error = None;
        }

        if ctx.input_mut(|input| input.consume_key(Modifiers::COMMAND, Key::D)) {
            self.status = Some(match self.session.duplicate_node() {
                Ok(id) => StatusLine::info(format!("Duplicated device as {id}")),
                Err(error) => StatusLine::error(error.to_string()),
            });
        }
    }

    /// Hover drives focus, which is what duplication acts on.
    pub(in crate::app) fn update_focus(
        &mut self,
        geometry: &CanvasGeometry,
        pointer: Option<Pos2>,
    ) {
        let hovered = pointer
            .and_then(|pointer| geometry.node_at(pointer))
            .map(|node| node.id.as_str());
        if self.session.focused() != hovered {
            self.session.set_focus(hovered);
        }
    }

    pub(in crate::app) fn handle_canvas_pointer(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        geometry: &CanvasGeometry,
    ) {
        if response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }

        if response.drag_started_by(PointerButton::Primary) {
            let (origin, shift) =
                ui.input(|input| (input.pointer.press_origin(), input.modifiers.shift));
            self.drag = Some(match origin.and_then(|origin| geometry.node_at(origin)) {
                Some(node) if shift => CanvasDrag::Connect {
                    from: node.id.clone(),
                },
                Some(node) => CanvasDrag::Move {
                    node: node.id.clone(),
                },
                None => CanvasDrag::Pan,
            });
        }

        if response.dragged_by(PointerButton::Primary) {
            match self.drag.clone() {
                Some(CanvasDrag::Move { node }) => self.drag_node(&node, response.drag_delta()),
                Some(CanvasDrag::Pan) => self.pan += response.drag_delta(),
                Some(CanvasDrag::Connect { .. }) | None => {}
            }
        }

        if response.drag_stopped() {
            if let Some(CanvasDrag::Connect { from }) = self.drag.take() {
                let pointer = ui.input(|input| input.pointer.latest_pos());
                if let Some(target) = pointer.and_then(|pointer| geometry.node_at(pointer))
                    && target.id != from
                {
                    self.connect_nodes(&from, &target.id);
                }
            }
            self.drag = None;
        }

        if response.clicked_by(PointerButton::Primary) {
            let pointer = response.interact_pointer_pos();
            self.apply_canvas_click(pointer, rect, geometry);
        }
    }

    fn drag_node(&mut self, id: &str, screen_delta: egui::Vec2) {
        let Some(current) = self.session.snapshot().node(id).map(|node| node.position) else {
            self.drag = None;
            return;
        };

        let next = Position::from_vec2(current.to_vec2() + screen_delta / self.zoom);
        if let Err(error) = self.session.move_node(id, next) {
            self.edit_error = Some(error.to_string());
        }
    }

    fn connect_nodes(&mut self, from: &str, to: &str) {
        let kind = self.connect_kind.clone();
        self.status = Some(match self.session.connect(from, to, kind) {
            Ok(id) => StatusLine::info(format!("Connected {from} to {to} as {id}")),
            Err(error) => {
                tracing::warn!(%error, "rejected connection");
                StatusLine::error(error.to_string())
            }
        });
    }

    fn apply_canvas_click(
        &mut self,
        pointer: Option<Pos2>,
        rect: Rect,
        geometry: &CanvasGeometry,
    ) {
        let Some(pointer) = pointer.filter(|pointer| rect.contains(*pointer)) else {
            return;
        };

        let result = if let Some(node) = geometry.node_at(pointer) {
            self.session.select_node(&node.id)
        } else if let Some(edge) = geometry.edge_at(pointer) {
            self.session.select_edge(&edge.id)
        } else {
            if matches!(
                self.session.state(),
                SessionState::NodeSelected | SessionState::EdgeSelected
            ) {
                self.session.dismiss();
            }
            Ok(())
        };

        self.edit_error = result.err().map(|error| error.to_string());
    }
}
