//! Widget geometry, visibility flags and their projection into class and
//! style strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::calls::CallSummary;

const DEFAULT_PADDING: i32 = 10;

/// Screen edge the widget is anchored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    /// Sign applied to horizontal offsets.
    pub fn factor(self) -> i32 {
        match self {
            Direction::Left => 1,
            Direction::Right => -1,
        }
    }

    pub fn as_class(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// How a pointer gesture on the header ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragRelease {
    /// Released without moving.
    Click,
    Moved,
    /// No gesture was in progress.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct DragGesture {
    start_x: i32,
    start_y: i32,
    origin_x: i32,
    origin_y: i32,
}

/// Visual state of the floating widget.
#[derive(Debug, Clone)]
pub struct WidgetState {
    pub direction: Direction,
    pub closed: bool,
    pub minimized: bool,
    pub dragging: bool,
    pub hover: bool,
    pub hover_header: bool,
    /// True until the frame pushes its first adapter state.
    pub loading: bool,
    pub ringing: bool,
    pub dock_ui: bool,
    pub user_status: Option<String>,
    pub dnd_status: Option<String>,
    pub translate_x: i32,
    pub translate_y: i32,
    pub min_translate_x: i32,
    pub min_translate_y: i32,
    pub padding: i32,
    pub z_index: i32,
    pub current_path: String,
    drag: Option<DragGesture>,
}

impl WidgetState {
    pub fn new(direction: Direction, dock_ui: bool, z_index: i32) -> Self {
        Self {
            direction,
            closed: false,
            minimized: false,
            dragging: false,
            hover: false,
            hover_header: false,
            loading: true,
            ringing: false,
            dock_ui,
            user_status: None,
            dnd_status: None,
            translate_x: 0,
            translate_y: 0,
            min_translate_x: 0,
            min_translate_y: 0,
            padding: DEFAULT_PADDING,
            z_index,
            current_path: String::new(),
            drag: None,
        }
    }

    /// Presence is known once the frame reported a user or DND status.
    pub fn has_presence(&self) -> bool {
        let known = |status: &Option<String>| status.as_deref().is_some_and(|s| !s.is_empty());
        known(&self.user_status) || known(&self.dnd_status)
    }

    pub fn begin_drag(&mut self, x: i32, y: i32) {
        let (origin_x, origin_y) = if self.minimized {
            (self.min_translate_x, self.min_translate_y)
        } else {
            (self.translate_x, self.translate_y)
        };
        self.drag = Some(DragGesture {
            start_x: x,
            start_y: y,
            origin_x,
            origin_y,
        });
    }

    /// Move the widget with the pointer. Returns `false` when no gesture is
    /// in progress.
    pub fn drag_to(&mut self, x: i32, y: i32) -> bool {
        let Some(gesture) = self.drag else {
            return false;
        };
        if x == gesture.start_x && y == gesture.start_y && !self.dragging {
            return true;
        }
        self.dragging = true;

        // Pointer coordinates come from the embedder; saturate instead of overflowing.
        let dx = x
            .saturating_sub(gesture.start_x)
            .saturating_mul(self.direction.factor());
        let dy = y.saturating_sub(gesture.start_y);
        if self.minimized {
            self.min_translate_x = gesture.origin_x.saturating_add(dx);
            self.min_translate_y = gesture.origin_y.saturating_add(dy);
        } else {
            self.translate_x = gesture.origin_x.saturating_add(dx);
            self.translate_y = gesture.origin_y.saturating_add(dy);
        }
        true
    }

    pub fn end_drag(&mut self) -> DragRelease {
        if self.drag.take().is_none() {
            return DragRelease::Ignored;
        }
        if std::mem::take(&mut self.dragging) {
            DragRelease::Moved
        } else {
            DragRelease::Click
        }
    }

    pub fn main_class(&self) -> String {
        let expandable = self.dock_ui && self.minimized && (self.hover_header || self.dragging);
        class_names(&[
            ("root", true),
            (self.direction.as_class(), true),
            ("closed", self.closed),
            ("minimized", self.minimized),
            ("dragging", self.dragging),
            ("hover", self.hover),
            ("loading", self.loading),
            ("dock", self.dock_ui),
            ("expandable", expandable),
            ("noPresence", self.dock_ui && !self.has_presence()),
        ])
    }

    pub fn header_class(&self) -> String {
        let icon_trans = self.dock_ui && self.minimized && (self.hover_header || self.dragging);
        class_names(&[
            ("header", true),
            ("minimized", self.minimized),
            ("ringing", self.ringing),
            ("iconTrans", icon_trans),
        ])
    }

    pub fn icon_container_class(&self) -> String {
        class_names(&[
            ("iconContainer", true),
            ("noPresence", !self.has_presence()),
            ("hidden", !self.dock_ui),
        ])
    }

    pub fn position_style(&self) -> String {
        let factor = self.direction.factor();
        if self.minimized {
            if self.dock_ui {
                format!(
                    "transform: translate(0px, {}px)!important; z-index: {};",
                    self.min_translate_y, self.z_index
                )
            } else {
                format!(
                    "transform: translate( {}px, {}px)!important;",
                    self.min_translate_x.saturating_mul(factor),
                    self.padding.saturating_neg()
                )
            }
        } else {
            format!(
                "transform: translate({}px, {}px)!important; z-index: {};",
                self.translate_x.saturating_mul(factor),
                self.translate_y,
                self.z_index
            )
        }
    }
}

fn class_names(classes: &[(&str, bool)]) -> String {
    classes
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Call-bar flags derived from the frame route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFlags {
    pub show_current_call_btn: bool,
    pub show_view_calls_btn: bool,
    pub center_duration: bool,
    pub center_call_info: bool,
}

impl RouteFlags {
    pub fn compute(path: &str, has_current_call: bool, summary: &CallSummary) -> Self {
        let on_active_call_page = path.contains("/calls/active");
        let on_calls_page = path == "/calls";
        Self {
            show_current_call_btn: !on_active_call_page && has_current_call,
            show_view_calls_btn: !on_calls_page && (summary.on_hold > 0 || summary.ringing > 0),
            center_duration: on_active_call_page,
            center_call_info: on_calls_page,
        }
    }
}

/// Locale template with its first `0` replaced by `count`; `None` when the
/// count is zero.
pub fn calls_label(strings: &HashMap<String, String>, key: &str, count: usize) -> Option<String> {
    if count == 0 {
        return None;
    }
    let template = strings.get(key).map(String::as_str).unwrap_or_default();
    Some(template.replacen('0', &count.to_string(), 1))
}

/// Rendered projection of the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub main_class: String,
    pub header_class: String,
    pub icon_container_class: String,
    pub position_style: String,
    #[serde(flatten)]
    pub route: RouteFlags,
    pub show_duration: bool,
    pub current_start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ringing_calls_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_hold_calls_label: Option<String>,
    pub summary: CallSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> WidgetState {
        WidgetState::new(Direction::Right, false, 999)
    }

    #[test]
    fn test_initial_main_class_is_loading() {
        assert_eq!(widget().main_class(), "root right loading");
    }

    #[test]
    fn test_dock_classes() {
        let mut state = WidgetState::new(Direction::Left, true, 999);
        state.loading = false;
        state.minimized = true;
        state.hover_header = true;

        assert_eq!(state.main_class(), "root left minimized dock expandable noPresence");
        assert_eq!(state.header_class(), "header minimized iconTrans");
        assert_eq!(state.icon_container_class(), "iconContainer noPresence");

        state.user_status = Some("Available".to_string());
        assert_eq!(state.main_class(), "root left minimized dock expandable");
        assert_eq!(state.icon_container_class(), "iconContainer");
    }

    #[test]
    fn test_non_dock_icon_hidden() {
        let mut state = widget();
        state.dnd_status = Some("TakeAllCalls".to_string());
        state.ringing = true;
        assert_eq!(state.icon_container_class(), "iconContainer hidden");
        assert_eq!(state.header_class(), "header ringing");
    }

    #[test]
    fn test_position_styles() {
        let mut state = widget();
        state.translate_x = 20;
        state.translate_y = 30;
        assert_eq!(
            state.position_style(),
            "transform: translate(-20px, 30px)!important; z-index: 999;"
        );

        state.minimized = true;
        state.min_translate_x = 15;
        assert_eq!(
            state.position_style(),
            "transform: translate( -15px, -10px)!important;"
        );

        state.dock_ui = true;
        state.min_translate_y = 40;
        assert_eq!(
            state.position_style(),
            "transform: translate(0px, 40px)!important; z-index: 999;"
        );
    }

    #[test]
    fn test_drag_moves_main_offsets_with_direction_factor() {
        let mut state = widget();
        state.begin_drag(100, 100);
        assert!(state.drag_to(90, 130));
        assert!(state.dragging);
        assert_eq!(state.translate_x, 10);
        assert_eq!(state.translate_y, 30);
        assert_eq!(state.end_drag(), DragRelease::Moved);
        assert!(!state.dragging);
    }

    #[test]
    fn test_drag_while_minimized_moves_minimized_offsets() {
        let mut state = WidgetState::new(Direction::Left, false, 1);
        state.minimized = true;
        state.begin_drag(0, 0);
        state.drag_to(25, -5);
        assert_eq!(state.min_translate_x, 25);
        assert_eq!(state.min_translate_y, -5);
        assert_eq!(state.translate_x, 0);
    }

    #[test]
    fn test_extreme_pointer_coordinates_saturate() {
        let mut state = widget();
        state.begin_drag(i32::MIN, 0);
        assert!(state.drag_to(i32::MAX, i32::MIN));
        assert_eq!(state.translate_x, -i32::MAX);
        assert_eq!(state.translate_y, i32::MIN);
        assert_eq!(
            state.position_style(),
            format!("transform: translate({}px, {}px)!important; z-index: 999;", i32::MAX, i32::MIN)
        );

        state.translate_x = i32::MIN;
        assert!(state.position_style().contains(&format!("translate({}px", i32::MAX)));

        state.minimized = true;
        state.min_translate_x = i32::MIN;
        state.padding = i32::MIN;
        assert_eq!(
            state.position_style(),
            format!("transform: translate( {}px, {}px)!important;", i32::MAX, i32::MAX)
        );
        assert_eq!(state.end_drag(), DragRelease::Moved);
    }

    #[test]
    fn test_release_without_move_is_click() {
        let mut state = widget();
        state.begin_drag(5, 5);
        state.drag_to(5, 5);
        assert_eq!(state.end_drag(), DragRelease::Click);
        assert_eq!(state.end_drag(), DragRelease::Ignored);
        assert!(!state.drag_to(1, 1));
    }

    #[test]
    fn test_route_flags() {
        let summary = CallSummary {
            ringing: 1,
            on_hold: 0,
            has_active_calls: true,
        };

        let flags = RouteFlags::compute("/calls/active/123", true, &summary);
        assert!(!flags.show_current_call_btn);
        assert!(flags.show_view_calls_btn);
        assert!(flags.center_duration);
        assert!(!flags.center_call_info);

        let flags = RouteFlags::compute("/calls", true, &summary);
        assert!(flags.show_current_call_btn);
        assert!(!flags.show_view_calls_btn);
        assert!(flags.center_call_info);

        let flags = RouteFlags::compute("/dialer", false, &CallSummary::default());
        assert_eq!(flags, RouteFlags::default());
    }

    #[test]
    fn test_calls_label() {
        let mut strings = HashMap::new();
        strings.insert("ringCallsInfo".to_string(), "0 ringing call(s), 0 total".to_string());

        assert_eq!(
            calls_label(&strings, "ringCallsInfo", 3).as_deref(),
            Some("3 ringing call(s), 0 total")
        );
        assert_eq!(calls_label(&strings, "ringCallsInfo", 0), None);
        assert_eq!(calls_label(&strings, "onHoldCallsInfo", 2).as_deref(), Some(""));
    }
}
