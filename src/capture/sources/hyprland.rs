//! Window catalog and desktop layout read from `hyprctl`.

use async_trait::async_trait;
use serde_json::Value;
use tokio::task;

use super::run_command;
use crate::capture::{
    dependencies::{Desktop, WindowCatalog},
    types::{CaptureError, Point, ProcessInfo, Rect, WindowDescriptor},
};
use crate::config::CaptureConfig;

const BASE_DPI: f32 = 96.0;

/// Hyprland keeps "minimized" windows on a special workspace by convention.
const MINIMIZED_WORKSPACE: &str = "special:minimized";

/// [`WindowCatalog`] and [`Desktop`] backed by Hyprland's IPC.
#[derive(Debug, Clone, Default)]
pub struct HyprlandCatalog {
    /// Window classes that must not be captured through the compositor.
    pub compositor_excluded: Vec<String>,
    /// Window classes that only render correctly through the compositor.
    pub composited_apps: Vec<String>,
}

impl HyprlandCatalog {
    /// Catalog using the per-application capture policy from `[capture]`.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            compositor_excluded: config.compositor_excluded_apps.clone(),
            composited_apps: config.composited_apps.clone(),
        }
    }

    fn query(&self, what: &str) -> Result<Value, CaptureError> {
        let output = run_command("hyprctl", &[what, "-j"], None)?;
        serde_json::from_slice(&output).map_err(|e| {
            CaptureError::InvalidResponse(format!("Failed to parse hyprctl {} output: {}", what, e))
        })
    }

    fn dispatch(&self, args: &[&str]) {
        let mut full = vec!["dispatch"];
        full.extend_from_slice(args);
        if let Err(e) = run_command("hyprctl", &full, None) {
            log::warn!("hyprctl dispatch {:?} failed: {}", args, e);
        }
    }

    fn describe(&self, client: &Value) -> Option<WindowDescriptor> {
        let mut window = parse_client(client)?;
        window.special_composited_app = self.composited_apps.contains(&window.process.name);
        Some(window)
    }
}

impl WindowCatalog for HyprlandCatalog {
    fn list_visible_windows(&self, _child_depth: usize) -> Vec<WindowDescriptor> {
        // Hyprland clients have no child windows, the depth has nothing to resolve.
        match self.query("clients") {
            Ok(Value::Array(clients)) => clients
                .iter()
                .filter_map(|client| self.describe(client))
                .filter(|w| w.visible && !w.minimized)
                .collect(),
            Ok(_) => {
                log::warn!("hyprctl clients did not return an array");
                Vec::new()
            }
            Err(e) => {
                log::warn!("Window listing failed: {}", e);
                Vec::new()
            }
        }
    }

    fn active_window(&self) -> Option<WindowDescriptor> {
        match self.query("activewindow") {
            Ok(client) => self.describe(&client),
            Err(e) => {
                log::warn!("Active window query failed: {}", e);
                None
            }
        }
    }

    fn is_gdi_capture_permitted(&self, _process: &ProcessInfo) -> bool {
        // Wayland clients cannot be asked to paint into our buffer.
        false
    }

    fn is_compositor_capture_permitted(&self, process: &ProcessInfo) -> bool {
        !self.compositor_excluded.contains(&process.name)
    }

    fn is_compositing_enabled(&self) -> bool {
        true
    }

    fn restore(&self, window: &WindowDescriptor) {
        let target = format!("e+0,address:{:#x}", window.handle);
        self.dispatch(&["movetoworkspace", &target]);
    }

    fn to_foreground(&self, window: &WindowDescriptor) {
        let target = format!("address:{:#x}", window.handle);
        self.dispatch(&["focuswindow", &target]);
    }
}

#[async_trait]
impl Desktop for HyprlandCatalog {
    fn displays(&self) -> Vec<Rect> {
        match self.query("monitors") {
            Ok(Value::Array(monitors)) => monitors
                .iter()
                .filter_map(parse_monitor)
                .map(|(rect, _)| rect)
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                log::warn!("Monitor query failed: {}", e);
                Vec::new()
            }
        }
    }

    fn cursor_position(&self) -> Option<Point> {
        cursor_position()
    }

    async fn query_dpi(&self) -> Option<(f32, f32)> {
        let catalog = self.clone();
        let scale = task::spawn_blocking(move || {
            let monitors = catalog.query("monitors").ok()?;
            monitors
                .as_array()?
                .iter()
                .find(|m| m.get("focused").and_then(Value::as_bool).unwrap_or(false))
                .and_then(parse_monitor)
                .map(|m| m.1)
        })
        .await
        .ok()
        .flatten()?;

        let dpi = BASE_DPI * scale as f32;
        Some((dpi, dpi))
    }
}

/// Pointer position from `hyprctl cursorpos`.
pub(crate) fn cursor_position() -> Option<Point> {
    let output = run_command("hyprctl", &["cursorpos", "-j"], None).ok()?;
    let json: Value = serde_json::from_slice(&output).ok()?;
    Some(Point::new(
        json.get("x")?.as_i64()? as i32,
        json.get("y")?.as_i64()? as i32,
    ))
}

fn pair(value: &Value, key: &str) -> Option<(i32, i32)> {
    let array = value.get(key)?.as_array()?;
    Some((
        array.first()?.as_f64()?.round() as i32,
        array.get(1)?.as_f64()?.round() as i32,
    ))
}

/// Builds a descriptor from one `hyprctl clients` entry.
fn parse_client(client: &Value) -> Option<WindowDescriptor> {
    let address = client.get("address")?.as_str()?;
    let handle = u64::from_str_radix(address.trim_start_matches("0x"), 16).ok()?;
    let (x, y) = pair(client, "at")?;
    let (width, height) = pair(client, "size")?;

    let workspace = client
        .get("workspace")
        .and_then(|w| w.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mapped = client.get("mapped").and_then(Value::as_bool).unwrap_or(true);
    let hidden = client.get("hidden").and_then(Value::as_bool).unwrap_or(false);
    let class = client
        .get("class")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(WindowDescriptor {
        handle,
        title: client
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        bounds: Rect::new(x, y, width, height),
        minimized: workspace == MINIMIZED_WORKSPACE,
        visible: mapped && !hidden,
        special_composited_app: false,
        browser_document: false,
        process: ProcessInfo {
            pid: client.get("pid").and_then(Value::as_u64).unwrap_or(0) as u32,
            name: class,
        },
        children: Vec::new(),
    })
}

/// Logical bounds and scale of one `hyprctl monitors` entry.
fn parse_monitor(monitor: &Value) -> Option<(Rect, f64)> {
    let x = monitor.get("x")?.as_i64()? as i32;
    let y = monitor.get("y")?.as_i64()? as i32;
    let width = monitor.get("width")?.as_f64()?;
    let height = monitor.get("height")?.as_f64()?;
    let scale = monitor
        .get("scale")
        .and_then(Value::as_f64)
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);
    let transform = monitor.get("transform").and_then(Value::as_i64).unwrap_or(0);

    let (mut width, mut height) = (width / scale, height / scale);
    // Odd transforms rotate the output by 90 or 270 degrees.
    if transform % 2 == 1 {
        std::mem::swap(&mut width, &mut height);
    }
    Some((
        Rect::new(x, y, width.round() as i32, height.round() as i32),
        scale,
    ))
}
