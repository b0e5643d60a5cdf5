//! Choice of the window capture technique.
//!
//! The same rules decide the first technique and every fallback step, so a
//! failed attempt never resurrects a technique the rules would have rejected.

use crate::capture::{
    dependencies::WindowCatalog,
    types::{WindowCaptureTechnique, WindowDescriptor},
};

/// Whether the compositor path may be used for `window` at all.
pub fn compositor_eligible(window: &WindowDescriptor, catalog: &dyn WindowCatalog) -> bool {
    catalog.is_special_composited_app(window)
        || catalog.is_compositor_capture_permitted(&window.process)
}

/// Resolves `requested` into the concrete technique to attempt first.
///
/// Browser documents are handled before this is consulted; see the orchestrator.
pub fn select_technique(
    window: &WindowDescriptor,
    requested: WindowCaptureTechnique,
    compositing_enabled: bool,
    catalog: &dyn WindowCatalog,
) -> WindowCaptureTechnique {
    let gdi_permitted = catalog.is_gdi_capture_permitted(&window.process);

    match requested {
        WindowCaptureTechnique::Auto => {
            let mut technique = WindowCaptureTechnique::Screen;

            if !catalog.is_special_composited_app(window) && gdi_permitted {
                if !compositing_enabled && catalog.is_retained_mode_renderer(&window.process) {
                    log::info!(
                        "Not using GDI for windows of process {}, it renders without GDI",
                        window.process.name
                    );
                } else {
                    technique = WindowCaptureTechnique::Gdi;
                }
            }

            if compositing_enabled && compositor_eligible(window, catalog) {
                technique = WindowCaptureTechnique::Compositor;
            }
            technique
        }
        WindowCaptureTechnique::Compositor | WindowCaptureTechnique::CompositorTransparent => {
            if compositing_enabled && compositor_eligible(window, catalog) {
                requested
            } else if gdi_permitted {
                WindowCaptureTechnique::Gdi
            } else {
                WindowCaptureTechnique::Screen
            }
        }
        WindowCaptureTechnique::Gdi if !gdi_permitted => WindowCaptureTechnique::Screen,
        WindowCaptureTechnique::Gdi => WindowCaptureTechnique::Gdi,
        WindowCaptureTechnique::Screen => WindowCaptureTechnique::Screen,
    }
}

/// Next technique after `failed` produced nothing, or `None` once `Screen` failed.
pub fn fallback_technique(
    window: &WindowDescriptor,
    failed: WindowCaptureTechnique,
    compositing_enabled: bool,
    catalog: &dyn WindowCatalog,
) -> Option<WindowCaptureTechnique> {
    match failed {
        WindowCaptureTechnique::Compositor | WindowCaptureTechnique::CompositorTransparent => {
            Some(select_technique(
                window,
                WindowCaptureTechnique::Gdi,
                compositing_enabled,
                catalog,
            ))
        }
        WindowCaptureTechnique::Gdi | WindowCaptureTechnique::Auto => {
            Some(WindowCaptureTechnique::Screen)
        }
        WindowCaptureTechnique::Screen => None,
    }
}
