use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio::time::{Duration, sleep};

use super::{
    artifact::CaptureArtifact,
    cancel::CancelSignal,
    dependencies::{
        CaptureDependencies, CaptureFeedback, Desktop, Destination, DocumentCapture, ImageImport,
        PixelSource, Selection, SelectionSurface, WindowCatalog,
    },
    manager::{CaptureManager, CaptureOutcome},
    orchestrator::{
        CaptureOrchestrator, CaptureRequest, CaptureRun, CaptureSettings, CaptureState, RunOutcome,
    },
    types::{
        CaptureError, CaptureMode, CaptureStatus, CursorOverlay, ExportNotification,
        ExportOutcome, Point, ProcessInfo, Rect, ScreenCaptureMode, WindowCaptureTechnique,
        WindowDescriptor,
    },
};

const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
struct MockCatalog {
    windows: Vec<WindowDescriptor>,
    active: Option<WindowDescriptor>,
    gdi: bool,
    compositor: bool,
    compositing: bool,
    calls: Calls,
}

impl WindowCatalog for MockCatalog {
    fn list_visible_windows(&self, child_depth: usize) -> Vec<WindowDescriptor> {
        self.calls.push(format!("list {child_depth}"));
        self.windows.clone()
    }

    fn active_window(&self) -> Option<WindowDescriptor> {
        self.active.clone()
    }

    fn is_gdi_capture_permitted(&self, _process: &ProcessInfo) -> bool {
        self.gdi
    }

    fn is_compositor_capture_permitted(&self, _process: &ProcessInfo) -> bool {
        self.compositor
    }

    fn is_compositing_enabled(&self) -> bool {
        self.compositing
    }

    fn restore(&self, window: &WindowDescriptor) {
        self.calls.push(format!("restore {}", window.title));
    }

    fn to_foreground(&self, window: &WindowDescriptor) {
        self.calls.push(format!("foreground {}", window.title));
    }
}

#[derive(Clone)]
struct MockDesktop {
    displays: Vec<Rect>,
    cursor: Option<Point>,
    dpi: Option<(f32, f32)>,
}

#[async_trait]
impl Desktop for MockDesktop {
    fn displays(&self) -> Vec<Rect> {
        self.displays.clone()
    }

    fn cursor_position(&self) -> Option<Point> {
        self.cursor
    }

    async fn query_dpi(&self) -> Option<(f32, f32)> {
        self.dpi
    }
}

#[derive(Clone, Default)]
struct MockPixels {
    screen_image: Option<RgbaImage>,
    screen_fails: bool,
    screen_delay: Option<Duration>,
    gdi: Option<RgbaImage>,
    compositor: Option<RgbaImage>,
    cursor: Option<Point>,
    calls: Calls,
}

#[async_trait]
impl PixelSource for MockPixels {
    async fn capture_screen_region(&self, rect: Rect) -> Option<RgbaImage> {
        self.calls.push(format!("screen {rect}"));
        if let Some(delay) = self.screen_delay {
            sleep(delay).await;
        }
        if self.screen_fails {
            return None;
        }
        Some(self.screen_image.clone().unwrap_or_else(|| {
            RgbaImage::from_pixel(rect.width as u32, rect.height as u32, GREY)
        }))
    }

    async fn capture_window_via_gdi(&self, _window: &WindowDescriptor) -> Option<RgbaImage> {
        self.calls.push("gdi");
        self.gdi.clone()
    }

    async fn capture_window_via_compositor(
        &self,
        _window: &WindowDescriptor,
        transparent: bool,
    ) -> Option<RgbaImage> {
        self.calls
            .push(if transparent { "compositor-transparent" } else { "compositor" });
        self.compositor.clone()
    }

    async fn capture_cursor(&self) -> Option<CursorOverlay> {
        self.cursor.map(|position| CursorOverlay {
            position,
            visible: true,
            image: None,
        })
    }
}

#[derive(Clone)]
struct MockSurface {
    selection: Selection,
    /// Time the user takes to answer.
    delay: Option<Duration>,
    presented: Arc<Mutex<Vec<(CaptureMode, usize)>>>,
}

#[async_trait]
impl SelectionSurface for MockSurface {
    async fn present(
        &self,
        _preview: &CaptureArtifact,
        windows: &[WindowDescriptor],
        mode: CaptureMode,
    ) -> Selection {
        self.presented.lock().unwrap().push((mode, windows.len()));
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        self.selection.clone()
    }
}

#[derive(Clone, Default)]
struct MockFeedback {
    calls: Calls,
}

#[async_trait]
impl CaptureFeedback for MockFeedback {
    async fn play_sound(&self) -> Result<(), CaptureError> {
        self.calls.push("sound");
        Err(CaptureError::AcquisitionFailure("no sound card".into()))
    }

    async fn flash(&self, bounds: Rect) -> Result<(), CaptureError> {
        self.calls.push(format!("flash {bounds}"));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockImport {
    clipboard: Option<RgbaImage>,
}

#[async_trait]
impl ImageImport for MockImport {
    async fn clipboard_image(&self) -> Result<RgbaImage, CaptureError> {
        self.clipboard
            .clone()
            .ok_or_else(|| CaptureError::ClipboardError("no image on the clipboard".into()))
    }

    async fn load_file(&self, path: &Path) -> Result<RgbaImage, CaptureError> {
        Err(CaptureError::ImportUnavailable(path.display().to_string()))
    }
}

/// Records into the pixel source's call log so the order against other techniques shows.
#[derive(Clone)]
struct MockDocument {
    image: Option<RgbaImage>,
    calls: Calls,
}

#[async_trait]
impl DocumentCapture for MockDocument {
    async fn capture_document(&self, _window: &WindowDescriptor) -> Option<RgbaImage> {
        self.calls.push("doc");
        self.image.clone()
    }
}

#[derive(Clone)]
struct MockDestination {
    name: String,
    outcome: ExportOutcome,
    exported: Arc<Mutex<Vec<CaptureArtifact>>>,
}

impl MockDestination {
    fn new(name: &str, outcome: ExportOutcome) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            exported: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.exported.lock().unwrap().len()
    }

    fn last_export(&self) -> CaptureArtifact {
        self.exported.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn designation(&self) -> &str {
        &self.name
    }

    async fn export(&self, artifact: &CaptureArtifact) -> ExportNotification {
        self.exported.lock().unwrap().push(artifact.clone());
        match self.outcome {
            ExportOutcome::Success => ExportNotification::success(self.name.clone(), None),
            ExportOutcome::Failure => ExportNotification::failure(self.name.clone(), "disk full"),
            ExportOutcome::Cancelled => ExportNotification::cancelled(self.name.clone()),
        }
    }
}

struct Fixture {
    catalog: MockCatalog,
    desktop: MockDesktop,
    pixels: MockPixels,
    surface: MockSurface,
    feedback: MockFeedback,
    import: MockImport,
    document: Option<MockDocument>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            catalog: MockCatalog::default(),
            desktop: MockDesktop {
                displays: vec![Rect::new(0, 0, 400, 300)],
                cursor: None,
                dpi: None,
            },
            pixels: MockPixels::default(),
            surface: MockSurface {
                selection: Selection::Cancelled,
                delay: None,
                presented: Arc::new(Mutex::new(Vec::new())),
            },
            feedback: MockFeedback::default(),
            import: MockImport::default(),
            document: None,
        }
    }

    /// Registers a document backend answering with `image`.
    fn with_document(mut self, image: Option<RgbaImage>) -> Self {
        self.document = Some(MockDocument {
            image,
            calls: self.pixels.calls.clone(),
        });
        self
    }

    fn dependencies(&self) -> CaptureDependencies {
        CaptureDependencies {
            catalog: Arc::new(self.catalog.clone()),
            desktop: Arc::new(self.desktop.clone()),
            pixels: Arc::new(self.pixels.clone()),
            surface: Arc::new(self.surface.clone()),
            feedback: Arc::new(self.feedback.clone()),
            import: Arc::new(self.import.clone()),
            document: self
                .document
                .clone()
                .map(|document| Arc::new(document) as Arc<dyn DocumentCapture>),
        }
    }

    async fn run(
        &self,
        request: CaptureRequest,
        settings: &mut CaptureSettings,
    ) -> Result<CaptureRun, CaptureError> {
        CaptureOrchestrator::new(Arc::new(self.dependencies()))
            .run(request, settings, &CancelSignal::new())
            .await
    }

    fn presented(&self) -> Vec<(CaptureMode, usize)> {
        self.surface.presented.lock().unwrap().clone()
    }
}

fn window(title: &str, bounds: Rect) -> WindowDescriptor {
    WindowDescriptor {
        handle: 7,
        title: title.to_string(),
        bounds,
        visible: true,
        process: ProcessInfo {
            pid: 42,
            name: "app".into(),
        },
        ..Default::default()
    }
}

/// `width`x`height` image of `fill` whose first `black` pixels are black.
fn image_with_black(width: u32, height: u32, black: u32, fill: Rgba<u8>) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, fill);
    for (index, pixel) in image.pixels_mut().enumerate() {
        if (index as u32) < black {
            *pixel = Rgba([0, 0, 0, 255]);
        }
    }
    image
}

#[tokio::test]
async fn region_with_supplied_rect_skips_interactive_step() {
    let fixture = Fixture::new();
    let destination = MockDestination::new("File", ExportOutcome::Success);
    let mut settings = CaptureSettings::default();

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(10, 10, 100, 50))
                .with_destination(Arc::new(destination.clone())),
            &mut settings,
        )
        .await
        .unwrap();

    assert_eq!(run.state(), CaptureState::Done);
    assert!(!run.trace.contains(&CaptureState::InteractiveRefine));
    assert!(fixture.presented().is_empty());

    let report = run.report().unwrap();
    assert_eq!(report.bounds, Some(Rect::new(10, 10, 100, 50)));
    assert_eq!(report.details.capture_mode, CaptureMode::Region);
    assert_eq!(report.details.metadata("source"), Some("Screen"));
    assert!(!report.is_retained());
    assert_eq!(destination.calls(), 1);
    assert_eq!(
        destination.last_export().bounds(),
        Some(Rect::new(10, 10, 100, 50))
    );
}

#[tokio::test]
async fn repeated_region_capture_has_identical_bounds() {
    let fixture = Fixture::new();
    let mut settings = CaptureSettings::default();
    let request = CaptureRequest::new(CaptureMode::Region).with_region(Rect::new(5, 6, 70, 80));

    let first = fixture.run(request.clone(), &mut settings).await.unwrap();
    let second = fixture.run(request, &mut settings).await.unwrap();
    assert_eq!(first.report().unwrap().bounds, second.report().unwrap().bounds);
    assert_eq!(first.report().unwrap().bounds, Some(Rect::new(5, 6, 70, 80)));
}

#[tokio::test]
async fn trace_follows_state_machine() {
    let fixture = Fixture::new();
    let mut settings = CaptureSettings::default();
    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region).with_region(Rect::new(0, 0, 10, 10)),
            &mut settings,
        )
        .await
        .unwrap();
    assert_eq!(
        run.trace,
        vec![
            CaptureState::Idle,
            CaptureState::Preparing,
            CaptureState::Acquiring,
            CaptureState::Finalizing,
            CaptureState::Routed,
            CaptureState::Done,
        ]
    );
}

#[tokio::test]
async fn missing_active_window_degrades_to_full_screen() {
    let mut fixture = Fixture::new();
    fixture.desktop.displays = vec![Rect::new(0, 0, 200, 100), Rect::new(200, 0, 100, 120)];
    let mut settings = CaptureSettings::default();
    settings.capture.screen_capture_mode = ScreenCaptureMode::FullScreen;

    let run = fixture
        .run(CaptureRequest::new(CaptureMode::ActiveWindow), &mut settings)
        .await
        .unwrap();

    assert_eq!(run.mode, CaptureMode::FullScreen);
    let report = run.report().unwrap();
    assert_eq!(report.details.metadata("source"), Some("Screen"));
    assert_eq!(report.details.title, "Screen");
    assert_eq!(report.bounds, Some(Rect::new(0, 0, 300, 120)));
    assert_eq!(settings.last_captured_region, None);
}

#[tokio::test]
async fn minimized_active_window_degrades_to_display_under_pointer() {
    let mut fixture = Fixture::new();
    fixture.desktop.displays = vec![Rect::new(0, 0, 200, 100), Rect::new(200, 0, 100, 120)];
    fixture.desktop.cursor = Some(Point::new(250, 10));
    let mut minimized = window("Hidden", Rect::new(0, 0, 50, 50));
    minimized.minimized = true;
    fixture.catalog.active = Some(minimized);

    let mut settings = CaptureSettings::default();
    let run = fixture
        .run(CaptureRequest::new(CaptureMode::ActiveWindow), &mut settings)
        .await
        .unwrap();

    assert_eq!(run.mode, CaptureMode::FullScreen);
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(200, 0, 100, 120)));
}

#[tokio::test]
async fn fixed_screen_index_is_clamped() {
    let mut fixture = Fixture::new();
    fixture.desktop.displays = vec![Rect::new(0, 0, 200, 100), Rect::new(200, 0, 100, 120)];
    let mut settings = CaptureSettings::default();

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::FullScreen).with_screen_mode(ScreenCaptureMode::Fixed(5)),
            &mut settings,
        )
        .await
        .unwrap();
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(200, 0, 100, 120)));
}

#[tokio::test]
async fn black_gdi_copy_is_replaced_by_screen_copy() {
    let mut fixture = Fixture::new();
    fixture.catalog.gdi = true;
    fixture.catalog.compositing = false;
    // 5% black GDI copy against a 1% black screen copy of the same area.
    fixture.pixels.gdi = Some(image_with_black(200, 100, 1_000, WHITE));
    let screen = image_with_black(200, 100, 200, GREY);
    fixture.pixels.screen_image = Some(screen.clone());

    let destination = MockDestination::new("File", ExportOutcome::Success);
    let target = window("Editor window", Rect::new(100, 100, 200, 100));
    let mut settings = CaptureSettings::default();

    let run = fixture
        .run(
            CaptureRequest::window(target).with_destination(Arc::new(destination.clone())),
            &mut settings,
        )
        .await
        .unwrap();

    assert_eq!(
        fixture.pixels.calls.snapshot(),
        vec!["gdi", "screen 100,100 200x100"]
    );
    let exported = destination.last_export();
    assert_eq!(exported.pixels(), Some(&screen));
    assert_eq!(exported.bounds(), Some(Rect::new(100, 100, 200, 100)));
    assert_eq!(run.report().unwrap().details.title, "Editor window");
    assert_eq!(run.report().unwrap().details.metadata("source"), Some("Window"));
    assert_eq!(settings.last_captured_region, Some(Rect::new(100, 100, 200, 100)));
}

#[tokio::test]
async fn clean_gdi_copy_is_accepted_without_screen_copy() {
    let mut fixture = Fixture::new();
    fixture.catalog.gdi = true;
    let gdi = RgbaImage::from_pixel(80, 60, WHITE);
    fixture.pixels.gdi = Some(gdi.clone());
    let destination = MockDestination::new("File", ExportOutcome::Success);

    fixture
        .run(
            CaptureRequest::window(window("Clean", Rect::new(10, 10, 80, 60)))
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    assert_eq!(fixture.pixels.calls.snapshot(), vec!["gdi"]);
    assert_eq!(destination.last_export().pixels(), Some(&gdi));
}

#[tokio::test]
async fn special_composited_app_prefers_compositor() {
    let mut fixture = Fixture::new();
    fixture.catalog.gdi = true;
    fixture.catalog.compositing = true;
    fixture.pixels.compositor = Some(RgbaImage::from_pixel(50, 40, WHITE));
    let mut target = window("Store app", Rect::new(0, 0, 50, 40));
    target.special_composited_app = true;

    let run = fixture
        .run(CaptureRequest::window(target), &mut CaptureSettings::default())
        .await
        .unwrap();

    assert_eq!(fixture.pixels.calls.snapshot(), vec!["compositor"]);
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(0, 0, 50, 40)));
}

#[tokio::test]
async fn failed_techniques_fall_back_to_screen() {
    let mut fixture = Fixture::new();
    fixture.catalog.gdi = true;
    fixture.catalog.compositor = true;
    fixture.catalog.compositing = true;
    // Window partly off the 400x300 display.
    let target = window("Wide", Rect::new(350, 20, 100, 50));

    let run = fixture
        .run(CaptureRequest::window(target), &mut CaptureSettings::default())
        .await
        .unwrap();

    assert_eq!(
        fixture.pixels.calls.snapshot(),
        vec!["compositor", "gdi", "screen 350,20 50x50"]
    );
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(350, 20, 50, 50)));
}

#[tokio::test]
async fn exhausted_techniques_fail_without_routing() {
    let mut fixture = Fixture::new();
    fixture.pixels.screen_fails = true;
    let destination = MockDestination::new("File", ExportOutcome::Success);

    let err = fixture
        .run(
            CaptureRequest::window(window("Gone", Rect::new(0, 0, 40, 40)))
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::AcquisitionFailure(_)), "{err:?}");
    assert_eq!(destination.calls(), 0);
}

#[tokio::test]
async fn supplied_minimized_window_is_restored() {
    let fixture = Fixture::new();
    let mut target = window("Minimized", Rect::new(0, 0, 30, 30));
    target.minimized = true;

    fixture
        .run(CaptureRequest::window(target), &mut CaptureSettings::default())
        .await
        .unwrap();

    assert!(
        fixture
            .catalog
            .calls
            .snapshot()
            .contains(&"restore Minimized".to_string())
    );
}

#[tokio::test]
async fn failing_destination_does_not_stop_editor() {
    let fixture = Fixture::new();
    let broken = MockDestination::new("File", ExportOutcome::Failure);
    let editor = MockDestination::new("Editor", ExportOutcome::Success);

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(0, 0, 20, 20))
                .with_destination(Arc::new(broken.clone()))
                .with_destination(Arc::new(editor.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    let report = run.into_report().unwrap();
    let outcomes: Vec<ExportOutcome> = report.notifications.iter().map(|n| n.outcome).collect();
    assert_eq!(outcomes, vec![ExportOutcome::Failure, ExportOutcome::Success]);
    assert_eq!(report.failures().count(), 1);
    assert!(report.is_retained());
    assert!(report.retained.unwrap().has_pixels());
    assert_eq!((broken.calls(), editor.calls()), (1, 1));
}

#[tokio::test]
async fn picker_runs_alone() {
    let fixture = Fixture::new();
    let picker = MockDestination::new("Picker", ExportOutcome::Success);
    let file = MockDestination::new("File", ExportOutcome::Success);

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(0, 0, 20, 20))
                .with_destination(Arc::new(file.clone()))
                .with_destination(Arc::new(picker.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    let report = run.report().unwrap();
    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].source, "Picker");
    assert!(report.details.destinations().is_empty());
    assert!(report.is_retained());
    assert_eq!((picker.calls(), file.calls()), (1, 0));
}

#[tokio::test]
async fn configured_destinations_apply_when_request_names_none() {
    let fixture = Fixture::new();
    let configured = MockDestination::new("Clipboard", ExportOutcome::Success);
    let mut settings = CaptureSettings {
        destinations: vec![Arc::new(configured.clone())],
        ..Default::default()
    };

    fixture
        .run(
            CaptureRequest::new(CaptureMode::Region).with_region(Rect::new(0, 0, 5, 5)),
            &mut settings,
        )
        .await
        .unwrap();
    assert_eq!(configured.calls(), 1);
}

#[tokio::test]
async fn last_region_without_history_does_nothing() {
    let fixture = Fixture::new();
    let destination = MockDestination::new("File", ExportOutcome::Success);

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::LastRegion)
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    assert_eq!(run.state(), CaptureState::Done);
    assert!(matches!(run.outcome, RunOutcome::NothingCaptured));
    assert!(fixture.pixels.calls.snapshot().is_empty());
    assert_eq!(destination.calls(), 0);
}

#[tokio::test]
async fn cancelled_selection_keeps_last_region() {
    let fixture = Fixture::new();
    let destination = MockDestination::new("File", ExportOutcome::Success);
    let previous = Rect::new(1, 2, 3, 4);
    let mut settings = CaptureSettings {
        last_captured_region: Some(previous),
        ..Default::default()
    };

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region).with_destination(Arc::new(destination.clone())),
            &mut settings,
        )
        .await
        .unwrap();

    assert_eq!(run.state(), CaptureState::Failed);
    assert!(matches!(run.outcome, RunOutcome::UserCancelled));
    assert!(!run.trace.contains(&CaptureState::Routed));
    assert_eq!(destination.calls(), 0);
    assert_eq!(settings.last_captured_region, Some(previous));
}

#[tokio::test]
async fn confirmed_selection_becomes_last_region() {
    let mut fixture = Fixture::new();
    fixture.desktop.displays = vec![Rect::new(-400, 0, 400, 300), Rect::new(0, 0, 400, 300)];
    // Buffer coordinates of the 800x300 preview starting at x = -400.
    fixture.surface.selection = Selection::Confirmed {
        rect: Rect::new(410, 20, 100, 50),
        window: None,
    };
    let mut settings = CaptureSettings::default();

    let run = fixture
        .run(CaptureRequest::new(CaptureMode::Region), &mut settings)
        .await
        .unwrap();
    assert!(run.trace.contains(&CaptureState::InteractiveRefine));
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(10, 20, 100, 50)));
    assert_eq!(settings.last_captured_region, Some(Rect::new(10, 20, 100, 50)));

    let repeat = fixture
        .run(CaptureRequest::new(CaptureMode::LastRegion), &mut settings)
        .await
        .unwrap();
    assert_eq!(repeat.report().unwrap().bounds, Some(Rect::new(10, 20, 100, 50)));
    assert_eq!(
        fixture.pixels.calls.snapshot(),
        vec!["screen -400,0 800x300", "screen 10,20 100x50"]
    );
}

#[tokio::test]
async fn last_region_takes_title_from_window_under_center() {
    let mut fixture = Fixture::new();
    // Top-most first.
    fixture.catalog.windows = vec![
        window("Terminal", Rect::new(50, 50, 100, 100)),
        window("Background", Rect::new(0, 0, 400, 300)),
    ];
    let mut settings = CaptureSettings {
        last_captured_region: Some(Rect::new(60, 60, 80, 80)),
        ..Default::default()
    };

    let run = fixture
        .run(CaptureRequest::new(CaptureMode::LastRegion), &mut settings)
        .await
        .unwrap();
    assert_eq!(run.report().unwrap().details.title, "Terminal");
}

#[tokio::test]
async fn window_mode_offers_enumerated_windows() {
    let mut fixture = Fixture::new();
    let terminal = window("Terminal", Rect::new(50, 40, 100, 80));
    let mut hidden = window("Hidden", Rect::new(0, 0, 10, 10));
    hidden.visible = false;
    fixture.catalog.windows = vec![terminal.clone(), hidden];
    fixture.surface.selection = Selection::Confirmed {
        rect: terminal.bounds,
        window: Some(terminal.clone()),
    };

    let run = fixture
        .run(CaptureRequest::new(CaptureMode::Window), &mut CaptureSettings::default())
        .await
        .unwrap();

    assert_eq!(fixture.presented(), vec![(CaptureMode::Window, 1)]);
    let report = run.report().unwrap();
    assert_eq!(report.details.title, "Terminal");
    assert_eq!(report.bounds, Some(terminal.bounds));
}

#[tokio::test]
async fn empty_selection_ends_without_routing() {
    let mut fixture = Fixture::new();
    fixture.surface.selection = Selection::Confirmed {
        rect: Rect::new(10, 10, 0, 0),
        window: None,
    };
    let destination = MockDestination::new("File", ExportOutcome::Success);

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region).with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();
    assert_eq!(run.state(), CaptureState::Done);
    assert!(matches!(run.outcome, RunOutcome::NothingCaptured));
    assert_eq!(destination.calls(), 0);
}

#[tokio::test]
async fn cursor_is_anchored_to_capture() {
    let mut fixture = Fixture::new();
    fixture.pixels.cursor = Some(Point::new(50, 30));
    let destination = MockDestination::new("File", ExportOutcome::Success);

    fixture
        .run(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(10, 10, 100, 50))
                .with_pointer(true)
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    let cursor = destination.last_export().cursor.unwrap();
    assert_eq!(cursor.position, Point::new(40, 20));
    assert!(cursor.visible);
}

#[tokio::test]
async fn pointer_hidden_unless_requested() {
    let mut fixture = Fixture::new();
    fixture.pixels.cursor = Some(Point::new(5, 5));
    let destination = MockDestination::new("File", ExportOutcome::Success);

    fixture
        .run(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(0, 0, 10, 10))
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();
    assert!(!destination.last_export().cursor.unwrap().visible);
}

#[tokio::test]
async fn feedback_and_dpi_are_applied_to_screen_captures() {
    let mut fixture = Fixture::new();
    fixture.desktop.dpi = Some((144.0, 144.0));
    let mut settings = CaptureSettings::default();
    settings.capture.play_camera_sound = true;
    settings.capture.show_flash = true;

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::Region).with_region(Rect::new(1, 2, 30, 40)),
            &mut settings,
        )
        .await
        .unwrap();

    // A failing sound does not fail the capture.
    let mut calls = fixture.feedback.calls.snapshot();
    calls.sort();
    assert_eq!(calls, vec!["flash 1,2 30x40", "sound"]);
    let details = &run.report().unwrap().details;
    assert_eq!((details.dpi_x, details.dpi_y), (144.0, 144.0));
    assert!(details.modified);
}

#[tokio::test]
async fn clipboard_import_skips_feedback() {
    let mut fixture = Fixture::new();
    fixture.import.clipboard = Some(RgbaImage::from_pixel(4, 3, WHITE));
    let mut settings = CaptureSettings::default();
    settings.capture.play_camera_sound = true;

    let run = fixture
        .run(CaptureRequest::new(CaptureMode::Clipboard), &mut settings)
        .await
        .unwrap();

    let report = run.report().unwrap();
    assert_eq!(report.details.title, "Clipboard");
    assert_eq!(report.details.metadata("source"), Some("Clipboard"));
    assert!(!report.details.modified);
    assert_eq!(report.bounds, Some(Rect::new(0, 0, 4, 3)));
    assert!(fixture.feedback.calls.snapshot().is_empty());
    assert!(fixture.pixels.calls.snapshot().is_empty());
}

#[tokio::test]
async fn empty_clipboard_is_import_error() {
    let fixture = Fixture::new();
    let err = fixture
        .run(CaptureRequest::new(CaptureMode::Clipboard), &mut CaptureSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::ImportUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn delay_can_be_cancelled() {
    let fixture = Fixture::new();
    let mut settings = CaptureSettings::default();
    settings.capture.capture_delay_ms = 10_000;
    let cancel = CancelSignal::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        remote.cancel();
    });

    let err = CaptureOrchestrator::new(Arc::new(fixture.dependencies()))
        .run(
            CaptureRequest::new(CaptureMode::Region),
            &mut settings,
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::Cancelled(_)), "{err:?}");
    assert!(fixture.presented().is_empty());
}

fn browser_window(bounds: Rect) -> WindowDescriptor {
    WindowDescriptor {
        browser_document: true,
        ..window("Docs - Browser", bounds)
    }
}

#[tokio::test]
async fn browser_window_prefers_document_capture() {
    let mut fixture = Fixture::new().with_document(Some(RgbaImage::from_pixel(40, 400, WHITE)));
    fixture.catalog.gdi = true;
    fixture.pixels.gdi = Some(RgbaImage::from_pixel(40, 40, WHITE));

    let run = fixture
        .run(
            CaptureRequest::window(browser_window(Rect::new(0, 0, 40, 40))),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    assert_eq!(fixture.pixels.calls.snapshot(), vec!["doc"]);
    let report = run.report().unwrap();
    assert_eq!(report.bounds, Some(Rect::new(0, 0, 40, 400)));
    assert_eq!(report.details.title, "Docs - Browser");
}

#[tokio::test]
async fn failed_document_capture_falls_through_to_window_technique() {
    let mut fixture = Fixture::new().with_document(None);
    fixture.catalog.gdi = true;
    fixture.pixels.gdi = Some(RgbaImage::from_pixel(40, 40, WHITE));

    let run = fixture
        .run(
            CaptureRequest::window(browser_window(Rect::new(0, 0, 40, 40))),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    assert_eq!(fixture.pixels.calls.snapshot(), vec!["doc", "gdi"]);
    assert_eq!(run.report().unwrap().bounds, Some(Rect::new(0, 0, 40, 40)));
}

#[tokio::test]
async fn explicit_technique_skips_document_capture() {
    let fixture = Fixture::new().with_document(Some(RgbaImage::from_pixel(40, 400, WHITE)));

    fixture
        .run(
            CaptureRequest::window(browser_window(Rect::new(0, 0, 40, 40)))
                .with_technique(WindowCaptureTechnique::Screen),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    assert_eq!(fixture.pixels.calls.snapshot(), vec!["screen 0,0 40x40"]);
}

#[tokio::test]
async fn browser_document_mode_tags_source() {
    let fixture = Fixture::new().with_document(Some(RgbaImage::from_pixel(30, 90, WHITE)));

    let run = fixture
        .run(
            CaptureRequest::new(CaptureMode::BrowserDocument)
                .with_window(browser_window(Rect::new(5, 6, 30, 30))),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap();

    let report = run.report().unwrap();
    assert_eq!(report.bounds, Some(Rect::new(5, 6, 30, 90)));
    assert_eq!(report.details.metadata("source"), Some("Browser"));
}

#[tokio::test]
async fn browser_document_mode_needs_a_backend() {
    let fixture = Fixture::new();
    let destination = MockDestination::new("File", ExportOutcome::Success);

    let err = fixture
        .run(
            CaptureRequest::new(CaptureMode::BrowserDocument)
                .with_window(browser_window(Rect::new(0, 0, 30, 30)))
                .with_destination(Arc::new(destination.clone())),
            &mut CaptureSettings::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::AcquisitionFailure(_)), "{err:?}");
    assert_eq!(destination.calls(), 0);
}

#[tokio::test]
async fn cancelling_during_selection_skips_routing() {
    let mut fixture = Fixture::new();
    fixture.surface.selection = Selection::Confirmed {
        rect: Rect::new(0, 0, 10, 10),
        window: None,
    };
    fixture.surface.delay = Some(Duration::from_secs(10));
    let destination = MockDestination::new("File", ExportOutcome::Success);
    let previous = Rect::new(1, 2, 3, 4);
    let mut settings = CaptureSettings {
        last_captured_region: Some(previous),
        ..Default::default()
    };
    let cancel = CancelSignal::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        remote.cancel();
    });

    let run = CaptureOrchestrator::new(Arc::new(fixture.dependencies()))
        .run(
            CaptureRequest::new(CaptureMode::Region).with_destination(Arc::new(destination.clone())),
            &mut settings,
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(run.state(), CaptureState::Failed);
    assert!(matches!(run.outcome, RunOutcome::UserCancelled));
    assert!(run.trace.contains(&CaptureState::InteractiveRefine));
    assert_eq!(destination.calls(), 0);
    assert_eq!(settings.last_captured_region, Some(previous));
}

#[tokio::test]
async fn cancelling_during_acquisition_is_an_error() {
    let mut fixture = Fixture::new();
    fixture.pixels.screen_delay = Some(Duration::from_secs(10));
    let destination = MockDestination::new("File", ExportOutcome::Success);
    let mut settings = CaptureSettings::default();
    let cancel = CancelSignal::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        remote.cancel();
    });

    let err = CaptureOrchestrator::new(Arc::new(fixture.dependencies()))
        .run(
            CaptureRequest::new(CaptureMode::FullScreen)
                .with_destination(Arc::new(destination.clone())),
            &mut settings,
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::Cancelled(_)), "{err:?}");
    assert_eq!(destination.calls(), 0);
    assert_eq!(settings.last_captured_region, None);
}

async fn wait_for_outcome(manager: &CaptureManager) -> Option<CaptureOutcome> {
    for _ in 0..100 {
        if let Some(result) = manager.try_take_result() {
            return Some(result);
        }
        sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn test_capture_manager_creation() {
    let manager = CaptureManager::new(
        &tokio::runtime::Handle::current(),
        CaptureSettings::default(),
    );
    assert_eq!(manager.get_status().await, CaptureStatus::Idle);
}

#[tokio::test]
async fn capture_manager_runs_requests() {
    let fixture = Fixture::new();
    let destination = MockDestination::new("File", ExportOutcome::Success);
    let manager = CaptureManager::with_dependencies(
        &tokio::runtime::Handle::current(),
        fixture.dependencies(),
        CaptureSettings::default(),
    );

    manager
        .request_capture(
            CaptureRequest::new(CaptureMode::Region)
                .with_region(Rect::new(3, 4, 10, 10))
                .with_destination(Arc::new(destination.clone())),
        )
        .unwrap();

    match wait_for_outcome(&manager).await {
        Some(CaptureOutcome::Success(run)) => {
            assert_eq!(run.report().unwrap().bounds, Some(Rect::new(3, 4, 10, 10)));
        }
        other => panic!("Expected success outcome, got {:?}", other),
    }
    assert_eq!(destination.calls(), 1);
    assert_eq!(manager.get_status().await, CaptureStatus::Success);

    manager.reset().await;
    assert_eq!(manager.get_status().await, CaptureStatus::Idle);
}

#[tokio::test]
async fn capture_manager_remembers_last_region() {
    let mut fixture = Fixture::new();
    fixture.catalog.gdi = true;
    fixture.pixels.gdi = Some(RgbaImage::from_pixel(20, 20, WHITE));
    let manager = CaptureManager::with_dependencies(
        &tokio::runtime::Handle::current(),
        fixture.dependencies(),
        CaptureSettings::default(),
    );

    manager
        .request_capture(CaptureRequest::window(window("Notes", Rect::new(8, 9, 20, 20))))
        .unwrap();
    assert!(matches!(
        wait_for_outcome(&manager).await,
        Some(CaptureOutcome::Success(_))
    ));

    let settings = manager.settings();
    assert_eq!(
        settings.lock().await.session_state().last_captured_region,
        Some(Rect::new(8, 9, 20, 20))
    );
}

#[tokio::test]
async fn capture_manager_records_failure_status() {
    let mut fixture = Fixture::new();
    fixture.pixels.screen_fails = true;
    let manager = CaptureManager::with_dependencies(
        &tokio::runtime::Handle::current(),
        fixture.dependencies(),
        CaptureSettings::default(),
    );

    manager
        .request_capture(CaptureRequest::new(CaptureMode::FullScreen))
        .unwrap();

    match wait_for_outcome(&manager).await {
        Some(CaptureOutcome::Failed(msg)) => {
            assert!(msg.contains("screen capture"), "unexpected failure message: {msg}");
        }
        other => panic!("Expected failure outcome, got {other:?}"),
    }
    assert!(matches!(
        manager.get_status().await,
        CaptureStatus::Failed(_)
    ));
}

#[tokio::test]
async fn capture_manager_reports_cancellation() {
    let fixture = Fixture::new();
    let mut settings = CaptureSettings::default();
    settings.capture.capture_delay_ms = 10_000;
    let manager = CaptureManager::with_dependencies(
        &tokio::runtime::Handle::current(),
        fixture.dependencies(),
        settings,
    );

    manager
        .request_capture(CaptureRequest::new(CaptureMode::FullScreen))
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    manager.cancel().await;

    assert!(matches!(
        wait_for_outcome(&manager).await,
        Some(CaptureOutcome::Cancelled(_))
    ));
    assert!(matches!(
        manager.get_status().await,
        CaptureStatus::Cancelled(_)
    ));
}

#[test]
fn request_capture_returns_error_when_channel_closed() {
    let manager = CaptureManager::with_closed_channel_for_test();
    let err = manager
        .request_capture(CaptureRequest::new(CaptureMode::FullScreen))
        .expect_err("should fail when channel closed");
    assert!(
        matches!(err, CaptureError::AcquisitionFailure(ref msg) if msg.contains("not running")),
        "unexpected error variant: {err:?}"
    );
}
