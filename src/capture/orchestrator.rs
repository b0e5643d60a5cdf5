//! One capture request, from preparation to routing.
//!
//! A run moves through `Preparing -> Acquiring -> (InteractiveRefine) ->
//! Finalizing -> Routed -> Done`, or stops in `Failed`. The artifact is owned by
//! the run until it is handed to the router, which disposes of it or returns it
//! as retained.

use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use image::RgbaImage;
use tokio::{task, time::sleep};

use crate::capture::{
    artifact::CaptureArtifact,
    cancel::CancelSignal,
    dependencies::{CaptureDependencies, Destination},
    interactive::{self, ALL_CHILDREN_DEPTH, DEFAULT_CHILD_DEPTH, RefineOutcome, WindowEnumeration},
    router::{self, RouteReport},
    selector::{compositor_eligible, fallback_technique, select_technique},
    types::{
        CaptureError, CaptureMode, Point, Rect, ScreenCaptureMode, WindowCaptureTechnique,
        WindowDescriptor,
    },
    validator::{self, ValidatorThresholds, Verdict},
};
use crate::config::{CaptureConfig, Config, SessionState};

/// Time a restored window gets to finish its un-minimize animation.
const RESTORE_SETTLE: Duration = Duration::from_millis(300);

/// Process-wide settings and cross-request state, owned by the host.
pub struct CaptureSettings {
    pub capture: CaptureConfig,
    pub validator: ValidatorThresholds,
    /// Rectangle reused by [`CaptureMode::LastRegion`].
    pub last_captured_region: Option<Rect>,
    /// Destinations used when a request names none.
    pub destinations: Vec<Arc<dyn Destination>>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            validator: ValidatorThresholds::default(),
            last_captured_region: None,
            destinations: Vec::new(),
        }
    }
}

impl CaptureSettings {
    pub fn from_config(
        config: &Config,
        state: &SessionState,
        destinations: Vec<Arc<dyn Destination>>,
    ) -> Self {
        Self {
            capture: config.capture.clone(),
            validator: config.validator,
            last_captured_region: state.last_captured_region,
            destinations,
        }
    }

    /// State to persist between processes.
    pub fn session_state(&self) -> SessionState {
        SessionState {
            last_captured_region: self.last_captured_region,
        }
    }
}

impl fmt::Debug for CaptureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSettings")
            .field("capture", &self.capture)
            .field("validator", &self.validator)
            .field("last_captured_region", &self.last_captured_region)
            .field(
                "destinations",
                &self
                    .destinations
                    .iter()
                    .map(|d| d.designation().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// States of a capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Preparing,
    Acquiring,
    InteractiveRefine,
    Finalizing,
    Routed,
    Done,
    Failed,
}

/// Parameters of one capture.
#[derive(Clone)]
pub struct CaptureRequest {
    pub mode: CaptureMode,
    /// Pre-supplied rectangle for [`CaptureMode::Region`].
    pub region: Option<Rect>,
    /// Pre-supplied window for window and browser captures.
    pub window: Option<WindowDescriptor>,
    /// Overrides the configured screen selection.
    pub screen_mode: Option<ScreenCaptureMode>,
    /// Overrides the configured window technique.
    pub technique: Option<WindowCaptureTechnique>,
    /// Image to import for [`CaptureMode::File`].
    pub filename: Option<PathBuf>,
    pub capture_pointer: bool,
    pub destinations: Vec<Arc<dyn Destination>>,
}

impl CaptureRequest {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            region: None,
            window: None,
            screen_mode: None,
            technique: None,
            filename: None,
            capture_pointer: false,
            destinations: Vec::new(),
        }
    }

    /// Captures `window` directly, without asking the catalog for the active window.
    pub fn window(window: WindowDescriptor) -> Self {
        Self::new(CaptureMode::ActiveWindow).with_window(window)
    }

    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_window(mut self, window: WindowDescriptor) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_screen_mode(mut self, screen_mode: ScreenCaptureMode) -> Self {
        self.screen_mode = Some(screen_mode);
        self
    }

    pub fn with_technique(mut self, technique: WindowCaptureTechnique) -> Self {
        self.technique = Some(technique);
        self
    }

    pub fn with_file(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_pointer(mut self, capture_pointer: bool) -> Self {
        self.capture_pointer = capture_pointer;
        self
    }

    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destinations.push(destination);
        self
    }

    fn needs_preview(&self) -> bool {
        match self.mode {
            CaptureMode::Window => true,
            CaptureMode::Region => self.region.is_none(),
            _ => false,
        }
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("mode", &self.mode)
            .field("region", &self.region)
            .field("window", &self.window.as_ref().map(|w| w.title.clone()))
            .field("screen_mode", &self.screen_mode)
            .field("technique", &self.technique)
            .field("filename", &self.filename)
            .field("capture_pointer", &self.capture_pointer)
            .field(
                "destinations",
                &self
                    .destinations
                    .iter()
                    .map(|d| d.designation().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The artifact reached the router.
    Routed(RouteReport),
    /// Nothing to capture (no remembered region, empty selection, disabled mode).
    NothingCaptured,
    /// The user declined the interactive selection.
    UserCancelled,
}

/// Result of a run that did not fail with an error.
#[derive(Debug)]
pub struct CaptureRun {
    /// Mode actually executed (an active window capture may degrade to full screen).
    pub mode: CaptureMode,
    pub trace: Vec<CaptureState>,
    pub outcome: RunOutcome,
}

impl CaptureRun {
    /// Terminal state of the run.
    pub fn state(&self) -> CaptureState {
        self.trace.last().copied().unwrap_or(CaptureState::Idle)
    }

    pub fn report(&self) -> Option<&RouteReport> {
        match &self.outcome {
            RunOutcome::Routed(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Option<RouteReport> {
        match self.outcome {
            RunOutcome::Routed(report) => Some(report),
            _ => None,
        }
    }
}

enum Acquired {
    Ready,
    NeedsRefine,
    Nothing,
}

struct Tracker {
    trace: Vec<CaptureState>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            trace: vec![CaptureState::Idle],
        }
    }

    fn enter(&mut self, state: CaptureState) {
        log::debug!(
            "Capture state {:?} -> {:?}",
            self.trace.last().copied().unwrap_or(CaptureState::Idle),
            state
        );
        self.trace.push(state);
    }

    fn finish(mut self, state: CaptureState, mode: CaptureMode, outcome: RunOutcome) -> CaptureRun {
        self.enter(state);
        CaptureRun {
            mode,
            trace: self.trace,
            outcome,
        }
    }
}

/// Drives capture runs against a set of collaborators.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    deps: Arc<CaptureDependencies>,
}

impl CaptureOrchestrator {
    pub fn new(deps: Arc<CaptureDependencies>) -> Self {
        Self { deps }
    }

    /// Executes one capture request.
    ///
    /// Acquisition failures and cancellation before the interactive step are
    /// returned as errors; the router is not invoked in that case.
    pub async fn run(
        &self,
        request: CaptureRequest,
        settings: &mut CaptureSettings,
        cancel: &CancelSignal,
    ) -> Result<CaptureRun, CaptureError> {
        let mut tracker = Tracker::new();
        tracker.enter(CaptureState::Preparing);
        log::debug!(
            "Capturing with mode {:?} and pointer {}",
            request.mode,
            request.capture_pointer
        );

        let mut mode = request.mode;
        let mut artifact = CaptureArtifact::new(mode);
        artifact.details.filename = request.filename.clone();
        for destination in &request.destinations {
            artifact.details.add_destination(Arc::clone(destination));
        }
        if artifact.details.destinations().is_empty() {
            for destination in &settings.destinations {
                artifact.details.add_destination(Arc::clone(destination));
            }
        }

        // Started before the delay so short-lived windows are still listed.
        let enumeration = request.needs_preview().then(|| {
            let depth = if settings.capture.window_capture_all_child_locations {
                ALL_CHILDREN_DEPTH
            } else {
                DEFAULT_CHILD_DEPTH
            };
            WindowEnumeration::spawn(Arc::clone(&self.deps.catalog), depth)
        });

        let acquired = match self
            .prepare_and_acquire(&mut mode, &request, &mut artifact, settings, cancel, &mut tracker)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                log::warn!("Capture failed in state {:?}: {}", tracker.trace.last(), e);
                if let Some(enumeration) = enumeration {
                    enumeration.abort();
                }
                artifact.dispose();
                return Err(e);
            }
        };

        match acquired {
            Acquired::Nothing => {
                if let Some(enumeration) = enumeration {
                    enumeration.settle().await;
                }
                return Ok(tracker.finish(CaptureState::Done, mode, RunOutcome::NothingCaptured));
            }
            Acquired::NeedsRefine => {
                tracker.enter(CaptureState::InteractiveRefine);
                let Some(enumeration) = enumeration else {
                    return Err(CaptureError::AcquisitionFailure(
                        "interactive capture without window enumeration".into(),
                    ));
                };
                match interactive::refine(
                    &mut artifact,
                    enumeration,
                    self.deps.surface.as_ref(),
                    mode,
                    cancel,
                )
                .await
                {
                    RefineOutcome::Confirmed { region, .. } => {
                        settings.last_captured_region = Some(region);
                    }
                    RefineOutcome::Empty => {
                        artifact.dispose();
                        return Ok(tracker.finish(
                            CaptureState::Done,
                            mode,
                            RunOutcome::NothingCaptured,
                        ));
                    }
                    RefineOutcome::Cancelled => {
                        artifact.dispose();
                        return Ok(tracker.finish(
                            CaptureState::Failed,
                            mode,
                            RunOutcome::UserCancelled,
                        ));
                    }
                }
            }
            Acquired::Ready => {
                if let Some(enumeration) = enumeration {
                    enumeration.settle().await;
                }
            }
        }

        tracker.enter(CaptureState::Finalizing);
        self.finalize(&mut artifact, &settings.capture).await;

        log::debug!("A capture of: {}", artifact.details.title);
        let report = router::route(artifact).await;
        tracker.enter(CaptureState::Routed);

        Ok(tracker.finish(CaptureState::Done, mode, RunOutcome::Routed(report)))
    }

    async fn prepare_and_acquire(
        &self,
        mode: &mut CaptureMode,
        request: &CaptureRequest,
        artifact: &mut CaptureArtifact,
        settings: &mut CaptureSettings,
        cancel: &CancelSignal,
        tracker: &mut Tracker,
    ) -> Result<Acquired, CaptureError> {
        let delay = settings.capture.capture_delay_ms;
        if delay > 0 {
            cancel
                .guard("capture delay", sleep(Duration::from_millis(delay)))
                .await?;
        }

        if !mode.is_import() {
            let displays = self.query("display query", |d| d.desktop.displays()).await?;
            artifact.screen_bounds = Rect::union_all(&displays);

            if let Some(mut cursor) = self.deps.pixels.capture_cursor().await {
                cursor.visible = cursor.visible
                    && request.capture_pointer
                    && settings.capture.capture_mouse_pointer;
                artifact.cursor = Some(cursor);
            }
        }

        tracker.enter(CaptureState::Acquiring);
        let acquired = cancel
            .guard(
                "acquisition",
                self.acquire(mode, request, artifact, settings, cancel),
            )
            .await??;

        if !matches!(acquired, Acquired::Nothing) {
            artifact.anchor_cursor();
        }
        Ok(acquired)
    }

    async fn acquire(
        &self,
        mode: &mut CaptureMode,
        request: &CaptureRequest,
        artifact: &mut CaptureArtifact,
        settings: &mut CaptureSettings,
        cancel: &CancelSignal,
    ) -> Result<Acquired, CaptureError> {
        match *mode {
            CaptureMode::Region if request.region.is_some() => {
                let region = request.region.unwrap_or_default();
                self.capture_rect(artifact, region).await?;
                artifact.details.add_metadata("source", "Screen");
                Ok(Acquired::Ready)
            }
            CaptureMode::Region | CaptureMode::Window => {
                let preview = artifact.screen_bounds;
                self.capture_rect(artifact, preview).await?;
                artifact.details.add_metadata("source", "Screen");
                Ok(Acquired::NeedsRefine)
            }
            CaptureMode::ActiveWindow => {
                if self
                    .capture_active_window(request, artifact, settings, cancel)
                    .await?
                {
                    artifact.details.add_metadata("source", "Window");
                } else {
                    log::info!("No usable window, capturing the full screen instead");
                    *mode = CaptureMode::FullScreen;
                    artifact.details.capture_mode = CaptureMode::FullScreen;
                    let rect = self.full_screen_rect(screen_mode(request, settings)).await?;
                    self.capture_rect(artifact, rect).await?;
                    artifact.details.add_metadata("source", "Screen");
                    artifact.details.title = "Screen".to_string();
                }
                Ok(Acquired::Ready)
            }
            CaptureMode::BrowserDocument => {
                self.capture_browser_document(request, artifact).await?;
                Ok(Acquired::Ready)
            }
            CaptureMode::FullScreen => {
                let rect = self.full_screen_rect(screen_mode(request, settings)).await?;
                self.capture_rect(artifact, rect).await?;
                artifact.details.add_metadata("source", "Screen");
                artifact.details.title = "Screen".to_string();
                Ok(Acquired::Ready)
            }
            CaptureMode::Clipboard => {
                let image = self
                    .deps
                    .import
                    .clipboard_image()
                    .await
                    .map_err(|e| CaptureError::ImportUnavailable(e.to_string()))?;
                artifact.set_pixels(image, Point::default());
                artifact.details.title = "Clipboard".to_string();
                artifact.details.add_metadata("source", "Clipboard");
                Ok(Acquired::Ready)
            }
            CaptureMode::File => {
                let path = request.filename.clone().ok_or_else(|| {
                    CaptureError::ImportUnavailable("no file name given".into())
                })?;
                let image = self
                    .deps
                    .import
                    .load_file(&path)
                    .await
                    .map_err(|e| {
                        CaptureError::ImportUnavailable(format!("{}: {}", path.display(), e))
                    })?;
                artifact.set_pixels(image, Point::default());
                artifact.details.title = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                artifact
                    .details
                    .add_metadata("file", path.display().to_string());
                artifact.details.add_metadata("source", "File");
                Ok(Acquired::Ready)
            }
            CaptureMode::LastRegion => {
                let Some(region) = settings.last_captured_region else {
                    log::info!("No region captured yet, nothing to repeat");
                    return Ok(Acquired::Nothing);
                };
                self.capture_rect(artifact, region).await?;

                let center = region.center();
                let windows = self
                    .query("window listing", |d| d.catalog.list_visible_windows(0))
                    .await?;
                if let Some(window) = windows.iter().find(|w| w.contains(center)) {
                    artifact.details.title = window.title.clone();
                }
                artifact.details.add_metadata("source", "Screen");
                Ok(Acquired::Ready)
            }
            CaptureMode::None => {
                log::warn!("Capture mode is disabled, nothing to capture");
                Ok(Acquired::Nothing)
            }
        }
    }

    /// Returns `false` when there is no window worth capturing.
    async fn capture_active_window(
        &self,
        request: &CaptureRequest,
        artifact: &mut CaptureArtifact,
        settings: &mut CaptureSettings,
        cancel: &CancelSignal,
    ) -> Result<bool, CaptureError> {
        let supplied = request.window.is_some();
        let window = match request.window.clone() {
            Some(window) => {
                log::debug!("Using supplied window");
                Some(window)
            }
            None => {
                self.query("active window query", |d| d.catalog.active_window())
                    .await?
            }
        };

        let Some(window) = window else {
            log::warn!("No window to capture");
            return Ok(false);
        };
        if (!supplied && window.minimized) || window.bounds.is_empty() {
            log::warn!("Window '{}' is not visible, nothing to capture", window.title);
            return Ok(false);
        }

        log::debug!("Capturing window: {} with {}", window.title, window.bounds);
        if window.minimized {
            self.bring_to_front(&window).await;
            cancel.guard("window restore", sleep(RESTORE_SETTLE)).await?;
        } else if supplied {
            self.bring_to_front(&window).await;
        }

        settings.last_captured_region = Some(window.bounds);
        let requested = request
            .technique
            .unwrap_or(settings.capture.window_capture_technique);
        self.capture_window(&window, artifact, settings, requested)
            .await?;
        Ok(true)
    }

    /// Captures `window` with the best technique, falling back until one yields pixels.
    pub async fn capture_window(
        &self,
        window: &WindowDescriptor,
        artifact: &mut CaptureArtifact,
        settings: &CaptureSettings,
        requested: WindowCaptureTechnique,
    ) -> Result<(), CaptureError> {
        let catalog = self.deps.catalog.as_ref();
        let compositing = catalog.is_compositing_enabled();

        if requested == WindowCaptureTechnique::Auto
            && let Some(document) = &self.deps.document
            && document.is_document_window(window)
        {
            match document.capture_document(window).await {
                Some(image) => {
                    artifact.set_pixels(image, window.bounds.location());
                    artifact.details.title = window.title.clone();
                    return Ok(());
                }
                None => log::warn!(
                    "Problem capturing browser document, skipping to normal window capture"
                ),
            }
        }

        let mut technique = select_technique(window, requested, compositing, catalog);
        log::info!(
            "Capturing window '{}' with technique {:?}",
            window.title,
            technique
        );
        let visible = window.bounds.intersect(&artifact.screen_bounds);

        loop {
            let attempt = match technique {
                WindowCaptureTechnique::Gdi => {
                    self.try_gdi(window, visible, &settings.validator).await
                }
                WindowCaptureTechnique::Compositor
                | WindowCaptureTechnique::CompositorTransparent => {
                    if compositor_eligible(window, catalog) {
                        let transparent = technique == WindowCaptureTechnique::CompositorTransparent;
                        self.deps
                            .pixels
                            .capture_window_via_compositor(window, transparent)
                            .await
                            .map(|image| (image, window.bounds.location()))
                    } else {
                        None
                    }
                }
                WindowCaptureTechnique::Screen | WindowCaptureTechnique::Auto => {
                    self.try_screen(window, visible).await
                }
            };

            if let Some((image, location)) = attempt {
                artifact.set_pixels(image, location);
                break;
            }

            match fallback_technique(window, technique, compositing, catalog) {
                Some(next) => {
                    log::debug!("{:?} capture failed, trying {:?}", technique, next);
                    technique = next;
                }
                None => {
                    return Err(CaptureError::AcquisitionFailure(format!(
                        "every technique failed for window '{}'",
                        window.title
                    )));
                }
            }
        }

        artifact.details.title = window.title.clone();
        Ok(())
    }

    async fn try_gdi(
        &self,
        window: &WindowDescriptor,
        visible: Rect,
        thresholds: &ValidatorThresholds,
    ) -> Option<(RgbaImage, Point)> {
        if !self.deps.catalog.is_gdi_capture_permitted(&window.process) {
            return None;
        }
        self.bring_to_front(window).await;
        let gdi = self.deps.pixels.capture_window_via_gdi(window).await?;
        let (image, verdict) =
            validator::validate_gdi_capture(gdi, visible, self.deps.pixels.as_ref(), thresholds)
                .await;
        let location = match verdict {
            Verdict::ReplacedByScreen => visible.location(),
            Verdict::Accepted | Verdict::KeptAfterComparison => window.bounds.location(),
        };
        Some((image, location))
    }

    async fn try_screen(&self, window: &WindowDescriptor, visible: Rect) -> Option<(RgbaImage, Point)> {
        if visible.is_empty() {
            log::warn!("Window '{}' lies outside every display", window.title);
            return None;
        }
        self.bring_to_front(window).await;
        self.deps
            .pixels
            .capture_screen_region(visible)
            .await
            .map(|image| (image, visible.location()))
    }

    async fn capture_browser_document(
        &self,
        request: &CaptureRequest,
        artifact: &mut CaptureArtifact,
    ) -> Result<(), CaptureError> {
        let document = self.deps.document.clone().ok_or_else(|| {
            CaptureError::AcquisitionFailure("browser document capture is not available".into())
        })?;
        let window = match request.window.clone() {
            Some(window) => window,
            None => self
                .query("active window query", |d| d.catalog.active_window())
                .await?
                .ok_or_else(|| {
                    CaptureError::AcquisitionFailure("no browser window to capture".into())
                })?,
        };

        let image = document.capture_document(&window).await.ok_or_else(|| {
            CaptureError::AcquisitionFailure(format!(
                "document capture of '{}' failed",
                window.title
            ))
        })?;
        artifact.set_pixels(image, window.bounds.location());
        artifact.details.title = window.title.clone();
        artifact.details.add_metadata("source", "Browser");
        Ok(())
    }

    async fn capture_rect(&self, artifact: &mut CaptureArtifact, rect: Rect) -> Result<(), CaptureError> {
        if rect.is_empty() {
            return Err(CaptureError::AcquisitionFailure(format!(
                "nothing to capture in {rect}"
            )));
        }
        let image = self
            .deps
            .pixels
            .capture_screen_region(rect)
            .await
            .ok_or_else(|| {
                CaptureError::AcquisitionFailure(format!("screen capture of {rect} failed"))
            })?;
        artifact.set_pixels(image, rect.location());
        Ok(())
    }

    async fn full_screen_rect(&self, mode: ScreenCaptureMode) -> Result<Rect, CaptureError> {
        let displays = self.query("display query", |d| d.desktop.displays()).await?;
        if displays.is_empty() {
            return Err(CaptureError::AcquisitionFailure("no displays found".into()));
        }
        let everything = Rect::union_all(&displays);

        let rect = match mode {
            ScreenCaptureMode::Auto => {
                let pointer = self
                    .query("pointer query", |d| d.desktop.cursor_position())
                    .await?;
                pointer
                    .and_then(|p| displays.iter().find(|display| display.contains(p)).copied())
                    .unwrap_or(everything)
            }
            ScreenCaptureMode::Fixed(index) => {
                let clamped = index.min(displays.len() - 1);
                if clamped != index {
                    log::warn!(
                        "Display {} does not exist, using display {}",
                        index,
                        clamped
                    );
                }
                displays[clamped]
            }
            ScreenCaptureMode::FullScreen => everything,
        };
        Ok(rect)
    }

    /// DPI query and capture feedback run side by side; both finish before routing.
    async fn finalize(&self, artifact: &mut CaptureArtifact, config: &CaptureConfig) {
        let import = artifact.details.capture_mode.is_import();
        let bounds = artifact.bounds().unwrap_or_default();

        let feedback = async {
            if !import {
                self.capture_feedback(bounds, config).await;
            }
        };
        let (dpi, ()) = futures::join!(self.deps.desktop.query_dpi(), feedback);

        if let Some((dpi_x, dpi_y)) = dpi {
            artifact.details.dpi_x = dpi_x;
            artifact.details.dpi_y = dpi_y;
        }
        if import {
            artifact.details.modified = false;
        }
    }

    async fn capture_feedback(&self, bounds: Rect, config: &CaptureConfig) {
        let sound = async {
            if config.play_camera_sound
                && let Err(e) = self.deps.feedback.play_sound().await
            {
                log::debug!("Capture sound failed: {}", e);
            }
        };
        let flash = async {
            if config.show_flash
                && let Err(e) = self.deps.feedback.flash(bounds).await
            {
                log::debug!("Capture flash failed: {}", e);
            }
        };
        futures::join!(sound, flash);
    }

    async fn bring_to_front(&self, window: &WindowDescriptor) {
        let target = window.clone();
        let result = self
            .query("window activation", move |d| {
                if target.minimized {
                    d.catalog.restore(&target);
                } else {
                    d.catalog.to_foreground(&target);
                }
            })
            .await;
        if let Err(e) = result {
            log::debug!("Could not bring '{}' to front: {}", window.title, e);
        }
    }

    /// Runs a blocking window-system query off the async executor.
    async fn query<T, F>(&self, what: &str, f: F) -> Result<T, CaptureError>
    where
        F: FnOnce(&CaptureDependencies) -> T + Send + 'static,
        T: Send + 'static,
    {
        let deps = Arc::clone(&self.deps);
        task::spawn_blocking(move || f(&deps))
            .await
            .map_err(|e| CaptureError::AcquisitionFailure(format!("{what} task failed: {e}")))
    }
}

fn screen_mode(request: &CaptureRequest, settings: &CaptureSettings) -> ScreenCaptureMode {
    request
        .screen_mode
        .unwrap_or(settings.capture.screen_capture_mode)
}
