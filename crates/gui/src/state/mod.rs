pub mod settings;

use shared::{ImageSource, ViewerConfig, MAX_PAGE_COUNT};

pub use settings::{ControlSettings, UiSettings, ViewerSettings};

/// Combined application state of the desktop shell
pub struct AppState {
    pub config: ViewerConfig,
    pub settings: ViewerSettings,
    /// Whether the viewer should be mounted
    pub viewer_open: bool,
    /// Last message for the status line
    pub status: Option<String>,
    /// Bumped on every change that needs a fresh activation
    revision: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ViewerConfig::default(), ViewerSettings::default())
    }
}

impl AppState {
    pub fn new(config: ViewerConfig, settings: ViewerSettings) -> Self {
        Self {
            config,
            settings,
            viewer_open: true,
            status: None,
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Change the page count (clamped to the valid range).
    /// Returns `true` if the config changed.
    pub fn set_page_count(&mut self, page_count: u32) -> bool {
        let page_count = page_count.clamp(1, MAX_PAGE_COUNT);
        if page_count == self.config.page_count {
            return false;
        }
        self.config.page_count = page_count;
        self.settings.ui.page_count = page_count;
        self.bump();
        true
    }

    pub fn set_image(&mut self, source: ImageSource) {
        self.status = Some(format!("Image: {}", source.describe()));
        self.config.replacement_image = Some(source);
        self.bump();
    }

    /// Returns `true` if an image was set
    pub fn clear_image(&mut self) -> bool {
        if self.config.replacement_image.take().is_none() {
            return false;
        }
        self.status = Some("Image cleared".to_string());
        self.bump();
        true
    }

    pub fn open_viewer(&mut self) {
        if !self.viewer_open {
            self.viewer_open = true;
            self.bump();
        }
    }

    pub fn close_viewer(&mut self) {
        self.viewer_open = false;
    }

    /// Whether the viewer is open but no activation exists for the current
    /// revision. `built` is the revision of the last activation attempt.
    pub fn wants_activation(&self, built: Option<u64>) -> bool {
        self.viewer_open && built != Some(self.revision)
    }

    /// Short label for the current page 0 image
    pub fn image_label(&self) -> String {
        match &self.config.replacement_image {
            Some(ImageSource::Uri(uri)) => uri
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(uri)
                .to_string(),
            Some(source) => source.describe(),
            None => "(ruled paper)".to_string(),
        }
    }
}
