use serde::{Deserialize, Serialize};

/// Number of pages the product mounts by default
pub const DEFAULT_PAGE_COUNT: u32 = 5;

/// Upper bound accepted for `page_count`
pub const MAX_PAGE_COUNT: u32 = 64;

/// Where a replacement image for page 0 comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    /// `file://` URI or plain filesystem path
    Uri(String),
    /// Already-fetched encoded image data (PNG, JPEG, ...)
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub fn uri(value: impl Into<String>) -> Self {
        Self::Uri(value.into())
    }

    /// Short human-readable description used in logs and the UI
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Uri(uri) => uri.clone(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Input of one viewer activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_image: Option<ImageSource>,
}

fn default_page_count() -> u32 {
    DEFAULT_PAGE_COUNT
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_count: DEFAULT_PAGE_COUNT,
            replacement_image: None,
        }
    }
}

impl ViewerConfig {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            replacement_image: None,
        }
    }

    pub fn with_image(mut self, source: ImageSource) -> Self {
        self.replacement_image = Some(source);
        self
    }

    /// Check the config invariants (`1 <= page_count <= MAX_PAGE_COUNT`)
    pub fn validate(&self) -> Result<(), String> {
        if self.page_count == 0 {
            return Err("page_count must be at least 1".to_string());
        }
        if self.page_count > MAX_PAGE_COUNT {
            return Err(format!(
                "page_count {} exceeds the maximum of {MAX_PAGE_COUNT}",
                self.page_count
            ));
        }
        Ok(())
    }

    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: ViewerConfig =
            serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;
        config.validate()?;
        Ok(config)
    }
}
