//! Page texture synthesis.
//!
//! Every page gets its own texture: either the caller's replacement image
//! (page 0 only, decoded asynchronously, see [`decode`]) or a procedurally
//! drawn sheet of ruled paper.

pub mod canvas;
pub mod decode;

use image::{Rgba, RgbaImage};
use shared::{ImageSource, ViewerConfig};

use crate::error::Result;
use canvas::{Canvas, Color};

pub const PAGE_TEXTURE_WIDTH: u32 = 512;
pub const PAGE_TEXTURE_HEIGHT: u32 = 640;

const PAPER_COLOR: Color = [0xFE, 0xF7, 0xCD, 0xFF];
const RULE_COLOR: Color = [0xFD, 0xE1, 0xD3, 0xFF];
const MARGIN_COLOR: Color = [0xFF, 0x00, 0x00, 0x33];
const TEXT_COLOR: Color = [0x55, 0x55, 0x55, 0xFF];

const RULE_PITCH: u32 = 24;
const MARGIN_X: u32 = 40;
const TEXT_X: f32 = 50.0;
const TEXT_TOP: f32 = 50.0;
const TEXT_LINE_SPACING: f32 = 30.0;
const TEXT_SIZE_PX: f32 = 14.0;

/// Placeholder notes written on every page after the first
pub const PLACEHOLDER_LINES: [&str; 5] = [
    "Notes from class:",
    "• Important concept",
    "• Remember to review",
    "• Study for next week",
    "• Ask questions",
];

/// Pixel content backing one page's material
#[derive(Debug, Clone, PartialEq)]
pub enum PageTexture {
    /// Replacement image; `decoded` stays `None` until the decode lands
    Image {
        source: ImageSource,
        decoded: Option<RgbaImage>,
        placeholder: RgbaImage,
    },
    SyntheticRuled {
        width: u32,
        height: u32,
        lines: Vec<String>,
        pixels: RgbaImage,
    },
    /// Drawing primitives were unavailable
    Blank {
        width: u32,
        height: u32,
        pixels: RgbaImage,
    },
}

impl PageTexture {
    /// Pixels the renderer should currently show
    pub fn pixels(&self) -> &RgbaImage {
        match self {
            PageTexture::Image {
                decoded: Some(img), ..
            } => img,
            PageTexture::Image { placeholder, .. } => placeholder,
            PageTexture::SyntheticRuled { pixels, .. } => pixels,
            PageTexture::Blank { pixels, .. } => pixels,
        }
    }

    /// Image texture still waiting for its decode
    pub fn is_pending(&self) -> bool {
        matches!(self, PageTexture::Image { decoded: None, .. })
    }

    pub fn image_source(&self) -> Option<&ImageSource> {
        match self {
            PageTexture::Image { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Placeholder text drawn on a synthetic page
    pub fn lines(&self) -> &[String] {
        match self {
            PageTexture::SyntheticRuled { lines, .. } => lines,
            _ => &[],
        }
    }
}

/// Source of drawing surfaces; [`Canvas::new`] in production
pub type CanvasFactory = fn(u32, u32) -> Result<Canvas>;

/// Texture for page `page_index`
pub fn synthesize(page_index: usize, config: &ViewerConfig) -> PageTexture {
    synthesize_with(page_index, config, Canvas::new)
}

/// [`synthesize`] drawing on canvases from `make_canvas`
pub fn synthesize_with(
    page_index: usize,
    config: &ViewerConfig,
    make_canvas: CanvasFactory,
) -> PageTexture {
    match (&config.replacement_image, page_index) {
        (Some(source), 0) => PageTexture::Image {
            source: source.clone(),
            decoded: None,
            placeholder: blank_pixels(),
        },
        _ => ruled_paper_with(page_index, make_canvas),
    }
}

/// Ruled paper, falling back to a blank sheet without a canvas
pub fn ruled_paper(page_index: usize) -> PageTexture {
    ruled_paper_with(page_index, Canvas::new)
}

pub fn ruled_paper_with(page_index: usize, make_canvas: CanvasFactory) -> PageTexture {
    let canvas = match make_canvas(PAGE_TEXTURE_WIDTH, PAGE_TEXTURE_HEIGHT) {
        Ok(canvas) => Some(canvas),
        Err(e) => {
            tracing::warn!("Page {page_index}: {e}; using a blank texture");
            None
        }
    };
    ruled_paper_on(canvas, page_index)
}

/// Draw ruled paper on `canvas`; `None` yields the blank fallback
pub fn ruled_paper_on(canvas: Option<Canvas>, page_index: usize) -> PageTexture {
    let Some(mut canvas) = canvas else {
        return PageTexture::Blank {
            width: PAGE_TEXTURE_WIDTH,
            height: PAGE_TEXTURE_HEIGHT,
            pixels: blank_pixels(),
        };
    };

    canvas.fill(PAPER_COLOR);

    let mut y = RULE_PITCH;
    while y < canvas.height() {
        canvas.hline(y, RULE_COLOR);
        y += RULE_PITCH;
    }

    canvas.vline(MARGIN_X, MARGIN_COLOR);

    let lines: Vec<String> = if page_index > 0 {
        PLACEHOLDER_LINES.iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };
    for (i, line) in lines.iter().enumerate() {
        let baseline = TEXT_TOP + i as f32 * TEXT_LINE_SPACING;
        canvas.fill_text(line, TEXT_X, baseline, TEXT_SIZE_PX, TEXT_COLOR);
    }

    PageTexture::SyntheticRuled {
        width: canvas.width(),
        height: canvas.height(),
        lines,
        pixels: canvas.into_image(),
    }
}

fn blank_pixels() -> RgbaImage {
    RgbaImage::from_pixel(PAGE_TEXTURE_WIDTH, PAGE_TEXTURE_HEIGHT, Rgba(PAPER_COLOR))
}
