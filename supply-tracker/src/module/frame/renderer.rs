//! Frame image renderer
//!
//! Fills a fixed SVG layout with the supply text and rasterizes it with resvg.
//! Output depends only on the input text; fonts are loaded once at startup.

use resvg::usvg::{fontdb, Options, Tree};
use resvg::tiny_skia;
use fontdb::Database;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::{PLACEHOLDER_SUPPLY, escape_xml};
use crate::module::supply::SupplySource;

const FRAME_SVG_TEMPLATE: &str = include_str!("../../../resources/frame_template.svg");

/// Width and height of the square frame image
pub const IMAGE_SIZE: u32 = 1200;

const TITLE: &str = "Bitcoin Supply Tracker";
const LIVE_BADGE: &str = "LIVE";
const FONT_FAMILY: &str = "DejaVu Sans";
/// Longest caller-supplied text that is drawn
const MAX_SUPPLY_TEXT_CHARS: usize = 32;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to parse frame SVG: {0}")]
    Svg(String),

    #[error("failed to allocate {0}x{0} pixmap")]
    Pixmap(u32),

    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

pub struct FrameImageRenderer {
    fontdb: Arc<Database>,
}

impl FrameImageRenderer {
    /// System fonts plus any fonts found in `fonts_dir`.
    pub fn new(fonts_dir: Option<&Path>) -> Self {
        let mut fontdb = Database::new();
        fontdb.load_system_fonts();
        if let Some(dir) = fonts_dir {
            if dir.is_dir() {
                fontdb.load_fonts_dir(dir);
            }
        }
        tracing::debug!("Loaded {} font faces for frame rendering", fontdb.len());

        Self {
            fontdb: Arc::new(fontdb),
        }
    }

    /// Fixed layout with `supply_text` substituted in.
    pub fn build_svg(supply_text: &str) -> String {
        let supply_text: String = supply_text.chars().take(MAX_SUPPLY_TEXT_CHARS).collect();

        FRAME_SVG_TEMPLATE
            .replace("{{SIZE}}", &IMAGE_SIZE.to_string())
            .replace("{{TITLE}}", TITLE)
            .replace("{{SUPPLY}}", &escape_xml(&supply_text))
            .replace("{{BADGE}}", LIVE_BADGE)
    }

    /// Render to PNG bytes. CPU bound; call from a blocking context.
    pub fn render_png(&self, supply_text: &str) -> Result<Vec<u8>, RenderError> {
        let svg = Self::build_svg(supply_text);

        let mut options = Options::default();
        options.font_family = FONT_FAMILY.to_string();
        options.fontdb = self.fontdb.clone();

        let tree = Tree::from_str(&svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;

        let mut pixmap =
            tiny_skia::Pixmap::new(IMAGE_SIZE, IMAGE_SIZE).ok_or(RenderError::Pixmap(IMAGE_SIZE))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        pixmap.encode_png().map_err(|e| RenderError::Encode(e.to_string()))
    }
}

/// Text to draw: the caller's value when present, otherwise a live fetch
/// straight from the source (bypassing the cache), otherwise the placeholder.
pub async fn resolve_supply_text(provided: Option<String>, source: &dyn SupplySource) -> String {
    if let Some(text) = provided.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        return text;
    }

    match source.fetch_supply().await {
        Ok(reading) => reading.display_text(),
        Err(e) => {
            tracing::warn!("Frame image live fetch failed, drawing placeholder: {}", e);
            PLACEHOLDER_SUPPLY.to_string()
        }
    }
}
