//! Farcaster Frame card
//!
//! The card is stateless: the only value carried between renders travels in
//! the image URL's `supply` query parameter.

mod card;
pub use card::{
    CardInteraction, CardRequest, CardResponder, CardResponse, FrameAction, UntrustedData,
    FRAME_PATH, FRAME_IMAGE_PATH, FRAME_VERSION, REFRESH_BUTTON_LABEL,
};

mod renderer;
pub use renderer::{FrameImageRenderer, RenderError, IMAGE_SIZE, resolve_supply_text};

/// Shown wherever a live value could not be obtained
pub const PLACEHOLDER_SUPPLY: &str = "--,---,---.--";

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
