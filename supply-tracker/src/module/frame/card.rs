use serde::Deserialize;
use std::sync::Arc;

use super::{PLACEHOLDER_SUPPLY, escape_xml};
use crate::module::supply::SupplyCache;

pub const FRAME_VERSION: &str = "vNext";
pub const REFRESH_BUTTON_LABEL: &str = "🔄 Refresh";
pub const FRAME_PATH: &str = "/frame";
pub const FRAME_IMAGE_PATH: &str = "/frame-image";

const TRACKER_TITLE: &str = "Bitcoin Supply Tracker";
const TRACKER_DESCRIPTION: &str = "Real-time Bitcoin supply tracking";
/// Browser poller period; independent of the server cache TTL
const POLL_INTERVAL_MS: u64 = 30_000;

/// The two request shapes of the card protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardRequest {
    /// First load by the host; the image fetches its own value
    InitialRender,
    /// Refresh button pressed; the value is embedded in the image URL
    ButtonPress,
}

/// State round-tripped through the image URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardInteraction {
    pub provided_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardResponse {
    pub image_url: String,
    pub refresh_target_url: String,
    pub button_label: String,
    pub title: String,
}

/// Body a frame host POSTs on button press. Only logged; never trusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAction {
    #[serde(default)]
    pub untrusted_data: Option<UntrustedData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedData {
    #[serde(default)]
    pub fid: Option<u64>,
    #[serde(default)]
    pub button_index: Option<u8>,
}

impl FrameAction {
    /// Best effort; hosts and debuggers send anything from nothing to full payloads.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        serde_json::from_slice(body).ok()
    }

    pub fn button_index(&self) -> Option<u8> {
        self.untrusted_data.as_ref().and_then(|d| d.button_index)
    }

    pub fn fid(&self) -> Option<u64> {
        self.untrusted_data.as_ref().and_then(|d| d.fid)
    }
}

impl CardResponse {
    /// Build the response for an interaction against `base_url` (no trailing slash).
    pub fn build(base_url: &str, interaction: &CardInteraction) -> Self {
        let (image_url, title) = match &interaction.provided_value {
            Some(value) => (
                format!(
                    "{}{}?supply={}",
                    base_url,
                    FRAME_IMAGE_PATH,
                    urlencoding::encode(value)
                ),
                format!("Bitcoin Supply: {} BTC", value),
            ),
            None => (
                format!("{}{}", base_url, FRAME_IMAGE_PATH),
                TRACKER_TITLE.to_string(),
            ),
        };

        Self {
            image_url,
            refresh_target_url: format!("{}{}", base_url, FRAME_PATH),
            button_label: REFRESH_BUTTON_LABEL.to_string(),
            title,
        }
    }

    fn meta_tags(&self) -> String {
        let image = escape_xml(&self.image_url);
        let post_url = escape_xml(&self.refresh_target_url);

        format!(
            r#"    <meta property="fc:frame" content="{version}" />
    <meta property="fc:frame:image" content="{image}" />
    <meta property="fc:frame:image:aspect_ratio" content="1:1" />
    <meta property="fc:frame:button:1" content="{label}" />
    <meta property="fc:frame:button:1:action" content="post" />
    <meta property="fc:frame:post_url" content="{post_url}" />
    <meta property="og:image" content="{image}" />
    <meta property="og:title" content="{title}" />
    <meta property="og:description" content="{description}" />
"#,
            version = FRAME_VERSION,
            image = image,
            label = escape_xml(&self.button_label),
            post_url = post_url,
            title = escape_xml(&self.title),
            description = TRACKER_DESCRIPTION,
        )
    }

    /// Frame document returned to the host
    pub fn to_html(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n  <head>\n{}  </head>\n  <body></body>\n</html>\n",
            self.meta_tags()
        )
    }

    /// Landing page: the card's initial meta-fields plus a minimal live view
    /// that polls `/supply`.
    pub fn to_landing_html(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
{meta}  </head>
  <body>
    <h1>{title}</h1>
    <p><span id="supply">Loading...</span> BTC</p>
    <p id="updated"></p>
    <script>
      async function refreshSupply() {{
        try {{
          const res = await fetch("/supply");
          const body = await res.json();
          if (!res.ok) throw new Error(body.error || "request failed");
          document.getElementById("supply").textContent = body.supply.toLocaleString("en-US", {{ minimumFractionDigits: 2, maximumFractionDigits: 2 }});
          document.getElementById("updated").textContent = "Updated: " + new Date(body.timestamp).toLocaleTimeString();
        }} catch (e) {{
          document.getElementById("updated").textContent = "Error: " + e.message;
        }}
      }}
      refreshSupply();
      setInterval(refreshSupply, {interval});
    </script>
  </body>
</html>
"#,
            title = TRACKER_TITLE,
            meta = self.meta_tags(),
            interval = POLL_INTERVAL_MS,
        )
    }
}

/// Answers card interactions from the shared supply cache
pub struct CardResponder {
    cache: Arc<SupplyCache>,
}

impl CardResponder {
    pub fn new(cache: Arc<SupplyCache>) -> Self {
        Self { cache }
    }

    /// Always yields a well-formed response; cache failures become the placeholder.
    pub async fn respond(&self, request: CardRequest, base_url: &str) -> CardResponse {
        let interaction = match request {
            CardRequest::InitialRender => CardInteraction::default(),
            CardRequest::ButtonPress => {
                let value = match self.cache.get_supply().await {
                    Ok(reading) => reading.display_text(),
                    Err(e) => {
                        tracing::error!("Frame refresh could not obtain supply: {}", e);
                        PLACEHOLDER_SUPPLY.to_string()
                    }
                };
                CardInteraction {
                    provided_value: Some(value),
                }
            }
        };

        CardResponse::build(base_url, &interaction)
    }
}
