//! Screen parsing interface.
//!
//! A [`ScreenParser`] turns the screenshot of a [`ComputerObservation`] into a
//! list of recognised elements. Parsing is post-processing only: it never
//! runs inside the step loop, and the crate ships no recognition engine.

use serde::{Deserialize, Serialize};

use crate::computer::{ComputerObservation, Screenshot};
use crate::error::EnvError;

/// Pixel rectangle of a recognised element, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left
            && x < self.left.saturating_add(self.width)
            && y >= self.top
            && y < self.top.saturating_add(self.height)
    }

    /// Centre point, handy as a click target.
    pub fn center(&self) -> (u32, u32) {
        (
            self.left.saturating_add(self.width / 2),
            self.top.saturating_add(self.height / 2),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedElement {
    pub text: String,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedScreenshot {
    pub elements: Vec<ParsedElement>,
}

impl ParsedScreenshot {
    /// Elements whose text contains `needle`, case-insensitively.
    pub fn find<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a ParsedElement> + 'a {
        let needle = needle.to_lowercase();
        self.elements
            .iter()
            .filter(move |e| e.text.to_lowercase().contains(&needle))
    }
}

/// An observation together with the overlay parsed from its screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedObservation {
    #[serde(flatten)]
    pub observation: ComputerObservation,
    pub parsed_screenshot: ParsedScreenshot,
}

/// Extracts text elements from a screenshot.
#[allow(async_fn_in_trait)]
pub trait ScreenParser {
    fn name(&self) -> &str;

    async fn parse_screenshot(&self, screenshot: &Screenshot) -> Result<ParsedScreenshot, EnvError>;
}

/// Parse `observation`'s screenshot and attach the result.
///
/// Observations without a screenshot cannot be parsed and yield
/// [`EnvError::Unsupported`].
pub async fn enrich<P: ScreenParser>(
    parser: &P,
    observation: ComputerObservation,
) -> Result<ParsedObservation, EnvError> {
    let screenshot = observation
        .screenshot
        .as_ref()
        .ok_or_else(|| EnvError::unsupported(parser.name(), "observation without screenshot"))?;
    let parsed_screenshot = parser.parse_screenshot(screenshot).await?;
    tracing::debug!(
        parser = parser.name(),
        elements = parsed_screenshot.elements.len(),
        "parsed screenshot"
    );
    Ok(ParsedObservation {
        observation,
        parsed_screenshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pretends every screenshot shows a single "OK" button.
    struct FixedParser;

    impl ScreenParser for FixedParser {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn parse_screenshot(&self, _screenshot: &Screenshot) -> Result<ParsedScreenshot, EnvError> {
            Ok(ParsedScreenshot {
                elements: vec![ParsedElement {
                    text: "OK".into(),
                    bounding_box: BoundingBox {
                        left: 10,
                        top: 20,
                        width: 40,
                        height: 10,
                    },
                }],
            })
        }
    }

    #[tokio::test]
    async fn enrich_keeps_original_observation() {
        let observation = ComputerObservation {
            screenshot: Some(Screenshot {
                format: "png".into(),
                base64: "AAAA".into(),
            }),
            ..Default::default()
        };
        let parsed = enrich(&FixedParser, observation.clone()).await.unwrap();
        assert_eq!(parsed.observation, observation);
        let ok = parsed.parsed_screenshot.find("ok").next().unwrap();
        assert_eq!(ok.bounding_box.center(), (30, 25));
        assert!(ok.bounding_box.contains(10, 20));
        assert!(!ok.bounding_box.contains(50, 20));

        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["screenshot"]["base64"], "AAAA");
        assert_eq!(json["parsed_screenshot"]["elements"][0]["text"], "OK");
    }

    #[test]
    fn boxes_at_the_edge_of_the_coordinate_space() {
        let edge = BoundingBox {
            left: u32::MAX - 5,
            top: u32::MAX - 5,
            width: 100,
            height: 100,
        };
        assert!(edge.contains(u32::MAX - 1, u32::MAX - 5));
        assert!(!edge.contains(u32::MAX - 6, u32::MAX - 1));
        assert_eq!(edge.center(), (u32::MAX, u32::MAX));
    }

    #[tokio::test]
    async fn observation_without_screenshot_is_unsupported() {
        let err = enrich(&FixedParser, ComputerObservation::default())
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
