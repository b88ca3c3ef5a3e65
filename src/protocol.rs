//! Process-level request/response contract
//!
//! JSON only exists at this boundary. A response is one JSON document of the
//! shape `{"success": true, "path": ...}`, `{"success": true, "style_guide":
//! {...}}` or `{"success": false, "error": "..."}`.

use crate::{
    error::Result,
    processor::CompositeProcessor,
    types::StyleGuide,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::PathBuf;

/// One unit of work requested from the process
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Composite `product` into `generated` and write `output`
    Process {
        generated: PathBuf,
        product: PathBuf,
        output: PathBuf,
        /// Style guide JSON; extracted from the scene when absent
        style_guide: Option<String>,
    },
    /// Extract a style guide from `image`
    Analyze { image: PathBuf },
}

/// Outcome of a [`Request`]
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Processed { path: PathBuf },
    Analyzed { style_guide: StyleGuide },
    Failed { error: String },
}

impl Response {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Compact JSON document
    ///
    /// # Errors
    /// - `InvalidConfig` when a style guide holds non-finite numbers, which
    ///   JSON has no representation for
    pub fn to_json(&self) -> Result<String> {
        if let Self::Analyzed { style_guide } = self {
            style_guide.validate()?;
        }
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Processed { path } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("path", &path.display().to_string())?;
            },
            Self::Analyzed { style_guide } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("style_guide", style_guide)?;
            },
            Self::Failed { error } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            },
        }
        map.end()
    }
}

/// Run a request; every failure becomes [`Response::Failed`]
#[must_use]
pub fn handle(processor: &CompositeProcessor, request: &Request) -> Response {
    let outcome = match request {
        Request::Process {
            generated,
            product,
            output,
            style_guide,
        } => style_guide
            .as_deref()
            .map(StyleGuide::from_json)
            .transpose()
            .and_then(|guide| processor.process(generated, product, output, guide.as_ref()))
            .map(|_| Response::Processed {
                path: output.clone(),
            }),
        Request::Analyze { image } => processor
            .analyze(image)
            .map(|style_guide| Response::Analyzed { style_guide }),
    };

    outcome.unwrap_or_else(|e| {
        log::error!("Request failed: {e}");
        Response::Failed {
            error: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositeConfig;
    use serde_json::{json, Value};

    fn sample_guide() -> StyleGuide {
        StyleGuide::from_json(
            r##"{
                "colors": ["#102030"],
                "lighting": {
                    "brightness": 0.5,
                    "contrast": 0.25,
                    "direction": {"angle": 1.5, "magnitude": 2.0},
                    "highlights": [],
                    "shadows": [{"x": 0.5, "y": 0.75, "radius": 4.0}]
                },
                "composition": {"depth": 0.5, "aspectRatio": 1.5}
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn test_response_shapes() {
        let processed: Value = serde_json::from_str(
            &Response::Processed {
                path: PathBuf::from("out/result.png"),
            }
            .to_json()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(processed, json!({"success": true, "path": "out/result.png"}));

        let failed: Value = serde_json::from_str(
            &Response::Failed {
                error: "boom".to_string(),
            }
            .to_json()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(failed, json!({"success": false, "error": "boom"}));

        let analyzed: Value = serde_json::from_str(
            &Response::Analyzed {
                style_guide: sample_guide(),
            }
            .to_json()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(analyzed["success"], json!(true));
        assert_eq!(analyzed["style_guide"]["composition"]["aspectRatio"], json!(1.5));
        assert_eq!(analyzed["style_guide"]["lighting"]["shadows"][0]["y"], json!(0.75));
    }

    #[test]
    fn test_non_finite_guide_is_not_serialized() {
        let mut guide = sample_guide();
        guide.lighting.brightness = f64::NAN;

        let err = Response::Analyzed {
            style_guide: guide.clone(),
        }
        .to_json()
        .unwrap_err();
        assert!(err.to_string().contains("brightness"), "{err}");
        assert!(guide.to_json().is_err());

        guide.lighting.brightness = 0.5;
        guide.composition.aspect_ratio = f64::INFINITY;
        assert!(guide.to_json().is_err());
    }

    #[test]
    fn test_style_guide_round_trip() {
        let guide = sample_guide();
        let json = guide.to_json().unwrap();
        assert_eq!(StyleGuide::from_json(&json).unwrap(), guide);
    }

    #[test]
    fn test_handle_reports_failures() {
        let processor = CompositeProcessor::classical(CompositeConfig::default()).unwrap();

        let response = handle(
            &processor,
            &Request::Analyze {
                image: PathBuf::from("/nonexistent/scene.png"),
            },
        );
        assert!(!response.is_success());

        let response = handle(
            &processor,
            &Request::Process {
                generated: PathBuf::from("/nonexistent/scene.png"),
                product: PathBuf::from("/nonexistent/product.png"),
                output: PathBuf::from("/tmp/never-written.png"),
                style_guide: Some("{not json".to_string()),
            },
        );
        match response {
            Response::Failed { error } => assert!(!error.is_empty()),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
