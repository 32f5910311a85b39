//! Per-platform media and text constraints

use crate::model::{AdCreative, AdType};
use crate::ports::PlatformError;

/// What a platform accepts, checked before any network call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    /// Ad types the platform can publish
    pub supported_ad_types: Vec<AdType>,
    /// Maximum text length in characters
    pub max_text_chars: Option<usize>,
    /// Whether a post without text is rejected
    pub requires_text: bool,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            supported_ad_types: vec![AdType::Text, AdType::Image, AdType::Video],
            max_text_chars: None,
            requires_text: false,
        }
    }
}

impl MediaPolicy {
    pub fn supports(&self, ad_type: AdType) -> bool {
        self.supported_ad_types.contains(&ad_type)
    }

    /// Check a creative against this policy.
    ///
    /// `text` is the text as the adapter will send it, which may differ from
    /// the creative content (e.g. with a media link appended).
    pub fn check(&self, creative: &AdCreative, text: &str) -> Result<(), PolicyViolation> {
        if !self.supports(creative.ad_type) {
            return Err(PolicyViolation::UnsupportedAdType {
                ad_type: creative.ad_type,
            });
        }

        if creative.ad_type != AdType::Text && creative.media_url().is_none() {
            return Err(PolicyViolation::MissingMedia {
                ad_type: creative.ad_type,
            });
        }

        if self.requires_text && text.trim().is_empty() {
            return Err(PolicyViolation::EmptyText);
        }

        if let Some(max) = self.max_text_chars {
            let len = text.chars().count();
            if len > max {
                return Err(PolicyViolation::TextTooLong { len, max });
            }
        }

        Ok(())
    }
}

/// Policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("{ad_type} ads are not supported")]
    UnsupportedAdType { ad_type: AdType },
    #[error("{ad_type} ad has no media URL")]
    MissingMedia { ad_type: AdType },
    #[error("Post text is empty")]
    EmptyText,
    #[error("Content too long: {len} > {max}")]
    TextTooLong { len: usize, max: usize },
}

impl From<PolicyViolation> for PlatformError {
    fn from(violation: PolicyViolation) -> Self {
        PlatformError::Validation(violation.to_string())
    }
}
