//! Request payloads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::style::Slot;

/// Number of overlays every request carries.
pub const OVERLAY_COUNT: usize = 3;

/// Longest accepted text per slot, in characters.
///
/// Three full-width blocks at this length still fit between the top and
/// bottom safe zones with the default styles.
pub const MAX_TEXT_CHARS: usize = 80;

/// The three overlay strings, in slot order (top, center, bottom).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct OverlayTexts {
    #[validate(length(equal = 3))]
    pub texts: Vec<String>,
}

impl OverlayTexts {
    /// Parse the `texts` form field: a JSON array of exactly three strings.
    ///
    /// Non-string entries are rejected rather than stringified, as is any
    /// entry longer than [`MAX_TEXT_CHARS`].
    pub fn parse_json(raw: &str) -> ModelResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ModelError::TextsFormat(e.to_string()))?;

        let items = value
            .as_array()
            .ok_or_else(|| ModelError::TextsFormat("expected a JSON array".to_string()))?;

        let texts = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ModelError::TextsFormat(format!("entry {} is not a string", i)))
            })
            .collect::<ModelResult<Vec<_>>>()?;

        let parsed = Self { texts };
        if parsed.validate().is_err() {
            return Err(ModelError::TextCount {
                expected: OVERLAY_COUNT,
                actual: parsed.texts.len(),
            });
        }

        for (index, text) in parsed.texts.iter().enumerate() {
            let chars = text.chars().count();
            if chars > MAX_TEXT_CHARS {
                return Err(ModelError::TextTooLong {
                    index,
                    max: MAX_TEXT_CHARS,
                    actual: chars,
                });
            }
        }
        Ok(parsed)
    }

    /// Text for a slot. Only valid after successful parsing.
    pub fn get(&self, slot: Slot) -> &str {
        self.texts.get(slot.index()).map(String::as_str).unwrap_or("")
    }
}
