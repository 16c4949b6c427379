//! Object id tokens: which rendered layer and which feature within it.
//!
//! A token is a single layer-code character followed by the decimal feature
//! id, e.g. `p2811970425`. Codes come from the injected [`LayerTable`], so
//! adding a layer never touches this module.

use crate::config::LayerTable;
use std::fmt;

/// A decoded object id token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    pub layer_code: char,
    pub feature_id: u64,
}

impl ObjectReference {
    pub fn new(layer_code: char, feature_id: u64) -> Self {
        Self {
            layer_code,
            feature_id,
        }
    }

    /// The token form: code immediately followed by the id.
    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.layer_code, self.feature_id)
    }
}

/// Encodes and decodes object id tokens against a layer table.
#[derive(Debug, Clone, Default)]
pub struct ObjectIdCodec {
    layers: LayerTable,
}

impl ObjectIdCodec {
    pub fn new(layers: LayerTable) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    /// Layer code for a rendered layer name.
    pub fn encode(&self, layer_name: &str) -> Option<char> {
        self.layers.code_for(layer_name)
    }

    /// Token for a feature in a rendered layer, if that layer is addressable.
    pub fn token_for(&self, layer_name: &str, feature_id: u64) -> Option<String> {
        self.encode(layer_name)
            .map(|code| ObjectReference::new(code, feature_id).token())
    }

    /// Decodes a token. Anything shorter than two characters, with an
    /// unknown code, or with a suffix that is not a plain decimal number
    /// yields `None`.
    pub fn decode(&self, token: &str) -> Option<ObjectReference> {
        let mut chars = token.chars();
        let code = chars.next()?;
        let digits = chars.as_str();

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.layers.layer_for(code)?;

        let feature_id = digits.parse::<u64>().ok()?;
        Some(ObjectReference::new(code, feature_id))
    }

    /// Rendered layer name a reference points into.
    pub fn layer_name(&self, reference: &ObjectReference) -> Option<&str> {
        self.layers.layer_for(reference.layer_code)
    }
}
