//! PHI region tagging.
//!
//! Marks rendered elements so audit or redaction tooling can find PHI-bearing
//! regions. This is a tag only; it plays no part in clearing.

use std::collections::BTreeMap;

/// Attribute set on PHI-bearing elements
pub const PHI_ATTRIBUTE: &str = "data-phi";
pub const PHI_ATTRIBUTE_VALUE: &str = "true";

/// Anything that carries string attributes (DOM node handle, view model, ...)
pub trait PhiElement {
    fn set_attribute(&mut self, name: &str, value: &str);
    fn attribute(&self, name: &str) -> Option<&str>;
}

/// Tag an element as PHI-bearing. Idempotent.
pub fn mark_as_phi<E: PhiElement + ?Sized>(element: &mut E) {
    element.set_attribute(PHI_ATTRIBUTE, PHI_ATTRIBUTE_VALUE);
}

pub fn is_marked_phi<E: PhiElement + ?Sized>(element: &E) -> bool {
    element.attribute(PHI_ATTRIBUTE) == Some(PHI_ATTRIBUTE_VALUE)
}

/// Minimal element model: a tag name plus ordered attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttributes {
    pub tag: String,
    attributes: BTreeMap<String, String>,
}

impl ElementAttributes {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl PhiElement for ElementAttributes {
    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
