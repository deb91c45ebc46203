//! Raw registry documents to canonical datasets.

mod arrayexpress;
mod geo;

pub use arrayexpress::ArrayExpressNormalizer;
pub use geo::GeoNormalizer;

use crate::document::{SourceDocument, XmlNode};
use crate::domain::Registry;
use crate::error::KiraError;
use crate::record::{Dataset, NONE_SENTINEL};

pub trait RecordNormalizer {
    fn registry(&self) -> Registry;
    fn normalize(&self, doc: &SourceDocument) -> Result<Dataset, KiraError>;
}

pub fn normalizer_for(registry: Registry) -> Box<dyn RecordNormalizer> {
    match registry {
        Registry::Geo => Box::new(GeoNormalizer),
        Registry::ArrayExpress => Box::new(ArrayExpressNormalizer),
    }
}

/// Text of a direct child, else of the first descendant; `"None"` when absent.
fn text_or_none(node: &XmlNode, name: &str) -> String {
    node.child(name)
        .map(XmlNode::text)
        .filter(|text| !text.is_empty())
        .or_else(|| node.find_text(name))
        .unwrap_or_else(|| NONE_SENTINEL.to_string())
}

fn join_or_none<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> String {
    let collected = values
        .into_iter()
        .map(|value| value.as_ref().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    if collected.is_empty() {
        NONE_SENTINEL.to_string()
    } else {
        collected.join(crate::record::MULTI_VALUE_SEPARATOR)
    }
}
