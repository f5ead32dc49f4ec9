//! Localization seam.

use contenthub_sdk::types::MessageTemplate;

/// Renders message templates into display text.
pub trait Translator: Send + Sync {
    fn text(&self, template: &MessageTemplate) -> String;
}

/// Translator without a catalog: the template key is the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyTranslator;

impl Translator for KeyTranslator {
    fn text(&self, template: &MessageTemplate) -> String {
        template.key.clone()
    }
}
