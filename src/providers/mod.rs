pub mod google;

use async_trait::async_trait;

use crate::core::errors::AppResult;

/// Text-to-text translation between the configured language pair.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> AppResult<String>;

    /// Translate a row of units. Order and cardinality are preserved, and
    /// blank units are passed through without a request.
    async fn translate_batch(&self, units: &[String]) -> AppResult<Vec<String>> {
        let mut translated = Vec::with_capacity(units.len());
        for unit in units {
            if unit.trim().is_empty() {
                translated.push(unit.clone());
            } else {
                translated.push(self.translate(unit).await?);
            }
        }
        Ok(translated)
    }
}

/// Returns text unchanged. Used for `--no-translate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str) -> AppResult<String> {
        Ok(text.to_string())
    }
}
