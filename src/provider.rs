use crate::error::Result;
use async_trait::async_trait;

/// The only thing the crate needs from a language model: prompt in, text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_output_tokens: u32, model_id: &str)
        -> Result<String>;
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for std::sync::Arc<P> {
    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        model_id: &str,
    ) -> Result<String> {
        (**self).complete(prompt, max_output_tokens, model_id).await
    }
}
