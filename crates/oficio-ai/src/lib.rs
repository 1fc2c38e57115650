//! Everything that talks to the LLM: the chat client behind the `ChatModel`
//! seam, need extraction with synonym expansion, the content moderator, and
//! the post-search provider validator. Every consumer degrades to a static
//! behavior when the model is absent, slow, or unparseable.

pub mod error;
pub mod expansion;
pub mod model;
pub mod moderation;
pub mod validation;

pub use error::LlmError;
pub use expansion::{ExtractedNeed, NeedExtractor};
pub use model::{ChatModel, ChatRequest, OpenAiChat};
pub use moderation::{ContentModerator, Verdict};
pub use validation::ProviderValidator;
