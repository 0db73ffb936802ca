pub mod error;
pub mod message;
pub mod model;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        ConfigError, CorpusError, ModelError, QuestionError, Result, VirobenchError,
    };
    pub use crate::message::{Message, UsageMetadata};
    pub use crate::model::{CallOptions, ChatModel, ChatResult};
}
