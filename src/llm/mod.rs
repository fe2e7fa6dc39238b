pub mod openai;

pub use openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, LlmClient, OpenAiClient,
    OpenAiClientConfig, OpenAiError,
};
