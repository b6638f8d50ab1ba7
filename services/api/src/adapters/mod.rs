pub mod db;
pub mod gemini_llm;
pub mod http_fetch;
pub mod openai_llm;

pub use db::DbAdapter;
pub use gemini_llm::GeminiCompletionAdapter;
pub use http_fetch::ReqwestFetcher;
pub use openai_llm::OpenAiCompletionAdapter;
