pub mod db;
pub mod paraphrase_llm;

pub use db::DbAdapter;
pub use paraphrase_llm::OpenAiParaphraseAdapter;
