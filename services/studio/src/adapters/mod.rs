pub mod chat_llm;
pub mod credential_file;
pub mod image_gen;

pub use chat_llm::PollenChatAdapter;
pub use credential_file::FileCredentialStore;
pub use image_gen::PollenImageAdapter;
