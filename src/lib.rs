pub mod legal;
pub mod llm;
pub mod shared;
pub mod storage;
