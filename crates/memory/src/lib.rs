//! Signed persistent memory store: per-agent STM, tamper-evident LTM,
//! relevance-scored retrieval, and the pure dream-cycle building blocks.

pub mod dream;
pub mod ltm;
pub mod manager;
pub mod retrieval;
pub mod schema;
pub mod signing;
pub mod stm;

pub use manager::{MemoryCore, MemoryCoreConfig};
pub use schema::{
    KeySettings, LtmRecord, MemoryLayer, MemorySource, PromotedFrom, StmEntry, Utterance,
    VerifiedLtmRecord,
};
