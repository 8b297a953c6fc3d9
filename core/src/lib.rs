pub mod engine;
pub mod error;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod store;
pub mod tokenizer;

pub use engine::{Deadline, Engine, EngineState, Selection};
pub use error::{EngineError, ParseError, StoreError};
pub use ingest::{IngestPaths, IngestReport, Ingestor, Phase, PhaseReport};
pub use model::*;
pub use store::Stores;
