//! Question answering over a built vector index: retrieve, assemble a
//! bounded context, prompt the chat model, normalize the answer.

pub mod context;
pub mod pipeline;
pub mod prompt;

pub use context::ContextAssembler;
pub use pipeline::{hf_pipeline, Answer, AnswerPipeline};
