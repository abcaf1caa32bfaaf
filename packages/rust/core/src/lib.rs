//! Blueprint generation: completion provider, the five section agents,
//! service assembly and the end-to-end `generate_blueprint` flow.

pub mod agents;
pub mod blueprint;
pub mod completion;
pub mod services;

pub use blueprint::{BlueprintResult, generate_blueprint};
pub use completion::{ChatCompletionClient, CompletionProvider, CompletionRequest};
pub use services::{Providers, Services, Session, placeholder_section};
