//! Controller crate - owns the "what to mine" decision. Builds Jobs from the
//! chain tip and template generator, multicasts and rebroadcasts them, and
//! validates the solutions workers send back.

pub mod chain;
pub mod config;
pub mod controller;
pub mod errors;

pub use chain::{BestSnapshot, BlockTemplate, ChainNotification, ChainState, ProcessBlockError, TemplateError, TemplateGenerator};
pub use config::ControllerConfig;
pub use controller::{Controller, TickAction};
pub use errors::{ControllerError, ControllerResult};
