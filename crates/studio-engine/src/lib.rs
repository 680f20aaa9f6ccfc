//! Image studio engine: environment config, image services, and the
//! interactive session that ties prompts, histories and results together.

pub mod config;
pub mod providers;
pub mod studio;

pub use config::StudioConfig;
pub use providers::{
    default_service_registry, DryrunProvider, EditRequest, GeminiProvider, GenerateRequest,
    ImageService, ImagenProvider, ServiceRegistry,
};
pub use studio::{InFlight, RequestGate, Slot, Studio, StudioError};
