pub use crate::provider::ProviderService;
