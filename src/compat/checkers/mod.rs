//! Concrete source checker implementations, in resolver priority order

pub mod fallback;
pub mod platform_sdk;
pub mod registry;

pub use fallback::FallbackChecker;
pub use platform_sdk::PlatformSdkChecker;
pub use registry::RegistryChecker;
