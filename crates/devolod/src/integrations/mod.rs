#[cfg(feature = "integration_devolo")]
pub mod devolo;
