//! devolo Home Control integration.
//!
//! Binary sensors of a devolo Central Unit are exposed as `binary_sensor`
//! entities and kept current from the gateway's push messages.

mod binary_sensor;
mod config;
#[allow(clippy::module_inception)]
mod devolo;
mod devolo_device;
mod home_control;
mod publisher;

use std::sync::Arc;

use anyhow::Context;
pub use binary_sensor::DEVICE_CLASS_MAPPING;
pub use binary_sensor::DevoloBinaryDeviceEntity;
pub use binary_sensor::async_setup_entry;
pub use binary_sensor::device_class_for;
pub use config::BinarySensorConfig;
pub use config::Config as DevoloConfig;
pub use config::DeviceConfig;
pub use devolo::DevoloIntegration;
pub use devolo_device::DOMAIN;
pub use devolo_device::DevoloDeviceEntity;
pub use home_control::BinarySensorProperty;
pub use home_control::Device;
pub use home_control::HomeControl;
pub use home_control::HomeControlError;
pub use home_control::Message;
pub use home_control::StaticHomeControl;
use linkme::distributed_slice;
pub use publisher::Notification;
pub use publisher::Publisher;
pub use publisher::Subscriber;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_devolo(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let devolo_config = if let Some(c) = &ctx.config.integrations.devolo {
        c
    } else {
        return Ok(None);
    };

    let home_control = StaticHomeControl::from_config(devolo_config)
        .context("Failed to load devolo device inventory")?;
    tracing::info!(
        "devolo gateway {} with {} devices",
        home_control.gateway_id(),
        devolo_config.devices.len()
    );
    Ok(Some(Box::new(DevoloIntegration::new(Arc::new(home_control)))))
}
