// VitalGuard - ESP-IDF Bindings
//
// Concrete bus and transport implementations for the device build.

pub mod http;
pub mod i2c;
pub mod wifi;
