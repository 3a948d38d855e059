// VitalGuard - Ambient Sensor Interface
//
// Temperature/humidity, force and acceleration come from separate drivers.
// The vitals core only copies their latest readings into each data point.

use crate::events::AmbientReadings;

pub trait AmbientSource {
    /// Latest readings; called once per sampling cycle.
    fn read(&mut self) -> AmbientReadings;
}

/// Used when no ambient sensors are fitted; all fields read as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAmbient;

impl AmbientSource for NoAmbient {
    fn read(&mut self) -> AmbientReadings {
        AmbientReadings::default()
    }
}

impl<F: FnMut() -> AmbientReadings> AmbientSource for F {
    fn read(&mut self) -> AmbientReadings {
        self()
    }
}
