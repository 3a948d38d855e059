// VitalGuard - Sample & Data Point Types

use serde::Serialize;

// ---------------------------------------------------------------------------
// Raw PPG samples (one FIFO record of the MAX30102)
// ---------------------------------------------------------------------------
const SAMPLE_MASK: u32 = 0x03_FFFF; // 18-bit left-justified
pub const FIFO_RECORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSamplePair {
    /// Channel A, the infrared intensity used for pulse detection.
    pub a: u32,
    /// Channel B, the red intensity.
    pub b: u32,
}

impl RawSamplePair {
    pub fn new(a: u32, b: u32) -> Self {
        Self { a: a & SAMPLE_MASK, b: b & SAMPLE_MASK }
    }

    /// Decode one 6-byte FIFO record: 3 bytes channel A then 3 bytes channel B.
    pub fn decode(record: &[u8; FIFO_RECORD_LEN]) -> Self {
        let a = u32::from_be_bytes([0, record[0], record[1], record[2]]);
        let b = u32::from_be_bytes([0, record[3], record[4], record[5]]);
        Self::new(a, b)
    }

    /// Both channels reading zero means no LED return at all.
    pub fn is_blank(&self) -> bool {
        self.a == 0 && self.b == 0
    }
}

// ---------------------------------------------------------------------------
// Readings supplied by the other sensors (opaque to the vitals core)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Acceleration {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AmbientReadings {
    pub temperature: f32,
    pub humidity: f32,
    pub force: f32,
    pub accel: Acceleration,
}

// ---------------------------------------------------------------------------
// Uplink data point (one per sampling cycle)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PpgReading {
    pub ir: u32,
    pub red: u32,
    pub heartrate: Option<f32>,
    pub spo2: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VitalSigns {
    pub ppg: PpgReading,
    pub temperature: f32,
    pub humidity: f32,
    pub force: f32,
    pub accel: Acceleration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VitalsDataPoint {
    pub cycle: u32,
    /// Milliseconds since boot.
    pub timestamp: u64,
    pub vital_signs: VitalSigns,
}

impl VitalsDataPoint {
    pub fn new(
        cycle: u32,
        timestamp: u64,
        latest: RawSamplePair,
        heartrate: Option<f32>,
        spo2: Option<f32>,
        ambient: AmbientReadings,
    ) -> Self {
        Self {
            cycle,
            timestamp,
            vital_signs: VitalSigns {
                ppg: PpgReading { ir: latest.a, red: latest.b, heartrate, spo2 },
                temperature: ambient.temperature,
                humidity: ambient.humidity,
                force: ambient.force,
                accel: ambient.accel,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_masks_to_18_bits() {
        let record = [0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03];
        let pair = RawSamplePair::decode(&record);
        assert_eq!(pair.a, 0x03_FFFF);
        assert_eq!(pair.b, 0x01_0203);
    }

    #[test]
    fn blank_sample_detection() {
        assert!(RawSamplePair::decode(&[0xC0, 0, 0, 0xC0, 0, 0]).is_blank());
        assert!(!RawSamplePair::new(1, 0).is_blank());
    }

    #[test]
    fn data_point_wire_layout() {
        let point = VitalsDataPoint::new(
            7,
            1234,
            RawSamplePair::new(50_000, 48_000),
            Some(72.0),
            None,
            AmbientReadings {
                temperature: 36.5,
                humidity: 45.0,
                force: 0.0,
                accel: Acceleration { ax: 0.0, ay: 0.0, az: 1.0 },
            },
        );
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["cycle"], 7);
        assert_eq!(json["timestamp"], 1234);
        assert_eq!(json["vital_signs"]["ppg"]["ir"], 50_000);
        assert_eq!(json["vital_signs"]["ppg"]["red"], 48_000);
        assert_eq!(json["vital_signs"]["ppg"]["heartrate"], 72.0);
        assert!(json["vital_signs"]["ppg"]["spo2"].is_null());
        assert_eq!(json["vital_signs"]["temperature"], 36.5);
        assert_eq!(json["vital_signs"]["accel"]["az"], 1.0);
    }
}
