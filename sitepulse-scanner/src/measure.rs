use crate::error::Result;
use crate::result::{Device, MeasurementResult};
use async_trait::async_trait;

/// Capability to measure one page under one device profile.
///
/// Implementations report metrics they could not obtain as absent values;
/// an `Err` means the page could not be measured at all.
#[async_trait]
pub trait PageMeasurer: Send + Sync {
    async fn measure(&self, url: &str, device: Device) -> Result<MeasurementResult>;
}

/// Round to two decimals, the precision reports display.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(2.996), 3.0);
        assert_eq!(round2(0.0), 0.0);
    }
}
