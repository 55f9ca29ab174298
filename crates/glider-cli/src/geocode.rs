use glider_core::error::Result;
use glider_core::pipeline::BasinGeocoder;

/// Stand-in for the external geocoding service: labels every mission with
/// one configured basin. Real deployments swap in a service-backed
/// implementation of the same trait.
pub struct FixedBasinGeocoder {
    pub label: String,
}

impl BasinGeocoder for FixedBasinGeocoder {
    fn basin(&self, _longitude: &[f64], _latitude: &[f64]) -> Result<String> {
        Ok(self.label.clone())
    }
}
