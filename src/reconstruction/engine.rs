//! The narrow interface to a 3D reconstruction engine.

use anyhow::Result;
use std::path::Path;

use super::native::NativeEngine;
use super::simulated::SimulatedEngine;

/// Session lifecycle of an external reconstruction engine.
///
/// The engine reads still images from a directory and writes `out.usdz` and
/// `model/out.obj` next to them. Callers only start, poll and stop it.
pub trait ReconstructionEngine: Send {
    /// Begin a session over the images in `images`. Returns immediately.
    fn start(&mut self, images: &Path) -> Result<()>;

    fn is_completed(&self) -> bool;

    /// Fraction complete. Engines are not trusted to stay within 0..=1.
    fn progress(&self) -> f64;

    /// Estimated seconds remaining, negative when unknown.
    fn eta(&self) -> f64;

    /// Ask the running session to cancel.
    fn stop(&mut self);

    fn describe(&self) -> String;
}

/// Open the engine named by `location`: `stub://...` for the simulated
/// engine, otherwise a path to the native shared library.
pub fn open_engine(location: &str) -> Result<Box<dyn ReconstructionEngine>> {
    if location.starts_with("stub://") {
        return Ok(Box::new(SimulatedEngine::from_url(location)?));
    }
    Ok(Box::new(NativeEngine::load(Path::new(location))?))
}

/// Clamp a reported progress fraction to `[0, 1]`. NaN reads as no progress.
pub fn normalize_progress(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// `None` when the engine has no estimate.
pub fn normalize_eta(raw: f64) -> Option<f64> {
    if raw.is_finite() && raw >= 0.0 {
        Some(raw)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped() {
        assert_eq!(normalize_progress(-0.5), 0.0);
        assert_eq!(normalize_progress(0.25), 0.25);
        assert_eq!(normalize_progress(7.0), 1.0);
        assert_eq!(normalize_progress(f64::NAN), 0.0);
        assert_eq!(normalize_progress(f64::INFINITY), 1.0);
    }

    #[test]
    fn negative_eta_is_unknown() {
        assert_eq!(normalize_eta(-1.0), None);
        assert_eq!(normalize_eta(f64::NAN), None);
        assert_eq!(normalize_eta(12.5), Some(12.5));
    }

    #[test]
    fn stub_location_opens_simulated_engine() -> Result<()> {
        let engine = open_engine("stub://engine")?;
        assert!(engine.describe().contains("simulated"));
        assert!(open_engine("/nonexistent/libpgm.so").is_err());
        Ok(())
    }
}
