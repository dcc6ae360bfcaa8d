//! Native engine loaded from a shared library at runtime.
//!
//! The library exports five C entry points:
//!
//! ```text
//! void   run_photogrammetry_session(const char *images);
//! bool   is_completed(void);
//! double get_progress(void);
//! double get_eta(void);
//! void   stop_photogrammetry_session(void);
//! ```

use anyhow::{anyhow, Context, Result};
use libloading::Library;
use std::ffi::{c_char, CString};
use std::path::{Path, PathBuf};

use super::engine::ReconstructionEngine;

type RunSession = unsafe extern "C" fn(*const c_char);
type IsCompleted = unsafe extern "C" fn() -> bool;
type GetF64 = unsafe extern "C" fn() -> f64;
type StopSession = unsafe extern "C" fn();

pub struct NativeEngine {
    path: PathBuf,
    run_session: RunSession,
    is_completed: IsCompleted,
    get_progress: GetF64,
    get_eta: GetF64,
    stop_session: StopSession,
    // Keeps the function pointers above valid. Declared last so it drops last.
    _library: Library,
}

impl NativeEngine {
    pub fn load(path: &Path) -> Result<Self> {
        let library = unsafe { Library::new(path) }
            .with_context(|| format!("load reconstruction engine {}", path.display()))?;

        // SAFETY: the signatures match the engine's exported C ABI.
        let engine = unsafe {
            Self {
                path: path.to_path_buf(),
                run_session: symbol(&library, b"run_photogrammetry_session\0")?,
                is_completed: symbol(&library, b"is_completed\0")?,
                get_progress: symbol(&library, b"get_progress\0")?,
                get_eta: symbol(&library, b"get_eta\0")?,
                stop_session: symbol(&library, b"stop_photogrammetry_session\0")?,
                _library: library,
            }
        };
        log::info!("reconstruction engine loaded from {}", path.display());
        Ok(engine)
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    let symbol = library.get::<T>(name).map_err(|e| {
        anyhow!(
            "engine symbol {} missing: {}",
            String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]),
            e
        )
    })?;
    Ok(*symbol)
}

impl ReconstructionEngine for NativeEngine {
    fn start(&mut self, images: &Path) -> Result<()> {
        let images = images
            .to_str()
            .ok_or_else(|| anyhow!("image directory {} is not UTF-8", images.display()))?;
        let images = CString::new(images).context("image directory contains a NUL byte")?;
        unsafe { (self.run_session)(images.as_ptr()) };
        Ok(())
    }

    fn is_completed(&self) -> bool {
        unsafe { (self.is_completed)() }
    }

    fn progress(&self) -> f64 {
        unsafe { (self.get_progress)() }
    }

    fn eta(&self) -> f64 {
        unsafe { (self.get_eta)() }
    }

    fn stop(&mut self) {
        unsafe { (self.stop_session)() }
    }

    fn describe(&self) -> String {
        format!("native engine {}", self.path.display())
    }
}
