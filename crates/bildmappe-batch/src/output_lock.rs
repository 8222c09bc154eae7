// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output write lock — an in-process registry of destinations currently
// being assembled, so two concurrent batches cannot interleave writes to
// the same path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use bildmappe_core::error::{BildmappeError, Result};
use tracing::debug;

static ACTIVE_OUTPUTS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn active_outputs() -> &'static Mutex<HashSet<PathBuf>> {
    ACTIVE_OUTPUTS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on an output path, held for the duration of assembly.
///
/// Released when the guard is dropped.
pub struct OutputLock {
    path: PathBuf,
}

impl OutputLock {
    /// Claim `path`. Fails with an assembly error when another batch in
    /// this process is already writing to it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut active = active_outputs()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !active.insert(path.to_path_buf()) {
            return Err(BildmappeError::Assembly(format!(
                "another batch is already writing to {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "output path locked");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        let mut active = active_outputs()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.path);
        debug!(path = %self.path.display(), "output path released");
    }
}
