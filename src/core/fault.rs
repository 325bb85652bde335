//! Purpose: Decide what happens when one node cannot be read while descending.
//! Exports: `FaultMode`, `FaultHandler`, `Propagate`, `Suppress`.
//! Role: Strategy consulted by the serializer for incidental per-node failures.
//! Invariants: One handler is chosen per top-level request and never changes mid-traversal.
//! Invariants: Addressed failures (missing path, bad conversion, read-only) bypass the handler.
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::path::Path;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    #[default]
    Propagate,
    Suppress,
}

impl FaultMode {
    pub fn handler(self) -> &'static dyn FaultHandler {
        match self {
            Self::Propagate => &Propagate,
            Self::Suppress => &Suppress,
        }
    }
}

pub trait FaultHandler: Send + Sync {
    /// `Ok(())` omits the node at `at`; `Err` aborts the call with the returned error.
    fn handle(&self, err: Error, at: &Path) -> Result<(), Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Propagate;

impl FaultHandler for Propagate {
    fn handle(&self, err: Error, at: &Path) -> Result<(), Error> {
        Err(err.or_path(at))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Suppress;

impl FaultHandler for Suppress {
    fn handle(&self, err: Error, at: &Path) -> Result<(), Error> {
        tracing::debug!(path = %at, error = %err, "suppressed value fault");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FaultMode;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::path::Path;

    #[test]
    fn propagate_annotates_path() {
        let at = Path::parse("a.b").expect("path");
        let err = FaultMode::Propagate
            .handler()
            .handle(Error::new(ErrorKind::Access), &at)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert_eq!(err.path(), Some(&at));
    }

    #[test]
    fn suppress_swallows() {
        let at = Path::parse("x").expect("path");
        assert!(
            FaultMode::Suppress
                .handler()
                .handle(Error::new(ErrorKind::Access), &at)
                .is_ok()
        );
    }

    #[test]
    fn mode_deserializes_from_snake_case() {
        let mode: FaultMode = serde_json::from_str("\"suppress\"").expect("mode");
        assert_eq!(mode, FaultMode::Suppress);
        assert_eq!(FaultMode::default(), FaultMode::Propagate);
    }
}
