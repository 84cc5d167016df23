//! Platforms without descriptor inheritance: every listener is bound fresh and
//! upgrades are refused.

use std::io;
use std::path::Path;

use crate::error::{ReloadError, UpgradeError};
use crate::reloader::handoff::Handoff;
use crate::reloader::registry::Snapshot;

#[derive(Debug)]
pub(super) enum ParentLink {}

impl ParentLink {
    pub(super) fn notify(&self) -> io::Result<()> {
        match *self {}
    }

    pub(super) async fn closed(&self) -> io::Result<()> {
        match *self {}
    }
}

pub(super) fn inherit(_handoff: &Handoff) -> Result<(Vec<Snapshot>, ParentLink), ReloadError> {
    Err(ReloadError::Handoff {
        reason: "listener handoff is not supported on this platform".into(),
    })
}

#[derive(Debug)]
pub(super) enum Successor {}

impl Successor {
    pub(super) fn spawn(
        _sockets: &[Snapshot],
        _generation: u64,
        _executable: Option<&Path>,
    ) -> Result<Self, UpgradeError> {
        Err(UpgradeError::Unsupported)
    }

    pub(super) fn pid(&self) -> Option<u32> {
        match *self {}
    }

    pub(super) async fn ready(&mut self) -> Result<(), UpgradeError> {
        match *self {}
    }

    pub(super) fn abandon(self) {
        match self {}
    }
}
