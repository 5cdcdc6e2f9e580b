//! Protocol globals the backend binds
//!
//! The compositor advertises its globals once at startup. [`GlobalCensus`]
//! records the ones this backend knows, decides whether the set is usable
//! (compositor and shell base are mandatory, the rest degrade gracefully) and
//! which version each will be bound at.
//!
//! Seat capabilities can change at runtime; [`CapabilityChange`] tells the
//! caller which device objects to create or release.

use crate::error::{GlpsError, Result};
use bitflags::bitflags;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalKind {
    Compositor,
    WmBase,
    DecorationManager,
    Seat,
    DataDeviceManager,
}

impl GlobalKind {
    pub const ALL: [GlobalKind; 5] = [
        GlobalKind::Compositor,
        GlobalKind::WmBase,
        GlobalKind::DecorationManager,
        GlobalKind::Seat,
        GlobalKind::DataDeviceManager,
    ];

    pub fn interface(self) -> &'static str {
        match self {
            GlobalKind::Compositor => "wl_compositor",
            GlobalKind::WmBase => "xdg_wm_base",
            GlobalKind::DecorationManager => "zxdg_decoration_manager_v1",
            GlobalKind::Seat => "wl_seat",
            GlobalKind::DataDeviceManager => "wl_data_device_manager",
        }
    }

    /// Versions this backend can speak.
    pub fn versions(self) -> RangeInclusive<u32> {
        match self {
            GlobalKind::Compositor => 1..=4,
            GlobalKind::WmBase => 1..=2,
            GlobalKind::DecorationManager => 1..=1,
            // axis_source, axis_stop and axis_discrete need 5
            GlobalKind::Seat => 5..=7,
            GlobalKind::DataDeviceManager => 1..=3,
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, GlobalKind::Compositor | GlobalKind::WmBase)
    }

    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.interface() == interface)
    }
}

/// Known globals advertised by the compositor, with their versions.
#[derive(Debug, Clone, Default)]
pub struct GlobalCensus {
    advertised: HashMap<GlobalKind, u32>,
}

impl GlobalCensus {
    /// Builds the census from `(interface, version)` pairs.
    pub fn from_globals<'a, I>(globals: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let mut advertised = HashMap::new();
        for (interface, version) in globals {
            if let Some(kind) = GlobalKind::from_interface(interface) {
                debug!("🔌 Compositor advertises {} v{}", interface, version);
                let entry = advertised.entry(kind).or_insert(version);
                *entry = (*entry).max(version);
            }
        }
        Self { advertised }
    }

    /// Advertised version, if it is one this backend can use.
    pub fn usable_version(&self, kind: GlobalKind) -> Option<u32> {
        let version = *self.advertised.get(&kind)?;
        let range = kind.versions();
        (version >= *range.start()).then(|| version.min(*range.end()))
    }

    pub fn has(&self, kind: GlobalKind) -> bool {
        self.usable_version(kind).is_some()
    }

    /// Fails on the first missing required global. Returns the optional
    /// globals that are absent, after logging a warning for each.
    pub fn check(&self) -> Result<Vec<GlobalKind>> {
        if let Some(kind) = GlobalKind::ALL
            .into_iter()
            .find(|kind| kind.is_required() && !self.has(*kind))
        {
            return Err(GlpsError::MissingGlobal(kind.interface()));
        }

        let missing: Vec<GlobalKind> = GlobalKind::ALL
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect();
        for kind in &missing {
            warn!(
                "⚠️ {} not available (need v{}+); continuing without it",
                kind.interface(),
                kind.versions().start()
            );
        }
        info!(
            "🔌 Globals ready: {} of {} bound",
            GlobalKind::ALL.len() - missing.len(),
            GlobalKind::ALL.len()
        );
        Ok(missing)
    }
}

bitflags! {
    /// Input devices a seat currently offers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

/// Devices to acquire and release after a capabilities event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityChange {
    pub added: SeatCapabilities,
    pub removed: SeatCapabilities,
}

impl CapabilityChange {
    pub fn between(old: SeatCapabilities, new: SeatCapabilities) -> Self {
        Self {
            added: new - old,
            removed: old - new,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: [(&str, u32); 6] = [
        ("wl_compositor", 6),
        ("wl_shm", 1),
        ("xdg_wm_base", 5),
        ("zxdg_decoration_manager_v1", 1),
        ("wl_seat", 9),
        ("wl_data_device_manager", 3),
    ];

    #[test]
    fn test_full_set_binds_everything() {
        let census = GlobalCensus::from_globals(FULL);
        assert!(census.check().unwrap().is_empty());
        assert_eq!(census.usable_version(GlobalKind::Compositor), Some(4));
        assert_eq!(census.usable_version(GlobalKind::Seat), Some(7));
        assert_eq!(census.usable_version(GlobalKind::DataDeviceManager), Some(3));
    }

    #[test]
    fn test_missing_compositor_is_fatal() {
        let census = GlobalCensus::from_globals(FULL.into_iter().filter(|(i, _)| *i != "wl_compositor"));
        let err = census.check().unwrap_err();
        assert!(matches!(err, GlpsError::MissingGlobal("wl_compositor")));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_missing_shell_is_fatal() {
        let census = GlobalCensus::from_globals([("wl_compositor", 4)]);
        assert!(matches!(
            census.check(),
            Err(GlpsError::MissingGlobal("xdg_wm_base"))
        ));
    }

    #[test]
    fn test_missing_decorations_degrade() {
        let census = GlobalCensus::from_globals([("wl_compositor", 4), ("xdg_wm_base", 1)]);
        let missing = census.check().unwrap();
        assert!(missing.contains(&GlobalKind::DecorationManager));
        assert!(missing.contains(&GlobalKind::Seat));
        assert!(!census.has(GlobalKind::DecorationManager));
    }

    #[test]
    fn test_old_seat_is_unusable() {
        let census = GlobalCensus::from_globals([("wl_seat", 4)]);
        assert_eq!(census.usable_version(GlobalKind::Seat), None);
    }

    #[test]
    fn test_capability_change() {
        let old = SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD;
        let new = SeatCapabilities::KEYBOARD | SeatCapabilities::TOUCH;
        let change = CapabilityChange::between(old, new);
        assert_eq!(change.added, SeatCapabilities::TOUCH);
        assert_eq!(change.removed, SeatCapabilities::POINTER);
        assert!(CapabilityChange::between(new, new).is_empty());
    }
}
