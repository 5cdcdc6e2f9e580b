//! Window registry
//!
//! Windows live in a fixed-capacity arena of slots. A [`WindowId`] is the slot
//! index plus the slot generation:
//! - fresh slots are handed out in creation order, so the first windows get
//!   ids 0, 1, 2, ...
//! - a destroyed slot is only reused once every fresh slot is taken, and its
//!   generation is bumped, so an id value is never handed out twice
//! - ids held by callers after destruction are rejected as stale
//!
//! The registry also maps native surfaces back to window ids, because
//! protocol events name surfaces, never application windows.

use crate::error::{GlpsError, Result};
use crate::frame::FrameTask;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default number of simultaneously open windows.
pub const DEFAULT_CAPACITY: usize = 100;

/// Longest window title kept, in bytes.
pub const MAX_TITLE_LEN: usize = 63;

/// Stable handle of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

impl WindowId {
    pub fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index. Equal to the creation order for windows that did not
    /// reuse a slot.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "{}", self.index)
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

/// Key attached to a `wl_surface` at creation, used for reverse lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey(pub u32);

/// Window creation input. The title is cut to [`MAX_TITLE_LEN`] bytes
/// wherever it enters the crate, literal construction included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowProperties {
    #[serde(deserialize_with = "deserialize_title")]
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl WindowProperties {
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: bounded_title(title.into()),
            width,
            height,
        }
    }

    /// Same properties with the title bound applied.
    pub fn bounded(self) -> Self {
        Self {
            title: bounded_title(self.title),
            ..self
        }
    }
}

impl Default for WindowProperties {
    fn default() -> Self {
        Self::new("GLPS Window", 640, 480)
    }
}

fn deserialize_title<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(bounded_title)
}

fn bounded_title(mut title: String) -> String {
    if title.len() > MAX_TITLE_LEN {
        let mut end = MAX_TITLE_LEN;
        while !title.is_char_boundary(end) {
            end -= 1;
        }
        title.truncate(end);
    }
    title
}

/// Everything known about one open window. `T` carries the native
/// protocol objects of the backend in use.
#[derive(Debug)]
pub struct WindowRecord<T> {
    pub id: WindowId,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub surface: SurfaceKey,
    pub native: T,
    /// Size announced by the toplevel, applied on the next surface configure.
    pub pending_size: Option<(u32, u32)>,
    pub frame: FrameTask,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(WindowRecord<T>),
    Vacant { generation: u32 },
}

#[derive(Debug)]
pub struct WindowRegistry<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    /// Vacant slots, oldest first.
    free: Vec<u32>,
    by_surface: HashMap<SurfaceKey, WindowId>,
    created: u64,
}

impl<T> WindowRegistry<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            free: Vec::new(),
            by_surface: HashMap::new(),
            created: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of windows ever created.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// Fails with `CapacityExceeded` when no slot can take another window.
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.slots.len() < self.capacity || !self.free.is_empty() {
            Ok(())
        } else {
            Err(GlpsError::CapacityExceeded {
                capacity: self.capacity,
            })
        }
    }

    /// Id the next `insert` will return.
    pub fn next_id(&self) -> Result<WindowId> {
        self.ensure_capacity()?;
        if self.slots.len() < self.capacity {
            return Ok(WindowId::from_raw_parts(self.slots.len() as u32, 0));
        }
        let index = self.free[0];
        match &self.slots[index as usize] {
            Slot::Vacant { generation } => Ok(WindowId::from_raw_parts(index, *generation)),
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        }
    }

    pub fn insert(
        &mut self,
        properties: &WindowProperties,
        surface: SurfaceKey,
        native: T,
    ) -> Result<WindowId> {
        let id = self.next_id()?;
        if id.index() < self.slots.len() {
            self.free.remove(0);
        }

        let record = WindowRecord {
            id,
            title: bounded_title(properties.title.clone()),
            width: properties.width,
            height: properties.height,
            surface,
            native,
            pending_size: None,
            frame: FrameTask::default(),
        };

        if id.index() == self.slots.len() {
            self.slots.push(Slot::Occupied(record));
        } else {
            self.slots[id.index()] = Slot::Occupied(record);
        }
        self.by_surface.insert(surface, id);
        self.created += 1;

        debug!("🪟 Registered window {} ({} live)", id, self.len());
        Ok(id)
    }

    /// Removes the window and hands its record back for teardown.
    pub fn remove(&mut self, id: WindowId) -> Result<WindowRecord<T>> {
        self.check(id)?;
        let slot = std::mem::replace(
            &mut self.slots[id.index()],
            Slot::Vacant {
                generation: id.generation.wrapping_add(1),
            },
        );
        let Slot::Occupied(record) = slot else {
            unreachable!("checked slot is occupied");
        };

        self.by_surface.remove(&record.surface);
        self.free.push(id.index);
        debug!("🗑️ Unregistered window {} ({} live)", id, self.len());
        Ok(record)
    }

    pub fn get(&self, id: WindowId) -> Result<&WindowRecord<T>> {
        self.check(id)?;
        match &self.slots[id.index()] {
            Slot::Occupied(record) => Ok(record),
            Slot::Vacant { .. } => Err(GlpsError::StaleWindow(id)),
        }
    }

    pub fn get_mut(&mut self, id: WindowId) -> Result<&mut WindowRecord<T>> {
        self.check(id)?;
        match &mut self.slots[id.index()] {
            Slot::Occupied(record) => Ok(record),
            Slot::Vacant { .. } => Err(GlpsError::StaleWindow(id)),
        }
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.check(id).is_ok()
    }

    /// Maps a native surface back to its window.
    pub fn resolve(&self, surface: SurfaceKey) -> Option<WindowId> {
        self.by_surface.get(&surface).copied()
    }

    /// Live window ids in slot order.
    pub fn ids(&self) -> Vec<WindowId> {
        self.iter().map(|record| record.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowRecord<T>> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(record) => Some(record),
            Slot::Vacant { .. } => None,
        })
    }

    /// Drains every live window, in slot order.
    pub fn drain(&mut self) -> Vec<WindowRecord<T>> {
        let ids = self.ids();
        ids.into_iter().filter_map(|id| self.remove(id).ok()).collect()
    }

    fn check(&self, id: WindowId) -> Result<()> {
        match self.slots.get(id.index()) {
            None => Err(GlpsError::UnknownWindow(id)),
            Some(Slot::Occupied(record)) if record.id == id => Ok(()),
            Some(_) => Err(GlpsError::StaleWindow(id)),
        }
    }
}
