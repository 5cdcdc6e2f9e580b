//! Clipboard and drag-and-drop bookkeeping
//!
//! Tracks the data offers announced by the compositor, which one is the
//! current drag or selection, and the last payload received. The payload is
//! a single mime type plus a bounded byte buffer; a new transfer overwrites it.
//!
//! Offer handles are generic so the bookkeeping can be exercised without a
//! live connection.

use crate::window::WindowId;
use log::{debug, trace};
use std::collections::HashMap;

/// Maximum payload kept from one transfer.
pub const PAYLOAD_CAPACITY: usize = 1024;

/// Maximum length of a stored mime type.
pub const MIME_CAPACITY: usize = 63;

/// Common MIME types for clipboard
pub mod mime_types {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=utf-8";
    pub const TEXT_URI_LIST: &str = "text/uri-list";
}

/// Data received from (or published to) another client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl TransferPayload {
    /// Builds a payload, truncating both fields to their capacity.
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let mut mime_type = mime_type.into();
        if mime_type.len() > MIME_CAPACITY {
            let mut end = MIME_CAPACITY;
            while !mime_type.is_char_boundary(end) {
                end -= 1;
            }
            mime_type.truncate(end);
        }
        let mut data = data.into();
        data.truncate(PAYLOAD_CAPACITY);
        Self { mime_type, data }
    }

    /// Payload as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

#[derive(Debug)]
struct Offer<O> {
    handle: O,
    mime_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DragSession {
    window: Option<WindowId>,
    offer: Option<u32>,
}

/// A drop ready to be read: the offer to receive from and the mime type to ask for.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingDrop<O> {
    pub window: Option<WindowId>,
    pub offer: O,
    pub mime_type: String,
}

#[derive(Debug)]
pub struct DataTransfer<O> {
    preferred: Vec<String>,
    offers: HashMap<u32, Offer<O>>,
    drag: Option<DragSession>,
    selection: Option<u32>,
    clipboard: Option<TransferPayload>,
}

impl<O> DataTransfer<O> {
    pub fn new(preferred: Vec<String>) -> Self {
        Self {
            preferred,
            offers: HashMap::new(),
            drag: None,
            selection: None,
            clipboard: None,
        }
    }

    /// A new `wl_data_offer` was announced.
    pub fn introduce(&mut self, key: u32, handle: O) {
        trace!("📦 New data offer {}", key);
        self.offers.insert(
            key,
            Offer {
                handle,
                mime_types: Vec::new(),
            },
        );
    }

    pub fn add_mime(&mut self, key: u32, mime_type: String) {
        if let Some(offer) = self.offers.get_mut(&key) {
            trace!("📦 Offer {} provides {}", key, mime_type);
            offer.mime_types.push(mime_type);
        }
    }

    pub fn offer(&self, key: u32) -> Option<&O> {
        self.offers.get(&key).map(|offer| &offer.handle)
    }

    pub fn offered_mime_types(&self, key: u32) -> &[String] {
        self.offers
            .get(&key)
            .map(|offer| offer.mime_types.as_slice())
            .unwrap_or(&[])
    }

    /// Picks the best mime type of an offer: the first preferred one it
    /// provides, otherwise the first it announced.
    pub fn choose_mime(&self, key: u32) -> Option<String> {
        let offered = self.offered_mime_types(key);
        self.preferred
            .iter()
            .find(|wanted| offered.contains(wanted))
            .or_else(|| offered.first())
            .cloned()
    }

    /// Drag entered a window. Returns the mime type to accept, and the
    /// handles of offers nothing refers to anymore.
    pub fn start_drag(&mut self, window: Option<WindowId>, key: Option<u32>) -> (Option<String>, Vec<O>) {
        self.drag = Some(DragSession { window, offer: key });
        let mime = key.and_then(|key| self.choose_mime(key));
        debug!("🖱️ Drag entered window {:?} offering {:?}", window, mime);
        (mime, self.prune())
    }

    /// Drag left without dropping.
    pub fn end_drag(&mut self) -> Vec<O> {
        self.drag = None;
        self.prune()
    }

    pub fn drag_window(&self) -> Option<WindowId> {
        self.drag.and_then(|drag| drag.window)
    }

    /// Drop happened: hands out the drag offer so it can be read and finished.
    pub fn take_drop(&mut self) -> Option<PendingDrop<O>> {
        let drag = self.drag.take()?;
        let key = drag.offer?;
        let mime_type = self.choose_mime(key)?;
        if self.selection == Some(key) {
            // never hand out the selection offer itself
            return None;
        }
        let offer = self.offers.remove(&key)?;
        Some(PendingDrop {
            window: drag.window,
            offer: offer.handle,
            mime_type,
        })
    }

    /// New selection announced. Returns the handles of offers nothing refers
    /// to anymore.
    pub fn set_selection(&mut self, key: Option<u32>) -> Vec<O> {
        self.selection = key;
        self.prune()
    }

    /// Current selection offer and the mime type to read it with.
    pub fn selection(&self) -> Option<(&O, String)> {
        let key = self.selection?;
        let mime = self.choose_mime(key)?;
        self.offer(key).map(|handle| (handle, mime))
    }

    pub fn store_clipboard(&mut self, payload: TransferPayload) {
        debug!(
            "📋 Clipboard now holds {} bytes of {}",
            payload.data.len(),
            payload.mime_type
        );
        self.clipboard = Some(payload);
    }

    pub fn clipboard(&self) -> Option<&TransferPayload> {
        self.clipboard.as_ref()
    }

    /// Removes offers that are neither the drag nor the selection offer.
    fn prune(&mut self) -> Vec<O> {
        let keep_drag = self.drag.and_then(|drag| drag.offer);
        let keep_selection = self.selection;
        let stale: Vec<u32> = self
            .offers
            .keys()
            .copied()
            .filter(|key| Some(*key) != keep_drag && Some(*key) != keep_selection)
            .collect();

        stale
            .into_iter()
            .filter_map(|key| self.offers.remove(&key))
            .map(|offer| offer.handle)
            .collect()
    }

    /// Drops every tracked offer, returning the handles for destruction.
    pub fn clear(&mut self) -> Vec<O> {
        self.drag = None;
        self.selection = None;
        self.offers.drain().map(|(_, offer)| offer.handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> DataTransfer<&'static str> {
        DataTransfer::new(vec![
            mime_types::TEXT_PLAIN_UTF8.to_string(),
            mime_types::TEXT_PLAIN.to_string(),
        ])
    }

    #[test]
    fn test_payload_is_bounded() {
        let payload = TransferPayload::new("x".repeat(100), vec![7u8; 4096]);
        assert_eq!(payload.mime_type.len(), MIME_CAPACITY);
        assert_eq!(payload.data.len(), PAYLOAD_CAPACITY);
    }

    #[test]
    fn test_preferred_mime_wins() {
        let mut t = transfer();
        t.introduce(1, "offer-1");
        t.add_mime(1, "image/png".to_string());
        t.add_mime(1, mime_types::TEXT_PLAIN.to_string());
        assert_eq!(t.choose_mime(1).as_deref(), Some(mime_types::TEXT_PLAIN));

        t.introduce(2, "offer-2");
        t.add_mime(2, "image/png".to_string());
        assert_eq!(t.choose_mime(2).as_deref(), Some("image/png"));
    }

    #[test]
    fn test_drop_hands_out_drag_offer() {
        let mut t = transfer();
        let window = WindowId::from_raw_parts(2, 0);
        t.introduce(5, "dnd");
        t.add_mime(5, mime_types::TEXT_URI_LIST.to_string());

        let (mime, stale) = t.start_drag(Some(window), Some(5));
        assert_eq!(mime.as_deref(), Some(mime_types::TEXT_URI_LIST));
        assert!(stale.is_empty());
        assert_eq!(t.drag_window(), Some(window));

        let drop = t.take_drop().unwrap();
        assert_eq!(drop.window, Some(window));
        assert_eq!(drop.offer, "dnd");
        assert!(t.offer(5).is_none());
        assert!(t.take_drop().is_none());
    }

    #[test]
    fn test_new_selection_prunes_old_offers() {
        let mut t = transfer();
        t.introduce(1, "old");
        t.add_mime(1, mime_types::TEXT_PLAIN.to_string());
        assert!(t.set_selection(Some(1)).is_empty());

        t.introduce(2, "new");
        t.add_mime(2, mime_types::TEXT_PLAIN_UTF8.to_string());
        let stale = t.set_selection(Some(2));
        assert_eq!(stale, vec!["old"]);

        let (handle, mime) = t.selection().unwrap();
        assert_eq!(*handle, "new");
        assert_eq!(mime, mime_types::TEXT_PLAIN_UTF8);
    }

    #[test]
    fn test_leave_releases_drag_offer() {
        let mut t = transfer();
        t.introduce(9, "dnd");
        t.start_drag(None, Some(9));
        assert_eq!(t.end_drag(), vec!["dnd"]);
        assert!(t.take_drop().is_none());
    }

    #[test]
    fn test_clipboard_overwritten() {
        let mut t = transfer();
        t.store_clipboard(TransferPayload::new("text/plain", b"first".to_vec()));
        t.store_clipboard(TransferPayload::new("text/plain", b"second".to_vec()));
        assert_eq!(t.clipboard().and_then(|p| p.as_text()), Some("second"));
    }
}
