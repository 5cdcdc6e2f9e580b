//! Drag-and-drop and clipboard over `wl_data_device`
//!
//! Offers are tracked by [`DataTransfer`](crate::data_transfer::DataTransfer)
//! under their protocol id. Payloads travel through a pipe: the other client
//! writes, we read up to the payload capacity and drop the rest.

use super::state::WaylandState;
use crate::data_transfer::{TransferPayload, PAYLOAD_CAPACITY};
use crate::error::Result;
use log::{debug, info, warn};
use rustix::pipe::{pipe_with, PipeFlags};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use wayland_client::protocol::{
    wl_data_device::{self, WlDataDevice},
    wl_data_device_manager::DndAction,
    wl_data_offer::{self, WlDataOffer},
    wl_data_source::{self, WlDataSource},
};
use wayland_client::{event_created_child, Connection, Dispatch, Proxy, QueueHandle};

fn offer_key(offer: &WlDataOffer) -> u32 {
    offer.id().protocol_id()
}

fn destroy_offers(offers: Vec<WlDataOffer>) {
    for offer in offers {
        offer.destroy();
    }
}

/// Asks the offering client for the data and reads it back.
pub(crate) fn receive(offer: &WlDataOffer, mime_type: &str, conn: &Connection) -> Result<TransferPayload> {
    let (reader, writer) = pipe_with(PipeFlags::CLOEXEC).map_err(io::Error::from)?;
    offer.receive(mime_type.to_string(), writer.as_fd());
    drop(writer);
    conn.flush()?;

    let mut data = Vec::new();
    File::from(reader)
        .take(PAYLOAD_CAPACITY as u64)
        .read_to_end(&mut data)?;
    debug!("📦 Received {} bytes of {}", data.len(), mime_type);
    Ok(TransferPayload::new(mime_type, data))
}

impl WaylandState {
    fn handle_drop(&mut self, conn: &Connection) {
        let Some(pending) = self.transfer.take_drop() else {
            debug!("📦 Drop without a usable offer");
            return;
        };
        match receive(&pending.offer, &pending.mime_type, conn) {
            Ok(payload) => {
                if pending.offer.version() >= 3 {
                    pending.offer.finish();
                }
                if let Some(window) = pending.window {
                    info!("📦 Drop of {} bytes on window {}", payload.data.len(), window);
                    self.callbacks.emit_drop(window, &payload);
                }
                self.transfer.store_clipboard(payload);
            }
            Err(err) => warn!("⚠️ Reading dropped data failed: {}", err),
        }
        pending.offer.destroy();
    }
}

impl Dispatch<WlDataDevice, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _device: &WlDataDevice,
        event: wl_data_device::Event,
        _data: &(),
        conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_device::Event::DataOffer { id } => {
                state.transfer.introduce(offer_key(&id), id);
            }
            wl_data_device::Event::Enter {
                serial, surface, id, ..
            } => {
                let window = state.window_of(&surface);
                let key = id.as_ref().map(offer_key);
                let (mime, stale) = state.transfer.start_drag(window, key);
                destroy_offers(stale);

                if let Some(offer) = id {
                    offer.accept(serial, mime);
                    if offer.version() >= 3 {
                        offer.set_actions(DndAction::Copy, DndAction::Copy);
                    }
                }
            }
            wl_data_device::Event::Leave => {
                destroy_offers(state.transfer.end_drag());
            }
            wl_data_device::Event::Motion { .. } => {}
            wl_data_device::Event::Drop => state.handle_drop(conn),
            wl_data_device::Event::Selection { id } => {
                let stale = state.transfer.set_selection(id.as_ref().map(offer_key));
                destroy_offers(stale);
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, WlDataDevice, [
        wl_data_device::EVT_DATA_OFFER_OPCODE => (WlDataOffer, ()),
    ]);
}

impl Dispatch<WlDataOffer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        offer: &WlDataOffer,
        event: wl_data_offer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_data_offer::Event::Offer { mime_type } = event {
            state.transfer.add_mime(offer_key(offer), mime_type);
        }
    }
}

impl Dispatch<WlDataSource, ()> for WaylandState {
    fn event(
        state: &mut Self,
        source: &WlDataSource,
        event: wl_data_source::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_data_source::Event::Send { mime_type, fd } => {
                let Some(selection) = state.selection.as_ref().filter(|s| &s.source == source) else {
                    return;
                };
                debug!("📋 Serving {} bytes as {}", selection.payload.data.len(), mime_type);
                if let Err(err) = File::from(fd).write_all(&selection.payload.data) {
                    warn!("⚠️ Writing clipboard data failed: {}", err);
                }
            }
            wl_data_source::Event::Cancelled => {
                if state.selection.as_ref().is_some_and(|s| &s.source == source) {
                    debug!("📋 Our selection was replaced");
                    state.selection = None;
                }
                source.destroy();
            }
            _ => {}
        }
    }
}
