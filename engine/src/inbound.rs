// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use capture::{CaptureHandle, CapturedPacket, TransientCaptureError};
use nat::{NatKey, NatTable};
use net::Port;

/// Component C5: blocking-reads inbound packets, restores any rewritten destination address and
/// interface found in the NAT table, and re-injects.
pub fn run(capture: Arc<dyn CaptureHandle>, nat: Arc<NatTable>, stop: Arc<AtomicBool>) {
    loop {
        match capture.recv() {
            Ok(mut packet) => {
                process(&mut packet, &nat);
                if let Err(err) = capture.send(packet) {
                    tracing::debug!(%err, "inbound re-injection failed");
                }
            }
            Err(TransientCaptureError::Closed) => return,
            Err(err) => {
                tracing::debug!(%err, "inbound recv failed");
                if stop.load(Ordering::Acquire) {
                    return;
                }
            }
        }
    }
}

/// The per-packet decision (§4.5).
fn process(packet: &mut CapturedPacket, nat: &NatTable) {
    let Ok(view) = packet.ipv4() else { return };
    if view.protocol().is_none() {
        return;
    }
    let remote_ip = view.source();
    let dst_addr = view.destination();
    let (Some(remote_port_raw), Some(local_port_raw)) =
        (view.source_port(), view.destination_port())
    else {
        return;
    };
    drop(view);

    let (Ok(remote_port), Ok(local_port)) =
        (Port::new(remote_port_raw), Port::new(local_port_raw))
    else {
        return;
    };

    let key = NatKey::new(remote_ip, remote_port, local_port);
    let Some(entry) = nat.lookup(&key, packet.bytes().len() as u64) else { return };

    if dst_addr != entry.original_local_ip {
        if let Ok(mut view) = packet.ipv4() {
            view.set_destination(entry.original_local_ip);
        }
        if let Some(if_index) = entry.original_if_index {
            packet.set_interface(if_index.as_u32(), false);
        }
    }
}
