// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use capture::{CaptureHandle, CapturedPacket, TransientCaptureError};
use config::{Mode, normalize_executable_path};
use flowtrack::FlowTableReader;
use nat::{NatKey, NatTable};
use net::{IfIndex, Port};
use portresolve::{Pid, PortResolver};

use crate::policy::PolicyReader;

/// The immutable-for-this-run pieces of engine config the outbound decision needs, beyond the
/// atomically-swapped mode and toggled set.
pub struct OutboundConfig {
    pub vpn_ip: Ipv4Addr,
    pub default_ip: Ipv4Addr,
    pub vpn_if_index: Option<IfIndex>,
    pub default_if_index: Option<IfIndex>,
}

/// Component C4: blocking-reads outbound packets, attributes and rewrites toggled flows, and
/// passes everything else through unchanged.
pub fn run(
    capture: Arc<dyn CaptureHandle>,
    config: OutboundConfig,
    flow_reader: FlowTableReader,
    port_resolver: Arc<dyn PortResolver>,
    nat: Arc<NatTable>,
    policy: PolicyReader,
    stop: Arc<AtomicBool>,
) {
    loop {
        match capture.recv() {
            Ok(mut packet) => {
                process(
                    &mut packet,
                    &config,
                    &flow_reader,
                    port_resolver.as_ref(),
                    &portresolve::resolve_executable_path,
                    &nat,
                    &policy,
                );
                if let Err(err) = capture.send(packet) {
                    tracing::debug!(%err, "outbound re-injection failed");
                }
            }
            Err(TransientCaptureError::Closed) => return,
            Err(err) => {
                tracing::debug!(%err, "outbound recv failed");
                if stop.load(Ordering::Acquire) {
                    return;
                }
            }
        }
    }
}

/// The per-packet decision (§4.4). `resolve_exe` is injected so tests can fake the C1-fallback
/// PID→executable resolution without touching the real OS.
fn process(
    packet: &mut CapturedPacket,
    config: &OutboundConfig,
    flow_reader: &FlowTableReader,
    port_resolver: &dyn PortResolver,
    resolve_exe: &dyn Fn(Pid) -> Option<String>,
    nat: &NatTable,
    policy: &PolicyReader,
) {
    let Some(snapshot) = policy.enter() else { return };

    let Ok(view) = packet.ipv4() else { return };
    if view.protocol().is_none() {
        return;
    }
    let src_ip = view.source();
    let dst_ip = view.destination();
    let (Some(src_port_raw), Some(dst_port_raw)) = (view.source_port(), view.destination_port())
    else {
        return;
    };
    drop(view);

    // Step 1: fast-path shortcut. The VPN client's own encapsulated traffic must never be
    // redirected, so this check precedes any flow lookup.
    match snapshot.mode() {
        Mode::VpnDefault if src_ip == config.default_ip => return,
        Mode::DirectDefault if src_ip == config.vpn_ip => return,
        _ => {}
    }

    let (Ok(src_port), Ok(dst_port)) = (Port::new(src_port_raw), Port::new(dst_port_raw)) else {
        return;
    };

    // Step 2: attribute.
    let exe = flow_reader
        .enter()
        .and_then(|tables| {
            tables.lookup_endpoint(src_ip, src_port).or_else(|| tables.lookup_port(src_port))
        })
        .or_else(|| {
            let pid = port_resolver.resolve(src_port)?;
            let raw = resolve_exe(pid)?;
            Some(Arc::from(normalize_executable_path(&raw)))
        });

    // Step 3: policy gate.
    let Some(exe) = exe else { return };
    if !snapshot.is_toggled(&exe) {
        return;
    }

    // Step 4: rewrite targets.
    let (new_src_ip, target_if) = match snapshot.mode() {
        Mode::VpnDefault => (config.default_ip, config.default_if_index),
        Mode::DirectDefault => (config.vpn_ip, config.vpn_if_index),
    };

    // Step 5: insert the NAT entry before re-injection, so an immediate reply can be matched.
    nat.insert(
        NatKey::new(dst_ip, dst_port, src_port),
        src_ip,
        Some(IfIndex::new(packet.if_index())),
        packet.bytes().len() as u64,
    );

    // Step 6: mutate in place. `set_source` keeps the IPv4/TCP/UDP checksums consistent via
    // RFC 1624 incremental update.
    if let Ok(mut view) = packet.ipv4() {
        view.set_source(new_src_ip);
    }
    if let Some(if_index) = target_if {
        packet.set_interface(if_index.as_u32(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrack::FlowTableWriter;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    struct FakeResolver(Option<Pid>);
    impl PortResolver for FakeResolver {
        fn resolve(&self, _port: Port) -> Option<Pid> {
            self.0
        }
    }

    fn build_udp_packet(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut pkt = vec![0u8; 28];
        pkt[0] = 0x45;
        pkt[2..4].copy_from_slice(&28u16.to_be_bytes());
        pkt[9] = 17; // UDP
        pkt[12..16].copy_from_slice(&src.octets());
        pkt[16..20].copy_from_slice(&dst.octets());
        pkt[20..22].copy_from_slice(&src_port.to_be_bytes());
        pkt[22..24].copy_from_slice(&dst_port.to_be_bytes());
        pkt
    }

    fn cfg() -> OutboundConfig {
        OutboundConfig {
            vpn_ip: Ipv4Addr::new(10, 0, 0, 5),
            default_ip: Ipv4Addr::new(192, 168, 1, 20),
            vpn_if_index: Some(IfIndex::new(3)),
            default_if_index: Some(IfIndex::new(7)),
        }
    }

    #[test]
    fn untoggled_flow_passes_unchanged() {
        let config = cfg();
        let (_writer, flow_reader) = FlowTableWriter::new();
        let nat = NatTable::new();
        let (_pw, policy) = crate::policy::PolicyWriter::new(Mode::VpnDefault, HashSet::new());
        let resolver = FakeResolver(None);

        let bytes = build_udp_packet(config.vpn_ip, Ipv4Addr::new(8, 8, 8, 8), 44000, 53);
        let mut packet = CapturedPacket::new(bytes.clone(), 3, true);
        process(&mut packet, &config, &flow_reader, &resolver, &|_| None, &nat, &policy);

        assert_eq!(packet.bytes(), &bytes[..]);
        assert_eq!(nat.len(), 0);
    }

    #[test]
    fn vpn_default_fast_path_skips_own_default_ip_traffic() {
        let config = cfg();
        let (_writer, flow_reader) = FlowTableWriter::new();
        let nat = NatTable::new();
        let (_pw, policy) = crate::policy::PolicyWriter::new(Mode::VpnDefault, HashSet::new());
        let resolver = FakeResolver(Some(Pid::new(4)));

        let bytes = build_udp_packet(config.default_ip, Ipv4Addr::new(8, 8, 8, 8), 44000, 53);
        let mut packet = CapturedPacket::new(bytes.clone(), 7, true);
        process(
            &mut packet,
            &config,
            &flow_reader,
            &resolver,
            &|_| Some("C:\\app\\toggled.exe".to_string()),
            &nat,
            &policy,
        );

        assert_eq!(packet.bytes(), &bytes[..]);
        assert_eq!(nat.len(), 0);
    }

    #[test]
    fn toggled_flow_resolved_via_c1_fallback_is_rewritten_and_nat_inserted_first() {
        let config = cfg();
        let mut toggled = HashSet::new();
        toggled.insert(Arc::from("C:\\APP\\BROWSER.EXE"));
        let (_pw, policy) = crate::policy::PolicyWriter::new(Mode::VpnDefault, toggled);

        let (_writer, flow_reader) = FlowTableWriter::new();
        let nat = NatTable::new();
        let resolver = FakeResolver(Some(Pid::new(99)));

        let bytes = build_udp_packet(config.vpn_ip, Ipv4Addr::new(8, 8, 8, 8), 44000, 53);
        let mut packet = CapturedPacket::new(bytes, 3, true);
        process(
            &mut packet,
            &config,
            &flow_reader,
            &resolver,
            &|_| Some("c:\\app\\browser.exe".to_string()),
            &nat,
            &policy,
        );

        assert_eq!(packet.ipv4().unwrap().source(), config.default_ip);
        assert_eq!(packet.if_index(), config.default_if_index.unwrap().as_u32());
        assert_eq!(nat.len(), 1);
    }

    #[test]
    fn run_rewrites_a_queued_packet_and_exits_when_the_handle_closes() {
        use capture::FakeCaptureHandle;
        use std::time::Duration;

        let config = cfg();
        let mut toggled = HashSet::new();
        toggled.insert(Arc::from("C:\\APP\\BROWSER.EXE"));
        let (_pw, policy) = crate::policy::PolicyWriter::new(Mode::VpnDefault, toggled);
        let (_writer, flow_reader) = FlowTableWriter::new();
        let nat = Arc::new(NatTable::new());
        let resolver: Arc<dyn PortResolver> = Arc::new(FakeResolver(Some(Pid::new(99))));
        let stop = Arc::new(AtomicBool::new(false));

        let fake = Arc::new(FakeCaptureHandle::new());
        let capture: Arc<dyn CaptureHandle> = Arc::clone(&fake);

        let bytes = build_udp_packet(config.vpn_ip, Ipv4Addr::new(8, 8, 8, 8), 44000, 53);
        fake.push(CapturedPacket::new(bytes, 3, true));

        let worker = std::thread::spawn(move || {
            run(capture, config, flow_reader, resolver, nat, policy, stop)
        });

        // Give the worker a moment to drain the queued packet before closing the handle; the
        // real driver's `recv` would block indefinitely on an empty queue the same way.
        std::thread::sleep(Duration::from_millis(50));
        fake.close();
        worker.join().expect("outbound worker thread panicked");

        let sent = fake.take_sent();
        assert_eq!(sent.len(), 1);
        let mut sent_packet = sent.into_iter().next().unwrap();
        assert_eq!(sent_packet.ipv4().unwrap().source(), Ipv4Addr::new(192, 168, 1, 20));
    }
}
