use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::JoinHandle;

use mmio_stub::peer::PeerClient;
use mmio_stub::{
    AccessWidth, AddressSpace, ControlMessage, GuestMemory, IrqLine, MmioManager, MmioStub,
    Operation, StubBuilder, StubConfig, read_message, write_payload, write_status,
};

const WINDOW_BASE: u64 = 0x0900_0000;

/// A peer whose registers are the guest's own backing store: every forwarded
/// access lands at the same offset in `memory`.
fn spawn_mirror_peer(mut link: UnixStream, memory: GuestMemory) -> JoinHandle<usize> {
    std::thread::spawn(move || {
        let mut served = 0;
        while let Ok(msg) = read_message(&mut link) {
            match msg.op {
                Operation::Write => {
                    let width = msg.width().unwrap();
                    let ok = memory
                        .write(msg.address, &msg.value.to_le_bytes()[..width.bytes()])
                        .is_ok();
                    write_status(&mut link, ok).unwrap();
                }
                Operation::Read => {
                    let width = msg.width().unwrap();
                    let mut buf = [0u8; 8];
                    let _ = memory.read(msg.address, &mut buf[..width.bytes()]);
                    write_payload(&mut link, width, u64::from_le_bytes(buf)).unwrap();
                }
                _ => {}
            }
            served += 1;
        }
        served
    })
}

struct Rig {
    bus: MmioManager,
    memory: GuestMemory,
    irq: Arc<IrqLine>,
    reverse_peer: UnixStream,
    forward_peer: JoinHandle<usize>,
}

fn rig() -> Rig {
    let memory = GuestMemory::with_segment(0, 0x100).unwrap();
    let irq = Arc::new(IrqLine::default());
    let (forward, forward_remote) = UnixStream::pair().unwrap();
    let (reverse, reverse_peer) = UnixStream::pair().unwrap();

    let forward_peer = spawn_mirror_peer(forward_remote, memory.clone());
    let stub: MmioStub<UnixStream> =
        StubBuilder::new(StubConfig::default(), memory.clone(), irq.clone())
            .forward_link(forward)
            .reverse_link(reverse)
            .build()
            .unwrap();

    let mut bus = MmioManager::default();
    bus.register_device(WINDOW_BASE, Box::new(stub)).unwrap();

    Rig {
        bus,
        memory,
        irq,
        reverse_peer,
        forward_peer,
    }
}

#[test]
fn window_write_then_peer_read_back() {
    let mut rig = rig();

    rig.bus
        .handle_write(WINDOW_BASE + 0x10, 4, 0xdeadbeef)
        .unwrap();

    let mut backing = [0u8; 4];
    rig.memory.read(0x10, &mut backing).unwrap();
    assert_eq!(u32::from_le_bytes(backing), 0xdeadbeef);

    rig.reverse_peer
        .write_all(&ControlMessage::read(0x10, AccessWidth::Word).encode())
        .unwrap();
    let mut reply = [0u8; 4];
    rig.reverse_peer.read_exact(&mut reply).unwrap();
    assert_eq!(reply, [0xef, 0xbe, 0xad, 0xde]);

    assert_eq!(rig.bus.handle_read(WINDOW_BASE + 0x10, 2).unwrap(), 0xbeef);

    drop(rig.bus);
    // HELLO, WRITE, READ
    assert_eq!(rig.forward_peer.join().unwrap(), 3);
}

#[test]
fn peer_requests_reach_memory_and_irq() {
    let rig = rig();
    let mut client = PeerClient::new(rig.reverse_peer);

    assert!(client.write(0x40, AccessWidth::Double, 0x0123_4567_89ab_cdef).unwrap());
    assert_eq!(client.read(0x44, AccessWidth::Word).unwrap(), 0x0123_4567);
    assert!(!client.write(0x100, AccessWidth::Byte, 1).unwrap());
    assert_eq!(client.read(0x1000, AccessWidth::Half).unwrap(), 0);

    client.nop().unwrap();
    client.raise_irq().unwrap();
    // Replies are ordered: once this read answers, the IRQ has been handled.
    client.read(0, AccessWidth::Byte).unwrap();
    assert!(rig.irq.is_asserted());
    assert_eq!(rig.irq.assertions(), 1);
}

#[test]
fn forward_and_reverse_writes_do_not_interfere() {
    const X: u64 = 0x20;
    const Y: u64 = 0x80;
    const ROUNDS: u64 = 200;

    let mut rig = rig();
    let mut client = PeerClient::new(rig.reverse_peer);

    let reverse = std::thread::spawn(move || {
        for i in 0..ROUNDS {
            assert!(client.write(Y, AccessWidth::Double, 0xb000 + i).unwrap());
        }
        client
    });

    for i in 0..ROUNDS {
        rig.bus
            .handle_write(WINDOW_BASE + X, 8, 0xa000 + i)
            .unwrap();
    }
    let _client = reverse.join().unwrap();

    let mut x = [0u8; 8];
    let mut y = [0u8; 8];
    rig.memory.read(X, &mut x).unwrap();
    rig.memory.read(Y, &mut y).unwrap();
    assert_eq!(u64::from_le_bytes(x), 0xa000 + ROUNDS - 1);
    assert_eq!(u64::from_le_bytes(y), 0xb000 + ROUNDS - 1);
}
