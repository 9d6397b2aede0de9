use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use mmio_stub::devices::scratch::ScratchDevice;
use mmio_stub::peer::{ForwardServer, PeerClient};
use mmio_stub::{MmioDevice, MmioError, MmioManager, ProxyError, ReadFailurePolicy};

/// Device-simulating peer for the MMIO stub.
///
/// Listens for the stub's two links, answers window accesses from a scratch
/// register bank, and raises the stub's IRQ whenever the doorbell is written.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Socket the stub's forward link connects to
    #[arg(long, env = "MMIO_PEER_FORWARD", default_value = "mmio-stub-chr.sock")]
    forward: PathBuf,

    /// Socket the stub's reverse link connects to
    #[arg(long, env = "MMIO_PEER_REVERSE", default_value = "mmio-stub-master-chr.sock")]
    reverse: PathBuf,

    /// Size of the simulated register window
    #[arg(long, env = "MMIO_PEER_WINDOW", default_value = "0x100", value_parser = parse_u64)]
    window_size: u64,

    /// Expect a status byte after every reverse READ payload
    #[arg(long)]
    trailing_read_status: bool,

    /// Print every window access
    #[arg(long)]
    trace: bool,
}

fn parse_u64(raw: &str) -> Result<u64, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{raw}': {e}"))
}

/// Prints each access the stub forwards before handing it on.
struct Traced {
    inner: Box<dyn MmioDevice>,
}

impl MmioDevice for Traced {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError> {
        let result = self.inner.read(offset, size);
        match &result {
            Ok(value) => println!(
                "{} {offset:#06x}/{size} -> {}",
                "R".bright_green().bold(),
                format!("{value:#x}").bright_yellow()
            ),
            Err(e) => println!("{} {offset:#06x}/{size}: {}", "R".bright_red().bold(), e),
        }
        result
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        let result = self.inner.write(offset, size, value);
        match &result {
            Ok(()) => println!(
                "{} {offset:#06x}/{size} <- {}",
                "W".bright_blue().bold(),
                format!("{value:#x}").bright_yellow()
            ),
            Err(e) => println!("{} {offset:#06x}/{size}: {}", "W".bright_red().bold(), e),
        }
        result
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn get_size(&self) -> u64 {
        self.inner.get_size()
    }
}

fn bind(path: &Path) -> Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("removed stale socket {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
    }
    UnixListener::bind(path).with_context(|| format!("binding {}", path.display()))
}

fn accept(listener: &UnixListener, what: &str) -> Result<UnixStream> {
    let (stream, _) = listener
        .accept()
        .with_context(|| format!("accepting the {what} link"))?;
    log::info!("{what} link connected");
    Ok(stream)
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let forward_listener = bind(&args.forward)?;
    let reverse_listener = bind(&args.reverse)?;
    log::info!(
        "waiting for the stub on {} and {}",
        args.forward.display(),
        args.reverse.display()
    );

    // The stub opens link A, greets, then opens link B.
    let mut server = ForwardServer::new(accept(&forward_listener, "forward")?);
    server.expect_hello().context("waiting for HELLO")?;
    let policy = if args.trailing_read_status {
        ReadFailurePolicy::TrailingStatus
    } else {
        ReadFailurePolicy::ZeroFill
    };
    let client = Arc::new(Mutex::new(
        PeerClient::new(accept(&reverse_listener, "reverse")?).read_failure(policy),
    ));

    let doorbell_client = client.clone();
    let scratch = ScratchDevice::new(args.window_size).on_doorbell(move |value| {
        log::info!("doorbell rung with {value:#x}, raising IRQ");
        let result = match doorbell_client.lock() {
            Ok(mut client) => client.raise_irq(),
            Err(_) => Err(ProxyError::Poisoned),
        };
        if let Err(e) = result {
            log::error!("raising IRQ: {e}");
        }
    });

    let device: Box<dyn MmioDevice> = if args.trace {
        Box::new(Traced {
            inner: Box::new(scratch),
        })
    } else {
        Box::new(scratch)
    };

    let mut bus = MmioManager::default();
    bus.register_device(0, device)?;
    log::info!("serving windows {:x?}", bus.windows());

    match server.serve(&mut bus) {
        ProxyError::Link(e) if e.kind() == ErrorKind::UnexpectedEof => {
            log::info!("stub disconnected");
            Ok(())
        }
        e => Err(e.into()),
    }
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    }
}
