//! Headless C64 host.
//!
//! `emu-c64 --config cfg.json` builds the machine, then reads JSON requests
//! from stdin and writes replies and machine events to stdout, one object
//! per line. Logging goes to stderr and is controlled by `RUST_LOG`.

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

use emu_c64::events::ChannelSink;
use emu_c64::host::{self, FrameSlot};
use emu_c64::{MachineConfig, MachineSession, Roms};

/// Events buffered between the machine and the stdout writer.
const EVENT_QUEUE: usize = 64;

struct CliArgs {
    config: Option<PathBuf>,
    autostart: Option<PathBuf>,
    start: bool,
    frame_events: bool,
}

fn usage() -> ! {
    eprintln!("Usage: emu-c64 [--config cfg.json] [--autostart disk.d64] [--start] [--frame-events]");
    process::exit(2);
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs {
        config: None,
        autostart: None,
        start: false,
        frame_events: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => cli.config = Some(args.next().map(PathBuf::from).unwrap_or_else(|| usage())),
            "--autostart" => {
                cli.autostart = Some(args.next().map(PathBuf::from).unwrap_or_else(|| usage()));
            }
            "--start" => cli.start = true,
            "--frame-events" => cli.frame_events = true,
            "-h" | "--help" => usage(),
            other => {
                eprintln!("Unknown option: {other}");
                usage();
            }
        }
    }
    cli
}

fn main() {
    env_logger::init();
    let cli = parse_args();

    let mut config = match &cli.config {
        Some(path) => MachineConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Cannot load {}: {e}", path.display());
            process::exit(1);
        }),
        None => MachineConfig::default(),
    };
    if let Some(disk) = cli.autostart {
        config.media.insert(0, disk);
        config.autostart.get_or_insert_with(|| emu_c64::autostart::FIRST_PROGRAM.to_string());
    }
    let roms = Roms::load(&config.roms).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let (sink, events) = ChannelSink::bounded(EVENT_QUEUE);
    let mut session = MachineSession::new(&config, &roms, sink).unwrap_or_else(|e| {
        eprintln!("Cannot build machine: {e}");
        process::exit(1);
    });

    let frame: FrameSlot = Arc::new(Mutex::new(None));
    let printer = {
        let frame = Arc::clone(&frame);
        let frame_events = cli.frame_events;
        thread::Builder::new()
            .name("event-printer".into())
            .spawn(move || host::forward_events(&events, &frame, frame_events))
            .unwrap_or_else(|e| {
                eprintln!("Cannot start event printer: {e}");
                process::exit(1);
            })
    };

    if cli.start {
        if let Err(e) = session.start() {
            eprintln!("Cannot start machine: {e}");
            process::exit(1);
        }
    }
    host::serve(&mut session, &frame, io::stdin().lock());

    // Dropping the session stops the worker, which closes the event channel.
    drop(session);
    if printer.join().is_err() {
        log::error!("event printer panicked");
    }
}
