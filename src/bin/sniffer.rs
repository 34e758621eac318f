// bin/sniffer.rs — passive sniffer driver (spec.md §6)
//
// Thin CLI wrapper: parses arguments, loads an optional link configuration,
// wires a radio transport into a packet pump running `SnifferObserver`, and
// blocks until the user hits Enter or sends EOF — mirroring the original
// driver's `raw_input()` wait. The radio transport itself is external to
// this core (spec.md §1); `LoopbackRadio` stands in for whatever concrete
// SDR backend (HackRF/PlutoSDR, selected by `--sdr`) is wired in at
// deployment time.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rf4ce_tools::*;

/// SDR hardware backend, selected by `--sdr` (spec.md §6). The concrete
/// driver for either backend lives outside this core; this crate only
/// defines the transport interface it would plug into (`radio.rs`).
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SdrArg {
    #[value(name = "hackrf")]
    HackRf,
    #[value(name = "pluto-sdr")]
    PlutoSdr,
}

#[derive(Parser)]
#[command(about = "Sniffs RF4CE packets. Supports encryption.")]
struct Args {
    /// JSON file containing link information
    #[arg(short, long)]
    link: Option<String>,

    /// RF4CE channel
    #[arg(short, long, default_value_t = 15)]
    channel: u8,

    /// SDR device to use
    #[arg(short, long, default_value = "pluto-sdr")]
    sdr: SdrArg,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    if !CHANNELS.contains(&args.channel) {
        anyhow::bail!("unsupported channel {} (must be one of {:?})", args.channel, CHANNELS);
    }

    let link_configs = match &args.link {
        Some(path) => match LinkConfig::load(path) {
            Ok(config) => {
                info!("loaded link configuration from {path}");
                vec![config]
            }
            Err(e) => {
                error!("cannot load configuration file: {e}");
                std::process::exit(1);
            }
        },
        None => vec![],
    };

    info!(
        "sniffing on channel {} ({} Hz) via {:?}",
        args.channel,
        center_freq_hz(args.channel),
        args.sdr
    );

    let (mut radio, inbound) = LoopbackRadio::new(args.channel, false)?;
    radio.start()?;

    let mut pump = PacketPump::start(SnifferObserver::new(link_configs));

    thread::scope(|scope| {
        scope.spawn(|| {
            for frame in inbound {
                pump.feed(frame);
            }
        });

        println!("Sniffing... press Enter to stop.");
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);

        info!("exiting...");
        pump.stop();
        radio.stop();
        // dropping the radio closes the inbound channel, ending the feeder
        // thread's loop so the scope can join it.
        drop(radio);
    });

    pump.join(Duration::from_secs(2));
    Ok(())
}
// EOF
