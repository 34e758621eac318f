// bin/pairing_sniffer.rs — pairing-time key recovery driver (spec.md §6)
//
// Watches a pairing exchange with `KeyRecoveryObserver` and, on success,
// persists the recovered `LinkConfig` to `output_file`. Mirrors the original
// driver's poll loop (`join(1.0)` / `isAlive()`) by checking the observer's
// state once per second instead of relying on thread liveness.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use rf4ce_tools::*;

/// SDR hardware backend, selected by `--sdr` (spec.md §6); see `bin/sniffer.rs`.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SdrArg {
    #[value(name = "hackrf")]
    HackRf,
    #[value(name = "pluto-sdr")]
    PlutoSdr,
}

#[derive(Parser)]
#[command(about = "Sniffs link information, including key, during pairing.")]
struct Args {
    /// Output JSON file storing link information
    output_file: String,

    /// RF4CE channel
    #[arg(short, long, default_value_t = 15)]
    channel: u8,

    /// SDR device to use
    #[arg(short, long, default_value = "pluto-sdr")]
    sdr: SdrArg,
}

/// Bridges the shared `KeyRecoveryObserver` into `pump::Processor` so the
/// pump worker and the main polling loop can both touch it through one lock.
struct Shared(Arc<Mutex<KeyRecoveryObserver>>);

impl Processor for Shared {
    fn process(&mut self, data: Vec<u8>) {
        self.0.lock().unwrap().observe(&data);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    if !CHANNELS.contains(&args.channel) {
        anyhow::bail!("unsupported channel {} (must be one of {:?})", args.channel, CHANNELS);
    }

    info!("sniffing on channel {} via {:?}", args.channel, args.sdr);

    let observer = Arc::new(Mutex::new(KeyRecoveryObserver::new()));
    let (mut radio, inbound) = LoopbackRadio::new(args.channel, false)?;
    radio.start()?;

    let mut pump = PacketPump::start(Shared(Arc::clone(&observer)));

    let final_state = thread::scope(|scope| {
        scope.spawn(|| {
            for frame in inbound {
                pump.feed(frame);
            }
        });

        let state = loop {
            println!("Sniffing...");
            thread::sleep(Duration::from_secs(1));
            let state = observer.lock().unwrap().state();
            if matches!(state, State::Done | State::Aborted) {
                break state;
            }
        };

        pump.stop();
        radio.stop();
        // dropping the radio closes the inbound channel, ending the feeder
        // thread's loop so the scope can join it.
        drop(radio);
        state
    });

    pump.join(Duration::from_secs(2));

    match final_state {
        State::Done => {
            let config = observer.lock().unwrap().link_config().clone();
            info!("key recovered: {config:?}");
            info!("saving link configuration into {}", args.output_file);
            config.save(&args.output_file)?;
        }
        State::Aborted => {
            error!("key recovery aborted: unexpected frame during capture");
        }
        _ => unreachable!("loop only exits on Done or Aborted"),
    }

    info!("exiting...");
    Ok(())
}
// EOF
