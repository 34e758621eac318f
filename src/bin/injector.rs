// bin/injector.rs — authenticated injection driver (spec.md §6)
//
// Loads a `LinkConfig`, wires up a radio transport (full-duplex only for
// `pluto-sdr`, matching the original's ACK-capable backend), and drives an
// `InjectionController` from stdin lines via `inject::parse_line`.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use clap::Parser;
use rf4ce_tools::*;

/// SDR hardware backend, selected by `--sdr` (spec.md §6); see `bin/sniffer.rs`.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SdrArg {
    #[value(name = "hackrf")]
    HackRf,
    #[value(name = "pluto-sdr")]
    PlutoSdr,
}

#[derive(Parser)]
#[command(about = "Injects arbitrary RF4CE packets. Supports encryption.")]
struct Args {
    /// JSON file containing link information
    config_file: String,

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

    let link_config = match LinkConfig::load(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load configuration file: {e}");
            std::process::exit(1);
        }
    };
    info!("SRC:({}) -> DST:({})", link_config.source, link_config.destination);
    if link_config.key.is_none() {
        info!("no secured configuration provided, will only send plaintext packets");
    }
    info!("loading last frame counter: {}", link_config.frame_counter);

    // Pluto-SDR is the only backend assumed full-duplex enough to receive
    // ACKs while transmitting, matching the original's backend selection.
    let full_duplex = args.sdr == SdrArg::PlutoSdr;
    let (mut radio, inbound) = LoopbackRadio::new(args.channel, full_duplex)?;
    radio.start()?;

    let ack_processor = full_duplex.then(AckProcessor::new);
    let ack_pump = ack_processor.clone().map(PacketPump::start);

    let mut controller = InjectionController::new(link_config, radio, ack_processor);

    print_help();

    let stdin = std::io::stdin();
    thread::scope(|scope| {
        if let Some(pump) = ack_pump.as_ref() {
            scope.spawn(move || {
                for frame in inbound {
                    pump.feed(frame);
                }
            });
        } else {
            drop(inbound);
        }

        print!("({})>>> ", controller.frame_counter());
        let _ = std::io::stdout().flush();

        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match inject::parse_line(&line) {
                Ok(cmds) => {
                    for cmd in cmds {
                        if let Err(e) = controller.execute(cmd) {
                            error!("{e}");
                        }
                    }
                }
                Err(reason) if reason == "exit" => break,
                Err(reason) => error!("{reason}"),
            }
            print!("({})>>> ", controller.frame_counter());
            let _ = std::io::stdout().flush();
        }

        if let Some(pump) = ack_pump.as_ref() {
            pump.stop();
        }
    });

    info!("saving last frame counter: {}", controller.frame_counter());
    controller.shutdown(&args.config_file)?;

    if let Some(mut pump) = ack_pump {
        pump.join(Duration::from_secs(2));
    }

    info!("exiting...");
    Ok(())
}

fn print_help() {
    println!(
        "Available commands:\n\n\
         \tcounter <value>      Set the frame counter value\n\
         \tdelay <value>        Minimum delay between packets (seconds)\n\
         \tciphered [0, 1]      Send ciphered payloads instead of cleartext\n\
         \tprofile <profile>    Select a profile number\n\
         \texit\n\n\
         Other inputs are treated as hex-encoded data to transmit."
    );
}
// EOF
