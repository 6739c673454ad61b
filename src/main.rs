use crossbeam_channel::bounded;
use failure::Error;
use log::{info, warn};

use crosswave::engine::Engine;
use crosswave::messages::{notification_channel, request_channel, Notification};
use crosswave::midi_input::MidiInputHandler;

const MIDI_QUEUE: usize = 256;

fn main() -> Result<(), Error> {
    flexi_logger::Logger::with_env_or_str("crosswave=info")
        .log_to_file()
        .directory("log")
        .start()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--list-ports") {
        for (i, name) in MidiInputHandler::list_ports()?.iter().enumerate() {
            println!("{}: {}", i, name);
        }
        return Ok(());
    }
    let port: usize = args.get(1).map(|a| a.parse()).transpose()?.unwrap_or(0);

    let (_request_tx, request_rx) = request_channel();
    let (notification_tx, notification_rx) = notification_channel();
    let (midi_tx, midi_rx) = bounded(MIDI_QUEUE);

    let engine = Engine::start(request_rx, midi_rx, Box::new(notification_tx))?;
    info!("engine running at {} Hz", engine.sample_rate());

    let _midi = match MidiInputHandler::connect(port, midi_tx) {
        Ok(handler) => Some(handler),
        Err(e) => {
            warn!("MIDI input unavailable: {}", e);
            None
        }
    };

    // keep the stream alive; an editor frontend would consume these
    for ntf in notification_rx.iter() {
        match ntf {
            Notification::Program { bank, prog, .. } => {
                info!("active program {}:{}", bank, prog)
            }
            Notification::Bank { num, .. } => info!("bank {} updated", num),
            Notification::Write => info!("program written"),
        }
    }

    Ok(())
}
