//! Audio host: owns the output stream and drives the instrument.
//!
//! The device callback renders in fixed sub-blocks. Per sub-block at
//! most one editor request is applied, so a bank load never starves
//! the stream, while pending MIDI events are all drained.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use failure::{err_msg, Error};
use log::{error, info};

use crate::messages::{NotificationSink, Request};
use crate::midi_input::MidiEvent;
use crate::synth::Instrument;
use crate::BLOCK_FRAMES;

/// Makeup gain for the headroom lost in the saturator's interpolation.
const OUTPUT_GAIN: f32 = 4.0 / 32768.0;

pub struct Engine {
    instrument: Arc<Mutex<Instrument>>,
    sample_rate: f32,
    _stream: cpal::Stream,
}

impl Engine {
    pub fn start(
        requests: Receiver<Request>,
        midi: Receiver<MidiEvent>,
        sink: Box<dyn NotificationSink + Send>,
    ) -> Result<Engine, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| err_msg("no audio output device"))?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate() as f32;
        let channels = config.channels() as usize;
        let stream_config: cpal::StreamConfig = config.into();
        info!(
            "audio output: {} at {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "?".into()),
            sample_rate,
            channels
        );

        let instrument = Arc::new(Mutex::new(Instrument::new(sample_rate, sink)));
        let shared = instrument.clone();

        let mut outl = vec![0i16; BLOCK_FRAMES];
        let mut outr = vec![0i16; BLOCK_FRAMES];

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut ins = match shared.lock() {
                    Ok(ins) => ins,
                    Err(_) => {
                        for v in data.iter_mut() {
                            *v = 0.0;
                        }
                        return;
                    }
                };
                render(&mut ins, &requests, &midi, data, channels, &mut outl, &mut outr);
            },
            |err| error!("stream error: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Engine {
            instrument,
            sample_rate,
            _stream: stream,
        })
    }

    pub fn instrument(&self) -> &Arc<Mutex<Instrument>> {
        &self.instrument
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

fn render(
    ins: &mut Instrument,
    requests: &Receiver<Request>,
    midi: &Receiver<MidiEvent>,
    data: &mut [f32],
    channels: usize,
    outl: &mut [i16],
    outr: &mut [i16],
) {
    for block in data.chunks_mut(BLOCK_FRAMES * channels) {
        let nframes = block.len() / channels;

        if let Ok(req) = requests.try_recv() {
            ins.receive_request(req);
        }
        while let Ok(ev) = midi.try_recv() {
            ins.receive_midi(ev.bytes(), 0);
        }

        ins.synthesize(&mut outl[..nframes], &mut outr[..nframes]);

        for (i, frame) in block.chunks_mut(channels).enumerate() {
            frame[0] = scale(outl[i]);
            if channels > 1 {
                frame[1] = scale(outr[i]);
            }
            for v in frame.iter_mut().skip(2) {
                *v = 0.0;
            }
        }
    }
}

fn scale(sample: i16) -> f32 {
    (sample as f32 * OUTPUT_GAIN).max(-1.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{request_channel, NullSink};
    use crossbeam_channel::bounded;

    #[test]
    fn render_applies_midi_and_fills_frames() {
        let mut ins = Instrument::new(48000.0, Box::new(NullSink));
        let (req_tx, req_rx) = request_channel();
        let (midi_tx, midi_rx) = bounded(16);

        midi_tx
            .send(MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap())
            .unwrap();
        drop(req_tx);
        drop(midi_tx);

        let mut data = vec![0.5f32; BLOCK_FRAMES * 4];
        let mut outl = vec![0i16; BLOCK_FRAMES];
        let mut outr = vec![0i16; BLOCK_FRAMES];
        render(
            &mut ins, &req_rx, &midi_rx, &mut data, 2, &mut outl, &mut outr,
        );

        assert_eq!(ins.active_voices(), 1);
        assert!(data.iter().all(|&v| v >= -1.0 && v <= 1.0));
        assert!(data.iter().any(|&v| v != 0.5), "output never written");
    }

    #[test]
    fn one_request_per_block() {
        let mut ins = Instrument::new(48000.0, Box::new(NullSink));
        let (req_tx, req_rx) = request_channel();
        let (_midi_tx, midi_rx) = bounded::<MidiEvent>(1);

        req_tx.send(Request::SetProgram { prog: 3 }).unwrap();
        req_tx.send(Request::SetProgram { prog: 7 }).unwrap();

        let mut data = vec![0.0f32; BLOCK_FRAMES * 2];
        let mut outl = vec![0i16; BLOCK_FRAMES];
        let mut outr = vec![0i16; BLOCK_FRAMES];
        render(
            &mut ins, &req_rx, &midi_rx, &mut data, 2, &mut outl, &mut outr,
        );
        assert_eq!(ins.program_number(), 3);

        render(
            &mut ins, &req_rx, &midi_rx, &mut data, 2, &mut outl, &mut outr,
        );
        assert_eq!(ins.program_number(), 7);
    }
}
