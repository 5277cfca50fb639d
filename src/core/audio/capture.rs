//! Microphone capture
//!
//! `MicrophoneCapture` owns a dedicated capture thread holding the cpal input
//! stream (cpal streams are not `Send`), downmixes to mono, resamples to the
//! 8 kHz wire rate, and delivers fixed 20 ms PCM frames over a channel.
//! Frames are dropped rather than buffered when the consumer falls behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AudioError, AudioResult, FRAME_SAMPLES, WIRE_SAMPLE_RATE};

/// Source of outbound audio frames for a voice session.
///
/// `open` starts capture and returns the frame stream; `close` stops it.
/// Implementations must deliver mono PCM-16 frames at the wire rate.
pub trait AudioCapture: Send {
    fn open(&mut self) -> AudioResult<mpsc::Receiver<Vec<i16>>>;
    fn close(&mut self);
}

/// Nearest-neighbor resampler from the device rate down to the wire rate,
/// with phase carried across callback boundaries.
struct WireResampler {
    step: f64,
    phase: f64,
    channels: usize,
}

impl WireResampler {
    fn new(device_rate: u32, channels: u16) -> Self {
        Self {
            step: device_rate as f64 / WIRE_SAMPLE_RATE as f64,
            phase: 0.0,
            channels: channels.max(1) as usize,
        }
    }

    fn push(&mut self, input: &[f32], out: &mut Vec<i16>) {
        let frames = input.len() / self.channels;
        while (self.phase as usize) < frames {
            let base = (self.phase as usize) * self.channels;
            let mono: f32 = input[base..base + self.channels].iter().sum::<f32>()
                / self.channels as f32;
            out.push((mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
            self.phase += self.step;
        }
        self.phase -= frames as f64;
    }
}

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    thread: std::thread::JoinHandle<()>,
}

/// cpal-backed microphone capture.
#[derive(Default)]
pub struct MicrophoneCapture {
    worker: Option<CaptureWorker>,
}

impl MicrophoneCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioCapture for MicrophoneCapture {
    fn open(&mut self) -> AudioResult<mpsc::Receiver<Vec<i16>>> {
        if self.worker.is_some() {
            return Err(AudioError::Stream("capture already running".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::channel::<Vec<i16>>(32);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<AudioResult<()>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(AudioError::NoDevice(
                        "no default input device".to_string(),
                    )));
                    return;
                }
            };

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::Unsupported(e.to_string())));
                    return;
                }
            };
            if supported.sample_format() != cpal::SampleFormat::F32 {
                let _ = ready_tx.send(Err(AudioError::Unsupported(format!(
                    "input sample format {:?} not supported",
                    supported.sample_format()
                ))));
                return;
            }

            let config: cpal::StreamConfig = supported.config();
            let mut resampler = WireResampler::new(config.sample_rate.0, config.channels);
            let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES * 2);
            debug!(
                device_rate = config.sample_rate.0,
                channels = config.channels,
                "opening microphone capture"
            );

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    resampler.push(data, &mut pending);
                    while pending.len() >= FRAME_SAMPLES {
                        let frame: Vec<i16> = pending.drain(..FRAME_SAMPLES).collect();
                        // try_send: drop the frame if the session is behind
                        if frame_tx.try_send(frame).is_err() {
                            debug!("dropping capture frame, consumer is behind");
                        }
                    }
                },
                |err| warn!("microphone stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !stop_flag.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
        });

        // Wait for the capture thread to report stream setup
        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {
                self.worker = Some(CaptureWorker { stop, thread });
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                stop.store(true, Ordering::Release);
                Err(AudioError::Stream(
                    "timed out waiting for capture stream".to_string(),
                ))
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            let _ = worker.thread.join();
            debug!("microphone capture stopped");
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.close();
    }
}
