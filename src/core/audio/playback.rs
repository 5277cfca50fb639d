//! Remote audio playback
//!
//! The single sink for inbound session audio. `SpeakerSink` owns an output
//! thread holding the cpal stream and a shared sample queue; decoded remote
//! audio is pushed in at its source rate and upsampled to the device rate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{AudioError, AudioResult};

/// Sink for inbound remote audio. The session pushes decoded PCM as it
/// arrives; implementations decide how it is heard (or observed, in tests).
pub trait AudioSink: Send + Sync {
    fn push_pcm(&self, pcm: &[i16], sample_rate: u32);
}

/// cpal-backed speaker output.
pub struct SpeakerSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    device_rate: Arc<AtomicU32>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SpeakerSink {
    pub fn new() -> AudioResult<Self> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let device_rate = Arc::new(AtomicU32::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<AudioResult<()>>();

        let queue_for_thread = queue.clone();
        let rate_for_thread = device_rate.clone();
        let stop_flag = stop.clone();

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(AudioError::NoDevice(
                        "no default output device".to_string(),
                    )));
                    return;
                }
            };

            let supported = match device.default_output_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::Unsupported(e.to_string())));
                    return;
                }
            };
            if supported.sample_format() != cpal::SampleFormat::F32 {
                let _ = ready_tx.send(Err(AudioError::Unsupported(format!(
                    "output sample format {:?} not supported",
                    supported.sample_format()
                ))));
                return;
            }

            let config: cpal::StreamConfig = supported.config();
            let channels = config.channels.max(1) as usize;
            rate_for_thread.store(config.sample_rate.0, Ordering::Release);
            debug!(
                device_rate = config.sample_rate.0,
                channels, "opening speaker playback"
            );

            let callback_queue = queue_for_thread;
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock();
                    for frame in data.chunks_mut(channels) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        for slot in frame {
                            *slot = sample;
                        }
                    }
                },
                |err| warn!("speaker stream error: {}", err),
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

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                queue,
                device_rate,
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                stop.store(true, Ordering::Release);
                Err(AudioError::Stream(
                    "timed out waiting for playback stream".to_string(),
                ))
            }
        }
    }

    /// Sample rate of the opened output device.
    pub fn device_rate(&self) -> u32 {
        self.device_rate.load(Ordering::Acquire)
    }
}

impl AudioSink for SpeakerSink {
    fn push_pcm(&self, pcm: &[i16], sample_rate: u32) {
        let device_rate = self.device_rate();
        if device_rate == 0 || pcm.is_empty() {
            return;
        }

        // Nearest-neighbor upsample to the device rate.
        let step = sample_rate as f64 / device_rate as f64;
        let out_len = (pcm.len() as f64 / step) as usize;
        let mut queue = self.queue.lock();
        // Bound the backlog to about one second so a stalled device does not
        // grow the queue without limit.
        let max_backlog = device_rate as usize;
        for i in 0..out_len {
            if queue.len() >= max_backlog {
                break;
            }
            let src = ((i as f64 * step) as usize).min(pcm.len() - 1);
            queue.push_back(pcm[src] as f32 / i16::MAX as f32);
        }
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
