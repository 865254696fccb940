use std::sync::{Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::{AudioBuffer, AudioError};

/// Microphone capture into an in-memory PCM buffer, with the elapsed
/// recording time exposed for the page's recording readout.
pub struct Recorder {
    stream: Option<cpal::Stream>,
    buffer: Arc<Mutex<AudioBuffer>>,
    started_at: Option<Instant>,
    selected_input_device: Option<String>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            stream: None,
            buffer: Arc::new(Mutex::new(AudioBuffer::new(16000, 1))),
            started_at: None,
            selected_input_device: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    /// Seconds since recording started; zero when idle.
    pub fn elapsed_secs(&self) -> f32 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.is_recording() {
            return Err(AudioError::Capture("Already recording".to_string()));
        }

        let host = cpal::default_host();
        let device = Self::pick_input_device(&host, self.selected_input_device.as_deref())
            .ok_or_else(|| AudioError::Capture("No input device available".to_string()))?;

        let device_name = Self::device_display_name(&device);
        info!("Input device: {}", device_name);

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::Capture(e.to_string()))?;
        if let Ok(mut guard) = self.buffer.lock() {
            guard.sample_rate = config.sample_rate();
            guard.channels = config.channels();
            guard.clear();
        }

        let buffer_clone = self.buffer.clone();
        let err_fn = |err| error!("an error occurred on stream: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| write_input_data(data, &buffer_clone),
                err_fn,
                None,
            ),
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| write_input_data_f32(data, &buffer_clone),
                err_fn,
                None,
            ),
            _ => return Err(AudioError::Capture("Unsupported sample format".to_string())),
        }
        .map_err(|e| AudioError::Capture(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Capture(e.to_string()))?;
        self.stream = Some(stream);
        self.started_at = Some(Instant::now());

        Ok(())
    }

    pub fn stop(&mut self) -> Result<AudioBuffer, AudioError> {
        if !self.is_recording() {
            return Err(AudioError::Capture("Not recording".to_string()));
        }

        self.stream.take();
        self.started_at = None;

        let mut guard = self
            .buffer
            .lock()
            .map_err(|e| AudioError::Capture(e.to_string()))?;
        let out = guard.clone();
        guard.clear();
        Ok(out)
    }

    pub fn list_input_devices(&self) -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::Capture(e.to_string()))?
            .map(|device| Self::device_display_name(&device))
            .collect::<Vec<_>>();
        Ok(devices)
    }

    pub fn set_selected_input_device(&mut self, name: Option<String>) {
        self.selected_input_device = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    fn pick_input_device(host: &cpal::Host, preferred_name: Option<&str>) -> Option<cpal::Device> {
        if let Some(name) = preferred_name {
            if let Ok(mut devices) = host.input_devices() {
                if let Some(device) = devices.find(|d| Self::device_display_name(d) == name) {
                    return Some(device);
                }
            }
            tracing::warn!(
                "Preferred input device '{}' not found, falling back to default",
                name
            );
        }
        let default_device = host.default_input_device()?;

        let default_name = Self::device_display_name(&default_device);
        if !Self::looks_like_loopback(&default_name) {
            return Some(default_device);
        }

        tracing::warn!(
            "Default device '{}' looks like loopback, trying to pick a microphone input",
            default_name
        );

        if let Ok(mut devices) = host.input_devices() {
            if let Some(alternative) = devices.find(|d| {
                let name = Self::device_display_name(d);
                !Self::looks_like_loopback(&name)
            }) {
                return Some(alternative);
            }
        }

        Some(default_device)
    }

    fn device_display_name(device: &cpal::Device) -> String {
        device
            .name()
            .or_else(|_| device.description().map(|d| d.name().to_string()))
            .unwrap_or_else(|_| "Unknown input".to_string())
    }

    fn looks_like_loopback(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let patterns = [
            "stereo mix",
            "what u hear",
            "wave out",
            "loopback",
            "monitor",
        ];
        patterns.iter().any(|p| lower.contains(p))
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_input_data(input: &[i16], buffer: &Arc<Mutex<AudioBuffer>>) {
    if let Ok(mut guard) = buffer.lock() {
        guard.append(input);
    }
}

fn write_input_data_f32(input: &[f32], buffer: &Arc<Mutex<AudioBuffer>>) {
    let samples: Vec<i16> = input.iter().map(|&x| (x * i16::MAX as f32) as i16).collect();
    if let Ok(mut guard) = buffer.lock() {
        guard.append(&samples);
    }
}
