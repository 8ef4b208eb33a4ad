//! Line-oriented control surface.
//!
//! Each command only writes to [`Controls`] or the recorder; the audio thread
//! sees the change at its next buffer boundary.

use std::str::FromStr;
use std::sync::Arc;

use clap::ValueEnum;
use thiserror::Error;

use crate::config::{Controls, ModulationScheme, NOISE_MAX, NOISE_MIN};
use crate::monitor::SpectrumSlot;
use crate::recorder::Recorder;
use crate::telemetry::Telemetry;

pub const HELP: &str = "\
commands:
  am | fm | qam     select modulation scheme
  noise <level>     set channel noise std-dev (0.0 - 0.5)
  echo              toggle echo
  record            start/stop recording
  stats             show latency, utilisation and spectrum peak
  help              show this text
  quit              stop the stream and exit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Scheme(ModulationScheme),
    Noise(f32),
    ToggleEcho,
    ToggleRecord,
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),
    #[error("noise needs a level between {min} and {max}")]
    MissingLevel { min: f32, max: f32 },
    #[error("invalid noise level '{0}'")]
    BadLevel(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default().to_lowercase();

        if let Ok(scheme) = ModulationScheme::from_str(&head, true) {
            return Ok(Command::Scheme(scheme));
        }

        match head.as_str() {
            "noise" => {
                let level = words.next().ok_or(CommandError::MissingLevel {
                    min: NOISE_MIN,
                    max: NOISE_MAX,
                })?;
                level
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Command::Noise)
                    .ok_or_else(|| CommandError::BadLevel(level.to_string()))
            }
            "echo" => Ok(Command::ToggleEcho),
            "record" | "rec" => Ok(Command::ToggleRecord),
            "stats" => Ok(Command::Stats),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(line.trim().to_string())),
        }
    }
}

/// Outcome of one command, to be shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: String,
    pub quit: bool,
}

impl Reply {
    fn say(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            quit: false,
        }
    }
}

pub struct ControlSurface<'a> {
    controls: Controls,
    recorder: &'a mut Recorder,
    telemetry: Arc<Telemetry>,
    spectrum: SpectrumSlot,
}

impl<'a> ControlSurface<'a> {
    pub fn new(
        controls: Controls,
        recorder: &'a mut Recorder,
        telemetry: Arc<Telemetry>,
        spectrum: SpectrumSlot,
    ) -> Self {
        Self {
            controls,
            recorder,
            telemetry,
            spectrum,
        }
    }

    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Scheme(scheme) => {
                self.controls.set_scheme(scheme);
                Reply::say(format!("Switched to {}", scheme))
            }
            Command::Noise(level) => {
                let applied = self.controls.set_noise_std(level);
                Reply::say(format!("Noise level set to {}", applied))
            }
            Command::ToggleEcho => {
                if self.controls.toggle_echo() {
                    Reply::say("Echo enabled")
                } else {
                    Reply::say("Echo disabled")
                }
            }
            Command::ToggleRecord => match self.recorder.toggle() {
                Ok(true) => Reply::say(format!(
                    "Recording started ({})",
                    self.recorder.path().display()
                )),
                Ok(false) => Reply::say("Recording stopped"),
                // Recording stays off; the stream is unaffected
                Err(e) => Reply::say(format!(
                    "Failed to open {}: {}",
                    self.recorder.path().display(),
                    e
                )),
            },
            Command::Stats => Reply::say(self.stats()),
            Command::Help => Reply::say(HELP),
            Command::Quit => Reply {
                message: "Stopping".into(),
                quit: true,
            },
        }
    }

    fn stats(&self) -> String {
        let state = self.controls.snapshot();
        let metrics = self.telemetry.metrics();
        let stats = self.telemetry.stats();

        let mut text = format!(
            "{} | noise {:.2} | echo {} | rec {}\n\
             latency {:.3} ms ({:.1}% cpu), peak {:.3} ms, {} buffers, {} overruns",
            state.scheme,
            state.noise_std,
            if state.echo_enabled { "on" } else { "off" },
            if state.recording { "on" } else { "off" },
            metrics.latency_ms,
            metrics.utilization_pct,
            stats.peak_latency_ms,
            stats.buffers,
            stats.overruns,
        );
        if stats.sanitized_samples > 0 || stats.dropped_record_buffers > 0 {
            text.push_str(&format!(
                "\n{} non-finite input samples replaced, {} record buffers dropped",
                stats.sanitized_samples, stats.dropped_record_buffers
            ));
        }

        let spectrum = self.spectrum.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(peak) = spectrum.as_ref().and_then(|frame| frame.dominant()) {
            text.push_str(&format!(
                "\nspectrum peak {:.0} Hz (magnitude {:.4})",
                peak.frequency_hz, peak.magnitude
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlState;
    use std::sync::Mutex;

    #[test]
    fn test_parse_commands() {
        assert_eq!("AM".parse::<Command>(), Ok(Command::Scheme(ModulationScheme::Am)));
        assert_eq!(" fm ".parse::<Command>(), Ok(Command::Scheme(ModulationScheme::Fm)));
        assert_eq!("qam".parse::<Command>(), Ok(Command::Scheme(ModulationScheme::Qam)));
        assert_eq!("noise 0.25".parse::<Command>(), Ok(Command::Noise(0.25)));
        assert_eq!("echo".parse::<Command>(), Ok(Command::ToggleEcho));
        assert_eq!("record".parse::<Command>(), Ok(Command::ToggleRecord));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "noise".parse::<Command>(),
            Err(CommandError::MissingLevel {
                min: NOISE_MIN,
                max: NOISE_MAX
            })
        );
        assert_eq!(
            "noise loud".parse::<Command>(),
            Err(CommandError::BadLevel("loud".into()))
        );
        assert_eq!(
            "noise NaN".parse::<Command>(),
            Err(CommandError::BadLevel("NaN".into()))
        );
        assert!(matches!("ssb".parse::<Command>(), Err(CommandError::Unknown(_))));
    }

    #[test]
    fn test_execute_updates_controls() {
        let dir = tempfile::tempdir().unwrap();
        let controls = Controls::new(ControlState::default());
        let (mut recorder, _tap) =
            Recorder::spawn(dir.path().join("r.wav"), 44_100, 1024, controls.clone()).unwrap();
        let telemetry = Arc::new(Telemetry::new(256));
        let spectrum: SpectrumSlot = Arc::new(Mutex::new(None));
        let mut surface =
            ControlSurface::new(controls.clone(), &mut recorder, telemetry, spectrum);

        surface.execute(Command::Scheme(ModulationScheme::Fm));
        let reply = surface.execute(Command::Noise(3.0));
        assert_eq!(reply.message, "Noise level set to 0.5");
        assert_eq!(surface.execute(Command::ToggleEcho).message, "Echo enabled");

        let state = controls.snapshot();
        assert_eq!(state.scheme, ModulationScheme::Fm);
        assert_eq!(state.noise_std, 0.5);
        assert!(state.echo_enabled);

        assert!(surface.execute(Command::Quit).quit);
        assert!(surface.execute(Command::Stats).message.starts_with("FM"));
    }

    #[test]
    fn test_record_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let controls = Controls::new(ControlState::default());
        let (mut recorder, _tap) = Recorder::spawn(
            dir.path().join("no_such_dir").join("r.wav"),
            44_100,
            1024,
            controls.clone(),
        )
        .unwrap();
        let mut surface = ControlSurface::new(
            controls.clone(),
            &mut recorder,
            Arc::new(Telemetry::new(256)),
            Arc::new(Mutex::new(None)),
        );

        let reply = surface.execute(Command::ToggleRecord);
        assert!(reply.message.starts_with("Failed to open"));
        assert!(!reply.quit);
        assert!(!controls.snapshot().recording);
    }
}
