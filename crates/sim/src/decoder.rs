use airspace_shared::{Action, AircraftState, Command, DecoderConfig, ACTION_SIZE};

use crate::control_loop::ControlError;
use crate::geo::{normalize_360, wrap_180};

/// Receiver of decoded commands, typically the traffic authority.
///
/// Commands are fire-and-forget: nothing is read back, and re-issuing the
/// same heading or speed must be harmless.
pub trait CommandSink {
    fn issue(&mut self, command: Command);
}

impl CommandSink for Vec<Command> {
    fn issue(&mut self, command: Command) {
        self.push(command);
    }
}

/// Turns policy rows into heading/speed commands.
#[derive(Debug, Clone, Copy)]
pub struct ActionDecoder {
    config: DecoderConfig,
}

impl ActionDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Check the width of a raw policy row and apply the configured clip.
    pub fn action(&self, agent: &str, raw: &[f32]) -> Result<Action, ControlError> {
        let action = Action::from_raw(raw).ok_or_else(|| ControlError::ActionWidth {
            agent: agent.to_string(),
            expected: ACTION_SIZE,
            got: raw.len(),
        })?;
        Ok(match self.config.action_clip {
            Some(limit) => action.clamped(limit),
            None => action,
        })
    }

    /// New heading (degrees, `[-180, 180)`) and new speed in command units.
    ///
    /// `cas` is m/s. Neither value is limited to the aircraft envelope; that
    /// is up to whoever receives the command.
    pub fn decode(&self, action: Action, heading: f64, cas: f64) -> (f64, f64) {
        let heading = wrap_180(heading + action.heading as f64 * self.config.d_heading_deg);
        let speed = (cas + action.speed as f64 * self.config.d_velocity) * self.config.speed_command_factor;
        (heading, speed)
    }

    pub fn commands(&self, ac: &AircraftState, action: Action) -> [Command; 2] {
        let (deg, kt) = self.decode(action, ac.hdg, ac.cas);
        [
            Command::Heading { id: ac.id.clone(), deg },
            Command::Speed { id: ac.id.clone(), kt },
        ]
    }

    /// Decode and hand both commands to `sink`.
    pub fn emit(&self, ac: &AircraftState, action: Action, sink: &mut dyn CommandSink) {
        for command in self.commands(ac, action) {
            sink.issue(command);
        }
    }
}

/// Target heading requested by a path-planning action, degrees `[0, 360)`.
///
/// The action is read as an (east, north) direction.
pub fn target_bearing(action: Action) -> f64 {
    normalize_360(f64::atan2(action.heading as f64, action.speed as f64).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airspace_shared::{D_HEADING_DEG, D_VELOCITY, MPS_TO_KT};

    fn aircraft(hdg: f64, cas: f64) -> AircraftState {
        AircraftState {
            id: "KL204".into(),
            lat: 52.0,
            lon: 4.0,
            hdg,
            gs: cas,
            tas: cas,
            cas,
        }
    }

    #[test]
    fn test_zero_action_keeps_state() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        let cas = 250.0 / MPS_TO_KT;
        let (hdg, kt) = decoder.decode(Action::none(), 0.0, cas);
        assert_eq!(hdg, 0.0);
        assert!((kt - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_action_steps() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        let (hdg, kt) = decoder.decode(Action { heading: 1.0, speed: -1.0 }, 170.0, 100.0);
        assert_eq!(hdg, wrap_180(170.0 + D_HEADING_DEG));
        assert_eq!(hdg, -167.5);
        assert!((kt - (100.0 - D_VELOCITY) * MPS_TO_KT).abs() < 1e-9);
    }

    #[test]
    fn test_decode_does_not_limit_output() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        let (_, kt) = decoder.decode(Action { heading: 0.0, speed: 50.0 }, 0.0, 100.0);
        assert!(kt > 800.0);
    }

    #[test]
    fn test_action_width_checked() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        assert!(decoder.action("KL1", &[0.1, 0.2]).is_ok());
        for raw in [&[][..], &[0.1][..], &[0.1, 0.2, 0.3][..]] {
            match decoder.action("KL1", raw) {
                Err(ControlError::ActionWidth { expected, got, .. }) => {
                    assert_eq!(expected, 2);
                    assert_eq!(got, raw.len());
                }
                other => panic!("expected width error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_action_clip() {
        let decoder = ActionDecoder::new(DecoderConfig {
            action_clip: Some(1.0),
            ..DecoderConfig::default()
        });
        let action = decoder.action("KL1", &[3.0, -0.5]).unwrap();
        assert_eq!(action, Action { heading: 1.0, speed: -0.5 });
    }

    #[test]
    fn test_commands_and_text_form() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        let mut sink: Vec<Command> = Vec::new();
        decoder.emit(&aircraft(90.0, 100.0), Action { heading: 0.5, speed: 0.0 }, &mut sink);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0], Command::Heading { id: "KL204".into(), deg: 101.25 });
        assert_eq!(sink[0].to_string(), "HDG KL204 101.25");
        assert!(sink[1].to_string().starts_with("SPD KL204 194.38"));
    }

    #[test]
    fn test_decode_is_reproducible() {
        let decoder = ActionDecoder::new(DecoderConfig::default());
        let ac = aircraft(123.456, 131.7);
        let action = Action { heading: 0.3141, speed: -0.2718 };
        let first = decoder.commands(&ac, action);
        for _ in 0..10 {
            assert_eq!(decoder.commands(&ac, action), first);
        }
    }

    #[test]
    fn test_target_bearing() {
        assert_eq!(target_bearing(Action { heading: 0.0, speed: 1.0 }), 0.0);
        assert!((target_bearing(Action { heading: 1.0, speed: 0.0 }) - 90.0).abs() < 1e-9);
        assert!((target_bearing(Action { heading: -1.0, speed: 0.0 }) - 270.0).abs() < 1e-9);
    }
}
