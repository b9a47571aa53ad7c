//! Offline keyword interpreter
//!
//! Recognises a few fixed phrasings without a network round trip. Useful when
//! no API key is configured and for scripted sessions.

use command_supervisor::{Interpretation, InterpreterClient, InterpreterError, Invocation};
use regex::{Captures, Regex};
use serde_json::{json, Map, Value};

const HELP: &str = "I can move, turn, power on or off, and stop. \
Try \"move forward for 5 seconds\".";

/// Walking speed used for phrased moves, in m/s (rad/s for turns).
const SPEED: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Move,
    Turn,
    Power,
    Stop,
    Quit,
}

pub struct KeywordInterpreter {
    patterns: Vec<(Pattern, Regex)>,
}

impl KeywordInterpreter {
    pub fn new() -> Result<Self, regex::Error> {
        let duration = r"(?:\s+for)?\s+(\d+(?:\.\d+)?)\s*(seconds?|secs?|s|minutes?|mins?)\b";
        let patterns = vec![
            (
                Pattern::Move,
                Regex::new(&format!(
                    r"^(?:move|go|walk|step)\s+(forwards?|ahead|backwards?|back|left|right){duration}"
                ))?,
            ),
            (
                Pattern::Turn,
                Regex::new(&format!(
                    r"^(?:turn|rotate|spin)\s+(left|right){duration}"
                ))?,
            ),
            (
                Pattern::Power,
                Regex::new(r"^(?:power|turn|switch)\s+(on|off)\b")?,
            ),
            (Pattern::Stop, Regex::new(r"^(?:stop|halt|freeze)\b")?),
            (Pattern::Quit, Regex::new(r"^(?:quit|exit|goodbye)\b")?),
        ];
        Ok(Self { patterns })
    }

    fn build(pattern: Pattern, caps: &Captures<'_>) -> Option<(&'static str, Map<String, Value>)> {
        let empty = Map::new();
        match pattern {
            Pattern::Move | Pattern::Turn => {
                let (v_x, v_y, v_rot) = match (pattern, caps.get(1)?.as_str()) {
                    (Pattern::Move, "forward" | "forwards" | "ahead") => (SPEED, 0.0, 0.0),
                    (Pattern::Move, "backward" | "backwards" | "back") => (-SPEED, 0.0, 0.0),
                    (Pattern::Move, "left") => (0.0, SPEED, 0.0),
                    (Pattern::Move, "right") => (0.0, -SPEED, 0.0),
                    (Pattern::Turn, "left") => (0.0, 0.0, SPEED),
                    (Pattern::Turn, "right") => (0.0, 0.0, -SPEED),
                    _ => return None,
                };
                let amount: f64 = caps.get(2)?.as_str().parse().ok()?;
                let seconds = if caps.get(3)?.as_str().starts_with('m') {
                    amount * 60.0
                } else {
                    amount
                };
                let args = json!({
                    "v_x": v_x,
                    "v_y": v_y,
                    "v_rot": v_rot,
                    "duration": seconds,
                });
                match args {
                    Value::Object(map) => Some(("move", map)),
                    _ => None,
                }
            }
            Pattern::Power => match caps.get(1)?.as_str() {
                "on" => Some(("power_on", empty)),
                _ => Some(("power_off", empty)),
            },
            Pattern::Stop => Some(("stop", empty)),
            Pattern::Quit => Some(("quit", empty)),
        }
    }
}

impl InterpreterClient for KeywordInterpreter {
    fn interpret(&mut self, text: &str) -> Result<Interpretation, InterpreterError> {
        let text = text.trim().to_lowercase();
        for (pattern, regex) in &self.patterns {
            if let Some(caps) = regex.captures(&text) {
                if let Some((name, args)) = Self::build(*pattern, &caps) {
                    tracing::debug!(?pattern, command = name, "keyword match");
                    return Ok(Interpretation::Invocation(Invocation::new(name, args, &text)));
                }
            }
        }
        Ok(Interpretation::PlainText(HELP.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(text: &str) -> Interpretation {
        KeywordInterpreter::new().unwrap().interpret(text).unwrap()
    }

    fn invocation(text: &str) -> Invocation {
        match interpret(text) {
            Interpretation::Invocation(inv) => inv,
            other => panic!("'{text}' gave {other:?}"),
        }
    }

    #[test]
    fn test_basic_commands() {
        let test_cases = vec![
            ("move forward for 5 seconds", "move"),
            ("walk back 3 secs", "move"),
            ("go left for 2 s", "move"),
            ("turn right for 4 seconds", "move"),
            ("power on", "power_on"),
            ("switch off", "power_off"),
            ("stop moving", "stop"),
            ("quit", "quit"),
        ];
        for (text, expected) in test_cases {
            assert_eq!(invocation(text).name, expected, "{text}");
        }
    }

    #[test]
    fn forward_five_seconds() {
        let inv = invocation("Move forward for 5 seconds");
        assert_eq!(inv.arguments["v_x"], json!(0.5));
        assert_eq!(inv.arguments["v_y"], json!(0.0));
        assert_eq!(inv.arguments["v_rot"], json!(0.0));
        assert_eq!(inv.arguments["duration"], json!(5.0));
        assert_eq!(inv.raw_text, "move forward for 5 seconds");
    }

    #[test]
    fn minutes_become_seconds() {
        let inv = invocation("walk right for 1 minute");
        assert_eq!(inv.arguments["v_y"], json!(-0.5));
        assert_eq!(inv.arguments["duration"], json!(60.0));
    }

    #[test]
    fn turns_set_rotation_only() {
        let inv = invocation("rotate left 2 seconds");
        assert_eq!(inv.arguments["v_x"], json!(0.0));
        assert_eq!(inv.arguments["v_rot"], json!(0.5));
    }

    #[test]
    fn unknown_phrases_get_help() {
        assert_eq!(
            interpret("make me a sandwich"),
            Interpretation::PlainText(HELP.to_string())
        );
        // a move without a duration is not guessed at
        assert!(matches!(
            interpret("move forward"),
            Interpretation::PlainText(_)
        ));
    }
}
