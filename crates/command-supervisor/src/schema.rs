//! Command argument schemas and per-argument validation

use serde_json::{json, Map, Value};

/// JSON type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Integer,
    String,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Inclusive upper bound; lower bound is exclusive when `min_exclusive`.
    Range {
        min: f64,
        max: f64,
        min_exclusive: bool,
    },
    /// Value must be one of the listed strings.
    OneOf(Vec<String>),
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Number(f64),
    Text(String),
}

impl ArgValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            ArgValue::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub constraints: Vec<Constraint>,
    pub description: String,
}

impl ParamSpec {
    fn new(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            constraints: Vec::new(),
            description: description.to_string(),
        }
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range {
            min,
            max,
            min_exclusive: false,
        });
        self
    }

    pub fn range_exclusive_min(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range {
            min,
            max,
            min_exclusive: true,
        });
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.constraints.push(Constraint::OneOf(
            allowed.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Type-check and constraint-check a raw JSON value. The error is a human reason.
    pub fn check(&self, raw: &Value) -> Result<ArgValue, String> {
        let value = match self.kind {
            ParamKind::Number => raw
                .as_f64()
                .map(ArgValue::Number)
                .ok_or_else(|| format!("expected a number, got {raw}"))?,
            ParamKind::Integer => match raw.as_i64() {
                Some(n) => ArgValue::Number(n as f64),
                None => match raw.as_f64() {
                    Some(n) if n.fract() == 0.0 => ArgValue::Number(n),
                    _ => return Err(format!("expected an integer, got {raw}")),
                },
            },
            ParamKind::String => raw
                .as_str()
                .map(|s| ArgValue::Text(s.to_string()))
                .ok_or_else(|| format!("expected a string, got {raw}"))?,
        };

        for constraint in &self.constraints {
            match (constraint, &value) {
                (
                    Constraint::Range {
                        min,
                        max,
                        min_exclusive,
                    },
                    ArgValue::Number(n),
                ) => {
                    let below = if *min_exclusive { *n <= *min } else { *n < *min };
                    if below || *n > *max {
                        let open = if *min_exclusive { '(' } else { '[' };
                        return Err(format!("{n} is outside {open}{min}, {max}]"));
                    }
                }
                (Constraint::OneOf(allowed), ArgValue::Text(s)) => {
                    if !allowed.iter().any(|a| a == s) {
                        return Err(format!(
                            "\"{s}\" is not one of {}",
                            allowed.join(", ")
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(value)
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.kind.json_type()));
        prop.insert("description".into(), json!(self.description));
        for constraint in &self.constraints {
            match constraint {
                Constraint::Range {
                    min,
                    max,
                    min_exclusive,
                } => {
                    let key = if *min_exclusive {
                        "exclusiveMinimum"
                    } else {
                        "minimum"
                    };
                    prop.insert(key.into(), json!(min));
                    prop.insert("maximum".into(), json!(max));
                }
                Constraint::OneOf(allowed) => {
                    prop.insert("enum".into(), json!(allowed));
                }
            }
        }
        Value::Object(prop)
    }
}

/// Time units a duration argument may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
}

impl TimeUnit {
    pub const NAMES: [&'static str; 2] = ["seconds", "minutes"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seconds" => Some(TimeUnit::Seconds),
            "minutes" => Some(TimeUnit::Minutes),
            _ => None,
        }
    }

    pub fn to_seconds(&self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value,
            TimeUnit::Minutes => value * 60.0,
        }
    }
}

/// Which arguments of a command describe how long it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationSpec {
    pub value_param: String,
    /// Parameter naming a [`TimeUnit`]; seconds when absent.
    pub unit_param: Option<String>,
}

/// A registered command: name, description and ordered argument schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub duration: Option<DurationSpec>,
}

impl Command {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
            duration: None,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn duration_from(mut self, value_param: &str, unit_param: Option<&str>) -> Self {
        self.duration = Some(DurationSpec {
            value_param: value_param.to_string(),
            unit_param: unit_param.map(str::to_string),
        });
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Render as a function-calling tool definition for the interpreter.
    pub fn to_tool(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}
