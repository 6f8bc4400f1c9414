//! Path and hop definitions

use crate::error::PathError;
use fabric_wire::{Action, ActionList, Match, DEFAULT_FLOW_PRIORITY, OFPP_MAX};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One switch-local forwarding instruction within a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    datapath_id: u64,
    in_port: u16,
    out_port: u16,
    actions: ActionList,
}

impl Hop {
    /// Create a hop with no extra actions
    pub fn new(datapath_id: u64, in_port: u16, out_port: u16) -> Self {
        Self {
            datapath_id,
            in_port,
            out_port,
            actions: ActionList::new(),
        }
    }

    /// Add one action applied before the output
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add actions applied before the output
    pub fn with_actions<I: IntoIterator<Item = Action>>(mut self, actions: I) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Switch this hop runs on
    pub fn datapath_id(&self) -> u64 {
        self.datapath_id
    }

    /// Port traffic enters the switch on
    pub fn in_port(&self) -> u16 {
        self.in_port
    }

    /// Port traffic leaves the switch on
    pub fn out_port(&self) -> u16 {
        self.out_port
    }

    /// Extra actions, possibly empty
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

impl TryFrom<&Value> for Hop {
    type Error = PathError;

    /// Parse `{"datapath_id", "in_port", "out_port", "actions"?}`
    ///
    /// `actions` may be absent, null, a single action object or an array of
    /// action objects. Ports must be physical; reserved numbers above
    /// `OFPP_MAX` are out of range.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = as_mapping(value, "hop")?;

        let datapath_id = integer_field(object, "datapath_id", u64::MAX)?;
        let in_port = integer_field(object, "in_port", u64::from(OFPP_MAX))? as u16;
        let out_port = integer_field(object, "out_port", u64::from(OFPP_MAX))? as u16;

        let actions = match object.get("actions") {
            None | Some(Value::Null) => ActionList::new(),
            Some(single @ Value::Object(_)) => std::iter::once(parse_action(single, "actions")?).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_action(item, &format!("actions[{}]", i)))
                .collect::<Result<ActionList, _>>()?,
            Some(other) => {
                return Err(PathError::InvalidType {
                    field: "actions".to_string(),
                    expected: "action or array of actions",
                    found: kind_of(other),
                })
            }
        };

        Ok(Self {
            datapath_id,
            in_port,
            out_port,
            actions,
        })
    }
}

/// Timeout and priority policy for the flow entries of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOptions {
    /// Base idle timeout in seconds
    pub idle_timeout: u16,
    /// Hard timeout in seconds, 0 = none
    pub hard_timeout: u16,
    /// Flow priority
    pub priority: u16,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            idle_timeout: 0,
            hard_timeout: 0,
            priority: DEFAULT_FLOW_PRIORITY,
        }
    }
}

impl PathOptions {
    /// Create path options
    pub fn new(idle_timeout: u16, hard_timeout: u16, priority: u16) -> Self {
        Self {
            idle_timeout,
            hard_timeout,
            priority,
        }
    }
}

impl TryFrom<&Value> for PathOptions {
    type Error = PathError;

    /// Parse a mapping with optional `idle_timeout`, `hard_timeout`, `priority`
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = as_mapping(value, "options")?;
        let defaults = Self::default();
        let max = u64::from(u16::MAX);

        let field = |name: &str, default: u16| -> Result<u16, PathError> {
            if object.contains_key(name) {
                Ok(integer_field(object, name, max)? as u16)
            } else {
                Ok(default)
            }
        };

        Ok(Self {
            idle_timeout: field("idle_timeout", defaults.idle_timeout)?,
            hard_timeout: field("hard_timeout", defaults.hard_timeout)?,
            priority: field("priority", defaults.priority)?,
        })
    }
}

/// Ordered hops from the ingress switch to the egress switch
///
/// Hops are kept in append order, which is forwarding order. There is no
/// way to reorder or remove them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    match_: Match,
    options: PathOptions,
    hops: Vec<Hop>,
}

impl Path {
    /// Empty path for traffic matching `match_`
    pub fn new(match_: Match, options: PathOptions) -> Self {
        Self {
            match_,
            options,
            hops: Vec::new(),
        }
    }

    /// Append the next hop towards the egress
    pub fn append_hop(&mut self, hop: Hop) -> &mut Self {
        self.hops.push(hop);
        self
    }

    /// Append a sequence of hops, in order
    pub fn append_hops<I: IntoIterator<Item = Hop>>(&mut self, hops: I) -> &mut Self {
        self.hops.extend(hops);
        self
    }

    /// Hops in forwarding order
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Egress hop
    pub fn last_hop(&self) -> Option<&Hop> {
        self.hops.last()
    }

    /// Match the path was computed for
    pub fn match_(&self) -> &Match {
        &self.match_
    }

    /// Timeout policy
    pub fn options(&self) -> &PathOptions {
        &self.options
    }

    /// Number of hops
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// No hops appended yet
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

fn as_mapping<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, PathError> {
    value.as_object().ok_or_else(|| PathError::InvalidType {
        field: field.to_string(),
        expected: "mapping",
        found: kind_of(value),
    })
}

fn integer_field(object: &Map<String, Value>, name: &str, max: u64) -> Result<u64, PathError> {
    let value = object
        .get(name)
        .ok_or_else(|| PathError::MissingField(name.to_string()))?;

    let Value::Number(number) = value else {
        return Err(PathError::InvalidType {
            field: name.to_string(),
            expected: "integer",
            found: kind_of(value),
        });
    };

    let out_of_range = || PathError::OutOfRange {
        field: name.to_string(),
        value: number.to_string(),
        max,
    };

    if let Some(unsigned) = number.as_u64() {
        return if unsigned <= max { Ok(unsigned) } else { Err(out_of_range()) };
    }
    if number.as_i64().is_some() {
        // only negative integers fail as_u64
        return Err(out_of_range());
    }

    Err(PathError::InvalidType {
        field: name.to_string(),
        expected: "integer",
        found: "float",
    })
}

fn parse_action(value: &Value, field: &str) -> Result<Action, PathError> {
    if !value.is_object() {
        return Err(PathError::InvalidType {
            field: field.to_string(),
            expected: "action",
            found: kind_of(value),
        });
    }
    serde_json::from_value(value.clone()).map_err(|_| PathError::InvalidType {
        field: field.to_string(),
        expected: "action",
        found: "object",
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
