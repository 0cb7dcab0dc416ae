//! Parse command-line words into typed parameters for a command template.

use traci_core::command::Parameter;
use traci_core::value::{Position2D, TypeTag, Value};

/// Parse `raw` as a value of type `tag`.
///
/// Bytes also accept `true`/`false`; positions are written `x,y`.
pub fn parse_param(tag: TypeTag, raw: &str) -> Result<Parameter, String> {
    let bad = |e: &dyn std::fmt::Display| format!("cannot read {raw:?} as {tag}: {e}");
    match tag {
        TypeTag::Integer => raw.parse().map(Value::Integer).map_err(|e| bad(&e)),
        TypeTag::Double => raw.parse().map(Value::Double).map_err(|e| bad(&e)),
        TypeTag::String => Ok(Value::String(raw.to_owned())),
        TypeTag::StringList => Ok(Value::StringList(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )),
        TypeTag::Byte => match raw {
            "true" => Ok(Value::flag(true)),
            "false" => Ok(Value::flag(false)),
            _ => raw.parse().map(Value::Byte).map_err(|e| bad(&e)),
        },
        TypeTag::Position2D => {
            let (x, y) = raw
                .split_once(',')
                .ok_or_else(|| bad(&"expected x,y"))?;
            let x = x.trim().parse().map_err(|e| bad(&e))?;
            let y = y.trim().parse().map_err(|e| bad(&e))?;
            Ok(Value::Position2D(Position2D::new(x, y)))
        }
        other => Err(format!("{other} parameters cannot be given on the command line")),
    }
}

/// Parse one word per declared parameter type.
pub fn parse_params(types: &[TypeTag], raw: &[String]) -> Result<Vec<Parameter>, String> {
    if types.len() != raw.len() {
        return Err(format!("expected {} arguments, got {}", types.len(), raw.len()));
    }
    types
        .iter()
        .zip(raw)
        .map(|(tag, word)| parse_param(*tag, word))
        .collect()
}
