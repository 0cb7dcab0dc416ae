//! Binary frame encoding and decoding for the simulation control protocol.
//!
//! # Request Frame (Big Endian)
//!
//! ```text
//! [u32 total_len] [u8 command_group] [u8 variable] [u32 target_len][target]
//! repeated: [u8 TypeTag][value body]
//! ```
//!
//! # Response Frame
//!
//! ```text
//! [u32 total_len]
//! [u8 status_group] [u8 status_code] [u32 desc_len][description]
//! [u8 result_group] [u8 TypeTag][value body]      (success only, when applicable)
//! ```
//!
//! Unlike many length-prefixed protocols, `total_len` counts the 4-byte
//! length field itself. A frame is therefore never shorter than 4 bytes.
//!
//! # Example
//!
//! ```
//! use traci_core::protocol::{decode_response, encode_request, encode_response, DecodedValue, ResponseFrame};
//! use traci_core::simulation;
//! use traci_core::value::Value;
//!
//! let cmd = simulation::current_time();
//! let wire = encode_request(&cmd).unwrap();
//! assert_eq!(u32::from_be_bytes(wire[..4].try_into().unwrap()) as usize, wire.len());
//!
//! let reply = ResponseFrame::success(&cmd, Value::Integer(3_600_000));
//! let frame = encode_response(&reply).unwrap();
//! assert_eq!(
//!     decode_response(&frame, &cmd).unwrap(),
//!     DecodedValue::Value(Value::Integer(3_600_000)),
//! );
//! ```

use std::fmt;

use thiserror::Error;

use crate::command::CommandDescriptor;
use crate::constants::status;
use crate::value::{encode_value, write_string, Cursor, TypeTag, Value};

/// Size of the length prefix that starts every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default upper bound for a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during protocol encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A parameter cannot be represented on the wire.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The buffer does not contain enough bytes for the expected data.
    #[error("insufficient data in buffer")]
    InsufficientData,

    /// A string field contains invalid UTF-8.
    #[error("invalid UTF-8 in string field")]
    Utf8Error,

    /// The type tag byte does not correspond to any known value kind.
    #[error("unknown type tag: 0x{0:02X}")]
    UnknownTypeTag(u8),

    /// The status code byte is not one the protocol defines.
    #[error("unknown status code: 0x{0:02X}")]
    UnknownStatus(u8),

    /// The payload is structurally invalid.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The declared frame length disagrees with the bytes supplied.
    #[error("frame declares {declared} bytes but {actual} were supplied")]
    LengthMismatch { declared: u32, actual: usize },

    /// A frame exceeds the configured size limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: u32 },

    /// Bytes remain after the last expected field.
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    /// A successful response carried no result section, but one was expected.
    #[error("response has no result section")]
    MissingResult,

    /// The status section belongs to a different command group.
    #[error("status for command group 0x{actual:02X}, expected 0x{expected:02X}")]
    StatusGroupMismatch { expected: u8, actual: u8 },

    /// The result section belongs to a different response group.
    #[error("result group 0x{actual:02X}, expected 0x{expected:02X}")]
    ResponseGroupMismatch { expected: u8, actual: u8 },

    /// The value on the wire is not of the expected kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    /// The simulator rejected the command.
    #[error("simulator reported {code}: {description}")]
    Status { code: StatusCode, description: String },
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome reported in the status section of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    NotImplemented,
    Error,
}

impl StatusCode {
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            status::OK => Ok(StatusCode::Ok),
            status::NOT_IMPLEMENTED => Ok(StatusCode::NotImplemented),
            status::ERR => Ok(StatusCode::Error),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            StatusCode::Ok => status::OK,
            StatusCode::NotImplemented => status::NOT_IMPLEMENTED,
            StatusCode::Error => status::ERR,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "ok"),
            StatusCode::NotImplemented => write!(f, "not implemented"),
            StatusCode::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame types
// ---------------------------------------------------------------------------

/// A request as seen on the wire, without the response contract.
///
/// This is what the simulator side recovers from an encoded
/// [`CommandDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    pub command_group: u8,
    pub variable: u8,
    pub target: String,
    pub parameters: Vec<Value>,
}

/// The typed result section of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSection {
    pub group: u8,
    pub value: Value,
}

/// A complete response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub status_group: u8,
    pub status: StatusCode,
    pub description: String,
    pub result: Option<ResultSection>,
}

impl ResponseFrame {
    /// A successful reply to `cmd` carrying `value` in its expected group.
    pub fn success(cmd: &CommandDescriptor, value: Value) -> Self {
        Self {
            status_group: cmd.command_group(),
            status: StatusCode::Ok,
            description: String::new(),
            result: cmd
                .expected_response_group()
                .map(|group| ResultSection { group, value }),
        }
    }

    /// A status-only acknowledgement of `cmd`.
    pub fn ack(cmd: &CommandDescriptor) -> Self {
        Self {
            status_group: cmd.command_group(),
            status: StatusCode::Ok,
            description: String::new(),
            result: None,
        }
    }

    /// A failure reply to `cmd`.
    pub fn failure(cmd: &CommandDescriptor, description: impl Into<String>) -> Self {
        Self {
            status_group: cmd.command_group(),
            status: StatusCode::Error,
            description: description.into(),
            result: None,
        }
    }
}

/// The outcome of a successfully decoded response.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Status-only success, as returned by setters.
    Ack,
    /// A typed result value.
    Value(Value),
}

impl DecodedValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            DecodedValue::Ack => None,
            DecodedValue::Value(v) => Some(v),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            DecodedValue::Ack => None,
            DecodedValue::Value(v) => Some(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

/// Prepend the length prefix to a frame body.
///
/// The prefix counts itself, so the returned buffer's first four bytes equal
/// its total length.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let total = LENGTH_PREFIX_SIZE + body.len();
    let declared = u32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge {
        size: total,
        max: u32::MAX,
    })?;
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&declared.to_be_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Read the total frame length from a 4-byte BE header.
pub fn read_frame_length(header: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*header)
}

/// Verify the length prefix of a complete frame and return its body.
fn frame_body(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    let header: &[u8; 4] = frame
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(ProtocolError::InsufficientData)?;
    let declared = read_frame_length(header);
    if declared as usize != frame.len() {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }
    Ok(&frame[LENGTH_PREFIX_SIZE..])
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Encode a [`CommandDescriptor`] into a complete request frame.
///
/// The body is built first; the length prefix is computed from it last.
pub fn encode_request(cmd: &CommandDescriptor) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    body.push(cmd.command_group());
    body.push(cmd.variable());
    write_string(&mut body, cmd.target())?;
    for param in cmd.parameters() {
        encode_value(&mut body, param)?;
    }
    encode_frame(&body)
}

/// Decode a complete request frame (length prefix included).
pub fn decode_request(frame: &[u8]) -> Result<RequestFrame, ProtocolError> {
    let mut cur = Cursor::new(frame_body(frame)?);
    let command_group = cur.read_u8()?;
    let variable = cur.read_u8()?;
    let target = cur.read_string()?;
    let mut parameters = Vec::new();
    while cur.remaining() > 0 {
        parameters.push(cur.read_tagged_value()?);
    }
    Ok(RequestFrame {
        command_group,
        variable,
        target,
        parameters,
    })
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Encode a [`ResponseFrame`] into a complete frame.
pub fn encode_response(resp: &ResponseFrame) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    body.push(resp.status_group);
    body.push(resp.status.as_u8());
    write_string(&mut body, &resp.description)?;
    if let Some(result) = &resp.result {
        body.push(result.group);
        encode_value(&mut body, &result.value)?;
    }
    encode_frame(&body)
}

/// Parse a response frame without a command to check it against.
///
/// As with [`decode_response`], the result section is only read when the
/// status is [`StatusCode::Ok`].
pub fn parse_response(frame: &[u8]) -> Result<ResponseFrame, ProtocolError> {
    let mut cur = Cursor::new(frame_body(frame)?);
    let status_group = cur.read_u8()?;
    let status = StatusCode::from_u8(cur.read_u8()?)?;
    let description = cur.read_string()?;

    let result = if status == StatusCode::Ok && cur.remaining() > 0 {
        let group = cur.read_u8()?;
        let value = cur.read_tagged_value()?;
        if cur.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(cur.remaining()));
        }
        Some(ResultSection { group, value })
    } else {
        None
    };

    Ok(ResponseFrame {
        status_group,
        status,
        description,
        result,
    })
}

/// Decode a complete response frame and validate it against `cmd`.
///
/// A non-success status fails with [`ProtocolError::Status`] before any byte
/// of the result section is looked at. Otherwise the result group and value
/// type must match the command's expectations.
pub fn decode_response(frame: &[u8], cmd: &CommandDescriptor) -> Result<DecodedValue, ProtocolError> {
    let mut cur = Cursor::new(frame_body(frame)?);

    let status_group = cur.read_u8()?;
    let code = StatusCode::from_u8(cur.read_u8()?)?;
    let description = cur.read_string()?;
    if status_group != cmd.command_group() {
        return Err(ProtocolError::StatusGroupMismatch {
            expected: cmd.command_group(),
            actual: status_group,
        });
    }
    if code != StatusCode::Ok {
        return Err(ProtocolError::Status { code, description });
    }

    if cur.remaining() == 0 {
        return match cmd.expected_response_group() {
            Some(_) => Err(ProtocolError::MissingResult),
            None => Ok(DecodedValue::Ack),
        };
    }

    let group = cur.read_u8()?;
    if let Some(expected) = cmd.expected_response_group() {
        if group != expected {
            return Err(ProtocolError::ResponseGroupMismatch {
                expected,
                actual: group,
            });
        }
    }

    let value = match cmd.expected_response_type() {
        Some(expected) => cur.read_expected_value(expected)?,
        None => cur.read_tagged_value()?,
    };
    if cur.remaining() > 0 {
        return Err(ProtocolError::TrailingBytes(cur.remaining()));
    }
    Ok(DecodedValue::Value(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{cmd, tag, var};
    use crate::simulation;
    use crate::value::{BoundingBox, Position2D};

    // -- helper: re-decode every encoded request ----------------------------

    fn round_trip_request(cmd: &CommandDescriptor) -> RequestFrame {
        let wire = encode_request(cmd).unwrap();
        let len = read_frame_length(wire[..4].try_into().unwrap()) as usize;
        assert_eq!(len, wire.len());
        let decoded = decode_request(&wire).expect("decode_request failed");
        assert_eq!(decoded.command_group, cmd.command_group());
        assert_eq!(decoded.variable, cmd.variable());
        assert_eq!(decoded.target, cmd.target());
        assert_eq!(decoded.parameters, cmd.parameters());
        decoded
    }

    fn reply(resp: &ResponseFrame) -> Vec<u8> {
        encode_response(resp).unwrap()
    }

    // -- Frame length invariant ---------------------------------------------

    #[test]
    fn every_registered_command_round_trips() {
        for template in simulation::registry().templates() {
            let target = if template.takes_target() { "edge_0" } else { "" };
            let args = template
                .parameters()
                .iter()
                .map(|t| sample_value(*t))
                .collect();
            let cmd = template.build(target, args).unwrap();
            round_trip_request(&cmd);
        }
    }

    fn sample_value(tag: TypeTag) -> Value {
        match tag {
            TypeTag::Integer => Value::Integer(-1),
            TypeTag::Double => Value::Double(-0.25),
            TypeTag::String => Value::String("route_a".into()),
            TypeTag::StringList => Value::StringList(vec![]),
            TypeTag::Byte => Value::Byte(1),
            TypeTag::Position2D => Value::Position2D(Position2D::new(1.0, 2.0)),
            TypeTag::BoundingBox => Value::BoundingBox(BoundingBox::default()),
            _ => Value::Compound(vec![]),
        }
    }

    #[test]
    fn current_time_wire_format() {
        let wire = encode_request(&simulation::current_time()).unwrap();
        // 4 (length) + 1 (group) + 1 (variable) + 4 (empty target) = 10
        assert_eq!(
            wire,
            vec![0, 0, 0, 10, cmd::GET_SIM_VARIABLE, var::TIME_STEP, 0, 0, 0, 0]
        );
    }

    #[test]
    fn convert_2d_parameter_order() {
        let cmd = simulation::convert_2d("e12", 12.5, 1, true).unwrap();
        let wire = encode_request(&cmd).unwrap();

        // header + group + variable + target "e12"
        let params = &wire[4 + 2 + 4 + 3..];
        let mut expected = vec![tag::DOUBLE];
        expected.extend_from_slice(&12.5f64.to_be_bytes());
        expected.extend_from_slice(&[tag::UBYTE, 1, tag::UBYTE, 1]);
        assert_eq!(params, expected.as_slice());

        let decoded = round_trip_request(&cmd);
        assert_eq!(decoded.target, "e12");
        assert_eq!(
            decoded.parameters,
            vec![Value::Double(12.5), Value::Byte(1), Value::Byte(1)]
        );
    }

    #[test]
    fn distance_2d_flattens_positions_and_flags() {
        let cmd = simulation::distance_2d(
            Position2D::new(0.0, 0.0),
            Position2D::new(3.0, 4.0),
            false,
            true,
        );
        let decoded = round_trip_request(&cmd);
        assert_eq!(decoded.target, "");
        assert_eq!(
            decoded.parameters,
            vec![
                Value::Position2D(Position2D::new(0.0, 0.0)),
                Value::Position2D(Position2D::new(3.0, 4.0)),
                Value::Byte(0),
                Value::Byte(1),
            ]
        );
    }

    #[test]
    fn save_state_uses_set_group() {
        let cmd = simulation::save_state("state.xml");
        let decoded = round_trip_request(&cmd);
        assert_eq!(decoded.command_group, cmd::SET_SIM_VARIABLE);
        assert_eq!(decoded.variable, var::SAVE_SIMSTATE);
        assert_eq!(decoded.parameters, vec![Value::String("state.xml".into())]);
        assert_eq!(cmd.expected_response_group(), None);
        assert_eq!(cmd.expected_response_type(), None);
    }

    // -- Response decoding --------------------------------------------------

    #[test]
    fn current_time_response_decodes() {
        let cmd = simulation::current_time();
        let frame = reply(&ResponseFrame::success(&cmd, Value::Integer(3_600_000)));
        assert_eq!(
            decode_response(&frame, &cmd),
            Ok(DecodedValue::Value(Value::Integer(3_600_000)))
        );
    }

    #[test]
    fn save_state_ack_has_no_value() {
        let cmd = simulation::save_state("state.xml");
        let frame = reply(&ResponseFrame::ack(&cmd));
        let decoded = decode_response(&frame, &cmd).unwrap();
        assert_eq!(decoded, DecodedValue::Ack);
        assert_eq!(decoded.value(), None);
    }

    #[test]
    fn wrong_wire_type_is_a_type_mismatch() {
        let cmd = simulation::current_time();
        let frame = reply(&ResponseFrame::success(&cmd, Value::Double(3600.0)));
        assert_eq!(
            decode_response(&frame, &cmd),
            Err(ProtocolError::TypeMismatch {
                expected: TypeTag::Integer,
                actual: TypeTag::Double,
            })
        );
    }

    #[test]
    fn type_mismatch_for_every_wrong_tag() {
        let cmd = simulation::net_boundary();
        let others = [
            Value::Integer(0),
            Value::Double(0.0),
            Value::String(String::new()),
            Value::StringList(vec![]),
            Value::Byte(0),
            Value::Position2D(Position2D::default()),
            Value::Compound(vec![]),
        ];
        for value in others {
            let actual = value.type_tag();
            let frame = reply(&ResponseFrame::success(&cmd, value));
            assert_eq!(
                decode_response(&frame, &cmd),
                Err(ProtocolError::TypeMismatch {
                    expected: TypeTag::BoundingBox,
                    actual,
                })
            );
        }
    }

    #[test]
    fn failure_status_wins_over_result_bytes() {
        let cmd = simulation::current_time();
        // A failure status followed by a result section whose tag is garbage.
        let mut body = vec![cmd::GET_SIM_VARIABLE, status::ERR];
        write_string(&mut body, "no simulation loaded").unwrap();
        body.extend_from_slice(&[cmd::RESPONSE_GET_SIM_VARIABLE, 0xEE, 1, 2, 3]);
        let frame = encode_frame(&body).unwrap();

        assert_eq!(
            decode_response(&frame, &cmd),
            Err(ProtocolError::Status {
                code: StatusCode::Error,
                description: "no simulation loaded".into(),
            })
        );
    }

    #[test]
    fn not_implemented_status_is_reported() {
        let cmd = simulation::bus_stop_waiting();
        let mut resp = ResponseFrame::failure(&cmd, "unsupported");
        resp.status = StatusCode::NotImplemented;
        assert!(matches!(
            decode_response(&reply(&resp), &cmd),
            Err(ProtocolError::Status {
                code: StatusCode::NotImplemented,
                ..
            })
        ));
    }

    #[test]
    fn wrong_result_group_is_rejected() {
        let cmd = simulation::current_time();
        let mut resp = ResponseFrame::success(&cmd, Value::Integer(1));
        resp.result = Some(ResultSection {
            group: 0x11,
            value: Value::Integer(1),
        });
        assert_eq!(
            decode_response(&reply(&resp), &cmd),
            Err(ProtocolError::ResponseGroupMismatch {
                expected: cmd::RESPONSE_GET_SIM_VARIABLE,
                actual: 0x11,
            })
        );
    }

    #[test]
    fn status_for_another_command_is_rejected() {
        let cmd = simulation::current_time();
        let other = simulation::save_state("x.xml");
        assert_eq!(
            decode_response(&reply(&ResponseFrame::ack(&other)), &cmd),
            Err(ProtocolError::StatusGroupMismatch {
                expected: cmd::GET_SIM_VARIABLE,
                actual: cmd::SET_SIM_VARIABLE,
            })
        );
    }

    #[test]
    fn missing_result_for_getter_is_rejected() {
        let cmd = simulation::departed_ids();
        assert_eq!(
            decode_response(&reply(&ResponseFrame::ack(&cmd)), &cmd),
            Err(ProtocolError::MissingResult)
        );
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let cmd = simulation::current_time();
        let mut frame = reply(&ResponseFrame::success(&cmd, Value::Integer(5)));
        frame.push(0);
        assert_eq!(
            decode_response(&frame, &cmd),
            Err(ProtocolError::LengthMismatch {
                declared: (frame.len() - 1) as u32,
                actual: frame.len(),
            })
        );
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let cmd = simulation::current_time();
        let frame = reply(&ResponseFrame::success(&cmd, Value::Integer(5)));
        assert!(decode_response(&frame[..frame.len() - 2], &cmd).is_err());
        assert_eq!(decode_response(&[0, 0], &cmd), Err(ProtocolError::InsufficientData));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut body = vec![cmd::GET_SIM_VARIABLE, 0x42];
        write_string(&mut body, "").unwrap();
        let frame = encode_frame(&body).unwrap();
        assert_eq!(
            decode_response(&frame, &simulation::current_time()),
            Err(ProtocolError::UnknownStatus(0x42))
        );
    }

    #[test]
    fn parse_response_round_trip() {
        let cmd = simulation::arrived_ids();
        let resp = ResponseFrame::success(&cmd, Value::StringList(vec!["v1".into(), "v2".into()]));
        assert_eq!(parse_response(&reply(&resp)).unwrap(), resp);

        let failed = ResponseFrame::failure(&cmd, "boom");
        assert_eq!(parse_response(&reply(&failed)).unwrap(), failed);
    }

    // -- Frame helpers ------------------------------------------------------

    #[test]
    fn frame_length_counts_itself() {
        let frame = encode_frame(b"hello").unwrap();
        assert_eq!(frame.len(), 4 + 5);
        assert_eq!(read_frame_length(frame[..4].try_into().unwrap()), 9);
    }

    #[test]
    fn empty_frame_is_four_bytes() {
        let frame = encode_frame(&[]).unwrap();
        assert_eq!(frame, vec![0, 0, 0, 4]);
    }

    #[test]
    fn status_code_round_trip() {
        for code in [StatusCode::Ok, StatusCode::NotImplemented, StatusCode::Error] {
            assert_eq!(StatusCode::from_u8(code.as_u8()).unwrap(), code);
        }
    }
}
