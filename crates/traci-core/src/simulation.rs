//! Simulation-wide commands: time, vehicle counters, coordinate conversion,
//! distances and state persistence.
//!
//! Each function builds a [`CommandDescriptor`] from the matching template in
//! [`registry`]. None of them touch the network; pass the result to
//! [`SimClient::execute`](crate::client::SimClient::execute).
//!
//! # Example
//!
//! ```
//! use traci_core::constants::{cmd, var};
//! use traci_core::simulation;
//!
//! let cmd = simulation::current_time();
//! assert_eq!(cmd.command_group(), cmd::GET_SIM_VARIABLE);
//! assert_eq!(cmd.variable(), var::TIME_STEP);
//! assert!(cmd.target().is_empty());
//! ```

use crate::command::{CommandDescriptor, CommandError, CommandTemplate, Registry};
use crate::constants::{cmd, distance, tag, var};
use crate::value::{Position2D, TypeTag, Value};

const GET: u8 = cmd::GET_SIM_VARIABLE;
const SET: u8 = cmd::SET_SIM_VARIABLE;
const RESPONSE: u8 = cmd::RESPONSE_GET_SIM_VARIABLE;

const fn get(name: &'static str, variable: u8, response_type: TypeTag) -> CommandTemplate {
    CommandTemplate::getter(name, GET, variable, RESPONSE, response_type)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub static CURRENT_TIME: CommandTemplate = get("current_time", var::TIME_STEP, TypeTag::Integer);
pub static DELTA_T: CommandTemplate = get("delta_t", var::DELTA_T, TypeTag::Integer);

pub static LOADED_NUMBER: CommandTemplate =
    get("loaded_number", var::LOADED_VEHICLES_NUMBER, TypeTag::Integer);
pub static LOADED_IDS: CommandTemplate =
    get("loaded_ids", var::LOADED_VEHICLES_IDS, TypeTag::StringList);
pub static DEPARTED_NUMBER: CommandTemplate =
    get("departed_number", var::DEPARTED_VEHICLES_NUMBER, TypeTag::Integer);
pub static DEPARTED_IDS: CommandTemplate =
    get("departed_ids", var::DEPARTED_VEHICLES_IDS, TypeTag::StringList);
pub static ARRIVED_NUMBER: CommandTemplate =
    get("arrived_number", var::ARRIVED_VEHICLES_NUMBER, TypeTag::Integer);
pub static ARRIVED_IDS: CommandTemplate =
    get("arrived_ids", var::ARRIVED_VEHICLES_IDS, TypeTag::StringList);
pub static STARTING_TELEPORT_NUMBER: CommandTemplate = get(
    "starting_teleport_number",
    var::TELEPORT_STARTING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static STARTING_TELEPORT_IDS: CommandTemplate = get(
    "starting_teleport_ids",
    var::TELEPORT_STARTING_VEHICLES_IDS,
    TypeTag::StringList,
);
pub static ENDING_TELEPORT_NUMBER: CommandTemplate = get(
    "ending_teleport_number",
    var::TELEPORT_ENDING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static ENDING_TELEPORT_IDS: CommandTemplate = get(
    "ending_teleport_ids",
    var::TELEPORT_ENDING_VEHICLES_IDS,
    TypeTag::StringList,
);
pub static PARKING_STARTING_NUMBER: CommandTemplate = get(
    "parking_starting_number",
    var::PARKING_STARTING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static PARKING_STARTING_IDS: CommandTemplate = get(
    "parking_starting_ids",
    var::PARKING_STARTING_VEHICLES_IDS,
    TypeTag::StringList,
);
pub static PARKING_ENDING_NUMBER: CommandTemplate = get(
    "parking_ending_number",
    var::PARKING_ENDING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static PARKING_ENDING_IDS: CommandTemplate = get(
    "parking_ending_ids",
    var::PARKING_ENDING_VEHICLES_IDS,
    TypeTag::StringList,
);
pub static STOP_STARTING_NUMBER: CommandTemplate = get(
    "stop_starting_number",
    var::STOP_STARTING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static STOP_STARTING_IDS: CommandTemplate = get(
    "stop_starting_ids",
    var::STOP_STARTING_VEHICLES_IDS,
    TypeTag::StringList,
);
pub static STOP_ENDING_NUMBER: CommandTemplate = get(
    "stop_ending_number",
    var::STOP_ENDING_VEHICLES_NUMBER,
    TypeTag::Integer,
);
pub static STOP_ENDING_IDS: CommandTemplate =
    get("stop_ending_ids", var::STOP_ENDING_VEHICLES_IDS, TypeTag::StringList);
pub static MIN_EXPECTED_NUMBER: CommandTemplate =
    get("min_expected_number", var::MIN_EXPECTED_VEHICLES, TypeTag::Integer);
pub static BUS_STOP_WAITING: CommandTemplate =
    get("bus_stop_waiting", var::BUS_STOP_WAITING, TypeTag::Integer);
pub static NET_BOUNDARY: CommandTemplate =
    get("net_boundary", var::NET_BOUNDING_BOX, TypeTag::BoundingBox);

/// Road position (pos, lane, to_geo). The flag selects the result kind.
const ROAD_CONVERSION: &[TypeTag] = &[TypeTag::Double, TypeTag::Byte, TypeTag::Byte];
/// (from-type, x, y, to-type).
const GEO_CONVERSION: &[TypeTag] = &[TypeTag::Byte, TypeTag::Double, TypeTag::Double, TypeTag::Byte];

pub static CONVERT_2D: CommandTemplate =
    get("convert_2d", var::POSITION_CONVERSION, TypeTag::Position2D)
        .with_target()
        .with_parameters(ROAD_CONVERSION);
pub static CONVERT_2D_GEO: CommandTemplate =
    get("convert_2d_geo", var::POSITION_CONVERSION, TypeTag::PositionLonLat)
        .with_target()
        .with_parameters(ROAD_CONVERSION);
pub static CONVERT_3D: CommandTemplate =
    get("convert_3d", var::POSITION_CONVERSION, TypeTag::Position3D)
        .with_target()
        .with_parameters(ROAD_CONVERSION);
pub static CONVERT_3D_GEO: CommandTemplate =
    get("convert_3d_geo", var::POSITION_CONVERSION, TypeTag::PositionLonLatAlt)
        .with_target()
        .with_parameters(ROAD_CONVERSION);
pub static CONVERT_TO_GEO: CommandTemplate =
    get("convert_to_geo", var::POSITION_CONVERSION, TypeTag::PositionLonLat)
        .with_parameters(GEO_CONVERSION);
pub static CONVERT_FROM_GEO: CommandTemplate =
    get("convert_from_geo", var::POSITION_CONVERSION, TypeTag::Position2D)
        .with_parameters(GEO_CONVERSION);
pub static CONVERT_ROAD: CommandTemplate = get("convert_road", var::POSITION, TypeTag::Position2D)
    .with_parameters(&[TypeTag::Double, TypeTag::Double, TypeTag::Byte]);

pub static DISTANCE_2D: CommandTemplate = get("distance_2d", var::DISTANCE_REQUEST, TypeTag::Double)
    .with_parameters(&[
        TypeTag::Position2D,
        TypeTag::Position2D,
        TypeTag::Byte,
        TypeTag::Byte,
    ]);
pub static DISTANCE_ROAD: CommandTemplate =
    get("distance_road", var::DISTANCE_REQUEST, TypeTag::Double).with_parameters(&[
        TypeTag::String,
        TypeTag::Double,
        TypeTag::String,
        TypeTag::Double,
        TypeTag::Byte,
    ]);

pub static CLEAR_PENDING: CommandTemplate =
    CommandTemplate::setter("clear_pending", SET, var::CLEAR_PENDING_VEHICLES, &[TypeTag::String]);
pub static SAVE_STATE: CommandTemplate =
    CommandTemplate::setter("save_state", SET, var::SAVE_SIMSTATE, &[TypeTag::String]);

static REGISTRY: Registry = Registry::new(&[
    &CURRENT_TIME,
    &DELTA_T,
    &LOADED_NUMBER,
    &LOADED_IDS,
    &DEPARTED_NUMBER,
    &DEPARTED_IDS,
    &ARRIVED_NUMBER,
    &ARRIVED_IDS,
    &STARTING_TELEPORT_NUMBER,
    &STARTING_TELEPORT_IDS,
    &ENDING_TELEPORT_NUMBER,
    &ENDING_TELEPORT_IDS,
    &PARKING_STARTING_NUMBER,
    &PARKING_STARTING_IDS,
    &PARKING_ENDING_NUMBER,
    &PARKING_ENDING_IDS,
    &STOP_STARTING_NUMBER,
    &STOP_STARTING_IDS,
    &STOP_ENDING_NUMBER,
    &STOP_ENDING_IDS,
    &MIN_EXPECTED_NUMBER,
    &BUS_STOP_WAITING,
    &NET_BOUNDARY,
    &CONVERT_2D,
    &CONVERT_2D_GEO,
    &CONVERT_3D,
    &CONVERT_3D_GEO,
    &CONVERT_TO_GEO,
    &CONVERT_FROM_GEO,
    &CONVERT_ROAD,
    &DISTANCE_2D,
    &DISTANCE_ROAD,
    &CLEAR_PENDING,
    &SAVE_STATE,
]);

/// All simulation commands, keyed by name.
pub fn registry() -> Registry {
    REGISTRY
}

// ---------------------------------------------------------------------------
// Getters
// ---------------------------------------------------------------------------

/// Current simulation time in ms.
pub fn current_time() -> CommandDescriptor {
    CURRENT_TIME.instantiate("", vec![])
}

/// Length of one simulation step in ms.
pub fn delta_t() -> CommandDescriptor {
    DELTA_T.instantiate("", vec![])
}

pub fn loaded_number() -> CommandDescriptor {
    LOADED_NUMBER.instantiate("", vec![])
}

pub fn loaded_ids() -> CommandDescriptor {
    LOADED_IDS.instantiate("", vec![])
}

pub fn departed_number() -> CommandDescriptor {
    DEPARTED_NUMBER.instantiate("", vec![])
}

pub fn departed_ids() -> CommandDescriptor {
    DEPARTED_IDS.instantiate("", vec![])
}

pub fn arrived_number() -> CommandDescriptor {
    ARRIVED_NUMBER.instantiate("", vec![])
}

pub fn arrived_ids() -> CommandDescriptor {
    ARRIVED_IDS.instantiate("", vec![])
}

pub fn starting_teleport_number() -> CommandDescriptor {
    STARTING_TELEPORT_NUMBER.instantiate("", vec![])
}

pub fn starting_teleport_ids() -> CommandDescriptor {
    STARTING_TELEPORT_IDS.instantiate("", vec![])
}

pub fn ending_teleport_number() -> CommandDescriptor {
    ENDING_TELEPORT_NUMBER.instantiate("", vec![])
}

pub fn ending_teleport_ids() -> CommandDescriptor {
    ENDING_TELEPORT_IDS.instantiate("", vec![])
}

pub fn parking_starting_number() -> CommandDescriptor {
    PARKING_STARTING_NUMBER.instantiate("", vec![])
}

pub fn parking_starting_ids() -> CommandDescriptor {
    PARKING_STARTING_IDS.instantiate("", vec![])
}

pub fn parking_ending_number() -> CommandDescriptor {
    PARKING_ENDING_NUMBER.instantiate("", vec![])
}

pub fn parking_ending_ids() -> CommandDescriptor {
    PARKING_ENDING_IDS.instantiate("", vec![])
}

pub fn stop_starting_number() -> CommandDescriptor {
    STOP_STARTING_NUMBER.instantiate("", vec![])
}

pub fn stop_starting_ids() -> CommandDescriptor {
    STOP_STARTING_IDS.instantiate("", vec![])
}

pub fn stop_ending_number() -> CommandDescriptor {
    STOP_ENDING_NUMBER.instantiate("", vec![])
}

pub fn stop_ending_ids() -> CommandDescriptor {
    STOP_ENDING_IDS.instantiate("", vec![])
}

/// Vehicles in the network plus those still waiting to depart.
pub fn min_expected_number() -> CommandDescriptor {
    MIN_EXPECTED_NUMBER.instantiate("", vec![])
}

/// Accumulated waiting time at bus stops in ms.
pub fn bus_stop_waiting() -> CommandDescriptor {
    BUS_STOP_WAITING.instantiate("", vec![])
}

/// Bounding box of the loaded network.
pub fn net_boundary() -> CommandDescriptor {
    NET_BOUNDARY.instantiate("", vec![])
}

// ---------------------------------------------------------------------------
// Conversions and distances
// ---------------------------------------------------------------------------

fn road_position(pos: f64, lane_index: u8, to_geo: bool) -> Vec<Value> {
    vec![Value::Double(pos), Value::Byte(lane_index), Value::flag(to_geo)]
}

/// Convert a road position (`edge_id`, `pos`, lane) into coordinates.
///
/// The result is planar, or lon/lat when `to_geo` is set. Fails with
/// [`CommandError::MissingTarget`] for an empty edge id.
pub fn convert_2d(
    edge_id: &str,
    pos: f64,
    lane_index: u8,
    to_geo: bool,
) -> Result<CommandDescriptor, CommandError> {
    let template = if to_geo { &CONVERT_2D_GEO } else { &CONVERT_2D };
    template.build(edge_id, road_position(pos, lane_index, to_geo))
}

/// Like [`convert_2d`], with elevation (or altitude when `to_geo` is set).
pub fn convert_3d(
    edge_id: &str,
    pos: f64,
    lane_index: u8,
    to_geo: bool,
) -> Result<CommandDescriptor, CommandError> {
    let template = if to_geo { &CONVERT_3D_GEO } else { &CONVERT_3D };
    template.build(edge_id, road_position(pos, lane_index, to_geo))
}

/// Convert between planar and geographic coordinates.
///
/// With `from_geo` set, `(x, y)` is read as `(lon, lat)` and the result is a
/// planar position; otherwise the result is a lon/lat position.
pub fn convert_geo(x: f64, y: f64, from_geo: bool) -> CommandDescriptor {
    let (template, from, to) = if from_geo {
        (&CONVERT_FROM_GEO, tag::POSITION_LON_LAT, tag::POSITION_2D)
    } else {
        (&CONVERT_TO_GEO, tag::POSITION_2D, tag::POSITION_LON_LAT)
    };
    template.instantiate(
        "",
        vec![Value::Byte(from), Value::Double(x), Value::Double(y), Value::Byte(to)],
    )
}

/// Map a coordinate onto the road network.
pub fn convert_road(x: f64, y: f64, is_geo: bool) -> CommandDescriptor {
    CONVERT_ROAD.instantiate(
        "",
        vec![Value::Double(x), Value::Double(y), Value::flag(is_geo)],
    )
}

/// Distance between two coordinates, as the crow flies or along the roads.
pub fn distance_2d(from: Position2D, to: Position2D, is_geo: bool, is_driving: bool) -> CommandDescriptor {
    DISTANCE_2D.instantiate(
        "",
        vec![
            Value::Position2D(from),
            Value::Position2D(to),
            Value::flag(is_geo),
            distance_kind(is_driving),
        ],
    )
}

/// Distance between two road positions.
pub fn distance_road(
    edge_from: &str,
    pos_from: f64,
    edge_to: &str,
    pos_to: f64,
    is_driving: bool,
) -> CommandDescriptor {
    DISTANCE_ROAD.instantiate(
        "",
        vec![
            Value::String(edge_from.to_owned()),
            Value::Double(pos_from),
            Value::String(edge_to.to_owned()),
            Value::Double(pos_to),
            distance_kind(is_driving),
        ],
    )
}

fn distance_kind(is_driving: bool) -> Value {
    Value::Byte(if is_driving {
        distance::DRIVING
    } else {
        distance::AIR
    })
}

// ---------------------------------------------------------------------------
// Setters
// ---------------------------------------------------------------------------

/// Drop vehicles that are waiting to be inserted on `route_id` (all routes
/// when empty).
pub fn clear_pending(route_id: &str) -> CommandDescriptor {
    CLEAR_PENDING.instantiate("", vec![Value::String(route_id.to_owned())])
}

/// Write the complete simulation state to `filename` on the simulator host.
pub fn save_state(filename: &str) -> CommandDescriptor {
    SAVE_STATE.instantiate("", vec![Value::String(filename.to_owned())])
}
