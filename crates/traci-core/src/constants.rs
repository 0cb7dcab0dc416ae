//! Protocol byte codes shared by the encoder, decoder and command table.
//!
//! Values follow the simulator's published control-protocol table. Nothing
//! else in the crate should spell these bytes out as literals.

/// Command group ids (top-level opcodes).
pub mod cmd {
    /// Read a simulation-wide variable.
    pub const GET_SIM_VARIABLE: u8 = 0xab;
    /// Response group for [`GET_SIM_VARIABLE`].
    pub const RESPONSE_GET_SIM_VARIABLE: u8 = 0xbb;
    /// Write a simulation-wide variable.
    pub const SET_SIM_VARIABLE: u8 = 0xcb;
}

/// Variable ids (sub-opcodes) within the simulation command groups.
pub mod var {
    pub const POSITION: u8 = 0x42;

    pub const BUS_STOP_WAITING: u8 = 0x67;
    pub const STOP_STARTING_VEHICLES_NUMBER: u8 = 0x68;
    pub const STOP_STARTING_VEHICLES_IDS: u8 = 0x69;
    pub const STOP_ENDING_VEHICLES_NUMBER: u8 = 0x6a;
    pub const STOP_ENDING_VEHICLES_IDS: u8 = 0x6b;
    pub const PARKING_STARTING_VEHICLES_NUMBER: u8 = 0x6c;
    pub const PARKING_STARTING_VEHICLES_IDS: u8 = 0x6d;
    pub const PARKING_ENDING_VEHICLES_NUMBER: u8 = 0x6e;
    pub const PARKING_ENDING_VEHICLES_IDS: u8 = 0x6f;

    pub const TIME_STEP: u8 = 0x70;
    pub const LOADED_VEHICLES_NUMBER: u8 = 0x71;
    pub const LOADED_VEHICLES_IDS: u8 = 0x72;
    pub const DEPARTED_VEHICLES_NUMBER: u8 = 0x73;
    pub const DEPARTED_VEHICLES_IDS: u8 = 0x74;
    pub const TELEPORT_STARTING_VEHICLES_NUMBER: u8 = 0x75;
    pub const TELEPORT_STARTING_VEHICLES_IDS: u8 = 0x76;
    pub const TELEPORT_ENDING_VEHICLES_NUMBER: u8 = 0x77;
    pub const TELEPORT_ENDING_VEHICLES_IDS: u8 = 0x78;
    pub const ARRIVED_VEHICLES_NUMBER: u8 = 0x79;
    pub const ARRIVED_VEHICLES_IDS: u8 = 0x7a;
    pub const DELTA_T: u8 = 0x7b;
    pub const NET_BOUNDING_BOX: u8 = 0x7c;
    pub const MIN_EXPECTED_VEHICLES: u8 = 0x7d;

    pub const POSITION_CONVERSION: u8 = 0x82;
    pub const DISTANCE_REQUEST: u8 = 0x83;

    pub const CLEAR_PENDING_VEHICLES: u8 = 0x94;
    pub const SAVE_SIMSTATE: u8 = 0x95;
}

/// Type tag bytes that precede every encoded value.
pub mod tag {
    pub const POSITION_LON_LAT: u8 = 0x00;
    pub const POSITION_2D: u8 = 0x01;
    pub const POSITION_LON_LAT_ALT: u8 = 0x02;
    pub const POSITION_3D: u8 = 0x03;
    pub const BOUNDING_BOX: u8 = 0x05;
    pub const UBYTE: u8 = 0x07;
    pub const INTEGER: u8 = 0x09;
    pub const DOUBLE: u8 = 0x0b;
    pub const STRING: u8 = 0x0c;
    pub const STRING_LIST: u8 = 0x0e;
    pub const COMPOUND: u8 = 0x0f;
}

/// Status codes carried in the status section of every response.
pub mod status {
    pub const OK: u8 = 0x00;
    pub const NOT_IMPLEMENTED: u8 = 0x01;
    pub const ERR: u8 = 0xff;
}

/// Distance request flavour flags.
pub mod distance {
    pub const AIR: u8 = 0x00;
    pub const DRIVING: u8 = 0x01;
}
