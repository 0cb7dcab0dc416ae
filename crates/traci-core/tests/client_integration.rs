//! End-to-end tests for `SimClient` against a mock simulator over TCP.

mod common;

use common::{connected_client, MockBehavior};

use traci_core::client::ClientState;
use traci_core::constants::{cmd, tag, var};
use traci_core::protocol::{DecodedValue, ResponseFrame};
use traci_core::simulation;
use traci_core::value::{BoundingBox, GeoPosition, GeoPosition3D, Position2D, Value};

#[tokio::test]
async fn current_time_scenario() {
    let (mut client, log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::success(
        &simulation::current_time(),
        Value::Integer(3_600_000),
    ))])
    .await;

    let value = client.execute(&simulation::current_time()).await.unwrap();
    assert_eq!(value, DecodedValue::Value(Value::Integer(3_600_000)));

    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command_group, cmd::GET_SIM_VARIABLE);
    assert_eq!(requests[0].variable, var::TIME_STEP);
    assert_eq!(requests[0].target, "");
    assert!(requests[0].parameters.is_empty());
}

#[tokio::test]
async fn road_to_planar_conversion_sends_parameters_after_target() {
    let expected = Position2D::new(101.5, -3.25);
    let (mut client, log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::success(
        &simulation::convert_2d("edge_7", 12.5, 1, false).unwrap(),
        Value::Position2D(expected),
    ))])
    .await;

    let value = client
        .execute(&simulation::convert_2d("edge_7", 12.5, 1, false).unwrap())
        .await
        .unwrap();
    assert_eq!(value, DecodedValue::Value(Value::Position2D(expected)));

    let requests = log.lock().unwrap();
    assert_eq!(requests[0].variable, var::POSITION_CONVERSION);
    assert_eq!(requests[0].target, "edge_7");
    assert_eq!(
        requests[0].parameters,
        vec![Value::Double(12.5), Value::Byte(1), Value::Byte(0)]
    );
}

#[tokio::test]
async fn road_to_geo_conversion_returns_lon_lat() {
    let expected = GeoPosition { lon: 13.4, lat: 52.5 };
    let cmd = simulation::convert_2d("edge_7", 12.5, 1, true).unwrap();
    let (mut client, log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::success(
        &cmd,
        Value::PositionLonLat(expected),
    ))])
    .await;

    let value = client.execute(&cmd).await.unwrap();
    assert_eq!(value, DecodedValue::Value(Value::PositionLonLat(expected)));
    assert_eq!(
        log.lock().unwrap()[0].parameters,
        vec![Value::Double(12.5), Value::Byte(1), Value::Byte(1)]
    );
}

#[tokio::test]
async fn road_to_geo_with_altitude_returns_three_coordinates() {
    let expected = GeoPosition3D { lon: 13.4, lat: 52.5, alt: 34.0 };
    let cmd = simulation::convert_3d("edge_7", 0.0, 0, true).unwrap();
    let (mut client, _log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::success(
        &cmd,
        Value::PositionLonLatAlt(expected),
    ))])
    .await;

    let value = client.execute(&cmd).await.unwrap();
    assert_eq!(value, DecodedValue::Value(Value::PositionLonLatAlt(expected)));
}

#[tokio::test]
async fn save_state_is_acknowledged() {
    let (mut client, log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::ack(
        &simulation::save_state("state.xml"),
    ))])
    .await;

    let value = client.execute(&simulation::save_state("state.xml")).await.unwrap();
    assert_eq!(value, DecodedValue::Ack);
    assert_eq!(value.value(), None);

    let requests = log.lock().unwrap();
    assert_eq!(requests[0].command_group, cmd::SET_SIM_VARIABLE);
    assert_eq!(requests[0].variable, var::SAVE_SIMSTATE);
    assert_eq!(requests[0].parameters, vec![Value::String("state.xml".into())]);
}

#[tokio::test]
async fn several_requests_share_one_connection() {
    let ids = vec!["veh0".to_string(), "veh1".to_string()];
    let boundary = BoundingBox {
        min: Position2D::new(0.0, 0.0),
        max: Position2D::new(2500.0, 1800.0),
    };
    let (mut client, log) = connected_client(vec![
        MockBehavior::Respond(ResponseFrame::success(
            &simulation::departed_ids(),
            Value::StringList(ids.clone()),
        )),
        MockBehavior::Respond(ResponseFrame::success(
            &simulation::net_boundary(),
            Value::BoundingBox(boundary),
        )),
        MockBehavior::Respond(ResponseFrame::success(
            &simulation::convert_geo(10.0, 20.0, false),
            Value::PositionLonLat(GeoPosition { lon: 13.4, lat: 52.5 }),
        )),
    ])
    .await;

    let departed = client.execute(&simulation::departed_ids()).await.unwrap();
    assert_eq!(departed.value().and_then(Value::as_string_list), Some(ids.as_slice()));

    let bounds = client.execute(&simulation::net_boundary()).await.unwrap();
    assert_eq!(bounds.value().and_then(Value::as_bounding_box), Some(boundary));

    let geo = client
        .execute(&simulation::convert_geo(10.0, 20.0, false))
        .await
        .unwrap();
    assert_eq!(
        geo.into_value(),
        Some(Value::PositionLonLat(GeoPosition { lon: 13.4, lat: 52.5 }))
    );

    assert_eq!(client.state(), ClientState::Connected);
    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[2].parameters,
        vec![
            Value::Byte(tag::POSITION_2D),
            Value::Double(10.0),
            Value::Double(20.0),
            Value::Byte(tag::POSITION_LON_LAT),
        ]
    );
}

#[tokio::test]
async fn fragmented_response_over_tcp() {
    let (mut client, _log) = connected_client(vec![MockBehavior::Fragmented(
        ResponseFrame::success(
            &simulation::departed_ids(),
            Value::StringList(vec!["a".into(), "bb".into(), "ccc".into()]),
        ),
        1,
    )])
    .await;

    let value = client.execute(&simulation::departed_ids()).await.unwrap();
    assert_eq!(
        value.into_value(),
        Some(Value::StringList(vec!["a".into(), "bb".into(), "ccc".into()]))
    );
}

#[tokio::test]
async fn distance_request_round_trip() {
    let cmd = simulation::distance_road("e1", 5.0, "e9", 40.0, true);
    let (mut client, log) = connected_client(vec![MockBehavior::Respond(ResponseFrame::success(
        &cmd,
        Value::Double(812.75),
    ))])
    .await;

    let value = client.execute(&cmd).await.unwrap();
    assert_eq!(value.value().and_then(Value::as_f64), Some(812.75));
    assert_eq!(log.lock().unwrap()[0].parameters.len(), 5);
}
