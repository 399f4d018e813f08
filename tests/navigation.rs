use approx::assert_relative_eq;
use nalgebra::Vector3;
use std::io::Cursor;
use uwb_nav::api::{EstimationMethod, NavigationApi, PositionQuery};
use uwb_nav::{ConfigurationManager, NavError, Point2, RangeVector, RouteRequest, StreamRangeProvider, WaypointId};

const DEPLOYMENT: &str = r#"{
    "anchors": [
        {"id": "0000000000000006", "x": 0.0,  "y": 0.0,  "z": 0.0},
        {"id": "0000000000000007", "x": 10.0, "y": 0.0,  "z": 0.0},
        {"id": "0000000000000009", "x": 0.0,  "y": 10.0, "z": 0.0},
        {"id": "000000000000000a", "x": 0.0,  "y": 0.0,  "z": 10.0}
    ],
    "crossings": [
        {"id": 1, "x": 2.0, "y": 2.0},
        {"id": 2, "x": 8.0, "y": 2.0},
        {"id": 3, "x": 2.0, "y": 8.0},
        {"id": 4, "x": 8.0, "y": 8.0}
    ],
    "columns": 2,
    "obstacles": [
        {"vertices": [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0]]}
    ]
}"#;

fn api() -> NavigationApi {
    let manager = ConfigurationManager::from_json_str(DEPLOYMENT).unwrap();
    NavigationApi::from_config(&manager).unwrap()
}

fn exact_ranges(api: &NavigationApi, truth: &Vector3<f64>) -> Vec<f64> {
    api.anchors().iter().map(|a| (a.position - truth).norm()).collect()
}

#[test]
fn test_linear_and_nonlinear_agree_on_clean_ranges() {
    let api = api();
    let truth = Vector3::new(3.0, 4.0, 5.0);
    let ranges = RangeVector::from_meters(&exact_ranges(&api, &truth));

    for method in [EstimationMethod::Linear, EstimationMethod::Nonlinear] {
        let query = PositionQuery {
            method,
            ..PositionQuery::default()
        };
        let response = api.locate(&ranges, &query).unwrap();
        assert_relative_eq!(response.estimate.position(), truth, epsilon = 1e-6);
        assert!(response.precision.unwrap().gdop.is_finite());
    }
}

#[test]
fn test_position_from_serial_stream() {
    let api = api();
    let truth = Vector3::new(3.0, 4.0, 5.0);

    let mut frame = Vec::new();
    for (anchor, range) in api.anchors().iter().zip(exact_ranges(&api, &truth)) {
        let mut id = [0u8; 8];
        id[7] = u8::from_str_radix(&anchor.id[14..], 16).unwrap();
        frame.extend_from_slice(&id);
        frame.extend_from_slice(&((range * 100.0).round() as u32).to_le_bytes());
    }
    let mut provider = StreamRangeProvider::new(Cursor::new(frame));

    let response = api.locate_from(&mut provider, &PositionQuery::default()).unwrap();
    // centimetre quantisation of the ranges
    assert!((response.estimate.position() - truth).norm() < 0.05);
    assert!(response.estimate.converged);
}

#[test]
fn test_obstacle_forces_detour_through_crossing() {
    let api = api();
    let request = RouteRequest {
        start: Point2::new(0.0, 0.0),
        destination: Some(Point2::new(10.0, 10.0)),
    };

    let route = api.route(&request).unwrap();
    let ids: Vec<WaypointId> = route.waypoints.iter().map(|w| w.id).collect();
    assert_eq!(
        ids,
        vec![WaypointId::Start, WaypointId::Crossing(2), WaypointId::Destination]
    );
    assert_relative_eq!(route.length, 2.0 * 68.0_f64.sqrt(), epsilon = 1e-12);

    let again = api.route(&request).unwrap();
    assert_eq!(route, again);
}

#[test]
fn test_failures_are_typed() {
    let api = api();
    let request = RouteRequest {
        start: Point2::new(0.0, 0.0),
        destination: None,
    };
    let err = api.route(&request).unwrap_err();
    assert!(matches!(err.as_nav(), Some(NavError::InvalidRequest { .. })));

    let too_few = RangeVector::new(vec![Some(5.0), Some(6.0), None, None]);
    let err = api.locate(&too_few, &PositionQuery::default()).unwrap_err();
    assert_eq!(err.kind(), "InsufficientGeometry");
}
