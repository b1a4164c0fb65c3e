use mock_http::{
    Expectation, ExpectationFailure, MockHttp, MockHttpError, ResponseTemplate, Times,
};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::TcpStream;

#[test]
fn new_starts_the_server() {
    // Act
    let mock_server = MockHttp::start().unwrap();

    // Assert
    assert!(TcpStream::connect(mock_server.address()).is_ok())
}

#[test]
fn returns_404_if_nothing_matches() {
    // Arrange - nothing registered
    let mock_server = MockHttp::start().unwrap();

    // Act
    let status = reqwest::blocking::get(mock_server.uri()).unwrap().status();

    // Assert
    assert_eq!(status, 404);
    let error = mock_server.verify().unwrap_err();
    assert!(matches!(
        error,
        MockHttpError::Expectation(ExpectationFailure::UnexpectedUrl { .. })
    ));
}

#[test]
fn get_request_with_default_response() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "/index.html"))
        .unwrap();

    // Act
    let response = reqwest::blocking::get(format!("{}/index.html", mock_server.uri())).unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().unwrap(), "");
    assert!(mock_server.verify().is_ok());
}

#[test]
fn configured_status_and_body_are_returned() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "/x"))
        .unwrap()
        .will(ResponseTemplate::new(201).set_body_string("hello"));

    // Act
    let response = reqwest::blocking::get(format!("{}/x", mock_server.uri())).unwrap();

    // Assert
    assert_eq!(response.status(), 201);
    assert_eq!(response.text().unwrap(), "hello");
    let report = mock_server.verify().unwrap();
    assert_eq!(report.requests_served, 1);
    assert!(report.serving_errors.is_empty());
}

#[test]
fn error_status_codes_are_not_failures() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .unwrap();

    // Act
    let status = reqwest::blocking::get(format!("{}/index.html", mock_server.uri()))
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 500);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn configured_response_headers_are_returned() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .append_headers(vec![("x-one", "1"), ("x-two", "2")]),
        )
        .mount(&mock_server)
        .unwrap();

    // Act
    let response = reqwest::blocking::get(format!("{}/index.html", mock_server.uri())).unwrap();

    // Assert
    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "text/html");
    assert_eq!(headers.get("x-one").unwrap(), "1");
    assert_eq!(headers.get("x-two").unwrap(), "2");
    assert!(mock_server.verify().is_ok());
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Greeting {
    hello: String,
}

#[test]
fn json_response_body_sets_the_content_type() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let greeting = Greeting {
        hello: "world".into(),
    };
    Expectation::given("GET", "/greeting")
        .respond_with(ResponseTemplate::new(200).set_body_json(&greeting))
        .mount(&mock_server)
        .unwrap();

    // Act
    let response = reqwest::blocking::get(format!("{}/greeting", mock_server.uri())).unwrap();

    // Assert
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(response.json::<Greeting>().unwrap(), greeting);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn will_can_change_the_response_after_registration() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let handle = mock_server
        .expects(Expectation::given("GET", "/x"))
        .unwrap()
        .will(ResponseTemplate::new(201));
    let uri = format!("{}/x", mock_server.uri());
    assert_eq!(reqwest::blocking::get(&uri).unwrap().status(), 201);

    // Act
    handle.will(ResponseTemplate::new(202));

    // Assert
    assert_eq!(reqwest::blocking::get(&uri).unwrap().status(), 202);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn unconstrained_expectations_can_be_requested_many_times() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let handle = mock_server
        .expects(Expectation::given("GET", "/index.html"))
        .unwrap();
    let uri = format!("{}/index.html", mock_server.uri());

    // Act
    for _ in 0..3 {
        assert_eq!(reqwest::blocking::get(&uri).unwrap().status(), 200);
    }

    // Assert
    assert_eq!(handle.invocation_count(), 3);
    assert_eq!(mock_server.verify().unwrap().requests_served, 3);
}

#[test]
fn unconstrained_expectations_do_not_have_to_be_requested() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "/index.html"))
        .unwrap();

    // Act - nothing

    // Assert
    assert!(mock_server.verify().is_ok());
}

#[test]
fn never_expectations_are_rejected() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let handle = mock_server
        .expects(Expectation::given("GET", "/index.html").times(Times::Never))
        .unwrap();

    // Act
    let status = reqwest::blocking::get(format!("{}/index.html", mock_server.uri()))
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 404);
    assert_eq!(handle.invocation_count(), 0);
    let error = mock_server.verify().unwrap_err();
    assert!(matches!(
        error,
        MockHttpError::Expectation(ExpectationFailure::UnexpectedUrl { .. })
    ));
}

#[test]
fn never_expectations_that_are_not_requested_pass_verification() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("DELETE", "/everything")
        .times(Times::Never)
        .mount(&mock_server)
        .unwrap();

    // Assert
    assert!(mock_server.verify().is_ok());
}

#[test]
fn once_expectations_requested_twice_fail() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .times(Times::Once)
        .respond_with(ResponseTemplate::new(200).set_body_string("first"))
        .mount(&mock_server)
        .unwrap();
    let uri = format!("{}/index.html", mock_server.uri());

    // Act
    let first = reqwest::blocking::get(&uri).unwrap();
    let first_status = first.status();
    let first_body = first.text().unwrap();
    let second = reqwest::blocking::get(&uri).unwrap().status();

    // Assert
    assert_eq!(first_status, 200);
    assert_eq!(first_body, "first");
    assert_eq!(second, 404);
    let error = mock_server.verify().unwrap_err();
    match error {
        MockHttpError::Expectation(ExpectationFailure::AlreadyRetrieved { request, .. }) => {
            assert_eq!(request.method, "GET");
            assert_eq!(request.path, "/index.html");
        }
        e => panic!("Unexpected error: {:?}", e),
    }
}

#[test]
fn once_expectations_never_requested_fail() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .times(Times::Once)
        .mount(&mock_server)
        .unwrap();

    // Act - we never call the expectation

    // Assert
    let error = mock_server.verify().unwrap_err();
    assert!(matches!(
        error,
        MockHttpError::Expectation(ExpectationFailure::UnretrievedUrl { .. })
    ));
}

#[test]
fn at_least_once_expectations_can_be_requested_many_times() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .times(Times::AtLeastOnce)
        .mount(&mock_server)
        .unwrap();
    let uri = format!("{}/index.html", mock_server.uri());

    // Act
    reqwest::blocking::get(&uri).unwrap();
    let status = reqwest::blocking::get(&uri).unwrap().status();

    // Assert
    assert_eq!(status, 200);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn at_least_once_expectations_never_requested_fail() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/index.html")
        .times(Times::AtLeastOnce)
        .mount(&mock_server)
        .unwrap();

    // Assert
    let error = mock_server.verify().unwrap_err();
    assert!(matches!(
        error,
        MockHttpError::Expectation(ExpectationFailure::UnretrievedUrl { .. })
    ));
}

#[test]
fn the_first_unretrieved_expectation_in_registration_order_is_reported() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    for path in ["/first", "/second", "/third"] {
        Expectation::given("GET", path)
            .times(Times::Once)
            .mount(&mock_server)
            .unwrap();
    }
    reqwest::blocking::get(format!("{}/first", mock_server.uri())).unwrap();

    // Act
    let error = mock_server.verify().unwrap_err();

    // Assert
    match error {
        MockHttpError::Expectation(failure @ ExpectationFailure::UnretrievedUrl { .. }) => {
            assert_eq!(failure.request().path, "/second");
        }
        e => panic!("Unexpected error: {:?}", e),
    }
}

#[test]
fn unregistered_paths_never_count_as_invocations() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let handle = mock_server
        .expects(Expectation::given("GET", "/registered"))
        .unwrap();

    // Act
    for _ in 0..3 {
        let status = reqwest::blocking::get(format!("{}/unregistered", mock_server.uri()))
            .unwrap()
            .status();
        assert_eq!(status, 404);
    }

    // Assert
    assert_eq!(handle.invocation_count(), 0);
    assert!(mock_server.verify().is_err());
}

#[test]
fn method_and_path_must_both_match() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "/index.html"))
        .unwrap();

    // Act
    let status = reqwest::blocking::Client::new()
        .post(format!("{}/index.html", mock_server.uri()))
        .send()
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 404);
    assert!(matches!(
        mock_server.verify(),
        Err(MockHttpError::Expectation(
            ExpectationFailure::UnexpectedUrl { .. }
        ))
    ));
}

#[test]
fn arbitrary_methods_are_dispatched() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let purge = reqwest::Method::from_bytes(b"PURGE").unwrap();
    Expectation::given("purge", "/cache")
        .times(Times::Once)
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .unwrap();

    // Act
    let status = reqwest::blocking::Client::new()
        .request(purge, format!("{}/cache", mock_server.uri()))
        .send()
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 204);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn the_last_registration_for_a_route_wins() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/x")
        .times(Times::Once)
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .unwrap();
    Expectation::given("GET", "/x")
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .unwrap();

    // Act
    let status = reqwest::blocking::get(format!("{}/x", mock_server.uri()))
        .unwrap()
        .status();

    // Assert - the shadowed `Once` expectation is not verified anymore
    assert_eq!(status, 202);
    assert!(mock_server.verify().is_ok());
}

#[test]
fn paths_without_a_leading_slash_are_fixed_up() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "index.html"))
        .unwrap();

    // Act
    let status = reqwest::blocking::get(format!("{}/index.html", mock_server.uri()))
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 200);
    assert!(mock_server.verify().is_ok());
}

#[test]
#[should_panic(expected = "contains a `?`")]
fn paths_with_a_query_string_are_refused() {
    Expectation::given("GET", "/search?q=rust");
}

#[test]
fn received_requests_are_recorded_in_arrival_order() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server.expects(Expectation::given("GET", "/a")).unwrap();
    let client = reqwest::blocking::Client::new();

    // Act
    client
        .get(format!("{}/a", mock_server.uri()))
        .send()
        .unwrap();
    client
        .post(format!("{}/b", mock_server.uri()))
        .body("payload")
        .send()
        .unwrap();

    // Assert
    let received_requests = mock_server.received_requests().unwrap();
    assert_eq!(received_requests.len(), 2);
    assert_eq!(received_requests[0].method, "GET");
    assert_eq!(received_requests[0].path(), "/a");
    assert_eq!(received_requests[1].method, "POST");
    assert_eq!(received_requests[1].path(), "/b");
    assert_eq!(received_requests[1].body, b"payload");
}

#[test]
fn request_recording_can_be_disabled() {
    // Arrange
    let mock_server = MockHttp::builder()
        .disable_request_recording()
        .start()
        .unwrap();
    mock_server.expects(Expectation::given("GET", "/a")).unwrap();

    // Act
    reqwest::blocking::get(format!("{}/a", mock_server.uri())).unwrap();

    // Assert
    assert!(mock_server.received_requests().is_none());
    assert!(mock_server.verify().is_ok());
}

#[test]
fn expectation_handles_know_their_name() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();

    // Act
    let named = Expectation::given("GET", "/a")
        .named("a")
        .mount(&mock_server)
        .unwrap();
    let anonymous = Expectation::given("GET", "/b").mount(&mock_server).unwrap();

    // Assert
    assert_eq!(named.name().as_deref(), Some("a"));
    assert_eq!(anonymous.name(), None);
}

#[test]
fn paths_are_matched_as_received_without_resolving_dot_segments() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    Expectation::given("GET", "/b").mount(&mock_server).unwrap();

    // Act - HTTP clients normalize paths, so the request is written by hand
    let mut stream = TcpStream::connect(mock_server.address()).unwrap();
    stream
        .write_all(b"GET /a/../b HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    // Assert
    assert!(response.starts_with("HTTP/1.1 404"), "{}", response);
    let received_requests = mock_server.received_requests().unwrap();
    assert_eq!(received_requests[0].path(), "/a/../b");
    match mock_server.verify().unwrap_err() {
        MockHttpError::Expectation(failure @ ExpectationFailure::UnexpectedUrl { .. }) => {
            assert_eq!(failure.request().path, "/a/../b");
        }
        e => panic!("Unexpected error: {:?}", e),
    }
}

#[test]
fn expectation_handles_expose_their_last_failure() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    let handle = Expectation::given("GET", "/index.html")
        .times(Times::Once)
        .mount(&mock_server)
        .unwrap();
    let uri = format!("{}/index.html", mock_server.uri());

    // Act
    reqwest::blocking::get(&uri).unwrap();
    let after_first_request = handle.last_failure();
    reqwest::blocking::get(&uri).unwrap();
    reqwest::blocking::get(format!("{}/elsewhere", mock_server.uri())).unwrap();

    // Assert
    assert_eq!(after_first_request, None);
    match handle.last_failure() {
        Some(ExpectationFailure::AlreadyRetrieved { request, .. }) => {
            assert_eq!(request.path, "/index.html");
        }
        other => panic!("Unexpected last failure: {:?}", other),
    }
    assert!(matches!(
        mock_server.verify(),
        Err(MockHttpError::Expectation(
            ExpectationFailure::UnexpectedUrl { .. }
        ))
    ));
}

#[test]
fn a_new_response_replaces_the_previous_one_entirely() {
    // Arrange
    let mock_server = MockHttp::start().unwrap();
    mock_server
        .expects(Expectation::given("GET", "/index.html"))
        .unwrap()
        .will(ResponseTemplate::new(200).set_body_string("first"))
        .will(ResponseTemplate::new(201));

    // Act
    let response = reqwest::blocking::get(format!("{}/index.html", mock_server.uri())).unwrap();

    // Assert
    assert_eq!(response.status(), 201);
    assert_eq!(response.text().unwrap(), "");
}
