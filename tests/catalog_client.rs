use booth_floorplan::config::{CatalogConfig, CircuitBreakerConfig};
use booth_floorplan::services::{CatalogClient, CircuitState, ServiceError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT: &str = "EXPO2026";

fn client(server: &MockServer, failure_threshold: u32) -> CatalogClient {
    let catalog = CatalogConfig {
        base_url: server.uri(),
        event_code: EVENT.into(),
        booked_product_code: "BOOKED".into(),
        refresh_seconds: 300,
        timeout_seconds: 5,
    };
    let breaker = CircuitBreakerConfig { failure_threshold, timeout_seconds: 60 };
    CatalogClient::from_config(&catalog, &breaker).expect("http client")
}

#[tokio::test]
async fn packages_are_requested_with_event_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/List-All"))
        .and(header("Authorization", EVENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "ok",
            "products": [
                { "id": 7, "name_english": "Shell scheme", "product_code": "P-3x2", "sizes": "3mx2m", "prices": "1,500" },
                { "id": "8", "product_code": "P-6x3", "sizes": "6m x 3m", "prices": 2800 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let packages = client(&server, 5).list_packages().await.expect("packages");
    assert_eq!(packages.products.len(), 2);
    assert_eq!(packages.products[0].id.as_deref(), Some("7"));
    assert_eq!(packages.products[0].price(), Some(1500.0));
    assert_eq!(packages.products[1].price(), Some(2800.0));
}

#[tokio::test]
async fn booked_booths_come_from_fourteenth_column() {
    let server = MockServer::start().await;
    let mut row = vec![json!(""); 15];
    row[14] = json!("06, 07");
    let mut other = vec![json!(null); 15];
    other[14] = json!("21");
    Mock::given(method("GET"))
        .and(path("/Get-Exhibition-Bookings/GetBookings/BOOKED"))
        .and(query_param("draw", "1"))
        .and(query_param("length", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recordsTotal": 2,
            "data": [row, other, ["short"]]
        })))
        .mount(&server)
        .await;

    let booths = client(&server, 5).booked_booths("BOOKED").await.expect("bookings");
    assert_eq!(booths, vec!["06".to_string(), "07".to_string(), "21".to_string()]);
}

#[tokio::test]
async fn payment_methods_default_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/Details/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payment_method": [{ "id": 1, "contentEnglish": "Bank transfer" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/Details/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client(&server, 5);
    let methods = client.product_details("7").await.expect("details");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].id, "1");
    assert_eq!(methods[0].content_english, "Bank transfer");
    assert!(client.product_details("8").await.expect("details").is_empty());
}

#[tokio::test]
async fn server_errors_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/List-All"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server, 2);
    for _ in 0..2 {
        let err = client.list_packages().await.expect_err("service is down");
        assert!(matches!(err, ServiceError::Status { status: 503, .. }));
    }
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    let err = client.list_packages().await.expect_err("circuit is open");
    assert!(matches!(err, ServiceError::CircuitOpen("catalog")));
}

#[tokio::test]
async fn client_errors_do_not_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/Details/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, 2);
    for _ in 0..3 {
        assert!(client.product_details("404").await.is_err());
    }
    assert_eq!(client.circuit_breaker().state(), CircuitState::Closed);
}
