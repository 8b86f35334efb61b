use booth_floorplan::config::{CatalogConfig, CircuitBreakerConfig};
use booth_floorplan::models::{BoothId, BoothStatus};
use booth_floorplan::registry::{BoothRegistry, SharedRegistry};
use booth_floorplan::selection::{SelectionError, SelectionSet};
use booth_floorplan::services::{Advisories, CatalogClient, CatalogSync, PaymentMethods};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sync(server: &MockServer) -> CatalogSync {
    let catalog = CatalogConfig {
        base_url: server.uri(),
        event_code: "EXPO2026".into(),
        booked_product_code: "BOOKED".into(),
        refresh_seconds: 300,
        timeout_seconds: 5,
    };
    let breaker = CircuitBreakerConfig { failure_threshold: 5, timeout_seconds: 60 };
    CatalogSync {
        client: CatalogClient::from_config(&catalog, &breaker).expect("http client"),
        registry: SharedRegistry::new(BoothRegistry::initialize(false).expect("static booth table")),
        payment_methods: PaymentMethods::default(),
        advisories: Advisories::default(),
        booked_product_code: "BOOKED".into(),
    }
}

fn booking_row(booths: &str) -> serde_json::Value {
    let mut row = vec![json!(""); 15];
    row[14] = json!(booths);
    json!(row)
}

#[tokio::test]
async fn booked_booth_from_catalog_cannot_be_selected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/List-All"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Get-Exhibition-Bookings/GetBookings/BOOKED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [booking_row("05")] })))
        .mount(&server)
        .await;

    let sync = sync(&server);
    let booth = BoothId::parse("05").expect("booth id");
    assert_eq!(sync.registry.read().get(&booth).map(|b| b.status), Some(BoothStatus::Available));
    let version = sync.registry.version();

    let report = sync.run_once().await;

    // пакеты недоступны, но список занятых стендов всё равно применён
    assert!(report.enriched.is_none());
    assert_eq!(report.booked.map(|m| m.newly_booked), Some(vec![booth.clone()]));
    assert!(sync.registry.version() > version);

    let advisories = sync.advisories.list();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].source, "catalog");

    let registry = sync.registry.read();
    assert_eq!(registry.get(&booth).map(|b| b.status), Some(BoothStatus::Booked));
    let mut selection = SelectionSet::new();
    assert_eq!(selection.toggle(&registry, &booth), Err(SelectionError::Unavailable(booth.clone())));
    assert!(selection.is_empty());
}

#[tokio::test]
async fn full_sync_enriches_prices_and_learns_payment_methods() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/List-All"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [
                { "id": 11, "product_code": "P-3x2", "sizes": "2m*3m", "prices": "1200", "name_english": "Shell" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Get-Exhibition-Bookings/GetBookings/BOOKED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Get-Exibition-Packages-Full/Details/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payment_method": [
                { "id": "1", "contentEnglish": "Card" },
                { "id": "2", "contentEnglish": "Bank transfer" }
            ]
        })))
        .mount(&server)
        .await;

    let sync = sync(&server);
    let report = sync.run_once().await;

    let enriched = report.enriched.expect("packages loaded");
    assert!(enriched.matched_by_size > 0);
    assert_eq!(report.payment_methods, Some(2));
    assert_eq!(sync.payment_methods.list().len(), 2);
    assert!(sync.advisories.list().is_empty());

    let registry = sync.registry.read();
    let priced: Vec<_> = registry.iter().filter(|b| b.price == Some(1200.0)).collect();
    assert!(!priced.is_empty());
    assert!(priced.iter().all(|b| b.size_key() == priced[0].size_key()));
}
