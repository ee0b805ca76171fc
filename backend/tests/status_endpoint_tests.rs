//! End-to-end tests for the HTTP routes against a mock chain.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use grid_backend::routes::{BalancesResponse, SaleView};
use grid_backend::{configure, AppState, ErrorResponse};
use grid_core::testing::MockConnector;
use grid_core::{Address, ContractAddresses, ContractRegistry, DynSolValue, U256};
use std::path::Path;
use std::sync::Arc;

const HOLDER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn registry() -> ContractRegistry {
    let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../contracts"));
    let addresses = ContractAddresses {
        energy_token: "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(),
        carbon_credit_token: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".parse().unwrap(),
        marketplace: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0".parse().unwrap(),
    };
    ContractRegistry::load(dir, &addresses).unwrap()
}

fn token_responses(mock: &MockConnector, registry: &ContractRegistry) {
    let energy = registry.energy_token();
    let carbon = registry.carbon_credit_token();
    mock.respond(energy, "name", &[DynSolValue::String("EnergyToken".into())]);
    mock.respond(energy, "symbol", &[DynSolValue::String("ETKN".into())]);
    mock.respond(
        energy,
        "balanceOf",
        &[DynSolValue::Uint(
            U256::from(12_500_000_000_000_000_000u128),
            256,
        )],
    );
    mock.respond(carbon, "symbol", &[DynSolValue::String("CCT".into())]);
    mock.respond(carbon, "balanceOf", &[DynSolValue::Uint(U256::ZERO, 256)]);
}

fn state(mock: Arc<MockConnector>, registry: ContractRegistry) -> web::Data<AppState> {
    web::Data::new(AppState::new(mock, registry))
}

#[actix_web::test]
async fn test_index_reports_token_name() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);

    let app = test::init_service(
        App::new()
            .app_data(state(mock.clone(), registry))
            .configure(configure),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
    let body = test::read_body(resp).await;
    assert_eq!(
        body,
        "Backend server is running! Energy Token name: EnergyToken".as_bytes()
    );
    assert_eq!(mock.calls().len(), 1);
}

#[actix_web::test]
async fn test_index_fails_when_chain_is_unreachable() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);
    mock.set_unreachable(true);

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("name"));
}

#[actix_web::test]
async fn test_index_fails_when_name_reverts() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    mock.fail_call(registry.energy_token(), "name");

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_balances_for_both_tokens() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let req = test::TestRequest::get()
        .uri(&format!("/balances/{}", HOLDER.to_lowercase()))
        .to_request();
    let body: BalancesResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.address, HOLDER);
    assert_eq!(body.energy_token.symbol, "ETKN");
    assert_eq!(body.energy_token.raw, "12500000000000000000");
    assert_eq!(body.energy_token.formatted, "12.5");
    assert_eq!(body.carbon_credit_token.symbol, "CCT");
    assert_eq!(body.carbon_credit_token.formatted, "0");
}

#[actix_web::test]
async fn test_balances_rejects_bad_address() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);

    let app = test::init_service(
        App::new()
            .app_data(state(mock.clone(), registry))
            .configure(configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/balances/not-an-address").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.code, 400);
    assert!(mock.calls().is_empty());
}

#[actix_web::test]
async fn test_balances_requires_0x_prefix() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);

    let app = test::init_service(
        App::new()
            .app_data(state(mock.clone(), registry))
            .configure(configure),
    )
    .await;
    let bare = HOLDER.trim_start_matches("0x");
    let req = test::TestRequest::get()
        .uri(&format!("/balances/{bare}"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.message.contains(bare));
    assert!(mock.calls().is_empty());
}

#[actix_web::test]
async fn test_balances_fails_when_read_fails() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    token_responses(&mock, &registry);
    mock.fail_call(registry.carbon_credit_token(), "balanceOf");

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let req = test::TestRequest::get()
        .uri(&format!("/balances/{HOLDER}"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_sales_lists_open_listings() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    let market = registry.marketplace();
    mock.respond(market, "nextSaleId", &[DynSolValue::Uint(U256::from(1u64), 256)]);
    mock.respond(
        market,
        "sales",
        &[
            DynSolValue::Uint(U256::ZERO, 256),
            DynSolValue::Address(HOLDER.parse::<Address>().unwrap()),
            DynSolValue::Address(registry.carbon_credit_token().address()),
            DynSolValue::Uint(U256::from(3_000_000_000_000_000_000u128), 256),
            DynSolValue::Uint(U256::from(10_000_000_000_000_000u128), 256),
            DynSolValue::Bool(true),
        ],
    );

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let req = test::TestRequest::get().uri("/sales").to_request();
    let body: Vec<SaleView> = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.len(), 1);
    assert_eq!(body[0].id, "0");
    assert_eq!(body[0].seller, HOLDER);
    assert_eq!(body[0].token.as_deref(), Some("carbon_credit_token"));
    assert_eq!(body[0].formatted_amount, "3");
    assert_eq!(body[0].price_wei, "10000000000000000");
}

#[actix_web::test]
async fn test_sales_fails_when_marketplace_unreachable() {
    let registry = registry();
    let mock = Arc::new(MockConnector::new());
    mock.set_unreachable(true);

    let app = test::init_service(App::new().app_data(state(mock, registry)).configure(configure)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/sales").to_request()).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
