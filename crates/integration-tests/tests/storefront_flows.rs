//! End-to-end flows against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`rayha-cli migrate`)
//! - A seeded catalog with at least one product in stock (`rayha-cli seed catalog`)
//! - The storefront running (`cargo run -p rayha-storefront`)
//! - For back-office flows, an admin account given by
//!   `STOREFRONT_TEST_ADMIN_EMAIL` and `STOREFRONT_TEST_ADMIN_PASSWORD`
//!   (`rayha-cli admin promote -e ...`)
//!
//! Run with: `cargo test -p rayha-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the storefront (configurable via environment).
fn base_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Client keeping the session cookie between requests, like a browser.
fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Register a fresh account. The client is signed in afterwards.
async fn register(client: &Client) -> Value {
    let email = format!("test-{}@example.com", Uuid::new_v4());
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({
            "email": email,
            "password": "un-mot-de-passe-solide",
            "username": "Testeur",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

/// First product with stock left.
async fn product_in_stock(client: &Client) -> Value {
    let products: Vec<Value> = client
        .get(format!("{}/api/products", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    products
        .into_iter()
        .find(|p| p["stock"].as_i64().unwrap_or(0) > 0)
        .expect("catalog has a product in stock")
}

/// Client signed in as the back-office account from the environment.
async fn admin() -> Client {
    let client = browser();
    let email = std::env::var("STOREFRONT_TEST_ADMIN_EMAIL").expect("STOREFRONT_TEST_ADMIN_EMAIL");
    let password =
        std::env::var("STOREFRONT_TEST_ADMIN_PASSWORD").expect("STOREFRONT_TEST_ADMIN_PASSWORD");
    let resp = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

/// A fresh product only this test touches.
async fn create_product(admin: &Client, price: &str, stock: i32) -> Value {
    let resp = admin
        .post(format!("{}/api/admin/products", base_url()))
        .json(&json!({
            "name": format!("Essai {}", Uuid::new_v4().simple()),
            "brand": "Maison Test",
            "price": price,
            "stock": stock,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

/// A fresh promo code. Returns the code.
async fn create_promo(admin: &Client, extra: Value) -> String {
    let code = format!("TEST{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase();
    let mut body = json!({ "code": code, "discount": 10 });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    let resp = admin
        .post(format!("{}/api/admin/promo-codes", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    code
}

async fn add_to_cart(client: &Client, product_id: &Value, quantity: u32) -> StatusCode {
    client
        .post(format!("{}/api/cart/items", base_url()))
        .json(&json!({ "productId": product_id, "quantity": quantity }))
        .send()
        .await
        .unwrap()
        .status()
}

async fn apply_promo(client: &Client, code: &str) -> StatusCode {
    client
        .post(format!("{}/api/cart/promo", base_url()))
        .json(&json!({ "code": code }))
        .send()
        .await
        .unwrap()
        .status()
}

async fn checkout(client: &Client, email: &Value) -> reqwest::Response {
    client
        .post(format!("{}/api/checkout", base_url()))
        .json(&json!({
            "customer": { "name": "Testeur", "email": email },
            "shippingAddress": {
                "line1": "12 rue des Parfumeurs",
                "city": "Grasse",
                "postalCode": "06130",
                "country": "FR",
            },
        }))
        .send()
        .await
        .unwrap()
}

async fn cart(client: &Client) -> Value {
    client
        .get(format!("{}/api/cart", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_product_listing_and_detail() {
    let client = browser();
    let product = product_in_stock(&client).await;

    let resp = client
        .get(format!("{}/api/products/{}", base_url(), product["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: Value = resp.json().await.unwrap();
    assert_eq!(detail["name"], product["name"]);

    let missing = client
        .get(format!("{}/api/products/999999999", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_register_me_logout() {
    let client = browser();
    let user = register(&client).await;

    let me: Value = client
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], user["email"]);
    assert_eq!(me["role"], "customer");

    let resp = client
        .post(format!("{}/api/auth/logout", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{}/api/auth/me", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_duplicate_registration_conflicts() {
    let client = browser();
    let user = register(&client).await;

    let resp = browser()
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({ "email": user["email"], "password": "un-autre-mot-de-passe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_guest_cart_merges_on_login() {
    let client = browser();
    let user = register(&client).await;
    let email = user["email"].as_str().unwrap().to_owned();
    client
        .post(format!("{}/api/auth/logout", base_url()))
        .send()
        .await
        .unwrap();

    let product = product_in_stock(&client).await;
    let resp = client
        .post(format!("{}/api/cart/items", base_url()))
        .json(&json!({ "productId": product["id"], "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cart(&client).await["summary"]["itemCount"], 1);

    let resp = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({ "email": email, "password": "un-mot-de-passe-solide" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let merged = cart(&client).await;
    assert_eq!(merged["summary"]["itemCount"], 1);
    assert_eq!(merged["items"][0]["productId"], product["id"]);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_unknown_promo_code_rejected() {
    let client = browser();
    let resp = client
        .post(format!("{}/api/cart/promo", base_url()))
        .json(&json!({ "code": format!("NOPE{}", Uuid::new_v4().simple()) }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Favorites and checkout
// ============================================================================

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_favorite_toggle() {
    let client = browser();
    register(&client).await;
    let product = product_in_stock(&client).await;
    let toggle = format!("{}/api/favorites/{}/toggle", base_url(), product["id"]);

    let on: Value = client.post(&toggle).send().await.unwrap().json().await.unwrap();
    assert_eq!(on["favorite"], true);

    let list: Vec<Value> = client
        .get(format!("{}/api/favorites", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.iter().any(|p| p["id"] == product["id"]));

    let off: Value = client.post(&toggle).send().await.unwrap().json().await.unwrap();
    assert_eq!(off["favorite"], false);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_checkout_places_order_and_empties_cart() {
    let client = browser();
    let user = register(&client).await;
    let product = product_in_stock(&client).await;

    client
        .post(format!("{}/api/cart/items", base_url()))
        .json(&json!({ "productId": product["id"] }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/checkout", base_url()))
        .json(&json!({
            "customer": { "name": "Testeur", "email": user["email"] },
            "shippingAddress": {
                "line1": "12 rue des Parfumeurs",
                "city": "Grasse",
                "postalCode": "06130",
                "country": "FR",
            },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"][0]["productId"], product["id"]);

    assert_eq!(cart(&client).await["summary"]["itemCount"], 0);

    let mine: Vec<Value> = client
        .get(format!("{}/api/orders", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.iter().any(|o| o["id"] == order["id"]));
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_checkout_with_empty_cart_rejected() {
    let client = browser();
    let resp = client
        .post(format!("{}/api/checkout", base_url()))
        .json(&json!({
            "customer": { "name": "Invité", "email": "invite@example.com" },
            "shippingAddress": { "city": "Paris" },
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Promo codes and stock at checkout
// ============================================================================

#[tokio::test]
#[ignore = "requires a running storefront and an admin account"]
async fn test_single_use_code_refused_at_checkout_after_redemption() {
    let admin = admin().await;
    let product = create_product(&admin, "40.00", 10).await;
    let code = create_promo(&admin, json!({ "singleUse": true })).await;

    let first = browser();
    let user = register(&first).await;
    let password_login = json!({ "email": user["email"], "password": "un-mot-de-passe-solide" });
    let second = browser();
    let resp = second
        .post(format!("{}/api/auth/login", base_url()))
        .json(&password_login)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Both sessions of the same account hold the code
    assert_eq!(add_to_cart(&first, &product["id"], 1).await, StatusCode::OK);
    assert_eq!(apply_promo(&first, &code).await, StatusCode::OK);
    assert_eq!(apply_promo(&second, &code).await, StatusCode::OK);

    let resp = checkout(&first, &user["email"]).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["promoCode"], code.as_str());

    let resp = admin
        .patch(format!("{}/api/admin/orders/{}/status", base_url(), order["id"]))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(add_to_cart(&second, &product["id"], 1).await, StatusCode::OK);
    let resp = checkout(&second, &user["email"]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Vous avez déjà utilisé ce code promo");

    // The code is gone from the session and the cart is untouched
    let view = cart(&second).await;
    assert!(view["promo"].is_null());
    assert_eq!(view["summary"]["itemCount"], 1);
}

#[tokio::test]
#[ignore = "requires a running storefront and an admin account"]
async fn test_stock_conflict_rolls_back_the_whole_order() {
    let admin = admin().await;
    let plenty = create_product(&admin, "30.00", 10).await;
    let scarce = create_product(&admin, "50.00", 2).await;

    let client = browser();
    let user = register(&client).await;
    assert_eq!(add_to_cart(&client, &plenty["id"], 1).await, StatusCode::OK);
    assert_eq!(add_to_cart(&client, &scarce["id"], 2).await, StatusCode::OK);

    let resp = admin
        .put(format!("{}/api/admin/products/{}/stock", base_url(), scarce["id"]))
        .json(&json!({ "stock": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = checkout(&client, &user["email"]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Nothing was taken from the line that could be served
    let detail: Value = client
        .get(format!("{}/api/products/{}", base_url(), plenty["id"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["stock"], 10);

    assert_eq!(cart(&client).await["summary"]["itemCount"], 3);
    let mine: Vec<Value> = client
        .get(format!("{}/api/orders", base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
#[ignore = "requires a running storefront and an admin account"]
async fn test_minimum_amount_code_dropped_when_cart_shrinks() {
    let admin = admin().await;
    let product = create_product(&admin, "60.00", 10).await;
    let code = create_promo(&admin, json!({ "minAmount": "120.00" })).await;

    let client = browser();
    assert_eq!(add_to_cart(&client, &product["id"], 2).await, StatusCode::OK);
    assert_eq!(apply_promo(&client, &code).await, StatusCode::OK);
    assert_eq!(cart(&client).await["promo"]["code"], code.as_str());

    let resp = client
        .patch(format!("{}/api/cart/items/{}", base_url(), product["id"]))
        .json(&json!({ "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let view = cart(&client).await;
    assert!(view["promo"].is_null());
    assert_eq!(view["summary"]["itemCount"], 1);

    // Back above the minimum, the code has to be applied again
    assert_eq!(add_to_cart(&client, &product["id"], 1).await, StatusCode::OK);
    assert!(cart(&client).await["promo"].is_null());
}
