//! Gateway-level integration tests.
//!
//! Drives whole requests through routes assembled by [`Gateway`], covering
//! the ownership scenarios a CRUD service actually serves.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Duration;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use uuid::Uuid;

use tollgate::core::fixtures::{user_record, MemoryDb, MemoryHomes, MemoryProducts, MemoryUsers};
use tollgate::core::store::{Beginner, HomeRecord, ProductRecord, UserRecord};
use tollgate::middleware::context::{Entity, RequestState};
use tollgate::middleware::BoxFuture;
use tollgate::prelude::*;

const SECRET: &[u8] = b"gateway-test-secret";
const KID: &str = "primary";
const ISSUER: &str = "tollgate";

struct Fixture {
    gateway: Gateway,
    db: Arc<MemoryDb>,
    owner: UserRecord,
    admin: UserRecord,
    product: ProductRecord,
    home: HomeRecord,
}

fn fixture() -> Fixture {
    let owner = user_record("Owner", "owner@example.com", "gopher", vec![Role::User]);
    let admin = user_record("Admin", "admin@example.com", "gopher", vec![Role::Admin]);
    let stranger = user_record("Eve", "eve@example.com", "gopher", vec![Role::User]);
    let product = ProductRecord {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        name: "widget".to_string(),
        cost: 19.99,
        quantity: 5,
    };
    let home = HomeRecord {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        kind: "SINGLE FAMILY".to_string(),
    };

    let db = Arc::new(MemoryDb::new());
    let keys = StaticKeys::new().with_key(KID, DecodingKey::from_secret(SECRET));
    let users = Arc::new(MemoryUsers::with_users(vec![
        owner.clone(),
        admin.clone(),
        stranger,
    ]));
    let authenticator = Arc::new(LocalAuthenticator::new(
        Algorithm::HS256,
        ISSUER,
        Arc::new(keys),
        Arc::clone(&users) as Arc<dyn tollgate::core::store::UserLookup>,
    ));

    let gateway = Gateway::builder()
        .authenticator(authenticator)
        .database(Arc::clone(&db) as Arc<dyn Beginner>)
        .users(users)
        .products(Arc::new(MemoryProducts::with_products(vec![product.clone()])))
        .homes(Arc::new(MemoryHomes::with_homes(vec![home.clone()])))
        .build();

    Fixture {
        gateway,
        db,
        owner,
        admin,
        product,
        home,
    }
}

fn token_for(user: &UserRecord) -> String {
    issue_token(
        &EncodingKey::from_secret(SECRET),
        KID,
        Algorithm::HS256,
        ISSUER,
        user.id,
        &user.roles,
        Duration::hours(1),
    )
    .unwrap()
}

fn bearer_request(token: &str) -> Request {
    http::Request::builder()
        .uri("/v1/products")
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn basic_request(email: &str, password: &str) -> Request {
    use base64::Engine;
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{email}:{password}"));
    http::Request::builder()
        .uri("/v1/auth/token")
        .header(http::header::AUTHORIZATION, format!("Basic {encoded}"))
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn echo_entity(
    state: &mut RequestState,
    _: Request,
) -> BoxFuture<'static, Result<Response, Error>> {
    let name = match state.entity() {
        Some(Entity::Product(p)) => p.name.clone(),
        Some(Entity::Home(h)) => h.kind.clone(),
        Some(Entity::User(u)) => u.name.clone(),
        None => "none".to_string(),
    };
    Box::pin(async move {
        Ok(Response::json(
            StatusCode::OK,
            &serde_json::json!({"entity": name}),
        ))
    })
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_owner_reads_own_product() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Product, false)
        .unwrap();

    let response = route
        .call(
            Some(fx.product.id.to_string()),
            bearer_request(&token_for(&fx.owner)),
            echo_entity,
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["entity"], "widget");
}

#[tokio::test]
async fn test_foreign_user_denied_with_401() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Product, false)
        .unwrap();

    let stranger = token_for(&user_record(
        "Eve",
        "eve@example.com",
        "gopher",
        vec![Role::User],
    ));
    // Token subject is not in the user store, so this caller fails closed
    // at authentication already.
    let response = route
        .call(
            Some(fx.product.id.to_string()),
            bearer_request(&stranger),
            echo_entity,
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_reads_foreign_home() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Home, false)
        .unwrap();

    let response = route
        .call(
            Some(fx.home.id.to_string()),
            bearer_request(&token_for(&fx.admin)),
            echo_entity,
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["entity"], "SINGLE FAMILY");
}

#[tokio::test]
async fn test_user_cannot_read_admin_route() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOnly), EntityKind::None, false)
        .unwrap();

    let response = route
        .call(None, bearer_request(&token_for(&fx.owner)), echo_entity)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = route
        .call(None, bearer_request(&token_for(&fx.admin)), echo_entity)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_basic_credentials_authenticate() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::Any), EntityKind::None, false)
        .unwrap();

    let response = route
        .call(None, basic_request("owner@example.com", "gopher"), echo_entity)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = route
        .call(
            None,
            basic_request("owner@example.com", "wrong"),
            echo_entity,
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_transactional_route_commits_on_success() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Product, true)
        .unwrap();
    assert_eq!(
        route.stage_names(),
        vec!["logger", "errors", "metrics", "panics", "authen", "authorize", "transact"],
    );

    let db = Arc::clone(&fx.db);
    let response = route
        .call(
            Some(fx.product.id.to_string()),
            bearer_request(&token_for(&fx.owner)),
            move |_, _| {
                db.latest().unwrap().set("product:quantity", "4");
                Box::pin(async {
                    Ok(Response::json(
                        StatusCode::OK,
                        &serde_json::json!({"quantity": 4}),
                    ))
                })
            },
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fx.db.read("product:quantity").as_deref(), Some("4"));
}

#[tokio::test]
async fn test_transactional_route_rolls_back_on_handler_error() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Product, true)
        .unwrap();

    let db = Arc::clone(&fx.db);
    let response = route
        .call(
            Some(fx.product.id.to_string()),
            bearer_request(&token_for(&fx.owner)),
            move |_, _| {
                db.latest().unwrap().set("product:quantity", "-1");
                Box::pin(async {
                    Err(Error::from(AppError::fields(vec![FieldError::new(
                        "quantity",
                        "must not be negative",
                    )])))
                })
            },
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["fields"][0]["field"], "quantity");
    assert_eq!(fx.db.read("product:quantity"), None);
    assert!(fx.db.latest().unwrap().is_rolled_back());
}

#[tokio::test]
async fn test_panicking_route_stays_up_and_counts() {
    let fx = fixture();
    let metrics = fx.gateway.metrics();
    let route = fx.gateway.handler(None, EntityKind::None, false).unwrap();

    let response = route
        .call(
            None,
            http::Request::builder()
                .uri("/v1/liveness")
                .body(Full::new(Bytes::new()))
                .unwrap(),
            |_, _| Box::pin(async { panic!("boom") }),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let snap = metrics.snapshot();
    assert_eq!(snap.panics, 1);
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.requests, 1);

    // The route keeps serving afterwards.
    let response = route
        .call(
            None,
            http::Request::builder()
                .uri("/v1/liveness")
                .body(Full::new(Bytes::new()))
                .unwrap(),
            echo_entity,
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_entity_id_is_opaque_401() {
    let fx = fixture();
    let route = fx
        .gateway
        .handler(Some(Rule::AdminOrSubject), EntityKind::Product, false)
        .unwrap();

    let response = route
        .call(
            Some("1234-not-a-uuid".to_string()),
            bearer_request(&token_for(&fx.admin)),
            echo_entity,
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "ID is not in its proper form");
}
