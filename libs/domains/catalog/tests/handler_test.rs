//! Handler tests for the catalog domain
//!
//! These drive the axum router end to end against the in-memory repository
//! and a throwaway media directory:
//! - JSON and multipart request parsing
//! - Response shapes and HTTP status codes
//! - Bearer token enforcement on writes

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum_helpers::{JwtAuth, JwtConfig};
use domain_catalog::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{TestDataBuilder, assertions::*};
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

const SECRET: &str = "catalog-handler-test-secret-0123456789";
const BOUNDARY: &str = "catalog-test-boundary";
const HOST: &str = "shop.test";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

struct TestApp {
    router: Router,
    token: String,
    user_id: Uuid,
    media_root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

fn test_app(test_name: &str) -> TestApp {
    let builder = TestDataBuilder::from_test_name(test_name);
    let media_root = std::env::temp_dir().join(format!("catalog-{}-{}", test_name, Uuid::now_v7()));

    let jwt = JwtAuth::new(&JwtConfig::new(SECRET));
    let user_id = builder.user_id();
    let token = jwt
        .create_access_token(&user_id.to_string(), "ann@example.com", "Ann", &[])
        .unwrap();

    let media = Arc::new(LocalMediaStorage::new(&media_root, "/media"));
    let router = handlers::router(CatalogState {
        service: CatalogService::new(InMemoryCatalogRepository::new(), media),
        jwt,
        public_base_url: "http://localhost:8080".to_string(),
        trust_forwarded_headers: false,
    });

    TestApp {
        router,
        token,
        user_id,
        media_root,
    }
}

fn multipart_body(payload: Option<Value>, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(payload) = payload {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"payload\"\r\n\r\n{}\r\n",
                BOUNDARY, payload
            )
            .as_bytes(),
        );
    }
    for (file_name, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"uploaded_images\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::HOST, HOST)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, HOST)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send_form(
        &self,
        method: &str,
        uri: &str,
        payload: Option<Value>,
        files: &[(&str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, HOST)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(payload, files)))
            .unwrap();
        self.send(request).await
    }

    async fn delete(&self, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await.0
    }

    async fn create_category(&self, slug: &str) -> Uuid {
        let (status, body) = self
            .send_json(
                "POST",
                "/categories",
                json!({ "name": slug.to_uppercase(), "slug": slug }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn create_product(
        &self,
        category_id: Uuid,
        slug: &str,
        is_active: bool,
        files: &[(&str, &str, &[u8])],
    ) -> Value {
        let payload = json!({
            "name": format!("Product {}", slug),
            "slug": slug,
            "price": "19.99",
            "category_id": category_id,
            "sku": format!("SKU-{}", slug),
            "stock_quantity": 5,
            "is_active": is_active,
        });
        let (status, body) = self.send_form("POST", "/products", Some(payload), files).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

fn primary_flags(images: &Value) -> Vec<bool> {
    images
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["is_primary"].as_bool().unwrap())
        .collect()
}

#[tokio::test]
async fn test_create_category_returns_201() {
    let app = test_app("create_category");
    let category_id = app.create_category("shoes").await;

    let (status, body) = app.get(&format!("/categories/{}", category_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], "shoes");
    assert_eq!(body["products_count"], 0);
    assert!(body["image"].is_null());
}

#[tokio::test]
async fn test_writes_require_token() {
    let app = test_app("writes_require_token");

    let request = Request::builder()
        .method("POST")
        .uri("/categories")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "Shoes", "slug": "shoes" }).to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    // Reads stay public
    let (status, _) = app.get("/categories").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_product_first_image_is_primary() {
    let app = test_app("create_product_primary");
    let category_id = app.create_category("shoes").await;

    let body = app
        .create_product(
            category_id,
            "runner",
            true,
            &[("a.png", "image/png", PNG), ("b.png", "image/png", PNG), ("c.png", "image/png", PNG)],
        )
        .await;

    assert_eq!(body["category"], json!(category_id));
    assert!(body.get("category_id").is_none());
    assert_eq!(body["price"], "19.99");

    let images = &body["images"];
    assert_eq!(images.as_array().unwrap().len(), 3);
    assert_eq!(assert_single_primary(&primary_flags(images), "create"), 0);

    let url = images[0]["image"].as_str().unwrap();
    assert!(url.starts_with("http://shop.test/media/products/"), "{}", url);
    assert!(url.ends_with("-a.png"));
}

#[tokio::test]
async fn test_update_without_images_keeps_set() {
    let app = test_app("update_keeps_images");
    let category_id = app.create_category("shoes").await;
    let created = app
        .create_product(
            category_id,
            "runner",
            true,
            &[("a.png", "image/png", PNG), ("b.png", "image/png", PNG)],
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = app
        .send_form(
            "PUT",
            &format!("/products/{}", id),
            Some(json!({ "name": "Renamed", "price": "17.50" })),
            &[],
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["price"], "17.50");
    assert_eq!(updated["images"], created["images"]);
}

#[tokio::test]
async fn test_update_with_images_replaces_set() {
    let app = test_app("update_replaces_images");
    let category_id = app.create_category("shoes").await;
    let created = app
        .create_product(
            category_id,
            "runner",
            true,
            &[("a.png", "image/png", PNG), ("b.png", "image/png", PNG)],
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = app
        .send_form("PUT", &format!("/products/{}", id), None, &[("d.png", "image/png", PNG)])
        .await;

    assert_eq!(status, StatusCode::OK, "{}", updated);
    let images = updated["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert!(images[0]["image"].as_str().unwrap().ends_with("-d.png"));
    assert_eq!(images[0]["is_primary"], true);

    let (_, detail) = app.get(&format!("/products/{}", id)).await;
    assert_eq!(detail["images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_upload_rejected_and_nothing_persisted() {
    let app = test_app("empty_upload");
    let category_id = app.create_category("shoes").await;

    let payload = json!({
        "name": "Runner",
        "slug": "runner",
        "price": "19.99",
        "category_id": category_id,
        "sku": "SKU-1",
    });
    let (status, body) = app
        .send_form(
            "POST",
            "/products",
            Some(payload),
            &[("a.png", "image/png", PNG), ("empty.png", "image/png", b"")],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    let errors = body["details"]["uploaded_images"].as_array().unwrap();
    assert_eq!(errors[0]["code"], "empty_file");
    assert_eq!(errors[0]["params"]["index"], 1);

    let (_, products) = app.get("/products").await;
    assert!(products.as_array().unwrap().is_empty());
    assert!(!app.media_root.join("products").exists());
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let app = test_app("non_image_upload");
    let category_id = app.create_category("shoes").await;

    let payload = json!({
        "name": "Runner",
        "slug": "runner",
        "price": "19.99",
        "category_id": category_id,
        "sku": "SKU-1",
    });
    let (status, body) = app
        .send_form("POST", "/products", Some(payload), &[("notes.txt", "text/plain", b"hello")])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["uploaded_images"][0]["code"], "invalid_image");
}

#[tokio::test]
async fn test_missing_payload_rejected() {
    let app = test_app("missing_payload");
    let (status, body) = app
        .send_form("POST", "/products", None, &[("a.png", "image/png", PNG)])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["payload"][0]["code"], "required");
}

#[tokio::test]
async fn test_unknown_category_rejected_on_category_id() {
    let app = test_app("unknown_category");
    let payload = json!({
        "name": "Runner",
        "slug": "runner",
        "price": "19.99",
        "category_id": Uuid::now_v7(),
        "sku": "SKU-1",
    });
    let (status, body) = app.send_form("POST", "/products", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["category_id"][0]["code"], "does_not_exist");
}

#[tokio::test]
async fn test_duplicate_sku_conflict() {
    let app = test_app("duplicate_sku");
    let category_id = app.create_category("shoes").await;
    app.create_product(category_id, "runner", true, &[]).await;

    let payload = json!({
        "name": "Other",
        "slug": "other",
        "price": "5.00",
        "category_id": category_id,
        "sku": "SKU-runner",
    });
    let (status, body) = app.send_form("POST", "/products", Some(payload), &[]).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
}

#[tokio::test]
async fn test_products_count_only_active() {
    let app = test_app("products_count");
    let category_id = app.create_category("shoes").await;
    app.create_product(category_id, "a", true, &[]).await;
    app.create_product(category_id, "b", true, &[]).await;
    app.create_product(category_id, "c", false, &[]).await;

    let (_, categories) = app.get("/categories").await;
    assert_eq!(categories[0]["products_count"], 2);
}

#[tokio::test]
async fn test_list_products_projection() {
    let app = test_app("list_products");
    let category_id = app.create_category("shoes").await;
    app.create_product(category_id, "runner", true, &[("a.png", "image/png", PNG)])
        .await;
    app.create_product(category_id, "plain", true, &[]).await;

    let (status, products) = app.get("/products?search=RUN").await;
    assert_eq!(status, StatusCode::OK);

    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 1);
    let item = &products[0];
    assert_eq!(item["category"], "SHOES");
    assert!(item["average_rating"].is_null());
    assert_eq!(item["reviews_count"], 0);
    assert!(
        item["primary_image"]
            .as_str()
            .unwrap()
            .starts_with("http://shop.test/media/products/")
    );

    let (_, plain) = app.get("/products?search=plain").await;
    assert!(plain[0]["primary_image"].is_null());
}

#[tokio::test]
async fn test_review_author_comes_from_token() {
    let app = test_app("review_author");
    let category_id = app.create_category("shoes").await;
    let product = app.create_product(category_id, "runner", true, &[]).await;
    let id = product["id"].as_str().unwrap();

    let (status, review) = app
        .send_json(
            "POST",
            &format!("/products/{}/reviews", id),
            json!({
                "rating": 4,
                "title": "Comfortable",
                "comment": "Fits well",
                "user": "mallory",
                "user_id": Uuid::now_v7(),
                "is_verified_purchase": true,
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", review);
    assert_eq!(review["user"], "Ann");
    assert_eq!(review["user_id"], json!(app.user_id));
    assert_eq!(review["is_verified_purchase"], false);

    app.send_json(
        "POST",
        &format!("/products/{}/reviews", id),
        json!({ "rating": 5, "title": "Great" }),
    )
    .await;

    let (_, detail) = app.get(&format!("/products/{}", id)).await;
    assert_eq!(detail["average_rating"], 4.5);
    assert_eq!(detail["reviews"].as_array().unwrap().len(), 2);
    // Newest first
    assert_eq!(detail["reviews"][0]["title"], "Great");
}

#[tokio::test]
async fn test_review_rating_out_of_range() {
    let app = test_app("review_rating");
    let category_id = app.create_category("shoes").await;
    let product = app.create_product(category_id, "runner", true, &[]).await;

    let (status, body) = app
        .send_json(
            "POST",
            &format!("/products/{}/reviews", product["id"].as_str().unwrap()),
            json!({ "rating": 9, "title": "Too good" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["rating"].is_array());
}

#[tokio::test]
async fn test_delete_category_in_use_conflicts() {
    let app = test_app("delete_category_in_use");
    let category_id = app.create_category("shoes").await;
    let product = app.create_product(category_id, "runner", true, &[]).await;

    assert_eq!(
        app.delete(&format!("/categories/{}", category_id)).await,
        StatusCode::CONFLICT
    );
    assert_eq!(
        app.delete(&format!("/products/{}", product["id"].as_str().unwrap()))
            .await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete(&format!("/categories/{}", category_id)).await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_invalid_uuid_returns_400() {
    let app = test_app("invalid_uuid");
    let (status, body) = app.get("/products/not-a-uuid").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_UUID");
}

#[tokio::test]
async fn test_missing_product_returns_404() {
    let app = test_app("missing_product");
    let (status, body) = app.get(&format!("/products/{}", Uuid::now_v7())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_forwarded_host_is_not_trusted_by_default() {
    let app = test_app("test_forwarded_host_is_not_trusted_by_default");
    let (status, body) = app
        .send_json(
            "POST",
            "/categories",
            json!({ "name": "Shoes", "slug": "shoes", "image": "categories/shoes.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["id"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/categories/{}", id))
        .header(header::HOST, HOST)
        .header("x-forwarded-host", "evil.test")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image"], "http://shop.test/media/categories/shoes.png");
}

#[tokio::test]
async fn test_category_image_outside_media_root_rejected() {
    let app = test_app("test_category_image_outside_media_root_rejected");
    let (status, body) = app
        .send_json(
            "POST",
            "/categories",
            json!({ "name": "Shoes", "slug": "shoes", "image": "../../etc/passwd" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["image"][0]["code"], "invalid_path");
}

#[tokio::test]
async fn test_price_beyond_column_precision_is_a_field_error() {
    let app = test_app("test_price_beyond_column_precision_is_a_field_error");
    let category_id = app.create_category("shoes").await;

    let payload = json!({
        "name": "Runner",
        "slug": "runner",
        "price": "123456789012.345",
        "category_id": category_id,
        "sku": "RUN-1",
        "weight": "0.755",
    });
    let (status, body) = app
        .send_form("POST", "/products", Some(payload), &[("a.png", "image/png", PNG)])
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["price"][0]["code"], "max_digits");
    assert_eq!(body["details"]["weight"][0]["code"], "max_decimal_places");

    let (_, products) = app.get("/products").await;
    assert_eq!(products.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_update_null_clears_weight_and_dimensions() {
    let app = test_app("test_update_null_clears_weight_and_dimensions");
    let category_id = app.create_category("shoes").await;
    let product = app.create_product(category_id, "runner", true, &[]).await;
    let uri = format!("/products/{}", product["id"].as_str().unwrap());

    let (status, body) = app
        .send_form("PUT", &uri, Some(json!({ "weight": "1.5", "dimensions": "2x2" })), &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["weight"], "1.50");

    let (status, body) = app
        .send_form("PUT", &uri, Some(json!({ "weight": null })), &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["weight"].is_null());
    assert_eq!(body["dimensions"], "2x2");

    let (status, body) = app
        .send_form("PUT", &uri, Some(json!({ "dimensions": null })), &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["dimensions"].is_null());
}
