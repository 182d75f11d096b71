// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::orchestrator::SyncService;
use actix_web::{web, HttpResponse, Result};

/// Health check endpoint
pub async fn health_check(service: web::Data<SyncService>) -> Result<HttpResponse> {
    let db_status = match service.store().ping().await {
        Ok(()) => "connected",
        Err(err) => {
            tracing::warn!(error = %err, "health check: store unreachable");
            "disconnected"
        }
    };

    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        request_id: uuid::Uuid::new_v4().to_string(),
    }))
}

/// Re-scrape every stored product and append a price observation per variant.
pub async fn pop(service: web::Data<SyncService>) -> Result<HttpResponse> {
    tracing::info!("sync requested");

    match service.sync_all().await {
        Ok(report) => Ok(HttpResponse::Ok().json(DataResponse::success(report.products))),
        Err(err) => {
            tracing::error!(error = ?err, "sync failed");
            Ok(HttpResponse::InternalServerError().json(MessageResponse::new(format!("{err:#}"))))
        }
    }
}

/// Scrape and reconcile a single product.
pub async fn read(
    query: web::Query<ReadQuery>,
    service: web::Data<SyncService>,
) -> Result<HttpResponse> {
    let Some(product_id) = query.parsed_id() else {
        tracing::error!(raw = ?query.product_id, "read: missing or invalid productId");
        return Ok(plain_error());
    };

    match service.read(product_id).await {
        Ok((record, outcome)) => {
            tracing::info!(
                product_id,
                prices = outcome.prices_inserted,
                "read complete"
            );
            Ok(HttpResponse::Ok().json(record))
        }
        Err(err) => {
            tracing::error!(product_id, error = ?err, "read failed");
            Ok(plain_error())
        }
    }
}

/// Every stored product with brand, variants and price history.
pub async fn list_products(service: web::Data<SyncService>) -> Result<HttpResponse> {
    match service.store().catalog().await {
        Ok(entries) => Ok(HttpResponse::Ok().json(DataResponse::success(entries))),
        Err(err) => {
            tracing::error!(error = ?err, "catalog listing failed");
            Ok(HttpResponse::InternalServerError().json(MessageResponse::new(format!("{err:#}"))))
        }
    }
}

fn plain_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .content_type("text/plain; charset=utf-8")
        .body("Error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::configure_routes;
    use crate::database_ops::memory::MemoryCatalogStore;
    use crate::orchestrator::tests::StubFetcher;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;

    fn service_with(fetcher: StubFetcher) -> (web::Data<SyncService>, Arc<MemoryCatalogStore>) {
        let store = Arc::new(MemoryCatalogStore::new());
        let svc = SyncService::new(Arc::new(fetcher), store.clone(), 4, 8);
        (web::Data::new(svc), store)
    }

    #[actix_web::test]
    async fn read_returns_normalized_product() {
        let (svc, store) = service_with(StubFetcher::default().with_product(77, 5, &[700, 701]));
        let app = test::init_service(App::new().app_data(svc).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/read?productId=77").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["id"], 77);
        assert_eq!(body["brandId"], 5);
        assert_eq!(body["brand"]["name"], "Brand 5");
        assert_eq!(body["variants"][0]["price"], 85.5);
        assert_eq!(body["variants"][0]["hasStock"], true);
        assert_eq!(body["variants"][0]["assets"][0]["type"], "image");
        assert_eq!(store.snapshot().await.prices.len(), 2);
    }

    #[actix_web::test]
    async fn read_failures_are_plain_text() {
        let (svc, _) = service_with(StubFetcher::default());
        let app = test::init_service(App::new().app_data(svc).configure(configure_routes)).await;

        for uri in ["/read?productId=404", "/read?productId=abc", "/read"] {
            let req = test::TestRequest::post().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            let body = test::read_body(resp).await;
            assert_eq!(&body[..], b"Error", "{uri}");
        }
    }

    #[actix_web::test]
    async fn pop_wraps_products_in_success_envelope() {
        let fetcher = StubFetcher::default()
            .with_product(1, 9, &[10])
            .with_product(2, 9, &[20, 21]);
        let (svc, store) = service_with(fetcher);
        svc.read(1).await.unwrap();
        svc.read(2).await.unwrap();
        let app = test::init_service(App::new().app_data(svc).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/pop").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["message"], "Success");
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["data"][1]["id"], 2);
        assert_eq!(store.snapshot().await.prices.len(), 6);
    }

    #[actix_web::test]
    async fn pop_failure_reports_message() {
        let (svc, _) = service_with(StubFetcher::default().with_product(1, 9, &[10]));
        svc.read(1).await.unwrap();
        let broken = web::Data::new(SyncService::new(
            Arc::new(StubFetcher::default()),
            svc.store().clone(),
            4,
            8,
        ));
        let app = test::init_service(App::new().app_data(broken).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/pop").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("fetching product 1"));
    }

    #[actix_web::test]
    async fn products_lists_history() {
        let (svc, _) = service_with(StubFetcher::default().with_product(3, 1, &[30]));
        svc.read(3).await.unwrap();
        svc.read(3).await.unwrap();
        let app = test::init_service(App::new().app_data(svc).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/products").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["message"], "Success");
        assert_eq!(body["data"][0]["brand"]["id"], 1);
        let prices = body["data"][0]["variants"][0]["prices"].as_array().unwrap();
        assert_eq!(prices.len(), 2);
    }

    #[actix_web::test]
    async fn health_reports_store_status() {
        let (svc, _) = service_with(StubFetcher::default());
        let app = test::init_service(App::new().app_data(svc).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }
}
