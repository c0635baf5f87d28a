//! Admission control middleware for HTTP requests.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{Json, body::Body, response::IntoResponse};
use config::IdentitySource;
use http::{HeaderValue, Request, Response, StatusCode};
use rate_limit::{AdmissionController, AdmissionError};
use serde_json::json;
use tower::Layer;

use crate::client_identity::caller_identity;
use crate::request_id::{REQUEST_ID_HEADER, RequestId};

#[derive(Clone)]
pub struct AdmissionLayer {
    controller: Arc<AdmissionController>,
    source: Arc<IdentitySource>,
}

impl AdmissionLayer {
    pub fn new(controller: AdmissionController, source: IdentitySource) -> Self {
        Self {
            controller: Arc::new(controller),
            source: Arc::new(source),
        }
    }
}

impl<Service> Layer<Service> for AdmissionLayer
where
    Service: Send + Clone,
{
    type Service = AdmissionService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AdmissionService {
            next,
            controller: self.controller.clone(),
            source: self.source.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionService<Service> {
    next: Service,
    controller: Arc<AdmissionController>,
    source: Arc<IdentitySource>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AdmissionService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let controller = self.controller.clone();
        let source = self.source.clone();

        Box::pin(async move {
            let Some(identity) = caller_identity(&req, &source) else {
                log::debug!(
                    "Request rejected: no caller identity for dimension '{}'",
                    controller.dimension()
                );

                let response = (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "msg": "missing caller identity" })),
                );

                return Ok(response.into_response());
            };

            let request_id = RequestId::generate();

            let mut response = match controller.admit(&identity, request_id.as_str()).await {
                Ok(()) => {
                    req.extensions_mut().insert(request_id.clone());
                    next.call(req).await?
                }
                Err(err) => rejection(&identity, &err),
            };

            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            Ok(response)
        })
    }
}

/// Terminal response for a request that was not admitted.
fn rejection(identity: &str, err: &AdmissionError) -> Response<Body> {
    let response = match err {
        AdmissionError::ContentionTimeout => {
            log::debug!("Request from '{identity}' rejected ({}): {err}", err.reason());
            (StatusCode::REQUEST_TIMEOUT, Json(json!({ "msg": "request timeout" })))
        }
        AdmissionError::RetriesExhausted { .. } => {
            log::debug!("Request from '{identity}' rejected ({}): {err}", err.reason());
            (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "msg": "exceed max retries" })))
        }
        AdmissionError::StoreFault(_) => {
            // Store details stay in the logs.
            log::error!("Request from '{identity}' rejected ({}): {err}", err.reason());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
        }
    };

    response.into_response()
}
