//! Security headers attached to every response.

use crate::config::SecurityHeadersConfig;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{
        CACHE_CONTROL, CONTENT_SECURITY_POLICY, HeaderName, HeaderValue, REFERRER_POLICY,
        STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    },
};
use std::{
    future::{Ready, ready},
    pin::Pin,
    rc::Rc,
};

/// Headers every JSON response carries regardless of configuration
const FIXED_HEADERS: [(HeaderName, &str); 4] = [
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (X_FRAME_OPTIONS, "DENY"),
    (
        CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (REFERRER_POLICY, "no-referrer"),
];

/// Resolved header set, built once per worker
struct HeaderSet {
    always: Vec<(HeaderName, HeaderValue)>,
    cache_control: Option<HeaderValue>,
}

impl HeaderSet {
    fn new(config: &SecurityHeadersConfig) -> Self {
        let mut always: Vec<_> = FIXED_HEADERS
            .into_iter()
            .map(|(name, value)| (name, HeaderValue::from_static(value)))
            .collect();

        if config.hsts_max_age > 0 {
            let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age);
            if let Ok(value) = HeaderValue::try_from(hsts) {
                always.push((STRICT_TRANSPORT_SECURITY, value));
            }
        }

        Self {
            always,
            cache_control: HeaderValue::from_str(&config.cache_control).ok(),
        }
    }
}

/// Security headers middleware factory
pub struct SecurityHeaders {
    headers: Rc<HeaderSet>,
}

impl SecurityHeaders {
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self {
            headers: Rc::new(HeaderSet::new(&config)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware {
            service,
            headers: Rc::clone(&self.headers),
        }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: S,
    headers: Rc<HeaderSet>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let fut = self.service.call(req);
        let set = Rc::clone(&self.headers);

        Box::pin(async move {
            let mut res = fut.await?;
            let headers = res.headers_mut();

            for (name, value) in &set.always {
                headers.insert(name.clone(), value.clone());
            }
            if let Some(value) = &set.cache_control
                && !headers.contains_key(CACHE_CONTROL)
            {
                headers.insert(CACHE_CONTROL, value.clone());
            }

            Ok(res)
        })
    }
}
