use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

// The web app loads telegram-web-app.js and runs inside a Telegram frame,
// so frame-ancestors must allow the Telegram web clients.
const CSP: &str = "default-src 'self'; \
    script-src 'self' https://telegram.org; \
    connect-src 'self'; \
    img-src 'self' data: https:; \
    style-src 'self' 'unsafe-inline'; \
    object-src 'none'; \
    base-uri 'self'; \
    form-action 'self'; \
    frame-ancestors 'self' https://web.telegram.org https://*.telegram.org";

fn insert_missing(res: &mut Response<Body>, name: &'static str, value: &'static str) {
    if res.headers().get(name).is_none() {
        res.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

/// Adds the Content-Security-Policy and a couple of hardening headers to
/// every response that doesn't set them itself.
pub async fn csp_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    insert_missing(&mut res, "content-security-policy", CSP);
    insert_missing(&mut res, "referrer-policy", "strict-origin-when-cross-origin");
    insert_missing(&mut res, "x-content-type-options", "nosniff");

    res
}
