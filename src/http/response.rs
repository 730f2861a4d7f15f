use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

/// Outbound result of one exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// 200 with an HTML body
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
            .with_body(body)
    }

    pub fn text(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .with_body(body)
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// 303 See Other, the post-redirect-get response for form submissions
    pub fn redirect(location: &str) -> Self {
        let response = Self::new(StatusCode::SEE_OTHER);
        match HeaderValue::from_str(location) {
            Ok(value) => response.with_header(header::LOCATION, value),
            Err(_) => {
                tracing::warn!("redirect target is not a valid header value: {:?}", location);
                response
            }
        }
    }

    /// Default body used when nothing matched and no not-found handler exists
    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "404 Not Found")
    }

    /// Replaces any existing value for `name`
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a value without removing existing ones (e.g. `Set-Cookie`)
    pub fn append_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Hands the response over to the transport
    pub fn into_http(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_sets_content_type() {
        let res = Response::json(StatusCode::CREATED, &json!({ "ok": true })).unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"ok":true}"#);
    }

    #[test]
    fn redirect_is_see_other() {
        let res = Response::redirect("/b/general");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.header("location"), Some("/b/general"));
    }

    #[test]
    fn append_keeps_existing_values() {
        let res = Response::new(StatusCode::OK)
            .append_header(header::SET_COOKIE, HeaderValue::from_static("a=1"))
            .append_header(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(res.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn into_http_carries_status_headers_and_body() {
        let res = Response::text(StatusCode::IM_A_TEAPOT, "short and stout").into_http();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
