use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::session::Session;

/// A file received in a multipart submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was submitted under
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Immutable snapshot of one inbound HTTP exchange
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    files: Vec<UploadedFile>,
    params: HashMap<String, String>,
    headers: HeaderMap,
    session: Session,
}

impl Request {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Raw request path, without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &HashMap<String, String> {
        &self.body
    }

    /// Submitted form field
    pub fn input(&self, name: &str) -> Option<&str> {
        self.body.get(name).map(String::as_str)
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// Values bound from `{name}` segments of the matched route
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-visible-ASCII values are treated as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Copy of this request with route params replaced
    pub fn with_params(self, params: HashMap<String, String>) -> Self {
        Self { params, ..self }
    }
}

/// Assembles a `Request`; the transport adapter and tests both go through here.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    files: Vec<UploadedFile>,
    headers: HeaderMap,
    session: Option<Session>,
}

impl RequestBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            body: HashMap::new(),
            files: Vec::new(),
            headers: HeaderMap::new(),
            session: None,
        }
    }

    pub fn query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: HashMap<String, String>) -> Self {
        self.body = body;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    pub fn file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Adds a header; names or values that are not valid HTTP are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!("dropping invalid header {:?}", name),
        }
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Requests built without a session get a fresh, unsaved one.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            body: self.body,
            files: self.files,
            params: HashMap::new(),
            headers: self.headers,
            session: self.session.unwrap_or_else(Session::fresh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_all_parts() {
        let req = Request::builder(Method::POST, "/b/general/post")
            .query_param("page", "2")
            .field("body", "hello")
            .header("X-CSRF-TOKEN", "abc")
            .file(UploadedFile {
                field: "image".to_string(),
                file_name: Some("cat.png".to_string()),
                content_type: Some("image/png".to_string()),
                data: vec![1, 2, 3],
            })
            .build();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/b/general/post");
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.input("body"), Some("hello"));
        assert_eq!(req.header("x-csrf-token"), Some("abc"));
        assert_eq!(req.file("image").map(|f| f.data.len()), Some(3));
        assert!(req.params().is_empty());
    }

    #[test]
    fn with_params_keeps_everything_else() {
        let req = Request::builder(Method::GET, "/c/fred").field("a", "1").build();
        let session_id = req.session().id();

        let mut params = HashMap::new();
        params.insert("slug".to_string(), "fred".to_string());
        let bound = req.with_params(params);

        assert_eq!(bound.param("slug"), Some("fred"));
        assert_eq!(bound.input("a"), Some("1"));
        assert_eq!(bound.session().id(), session_id);
    }

    #[test]
    fn invalid_header_is_dropped() {
        let req = Request::builder(Method::GET, "/")
            .header("bad header", "x")
            .build();
        assert!(req.headers().is_empty());
    }
}
