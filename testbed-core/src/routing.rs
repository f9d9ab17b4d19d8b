// Routing system for HTTP requests

use crate::{Error, HttpRequest, HttpResponse, Result};
use futures_util::future::BoxFuture;
use http::Method;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A route handler function type
pub type HandlerFn =
    Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync>;

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: HandlerFn,
}

/// Router for managing routes and dispatching requests
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route to the router
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Register an async handler for `method` and a path pattern.
    ///
    /// Patterns capture segments written as `{name}` or `:name`.
    pub fn route<F, Fut>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(
            move |request: HttpRequest| -> BoxFuture<'static, Result<HttpResponse>> {
                Box::pin(handler(request))
            },
        );
        self.add_route(Route {
            method,
            path: path.to_string(),
            handler,
        });
        self
    }

    pub fn get<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find a route that matches the request and run its handler
    pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        // Parse query parameters from path
        let (path, query_string) = match request.path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (request.path.clone(), None),
        };

        if let Some(query) = query_string {
            request.query_params = parse_query_string(&query)?;
        }

        // Find matching route
        for route in &self.routes {
            if route.method != request.method {
                continue;
            }

            if let Some(params) = match_path(&route.path, &path) {
                request.path_params = params;
                request.path = path;
                return (route.handler)(request).await;
            }
        }

        Err(Error::RouteNotFound(format!("{} {}", request.method, path)))
    }
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        let param_name = pattern_part
            .strip_prefix(':')
            .or_else(|| pattern_part.strip_prefix('{').and_then(|p| p.strip_suffix('}')));

        if let Some(param_name) = param_name {
            params.insert(param_name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            // Static part doesn't match
            return None;
        }
    }

    Some(params)
}

/// Parse a query string into ordered pairs, keeping repeated keys
fn parse_query_string(query: &str) -> Result<Vec<(String, String)>> {
    serde_urlencoded::from_str(query).map_err(|e| Error::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_path_static() {
        let result = match_path("/users", "/users");
        assert_eq!(result.unwrap().len(), 0);
    }

    #[test]
    fn test_match_path_with_braced_param() {
        let params = match_path("/widgets/{widgetId}", "/widgets/123").unwrap();
        assert_eq!(params.get("widgetId"), Some(&"123".to_string()));
    }

    #[test]
    fn test_match_path_with_colon_param() {
        let params = match_path("/users/:user_id/posts/:post_id", "/users/1/posts/2").unwrap();
        assert_eq!(params.get("user_id"), Some(&"1".to_string()));
        assert_eq!(params.get("post_id"), Some(&"2".to_string()));
    }

    #[test]
    fn test_match_path_no_match() {
        assert!(match_path("/users/:id", "/posts/123").is_none());
        assert!(match_path("/users", "/users/123").is_none());
    }

    #[test]
    fn test_parse_query_string_repeated_and_encoded() {
        let params = parse_query_string("name=john%20doe&tag=a&tag=b").unwrap();
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "john doe".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_extracts_params_and_query() {
        let mut router = Router::new();
        router.get("/widgets/{id}", |req: HttpRequest| async move {
            let body = format!(
                "{}:{}",
                req.param("id").unwrap_or_default(),
                req.query("verbose").unwrap_or("no")
            );
            Ok(HttpResponse::ok().with_text(body))
        });

        let response = router
            .dispatch(HttpRequest::new(Method::GET, "/widgets/9?verbose=yes"))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"9:yes");
    }

    #[tokio::test]
    async fn test_dispatch_method_mismatch() {
        let mut router = Router::new();
        router.post("/widgets", |_req| async { Ok(HttpResponse::no_content()) });

        let err = router
            .dispatch(HttpRequest::new(Method::GET, "/widgets"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RouteNotFound(_)));
    }
}
