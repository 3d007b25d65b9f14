// router.rs

use crate::*;

pub type Handler<S> = fn(&S, &Request) -> Response;

pub struct Route<S> {
    pub path: String,
    pub methods: Vec<Method>,
    pub handler: Handler<S>,
}

/// Exact-path routes checked in registration order, then one fallback
/// handler for everything else.
pub struct Router<S> {
    routes: Vec<Route<S>>,
    fallback: Handler<S>,
}

impl<S> Router<S> {
    pub fn new(fallback: Handler<S>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    pub fn route(mut self, path: &str, methods: &[Method], handler: Handler<S>) -> Self {
        self.register(path, methods, handler);
        self
    }

    /// Add a route. A path may be registered more than once; the first
    /// registration that allows the method wins.
    pub fn register(&mut self, path: &str, methods: &[Method], handler: Handler<S>) {
        self.routes.push(Route {
            path: path.into(),
            methods: methods.to_vec(),
            handler,
        });
    }

    pub fn lookup(&self, method: Method, path: &str) -> Option<Handler<S>> {
        self.routes
            .iter()
            .find(|r| r.path == path && r.methods.contains(&method))
            .map(|r| r.handler)
    }

    pub fn handler_for(&self, req: &Request) -> Handler<S> {
        self.lookup(req.method, &req.path).unwrap_or(self.fallback)
    }

    pub fn dispatch(&self, state: &S, req: &Request) -> Response {
        (self.handler_for(req))(state, req)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.routes.len()
    }
}


// EOF
