//! Empty-body acceptance policy.

use std::collections::HashMap;

use reqwest::Method;

/// Which request methods may finish successfully with an empty response body.
///
/// By default GET and POST require a body; HEAD, PUT and DELETE accept an
/// empty one. Methods without a rule accept an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyBodyPolicy {
    rules: HashMap<Method, bool>,
    fallback: bool,
}

impl EmptyBodyPolicy {
    /// Accepts an empty body for every method.
    pub fn allow_all() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: true,
        }
    }

    /// Sets whether `method` may finish with an empty body.
    pub fn with_rule(mut self, method: Method, allow_empty: bool) -> Self {
        self.rules.insert(method, allow_empty);
        self
    }

    pub fn allows_empty(&self, method: &Method) -> bool {
        self.rules.get(method).copied().unwrap_or(self.fallback)
    }
}

impl Default for EmptyBodyPolicy {
    fn default() -> Self {
        Self::allow_all()
            .with_rule(Method::GET, false)
            .with_rule(Method::POST, false)
            .with_rule(Method::HEAD, true)
            .with_rule(Method::PUT, true)
            .with_rule(Method::DELETE, true)
    }
}
