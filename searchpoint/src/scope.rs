//! Scope Resolver: shapes the base collection before the predicate is applied.

use serde::Serialize;

use crate::collection::{Authorizer, Queryable};
use crate::config::SearchConfiguration;
use crate::errors::Result;
use crate::normalize::Normalized;
use crate::order::Window;
use crate::params::{ParamValue, Principal};

const SCOPE_SEPARATOR: char = ',';

/// Requested scope chain, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSpec {
    names: Vec<String>,
}

impl ScopeSpec {
    /// Split on commas; segments are trimmed and empty ones skipped. `None` when nothing remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let names: Vec<String> = raw
            .split(SCOPE_SEPARATOR)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        (!names.is_empty()).then_some(Self { names })
    }

    /// Accepts `scope=a,b` as well as `scope[]=a&scope[]=b`.
    pub fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(raw) => Self::parse(raw),
            ParamValue::List(_) => Self::parse(&value.to_strings().join(",")),
            _ => None,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_chain(&self) -> bool {
        self.names.len() > 1
    }
}

/// Window the resolver will apply for this configuration and request.
pub fn window_for<R>(config: &SearchConfiguration<R>, normalized: &Normalized) -> Window {
    Window::select(
        config.result_limit,
        config.skip_pagination,
        normalized.page,
        normalized.per_page,
    )
}

/// Apply default scopes, the requested chain, eager loading, ordering, the window and
/// finally authorization, in that order.
pub fn resolve<Q, A, R>(
    base: Q,
    config: &SearchConfiguration<R>,
    normalized: &Normalized,
    authorizer: &A,
    principal: Option<&Principal>,
) -> Result<Q>
where
    Q: Queryable,
    A: Authorizer<Q> + ?Sized,
{
    let mut collection = base;

    if normalized.skip_default_scopes {
        log::debug!("default scopes skipped by request");
    } else {
        for name in &config.default_scope_names {
            collection = collection.apply_scope(name)?;
        }
    }

    if let Some(spec) = &normalized.scope {
        log::debug!("applying scope chain {:?}", spec.names());
        for name in spec.names() {
            collection = collection.apply_scope(name)?;
        }
    }

    if !config.eager_load_hints.is_empty() {
        collection = collection.eager_load(&config.eager_load_hints)?;
    }

    if !config.order_clause.is_empty() {
        collection = collection.order(&config.order_clause)?;
    }

    let window = window_for(config, normalized);
    log::debug!("search window {window:?}");
    collection = match window {
        Window::Limit { limit } => collection.limit(limit),
        Window::Page { page, per_page } => collection.page(page, per_page),
        Window::Unbounded => collection,
    };

    authorizer.authorize(principal, collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{FnAuthorizer, Unrestricted};
    use crate::config::{SearchOptions, resolve as resolve_config};
    use crate::errors::SearchError;
    use crate::filters::{FilterParams, Predicate};
    use crate::order::OrderClause;
    use crate::params::RawRequest;
    use crate::record::Document;

    /// Collection that records every call it receives.
    #[derive(Debug, Default)]
    struct Journal {
        calls: Vec<String>,
    }

    impl Journal {
        fn push(mut self, call: String) -> Self {
            self.calls.push(call);
            self
        }
    }

    impl Queryable for Journal {
        type Record = Document;

        fn apply_scope(self, name: &str) -> Result<Self> {
            if name == "missing" {
                return Err(SearchError::UnknownScope { name: name.to_string() });
            }
            Ok(self.push(format!("scope:{name}")))
        }

        fn eager_load(self, hints: &[String]) -> Result<Self> {
            Ok(self.push(format!("includes:{}", hints.join("+"))))
        }

        fn order(self, clause: &OrderClause) -> Result<Self> {
            Ok(self.push(format!("order:{clause}")))
        }

        fn limit(self, limit: u64) -> Self {
            self.push(format!("limit:{limit}"))
        }

        fn page(self, page: u64, per_page: u64) -> Self {
            self.push(format!("page:{page}/{per_page}"))
        }

        fn filter(self, _predicate: &Predicate) -> Result<Self> {
            Ok(self.push("filter".to_string()))
        }

        async fn load(self) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    fn normalized(scope: Option<&str>, skip: bool) -> Normalized {
        Normalized {
            filters: FilterParams::new(),
            scope: scope.and_then(ScopeSpec::parse),
            page: 2,
            per_page: 25,
            skip_default_scopes: skip,
        }
    }

    fn calls(options: SearchOptions<Document>, normalized: &Normalized) -> Vec<String> {
        let config = resolve_config(&options, &RawRequest::new()).expect("config");
        let authorizer = FnAuthorizer::new(|_: Option<&Principal>, journal: Journal| Ok(journal.push("authorize".into())));
        resolve(Journal::default(), &config, normalized, &authorizer, None)
            .expect("resolves")
            .calls
    }

    #[test]
    fn parse_trims_and_skips_empty_segments() {
        let spec = ScopeSpec::parse(" published, ,visible ").expect("spec");
        assert_eq!(spec.names(), &["published".to_string(), "visible".to_string()]);
        assert!(spec.is_chain());
        assert!(ScopeSpec::parse(" , ").is_none());
        assert!(!ScopeSpec::parse("published").expect("spec").is_chain());
    }

    #[test]
    fn list_parameters_form_a_chain() {
        let spec = ScopeSpec::from_param(&ParamValue::from(vec!["a", "b,c"])).expect("spec");
        assert_eq!(spec.names(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn steps_run_in_documented_order() {
        let options = SearchOptions::new().default_scope("visible").includes("author");
        let calls = calls(options, &normalized(Some("published,featured"), false));
        assert_eq!(
            calls,
            vec![
                "scope:visible",
                "scope:published",
                "scope:featured",
                "includes:author",
                "order:id desc",
                "page:2/25",
                "authorize",
            ]
        );
    }

    #[test]
    fn skipping_default_scopes_keeps_requested_chain() {
        let options = SearchOptions::new().default_scope("visible");
        let calls = calls(options, &normalized(Some("published"), true));
        assert_eq!(calls[0], "scope:published");
        assert!(!calls.contains(&"scope:visible".to_string()));
    }

    #[test]
    fn limit_wins_over_pagination() {
        let calls = calls(SearchOptions::new().limit(10), &normalized(None, false));
        assert!(calls.contains(&"limit:10".to_string()));
        assert!(!calls.iter().any(|call| call.starts_with("page:")));
    }

    #[test]
    fn skip_pagination_without_limit_is_unbounded() {
        let options = SearchOptions::new().skip_pagination(true).order_clause(OrderClause::none());
        let calls = calls(options, &normalized(None, false));
        assert_eq!(calls, vec!["authorize"]);
    }

    #[test]
    fn unknown_scope_fails_fast() {
        let config = resolve_config(&SearchOptions::<Document>::new(), &RawRequest::new()).expect("config");
        let err = resolve(Journal::default(), &config, &normalized(Some("missing"), false), &Unrestricted, None)
            .expect_err("unknown scope");
        assert!(matches!(err, SearchError::UnknownScope { ref name } if name == "missing"));
    }
}
