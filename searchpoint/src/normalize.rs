//! Parameter normalizer: splits a raw request into control values and filter input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{PAYLOAD_PARAM, SearchConfiguration};
use crate::filters::FilterParams;
use crate::params::{ParamValue, RawRequest};
use crate::scope::ScopeSpec;

pub const SCOPE_PARAM: &str = "scope";
pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "per_page";
pub const SKIP_DEFAULT_SCOPES_PARAM: &str = "skip_default_scopes";
/// Nested filter group; when present it replaces the top-level candidates entirely.
pub const NESTED_FILTER_PARAM: &str = "q";
pub const ID_FILTER_KEY: &str = "id_eq";

const DEFAULT_PAGE: u64 = 1;
const ROUTING_KEYS: [&str; 2] = ["controller", "action"];

static ID_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^id:(\d+)").expect("valid id term regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub filters: FilterParams,
    pub scope: Option<ScopeSpec>,
    pub page: u64,
    pub per_page: u64,
    pub skip_default_scopes: bool,
}

/// Consume the control parameters from `request` and build the filter map.
pub fn normalize<R>(request: &mut RawRequest, config: &SearchConfiguration<R>) -> Normalized {
    let skip_default_scopes = request
        .take(SKIP_DEFAULT_SCOPES_PARAM)
        .is_some_and(|flag| flag.is_truthy());
    let scope = request.take(SCOPE_PARAM).and_then(|raw| ScopeSpec::from_param(&raw));
    let page = paging_value(request.take(PAGE_PARAM), PAGE_PARAM, DEFAULT_PAGE);
    let per_page = paging_value(request.take(PER_PAGE_PARAM), PER_PAGE_PARAM, config.default_page_size);

    let term_key = config.term_param_key.as_str();
    let mut filters = candidate_filters(request, term_key);
    filters.retain(|_, value| !value.is_droppable());

    if let Some(term) = request.get(term_key).filter(|term| !term.is_droppable()) {
        filters.insert(config.term_target_key(), term.clone());
    }

    let target = config.term_target_key();
    let id_lookup = filters
        .get(target)
        .and_then(ParamValue::as_str)
        .and_then(|term| ID_TERM.captures(term))
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str().to_string());
    if let Some(digits) = id_lookup {
        filters.remove(target);
        filters.insert(ID_FILTER_KEY, digits);
    }

    Normalized {
        filters,
        scope,
        page,
        per_page,
        skip_default_scopes,
    }
}

fn candidate_filters(request: &RawRequest, term_key: &str) -> FilterParams {
    if let Some(nested) = request.get(NESTED_FILTER_PARAM).and_then(ParamValue::as_group) {
        return FilterParams::from(nested.clone());
    }

    request
        .params()
        .iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            key != term_key
                && key != NESTED_FILTER_PARAM
                && key != PAYLOAD_PARAM
                && !ROUTING_KEYS.contains(&key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn paging_value(raw: Option<ParamValue>, name: &str, default: u64) -> u64 {
    match raw {
        None => default,
        Some(value) => value.as_positive_u64().unwrap_or_else(|| {
            log::warn!("ignoring invalid {name} parameter {value:?}, using {default}");
            default
        }),
    }
}
