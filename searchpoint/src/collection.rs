//! Capabilities the pipeline consumes: the queryable collection, authorization and decoration.

use std::future::Future;

use crate::errors::Result;
use crate::filters::Predicate;
use crate::order::OrderClause;
use crate::params::Principal;

/// A lazily composed query over some record store.
///
/// Every builder step consumes the collection and returns the narrowed one; nothing
/// touches storage until [`Queryable::load`]. Like a relational query builder, the
/// window (limit or page) applies to the final filtered set no matter when it was set.
pub trait Queryable: Sized {
    type Record;

    /// Narrow by a registered scope. Unknown names are [`SearchError::UnknownScope`](crate::SearchError::UnknownScope).
    fn apply_scope(self, name: &str) -> Result<Self>;

    /// Preload associations. Unknown hints are [`SearchError::UnknownInclude`](crate::SearchError::UnknownInclude).
    fn eager_load(self, hints: &[String]) -> Result<Self>;

    fn order(self, clause: &OrderClause) -> Result<Self>;

    fn limit(self, limit: u64) -> Self;

    /// 1-based page of `per_page` rows.
    fn page(self, page: u64, per_page: u64) -> Self;

    /// Apply the conjunctive filter predicate.
    fn filter(self, predicate: &Predicate) -> Result<Self>;

    /// Execute and materialize the ordered records.
    fn load(self) -> impl Future<Output = Result<Vec<Self::Record>>> + Send;
}

/// Authorization scope applied to every non-empty search before its predicate.
pub trait Authorizer<Q>: Send + Sync {
    fn authorize(&self, principal: Option<&Principal>, collection: Q) -> Result<Q>;
}

/// Authorizer that lets every principal see the whole collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl<Q> Authorizer<Q> for Unrestricted {
    fn authorize(&self, _principal: Option<&Principal>, collection: Q) -> Result<Q> {
        Ok(collection)
    }
}

/// Closure-backed authorizer.
///
/// ```
/// use searchpoint::collection::{Authorizer, FnAuthorizer};
/// use searchpoint::SearchError;
///
/// let signed_in = FnAuthorizer::new(|principal, collection: Vec<u32>| match principal {
///     Some(_) => Ok(collection),
///     None => Err(SearchError::Forbidden { message: "sign in first".into() }),
/// });
/// assert!(signed_in.authorize(None, vec![1]).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnAuthorizer<F>(F);

impl<F> FnAuthorizer<F> {
    pub fn new<Q>(authorize: F) -> Self
    where
        F: Fn(Option<&Principal>, Q) -> Result<Q> + Send + Sync,
    {
        Self(authorize)
    }
}

impl<Q, F> Authorizer<Q> for FnAuthorizer<F>
where
    F: Fn(Option<&Principal>, Q) -> Result<Q> + Send + Sync,
{
    fn authorize(&self, principal: Option<&Principal>, collection: Q) -> Result<Q> {
        (self.0)(principal, collection)
    }
}

/// Presentation wrapper applied to each loaded record before projection.
pub trait Decorator<R>: Send + Sync {
    type Output;

    fn decorate(&self, record: R) -> Self::Output;
}

/// No decoration: records are projected as loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl<R> Decorator<R> for Plain {
    type Output = R;

    #[inline]
    fn decorate(&self, record: R) -> R {
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SearchError;

    #[test]
    fn unrestricted_passes_collection_through() {
        let collection = Unrestricted.authorize(None, vec![1, 2, 3]).expect("allowed");
        assert_eq!(collection, vec![1, 2, 3]);
    }

    #[test]
    fn closure_authorizer_sees_principal() {
        let admins_only = FnAuthorizer::new(|principal: Option<&Principal>, collection: Vec<u8>| {
            if principal.is_some_and(|p| p.has_role("admin")) {
                Ok(collection)
            } else {
                Err(SearchError::Forbidden {
                    message: "admins only".into(),
                })
            }
        });
        let admin = Principal::new("1").with_role("admin");
        assert!(admins_only.authorize(Some(&admin), vec![1]).is_ok());
        assert!(matches!(
            admins_only.authorize(Some(&Principal::new("2")), vec![1]),
            Err(SearchError::Forbidden { .. })
        ));
    }
}
