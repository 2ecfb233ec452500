use std::{iter, slice, vec};

use thiserror::Error;

use crate::{scope::EMPTY_SCOPE, Scope};

/// Indicates the requester held insufficient scope to be granted access
/// to a controlled resource
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Error)]
#[error("insufficient scope")]
pub struct InsufficientScope;

/// An access policy based on OAuth2 scopes
///
/// This access policy takes the form of alternatives around required scopes.
/// This policy will allow access if any of the alternatives would allow
/// access. If the policy contains no alternatives, the default effect is to
/// deny access.
///
/// # Examples
///
/// ## Deny all requests
/// ```
/// use cachet_oauth2::{Scope, ScopePolicy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = ScopePolicy::deny_all();
///
/// let held = Scope::single("admin".parse()?);
/// assert!(policy.evaluate(&held).is_err());
/// # Ok(())
/// # }
/// ```
///
/// ## Allow any request
/// ```
/// use cachet_oauth2::{Scope, ScopePolicy};
///
/// let policy = ScopePolicy::allow_any();
///
/// let held = Scope::empty();
/// assert!(policy.evaluate(&held).is_ok());
/// ```
///
/// ## Allow requests with a single scope
/// ```
/// use cachet_oauth2::{Scope, ScopePolicy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = ScopePolicy::allow_one(
///     Scope::single("admin".parse()?)
/// );
///
/// let held = Scope::from_scope_tokens(vec![
///     "admin".parse()?,
///     "user".parse()?,
/// ]);
/// assert!(policy.evaluate(&held).is_ok());
///
/// let user_held = Scope::from_scope_tokens(vec![
///     "user".parse()?,
/// ]);
/// assert!(policy.evaluate(&user_held).is_err());
/// # Ok(())
/// # }
/// ```
///
/// ## Allow requests with multiple potential sets of scopes
/// ```
/// use cachet_oauth2::{Scope, ScopePolicy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut policy = ScopePolicy::deny_all();
/// policy.allow(Scope::single("admin".parse()?));
/// policy.allow(Scope::from_scope_tokens(vec![
///     "special".parse()?,
///     "user".parse()?,
/// ]));
///
/// let admin_held = Scope::from_scope_tokens(vec![
///     "admin".parse()?,
/// ]);
/// assert!(policy.evaluate(&admin_held).is_ok());
///
/// let user_held = Scope::from_scope_tokens(vec![
///     "user".parse()?,
/// ]);
/// assert!(policy.evaluate(&user_held).is_err());
///
/// let special_user_held = Scope::from_scope_tokens(vec![
///     "special".parse()?,
///     "user".parse()?,
/// ]);
/// assert!(policy.evaluate(&special_user_held).is_ok());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct ScopePolicy {
    inner: ScopePolicyInner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ScopePolicyInner {
    DenyAll,
    AllowAny,
    AllowOne(Scope),
    AllowMany(Vec<Scope>),
}

impl Default for ScopePolicy {
    #[inline]
    fn default() -> Self {
        Self::deny_all()
    }
}

impl ScopePolicy {
    /// Constructs a policy that has no permissible alternatives
    ///
    /// By default, this policy will deny all requests
    #[inline]
    pub const fn deny_all() -> Self {
        Self {
            inner: ScopePolicyInner::DenyAll,
        }
    }

    /// Constructs a policy that does not require any scopes (allow)
    #[inline]
    pub const fn allow_any() -> Self {
        Self {
            inner: ScopePolicyInner::AllowAny,
        }
    }

    /// Constructs a policy that requires this set of scopes
    #[inline]
    pub const fn allow_one(scope: Scope) -> Self {
        Self {
            inner: ScopePolicyInner::AllowOne(scope),
        }
    }

    /// Add an alternate allowable scope
    #[inline]
    pub fn or_allow(self, scope: Scope) -> Self {
        if scope.is_empty() {
            let mut this = self;
            this.inner = ScopePolicyInner::AllowAny;
            this
        } else {
            match self.inner {
                ScopePolicyInner::AllowAny => Self::allow_any(),
                ScopePolicyInner::DenyAll => Self::allow_one(scope),
                ScopePolicyInner::AllowOne(existing) => Self {
                    inner: ScopePolicyInner::AllowMany(vec![existing, scope]),
                },
                ScopePolicyInner::AllowMany(mut scopes) => {
                    scopes.push(scope);
                    Self {
                        inner: ScopePolicyInner::AllowMany(scopes),
                    }
                }
            }
        }
    }

    /// Add an alternate allowable scope
    pub fn allow(&mut self, scope: Scope) {
        let this = std::mem::take(self);
        *self = this.or_allow(scope);
    }

    /// Constructs a policy that requires this set of scopes from a string
    ///
    /// # Panics
    ///
    /// This function will panic if the provided string is not a valid [`Scope`].
    pub fn allow_one_from_static(scope: &'static str) -> Self {
        match scope.parse::<Scope>() {
            Ok(scope) => Self::allow_one(scope),
            Err(err) => panic!("{}: scope = {}", err, scope),
        }
    }

    /// Add an alternate allowable scope from a string
    ///
    /// # Panics
    ///
    /// This function will panic if the provided string is not a valid [`Scope`].
    pub fn or_allow_from_static(self, scope: &'static str) -> Self {
        match scope.parse::<Scope>() {
            Ok(scope) => self.or_allow(scope),
            Err(err) => panic!("{}: scope = {}", err, scope),
        }
    }

    /// Evaluates whether the held scope satisfies any of this policy's
    /// alternatives
    ///
    /// # Errors
    ///
    /// Returns an error if no alternative is satisfied by the held scope.
    pub fn evaluate(&self, held: &Scope) -> Result<(), InsufficientScope> {
        let allowed = self.into_iter().any(|req| held.contains_all(req));

        if allowed {
            Ok(())
        } else {
            Err(InsufficientScope)
        }
    }

    const fn is_allow_all(&self) -> bool {
        matches!(self.inner, ScopePolicyInner::AllowAny)
    }
}

impl IntoIterator for ScopePolicy {
    type Item = Scope;
    type IntoIter = IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        let inner = match self.inner {
            ScopePolicyInner::DenyAll => IntoIterInner::Empty,
            ScopePolicyInner::AllowAny => IntoIterInner::One(iter::once(Scope::empty())),
            ScopePolicyInner::AllowOne(scope) => IntoIterInner::One(iter::once(scope)),
            ScopePolicyInner::AllowMany(scopes) => IntoIterInner::Many(scopes.into_iter()),
        };
        IntoIter { inner }
    }
}

/// An iterator over the scopes in a [`ScopePolicy`]
#[derive(Debug)]
pub struct IntoIter {
    inner: IntoIterInner,
}

#[derive(Debug)]
enum IntoIterInner {
    Empty,
    One(iter::Once<Scope>),
    Many(vec::IntoIter<Scope>),
}

impl Iterator for IntoIter {
    type Item = Scope;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IntoIterInner::Empty => None,
            IntoIterInner::One(iter) => iter.next(),
            IntoIterInner::Many(iter) => iter.next(),
        }
    }
}

/// An iterator over a set of borrowed scopes
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    inner: IterInner<'a>,
}

#[derive(Clone, Debug)]
enum IterInner<'a> {
    Empty,
    One(iter::Once<&'a Scope>),
    Many(slice::Iter<'a, Scope>),
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Scope;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Empty => None,
            IterInner::One(iter) => iter.next(),
            IterInner::Many(iter) => iter.next(),
        }
    }
}

impl<'a> IntoIterator for &'a ScopePolicy {
    type Item = &'a Scope;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            inner: match &self.inner {
                ScopePolicyInner::DenyAll => IterInner::Empty,
                ScopePolicyInner::AllowAny => IterInner::One(iter::once(&*EMPTY_SCOPE)),
                ScopePolicyInner::AllowOne(scope) => IterInner::One(iter::once(scope)),
                ScopePolicyInner::AllowMany(scopes) => IterInner::Many(scopes.iter()),
            },
        }
    }
}

impl Extend<Scope> for ScopePolicy {
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Scope>,
    {
        for scope in iter {
            self.allow(scope);

            if self.is_allow_all() {
                break;
            }
        }
    }
}

impl iter::FromIterator<Scope> for ScopePolicy {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Scope>,
    {
        let mut set = Self::deny_all();
        set.extend(iter);
        set
    }
}

impl From<Scope> for ScopePolicy {
    #[inline]
    fn from(scope: Scope) -> Self {
        Self::allow_one(scope)
    }
}

/// Construct a policy from a list of scope alternatives.
///
/// For more information about how the alternatives are evaluated, see [`ScopePolicy`].
///
/// ```
/// use cachet_oauth2::{scope, policy};
///
/// let policy = policy![
///     scope!["admin"],
///     scope!["special", "user"],
/// ];
/// ```
///
/// This is equivalent to the following:
///
/// ```
/// use cachet_oauth2::{ScopePolicy, scope};
///
/// let policy = ScopePolicy::deny_all()
///     .or_allow(scope!["admin"])
///     .or_allow(scope!["special", "user"]);
/// ```
#[macro_export]
macro_rules! policy {
    ($($scope:expr),* $(,)?) => {
        $crate::ScopePolicy::deny_all()
        $(
            .or_allow($scope)
        )*
    };
}

#[cfg(test)]
mod tests {
    use crate::scope;

    use super::*;

    #[test]
    fn deny_all_denies_even_the_empty_scope() {
        assert!(ScopePolicy::deny_all().evaluate(&Scope::empty()).is_err());
    }

    #[test]
    fn allow_any_accepts_the_empty_scope() {
        assert!(ScopePolicy::allow_any().evaluate(&Scope::empty()).is_ok());
    }

    #[test]
    fn superset_of_a_required_scope_is_accepted() {
        let policy = policy![scope!["users:read"]];
        assert!(policy
            .evaluate(&scope!["users:read", "users:write"])
            .is_ok());
    }

    #[test]
    fn any_matching_alternative_is_sufficient() {
        let policy = policy![scope!["admin"], scope!["special", "user"]];
        assert!(policy.evaluate(&scope!["special", "user"]).is_ok());
        assert!(policy.evaluate(&scope!["admin"]).is_ok());
        assert!(policy.evaluate(&scope!["user"]).is_err());
    }

    #[test]
    fn allowing_the_empty_scope_allows_everything() {
        let policy = ScopePolicy::deny_all().or_allow(Scope::empty());
        assert!(policy.evaluate(&Scope::empty()).is_ok());
    }
}
