/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::borrow::Cow;

/// The error kinds surfaced across the core's operations.
///
/// `Duplicate` is deliberately *not* a failure from the caller's point of
/// view: it means "the operation is already in the requested state".
/// Callers that only care about success/failure should match on it
/// alongside `Ok`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(Cow<'static, str>),

    #[error("bad parameter: {0}")]
    BadParameter(Cow<'static, str>),

    #[error("unavailable: {0}")]
    Unavailable(Cow<'static, str>),

    #[error("not permitted: {0}")]
    NotPermitted(Cow<'static, str>),

    #[error("unsupported: {0}")]
    Unsupported(Cow<'static, str>),

    #[error("operation already in progress (duplicate): {0}")]
    Duplicate(Cow<'static, str>),

    #[error("retries exhausted")]
    Overflow,

    #[error("busy: {0}")]
    Busy(Cow<'static, str>),

    #[error("fault: {0}")]
    Fault(Cow<'static, str>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::NotFound(detail.into())
    }

    pub fn bad_parameter(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::BadParameter(detail.into())
    }

    pub fn unavailable(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::Unavailable(detail.into())
    }

    pub fn not_permitted(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::NotPermitted(detail.into())
    }

    pub fn unsupported(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::Unsupported(detail.into())
    }

    pub fn duplicate(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::Duplicate(detail.into())
    }

    pub fn busy(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::Busy(detail.into())
    }

    pub fn fault(detail: impl Into<Cow<'static, str>>) -> Self {
        Error::Fault(detail.into())
    }

    /// True for outcomes the caller should treat as a successful no-op.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }
}
