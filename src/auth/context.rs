// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped identity.
//!
//! The pipeline attaches a [`RequestIdentity`] to the request extensions once
//! a token validates. Downstream code reads it through
//! [`RequestIdentity::from_extensions`] (or the extractors), which returns
//! `None` for anonymous requests instead of an empty identity.
//!
//! The identity lives in the request's own extensions, so it is dropped with
//! the request and never shared with another one.

use std::sync::Arc;

use axum::http::{request::Parts, Extensions, HeaderMap, Method, Request, Uri};

use super::claims::Claims;

/// Validated identity for one request.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    claims: Arc<Claims>,
}

impl RequestIdentity {
    pub(crate) fn from_claims(claims: Claims) -> Self {
        Self {
            claims: Arc::new(claims),
        }
    }

    pub fn subject_id(&self) -> &str {
        self.claims.subject_id()
    }

    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }

    pub fn roles(&self) -> &[String] {
        self.claims.roles()
    }

    /// Full claims of the validated token.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn has_role(&self, required: &str) -> bool {
        self.claims.has_role(required)
    }

    /// Identity attached to a request, `None` when the request is anonymous.
    pub fn from_extensions(extensions: &Extensions) -> Option<&RequestIdentity> {
        extensions.get::<RequestIdentity>()
    }
}

/// Anything that exposes request headers and request-scoped extensions.
///
/// The pipeline is written against this trait; each framework adapter
/// provides the concrete request type.
pub trait IdentityCarrier {
    fn method(&self) -> &Method;
    fn uri(&self) -> &Uri;
    fn headers(&self) -> &HeaderMap;
    fn extensions(&self) -> &Extensions;
    fn extensions_mut(&mut self) -> &mut Extensions;

    /// Identity attached earlier in this request.
    fn identity(&self) -> Option<&RequestIdentity> {
        RequestIdentity::from_extensions(self.extensions())
    }

    /// Attach an identity. Write-once: if one is already attached it is kept
    /// and the new one is handed back as the error.
    fn attach_identity(&mut self, identity: RequestIdentity) -> Result<(), RequestIdentity> {
        if self.identity().is_some() {
            return Err(identity);
        }
        self.extensions_mut().insert(identity);
        Ok(())
    }
}

impl<B> IdentityCarrier for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn uri(&self) -> &Uri {
        Request::uri(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        Request::extensions_mut(self)
    }
}

impl IdentityCarrier for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
