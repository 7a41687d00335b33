//! Calendar use-case services.
//!
//! # Responsibility
//! - Orchestrate expansion and repository calls into use-case APIs.
//! - Keep rendering/routing consumers decoupled from storage details.
//!
//! # Invariants
//! - Site scoping is always explicit through `SiteContext`.
//! - A rule is expanded before anything is written for it.

use crate::model::event::{CategoryId, EventId};
use crate::recurrence::InvalidRuleError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod agenda;
pub mod event_service;
pub mod feed;
pub mod occurrence_service;
pub mod site_context;

pub use site_context::{SiteContext, TenantResolutionError};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    InvalidRule(InvalidRuleError),
    Tenant(TenantResolutionError),
    EventNotFound(EventId),
    CategoryNotFound(CategoryId),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRule(err) => write!(f, "{err}"),
            Self::Tenant(err) => write!(f, "{err}"),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::CategoryNotFound(id) => write!(f, "event category not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRule(err) => Some(err),
            Self::Tenant(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::EventNotFound(_) | Self::CategoryNotFound(_) => None,
        }
    }
}

impl From<InvalidRuleError> for ServiceError {
    fn from(value: InvalidRuleError) -> Self {
        Self::InvalidRule(value)
    }
}

impl From<TenantResolutionError> for ServiceError {
    fn from(value: TenantResolutionError) -> Self {
        Self::Tenant(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "event",
                id,
            } => Self::EventNotFound(id),
            RepoError::NotFound {
                entity: "event category",
                id,
            } => Self::CategoryNotFound(id),
            other => Self::Repo(other),
        }
    }
}
