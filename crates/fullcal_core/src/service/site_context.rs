//! Explicit tenant context.

use crate::model::site::{Site, SiteId};
use crate::repo::site_repo::SiteRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// A resolved site that scoped queries and writes run against.
///
/// Only constructible through `resolve`, so holding one proves the site
/// exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    site: Site,
}

impl SiteContext {
    /// Resolves `site_id` against stored sites.
    ///
    /// # Errors
    /// - `MissingSite` when no id is given.
    /// - `UnknownSite` when the id is not stored.
    pub fn resolve<R: SiteRepository>(
        repo: &R,
        site_id: Option<SiteId>,
    ) -> Result<Self, TenantResolutionError> {
        let site_id = site_id.ok_or(TenantResolutionError::MissingSite)?;
        let site = repo
            .get_site(site_id)
            .map_err(TenantResolutionError::Repo)?
            .ok_or(TenantResolutionError::UnknownSite(site_id))?;
        Ok(Self { site })
    }

    pub fn site_id(&self) -> SiteId {
        self.site.id
    }

    pub fn site(&self) -> &Site {
        &self.site
    }
}

#[derive(Debug)]
pub enum TenantResolutionError {
    MissingSite,
    UnknownSite(SiteId),
    Repo(RepoError),
}

impl Display for TenantResolutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSite => write!(f, "no current site could be resolved"),
            Self::UnknownSite(id) => write!(f, "site {id} does not exist"),
            Self::Repo(err) => write!(f, "failed to resolve site: {err}"),
        }
    }
}

impl Error for TenantResolutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::MissingSite | Self::UnknownSite(_) => None,
        }
    }
}
