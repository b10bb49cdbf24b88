//! Shared exposure validation for Install and UpdateConfig

use homestack_core::{validate_domain, Error, Manifest, Result};

use crate::{AppContext, AppForm};

/// Validate the exposure half of a form against the manifest and other apps.
/// Runs before any row mutation.
pub(crate) async fn validate_exposure(
    ctx: &AppContext,
    app_id: &str,
    manifest: &Manifest,
    form: &AppForm,
) -> Result<()> {
    if form.exposed {
        let domain = form
            .domain
            .as_deref()
            .ok_or_else(|| Error::DomainRequired(app_id.to_string()))?;

        if !validate_domain(domain) {
            return Err(Error::InvalidDomain(domain.to_string()));
        }
        if !manifest.exposable {
            return Err(Error::NotExposable(app_id.to_string()));
        }
        if let Some(holder) = ctx.db.apps().domain_in_use(domain, app_id).await? {
            return Err(Error::DomainInUse {
                domain: domain.to_string(),
                app_id: holder,
            });
        }
    } else if manifest.force_expose {
        return Err(Error::ForceExposeRequired(app_id.to_string()));
    }

    Ok(())
}
