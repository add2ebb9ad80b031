//! Maps instance URLs to Instance/Site/Account rows.
//!
//! All operations are get-or-create. Uniqueness is not enforced at the
//! store level; concurrent writers may race to create the same logical row,
//! and lookups take the first match while counting the anomaly.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use crate::api::SiteInfo;
use crate::database::changes::Entity;
use crate::database::models::{AccountRecord, InstanceRecord, SiteRecord};
use crate::database::repositories::{
    AccountRepository, InstanceRepository, SiteRepository, SqliteRepositories,
};
use crate::database::Database;
use crate::identity::{normalized_instance_url, SUGGESTED_INSTANCES};
use crate::metrics::{note_duplicates, IntegrityMetrics};
use crate::utils::now_utc_iso;

#[derive(Clone)]
pub struct SiteResolver {
    database: Database,
    metrics: Arc<IntegrityMetrics>,
}

impl SiteResolver {
    pub fn new(database: Database, metrics: Arc<IntegrityMetrics>) -> Self {
        Self { database, metrics }
    }

    /// Resolves a URL or bare hostname to its Site row, creating the
    /// Instance and Site on first contact. A URL that cannot be normalized
    /// is an error: this input comes from the developer or the user's own
    /// instance field, not from a remote server, so there is no skip path.
    pub fn site_for_url(&self, raw: &str) -> Result<SiteRecord> {
        let actor_id = normalized_instance_url(raw)
            .ok_or_else(|| anyhow!("malformed instance url: {raw:?}"))?;
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let (site, created) = site_for_actor_id(&repos, &metrics, &actor_id)?;
            let touched = if created {
                vec![Entity::Instance, Entity::Site]
            } else {
                Vec::new()
            };
            Ok((site, touched))
        })
    }

    /// The synthetic anonymous account for a site, created on first need.
    /// More than one signed-out account is a data-integrity anomaly, not an
    /// error: warn, count, first one wins.
    pub fn signed_out_account(&self, site: &SiteRecord) -> Result<AccountRecord> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let accounts = repos.accounts();
            let existing = accounts.find_signed_out(&site.id)?;
            note_duplicates(
                &metrics.duplicate_accounts,
                "signed-out account",
                &site.id,
                existing.len(),
            );
            if let Some(account) = existing.into_iter().next() {
                return Ok((account, Vec::new()));
            }
            let now = now_utc_iso();
            let account = AccountRecord {
                id: Uuid::new_v4().to_string(),
                site_id: site.id.clone(),
                username: None,
                signed_out: true,
                created_at: now.clone(),
                updated_at: now,
            };
            accounts.create(&account)?;
            Ok((account, vec![Entity::Account]))
        })
    }

    /// Ensures every built-in suggested instance has Instance+Site rows.
    /// Returns how many sites were newly created.
    pub fn seed_suggested_instances(&self) -> Result<usize> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let mut created = 0;
            for raw in SUGGESTED_INSTANCES {
                let actor_id = normalized_instance_url(raw)
                    .ok_or_else(|| anyhow!("malformed suggested instance: {raw:?}"))?;
                let (_site, was_created) = site_for_actor_id(&repos, &metrics, &actor_id)?;
                if was_created {
                    created += 1;
                }
            }
            let touched = if created > 0 {
                vec![Entity::Instance, Entity::Site]
            } else {
                Vec::new()
            };
            Ok((created, touched))
        })
    }

    /// Writes fetched site metadata onto the Site row.
    pub fn update_site_info(&self, site: &SiteRecord, info: &SiteInfo) -> Result<SiteRecord> {
        self.database.with_transaction(|repos| {
            let mut record = repos
                .sites()
                .get(&site.id)?
                .with_context(|| format!("site {} disappeared", site.id))?;
            record.name = info.name.clone();
            record.software = info.software.clone();
            record.default_listing_type = info.default_listing_type.clone();
            record.default_sort_type = info.default_sort_type.clone();
            record.site_info_fetched_at = Some(now_utc_iso());
            record.updated_at = now_utc_iso();
            repos.sites().update_site_info(&record)?;
            Ok((record, vec![Entity::Site]))
        })
    }
}

fn site_for_actor_id(
    repos: &SqliteRepositories<'_>,
    metrics: &IntegrityMetrics,
    actor_id: &str,
) -> Result<(SiteRecord, bool)> {
    let instances = repos.instances();
    let existing = instances.find_by_actor_id(actor_id)?;
    note_duplicates(&metrics.duplicate_instances, "instance", actor_id, existing.len());

    let (instance, mut created) = match existing.into_iter().next() {
        Some(instance) => (instance, false),
        None => {
            let instance = InstanceRecord {
                id: Uuid::new_v4().to_string(),
                actor_id: actor_id.to_string(),
                created_at: now_utc_iso(),
            };
            instances.create(&instance)?;
            (instance, true)
        }
    };

    let sites = repos.sites();
    let existing = sites.find_by_instance(&instance.id)?;
    note_duplicates(&metrics.duplicate_sites, "site", &instance.id, existing.len());
    let site = match existing.into_iter().next() {
        Some(site) => site,
        None => {
            let now = now_utc_iso();
            let site = SiteRecord {
                id: Uuid::new_v4().to_string(),
                instance_id: instance.id.clone(),
                name: None,
                software: None,
                default_listing_type: None,
                default_sort_type: None,
                site_info_fetched_at: None,
                created_at: now.clone(),
                updated_at: now,
            };
            sites.create(&site)?;
            created = true;
            site
        }
    };
    Ok((site, created))
}
