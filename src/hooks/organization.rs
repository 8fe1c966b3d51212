// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Organization hooks and organization switching.

use tracing::info;

use crate::cache::{QueryKey, QueryKeys};
use crate::error::SyncResult;
use crate::models::{
    HasPermissionParams, Invitation, InvitationQuery, MemberList, Organization, OrganizationQuery,
    OrganizationScope, PermissionCheck, SetActiveOrganizationParams, UpdateOrganizationParams,
};
use crate::mutation::AuthMutation;
use crate::provider::{AccountView, AuthContext, OrganizationView};
use crate::query::AuthQuery;

/// What [`AuthContext::switch_organization`] does after the server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Refetch the active organization and the organization list
    pub refetch: bool,
    /// Navigate to the organization (or personal) page
    pub navigate: bool,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            refetch: true,
            navigate: true,
        }
    }
}

fn patch_organization(
    cached: &Option<Organization>,
    params: &UpdateOrganizationParams,
) -> Option<Option<Organization>> {
    cached
        .as_ref()
        .filter(|org| org.id == params.organization_id)
        .map(|org| Some(params.data.apply_to(org)))
}

impl AuthContext {
    /// Cache key of one organization; the bare key means the active one.
    pub fn organization_key(&self, query: &OrganizationQuery) -> QueryKey {
        if query.is_active() {
            self.keys.full_organization.clone()
        } else {
            QueryKeys::scoped(&self.keys.full_organization, query)
        }
    }

    pub fn list_organizations(&self) -> AuthQuery<Vec<Organization>> {
        self.gated_query(self.keys.list_organizations.clone(), |client, options| async move {
            client.list_organizations(options).await
        })
    }

    /// Full organization by id or slug, or the active one for an empty query.
    pub fn full_organization(&self, query: OrganizationQuery) -> AuthQuery<Option<Organization>> {
        let key = self.organization_key(&query);
        self.gated_query(key, move |client, options| {
            let query = query.clone();
            async move { client.get_full_organization(query, options).await }
        })
    }

    /// Update an organization. Both its id-scoped entry and the active
    /// organization entry are patched optimistically when they hold the
    /// organization named in the parameters.
    pub fn update_organization(&self) -> AuthMutation<UpdateOrganizationParams, Organization> {
        let base = self.keys.full_organization.clone();
        let active = self.keys.full_organization.clone();
        self.bound_mutation(self.keys.full_organization.clone(), |client, params, options| async move {
            client.update_organization(params, options).await
        })
        .optimistic_at(
            move |params: &UpdateOrganizationParams| {
                QueryKeys::scoped(&base, &OrganizationQuery::by_id(params.organization_id.as_str()))
            },
            patch_organization,
        )
        .optimistic_at(move |_: &UpdateOrganizationParams| active.clone(), patch_organization)
        .invalidates_resource(self.keys.full_organization.clone())
        .invalidates(self.keys.list_organizations.clone())
    }

    /// Change the active organization; `None` selects the personal workspace.
    pub fn set_active_organization(&self) -> AuthMutation<SetActiveOrganizationParams, Option<Organization>> {
        self.bound_mutation(
            self.keys.full_organization.clone(),
            |client, params, options| async move {
                client.set_active_organization(params, options).await
            },
        )
        .invalidates(self.keys.session.clone())
        .invalidates_resource(self.keys.has_permission.clone())
        .invalidates_resource(self.keys.list_members.clone())
        .invalidates_resource(self.keys.list_invitations.clone())
    }

    pub fn has_permission(&self, params: HasPermissionParams) -> AuthQuery<PermissionCheck> {
        let key = QueryKeys::scoped(&self.keys.has_permission, &params);
        self.gated_query(key, move |client, options| {
            let params = params.clone();
            async move { client.has_permission(params, options).await }
        })
    }

    pub fn invitation(&self, query: InvitationQuery) -> AuthQuery<Invitation> {
        let key = QueryKeys::scoped(&self.keys.invitation, &query);
        self.gated_query(key, move |client, options| {
            let query = query.clone();
            async move { client.get_invitation(query, options).await }
        })
    }

    pub fn list_invitations(&self, scope: OrganizationScope) -> AuthQuery<Vec<Invitation>> {
        let key = QueryKeys::scoped(&self.keys.list_invitations, &scope);
        self.gated_query(key, move |client, options| {
            let scope = scope.clone();
            async move { client.list_invitations(scope, options).await }
        })
    }

    pub fn list_user_invitations(&self) -> AuthQuery<Vec<Invitation>> {
        self.gated_query(self.keys.list_user_invitations.clone(), |client, options| async move {
            client.list_user_invitations(options).await
        })
    }

    pub fn list_members(&self, scope: OrganizationScope) -> AuthQuery<MemberList> {
        let key = QueryKeys::scoped(&self.keys.list_members, &scope);
        self.gated_query(key, move |client, options| {
            let scope = scope.clone();
            async move { client.list_members(scope, options).await }
        })
    }

    /// Make `organization` active, then refetch, remember and navigate.
    ///
    /// Requires the organization provider. Returns the organization the
    /// server made active.
    pub async fn switch_organization(
        &self,
        organization: Option<&Organization>,
        options: SwitchOptions,
    ) -> SyncResult<Option<Organization>> {
        let config = self.organization()?.clone();

        let params = SetActiveOrganizationParams {
            organization_id: organization.map(|org| org.id.clone()),
            organization_slug: None,
        };
        let active = self.set_active_organization().mutate_async(params).await?;
        info!(
            organization = ?organization.map(|org| org.id.as_str()),
            "Switched active organization"
        );

        if options.refetch {
            self.full_organization(OrganizationQuery::default()).refetch().await;
            self.list_organizations().refetch().await;
        }

        self.set_last_visited_organization(organization);

        if options.navigate {
            let href = match organization {
                Some(org) => config.path(OrganizationView::Settings, Some(&org.slug)),
                None => config
                    .personal_path
                    .clone()
                    .or_else(|| self.config.account_path(AccountView::Settings))
                    .unwrap_or_else(|| self.config.redirect_to.clone()),
            };
            self.navigator.navigate(&href);
        }

        Ok(active)
    }
}
