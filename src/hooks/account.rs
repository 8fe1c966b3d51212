// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Linked accounts, profile, API keys and passkeys.

use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{
    Account, ApiKey, CreateApiKeyParams, CreatedApiKey, DeleteApiKeyParams, DeletePasskeyParams,
    Passkey, SessionData, UnlinkAccountParams, UpdateUserParams,
};
use crate::mutation::AuthMutation;
use crate::provider::{AuthContext, ImageFile, ImageHandler};
use crate::query::AuthQuery;

async fn discard_image(handler: &dyn ImageHandler, url: &str) {
    if let Err(err) = handler.delete(url).await {
        warn!(url = %url, error = %err, "Failed to delete image");
    }
}

impl AuthContext {
    pub fn list_accounts(&self) -> AuthQuery<Vec<Account>> {
        self.gated_query(self.keys.list_accounts.clone(), |client, options| async move {
            client.list_accounts(options).await
        })
    }

    pub fn unlink_account(&self) -> AuthMutation<UnlinkAccountParams, ()> {
        self.bound_mutation(
            self.keys.list_accounts.clone(),
            |client, params, options| async move { client.unlink_account(params, options).await },
        )
        .optimistic(|accounts: &Vec<Account>, params: &UnlinkAccountParams| {
            accounts
                .iter()
                .filter(|account| {
                    let same_provider = account.provider_id == params.provider_id;
                    let same_account = params
                        .account_id
                        .as_ref()
                        .map_or(true, |id| &account.account_id == id);
                    !(same_provider && same_account)
                })
                .cloned()
                .collect()
        })
    }

    /// Update the signed-in user; the cached session shows the change at once.
    pub fn update_user(&self) -> AuthMutation<UpdateUserParams, ()> {
        self.bound_mutation(
            self.keys.session.clone(),
            |client, params, options| async move { client.update_user(params, options).await },
        )
        .optimistic(|session: &Option<SessionData>, params: &UpdateUserParams| {
            session.as_ref().map(|data| SessionData {
                session: data.session.clone(),
                user: params.apply_to(&data.user),
            })
        })
    }

    /// Upload `image` through the image handler and make it the avatar.
    ///
    /// The previous avatar is deleted once the profile update succeeds; on
    /// failure the fresh upload is deleted instead. Returns the new URL.
    pub async fn update_avatar(&self, image: ImageFile) -> SyncResult<String> {
        if self.config.avatar.is_none() {
            return Err(SyncError::Config("avatar is disabled".to_string()));
        }
        let handler = self
            .image_handler
            .clone()
            .ok_or_else(|| SyncError::Config("avatar upload needs an image handler".to_string()))?;

        let previous = self
            .cache
            .get::<Option<SessionData>>(&self.keys.session)?
            .flatten()
            .and_then(|data| data.user.image);

        let url = match handler.upload(image).await {
            Ok(url) => url,
            Err(err) => {
                let err = SyncError::Remote(err);
                self.cache.report_error(&self.keys.session, &err);
                return Err(err);
            }
        };

        let params = UpdateUserParams {
            image: Some(url.clone()),
            ..Default::default()
        };
        if let Err(err) = self.update_user().mutate_async(params).await {
            discard_image(handler.as_ref(), &url).await;
            return Err(err);
        }

        if let Some(previous) = previous.filter(|previous| *previous != url) {
            discard_image(handler.as_ref(), &previous).await;
        }
        info!(url = %url, "Avatar updated");
        Ok(url)
    }

    pub fn list_api_keys(&self) -> AuthQuery<Vec<ApiKey>> {
        self.gated_query(self.keys.list_api_keys.clone(), |client, options| async move {
            client.list_api_keys(options).await
        })
    }

    /// The secret is only in the returned value; the list refetches without it.
    pub fn create_api_key(&self) -> AuthMutation<CreateApiKeyParams, CreatedApiKey> {
        self.bound_mutation(
            self.keys.list_api_keys.clone(),
            |client, params, options| async move { client.create_api_key(params, options).await },
        )
    }

    pub fn delete_api_key(&self) -> AuthMutation<DeleteApiKeyParams, ()> {
        self.bound_mutation(
            self.keys.list_api_keys.clone(),
            |client, params, options| async move { client.delete_api_key(params, options).await },
        )
        .optimistic(|keys: &Vec<ApiKey>, params: &DeleteApiKeyParams| {
            keys.iter().filter(|key| key.id != params.key_id).cloned().collect()
        })
    }

    pub fn list_passkeys(&self) -> AuthQuery<Vec<Passkey>> {
        self.gated_query(self.keys.list_passkeys.clone(), |client, options| async move {
            client.list_passkeys(options).await
        })
    }

    pub fn delete_passkey(&self) -> AuthMutation<DeletePasskeyParams, ()> {
        self.bound_mutation(
            self.keys.list_passkeys.clone(),
            |client, params, options| async move { client.delete_passkey(params, options).await },
        )
        .optimistic(|passkeys: &Vec<Passkey>, params: &DeletePasskeyParams| {
            passkeys
                .iter()
                .filter(|passkey| passkey.id != params.id)
                .cloned()
                .collect()
        })
    }
}
