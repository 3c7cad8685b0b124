//! Group lifecycle API.
//!
//! Registration endpoints authenticate with the group token, everything
//! else with the member auth token. The draw endpoints only move key
//! material that is either wrapped or public.

use async_trait::async_trait;

use crate::dto::{
    CreateGroupRequest, CreateUserRequest, FinishDrawRequest, InitDrawResponse,
    JoinGroupRequest, UpdateWishesRequest, UpdateWishesResponse,
};
use crate::draw::DrawTransport;
use crate::error::GroupError;
use crate::http::SharedApiClient;
use crate::identity::{GroupRegistration, UserRegistration};
use santa_core::{Group, GroupInfo};

const BASE_PATH: &str = "/group";

/// A member's public profile at registration time.
pub struct NewMember {
    pub username: String,
    pub email: String,
}

pub struct GroupApi {
    api: SharedApiClient,
}

impl GroupApi {
    pub fn new(api: SharedApiClient) -> Self {
        Self { api }
    }

    fn user_request(member: NewMember, keys: UserRegistration) -> CreateUserRequest {
        CreateUserRequest {
            username: member.username,
            email: member.email,
            password_verifier: keys.password_verifier,
            public_key_secret: keys.public_key_secret,
            private_key_encrypted: keys.private_key_encrypted,
        }
    }

    /// Register a new group with its organizer as first member.
    pub async fn create_group(
        &self,
        name: &str,
        registration: GroupRegistration,
        admin: NewMember,
        admin_keys: UserRegistration,
    ) -> Result<Group, GroupError> {
        self.api
            .post(
                BASE_PATH,
                &CreateGroupRequest {
                    name: name.to_string(),
                    secret_verifier: registration.secret_verifier,
                    admin: Self::user_request(admin, admin_keys),
                },
            )
            .await
            .map_err(GroupError::from_api)
    }

    /// Register a new member. Requires the group token from a group
    /// login.
    pub async fn join_group(
        &self,
        member: NewMember,
        keys: UserRegistration,
    ) -> Result<Group, GroupError> {
        let group_token = self
            .api
            .with_session(|s| s.group_token().map(String::from))
            .ok_or(GroupError::Auth)?;

        self.api
            .post(
                &format!("{BASE_PATH}/join"),
                &JoinGroupRequest {
                    group_token,
                    user: Self::user_request(member, keys),
                },
            )
            .await
            .map_err(GroupError::from_api)
    }

    /// Fetch the authenticated member's group, members and result list
    /// included.
    pub async fn get_group(&self) -> Result<Group, GroupError> {
        self.api
            .get(BASE_PATH)
            .await
            .map_err(GroupError::from_api)
    }

    /// Public name lookup; `None` when the id is unknown.
    pub async fn get_group_info(&self, group_id: &str) -> Result<Option<GroupInfo>, GroupError> {
        match self
            .api
            .get::<GroupInfo>(&format!("{BASE_PATH}/info/{group_id}"))
            .await
        {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.status().map(|s| s.as_u16()) == Some(404) => Ok(None),
            Err(e) => Err(GroupError::from_api(e)),
        }
    }

    pub async fn update_wishes(&self, wishes: &str) -> Result<String, GroupError> {
        let response: UpdateWishesResponse = self
            .api
            .put(
                &format!("{BASE_PATH}/wishes"),
                &UpdateWishesRequest {
                    wishes: wishes.to_string(),
                },
            )
            .await
            .map_err(GroupError::from_api)?;
        Ok(response.wishes)
    }

    /// Draw phase 1: open a draw session and fetch every member's
    /// wrapped public key in server-chosen random order.
    pub async fn init_draw(&self) -> Result<Vec<String>, GroupError> {
        let response: InitDrawResponse = self
            .api
            .get(&format!("{BASE_PATH}/draw"))
            .await
            .map_err(GroupError::from_api)?;
        Ok(response.public_keys_secret)
    }

    /// Draw phase 3 upload: hand the rotated cleartext keys back so the
    /// server can pair them with its retained identity order.
    pub async fn finish_draw(&self, public_keys: Vec<String>) -> Result<(), GroupError> {
        self.api
            .post_empty(&format!("{BASE_PATH}/draw"), &FinishDrawRequest { public_keys })
            .await
            .map_err(GroupError::from_api)
    }

    /// Remove a member. Organizer only, and only before the draw.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), GroupError> {
        self.api
            .delete(&format!("{BASE_PATH}/user/{user_id}"))
            .await
            .map_err(GroupError::from_api)
    }

    /// Leave the group, erasing this member's record server-side.
    pub async fn leave_group(&self) -> Result<(), GroupError> {
        self.api
            .delete(&format!("{BASE_PATH}/leave"))
            .await
            .map_err(GroupError::from_api)
    }
}

#[async_trait]
impl DrawTransport for GroupApi {
    async fn fetch_wrapped_keys(&self) -> Result<Vec<String>, GroupError> {
        self.init_draw().await
    }

    async fn submit_shuffled_keys(&self, public_keys: Vec<String>) -> Result<(), GroupError> {
        self.finish_draw(public_keys).await
    }
}
