use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::path::DatabasePath;

/// Caller-supplied profile data.
///
/// `user_uid` and `user_name` are required; an empty string counts as
/// absent. Deserializing from JSON tolerates missing required fields so that
/// [`ProfilePayload::into_document`] can report them as missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePayload {
    pub user_uid: String,
    pub user_name: String,
    pub last_name: Option<String>,
    pub photo: Option<String>,
    pub state: Option<String>,
    pub about: Option<String>,
}

impl ProfilePayload {
    pub fn new(user_uid: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_uid: user_uid.into(),
            user_name: user_name.into(),
            ..Default::default()
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// The path this profile is written to, `profiles/{userUid}`.
    pub fn path(&self) -> TypeResult<DatabasePath> {
        if self.user_uid.is_empty() {
            return Err(TypeError::MissingField("userUid"));
        }
        DatabasePath::profile(&self.user_uid)
    }

    /// Validate and expand into the stored document.
    ///
    /// `last_name`, `state` and `about` default to the empty string. `photo`
    /// passes through as given.
    pub fn into_document(self) -> TypeResult<ProfileDocument> {
        if self.user_uid.is_empty() {
            return Err(TypeError::MissingField("userUid"));
        }
        if self.user_name.is_empty() {
            return Err(TypeError::MissingField("userName"));
        }
        Ok(ProfileDocument {
            user_uid: self.user_uid,
            user_name: self.user_name,
            last_name: self.last_name.unwrap_or_default(),
            photo: self.photo,
            state: self.state.unwrap_or_default(),
            about: self.about.unwrap_or_default(),
        })
    }
}

/// The document stored at `profiles/{userUid}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub user_uid: String,
    pub user_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub state: String,
    pub about: String,
}
