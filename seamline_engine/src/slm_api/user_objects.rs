use serde::{Deserialize, Serialize};

/// A partial profile update. Only the populated fields are written. Email changes are checked for
/// uniqueness before the write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    pub fn with_display_name(mut self, name: String) -> Self {
        self.display_name = Some(name);
        self
    }

    pub fn with_email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_photo_url(mut self, url: String) -> Self {
        self.photo_url = Some(url);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.photo_url.is_none()
    }
}
