//! Fixed Garmin Connect endpoints, built from two overridable base URLs.

use crate::FileType;

pub const DEFAULT_SSO_URL: &str = "https://sso.garmin.com";
pub const DEFAULT_CONNECT_URL: &str = "https://connect.garmin.com";

/// Sent with every request; the SSO widget rejects unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36";

/// Query string of the SSO login widget, shared by the GET and the credential POST.
pub const LOGIN_QUERY: &[(&str, &str)] = &[
    ("service", "https://connect.garmin.com/post-auth/login"),
    ("webhost", "olaxpw-connect04"),
    ("source", "https://connect.garmin.com/en-US/signin"),
    (
        "redirectAfterAccountLoginUrl",
        "https://connect.garmin.com/post-auth/login",
    ),
    (
        "redirectAfterAccountCreationUrl",
        "https://connect.garmin.com/post-auth/login",
    ),
    ("gauthHost", "https://sso.garmin.com/sso"),
    ("locale", "en_US"),
    ("id", "gauth-widget"),
    (
        "cssUrl",
        "https://static.garmincdn.com/com.garmin.connect/ui/css/gauth-custom-v1.1-min.css",
    ),
    ("clientId", "GarminConnect"),
    ("rememberMeShown", "true"),
    ("rememberMeChecked", "false"),
    ("createAccountShown", "true"),
    ("openCreateAccount", "false"),
    ("usernameShown", "false"),
    ("displayNameShown", "false"),
    ("consumeServiceTicket", "false"),
    ("initialFocus", "true"),
    ("embedWidget", "false"),
    ("generateExtraServiceTicket", "false"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    sso_url: String,
    connect_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_SSO_URL, DEFAULT_CONNECT_URL)
    }
}

impl Endpoints {
    pub fn new(sso_url: &str, connect_url: &str) -> Self {
        Self {
            sso_url: sso_url.trim_end_matches('/').to_string(),
            connect_url: connect_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/sso/login", self.sso_url)
    }

    pub fn post_auth_url(&self) -> String {
        format!("{}/post-auth/login", self.connect_url)
    }

    pub fn search_url(&self) -> String {
        format!(
            "{}/proxy/activity-search-service-1.0/json/activities",
            self.connect_url
        )
    }

    pub fn download_url(&self, filetype: FileType, activity_id: &str) -> String {
        match filetype {
            FileType::Gpx | FileType::Tcx => format!(
                "{}/modern/proxy/download-service/export/{}/activity/{}?full=true",
                self.connect_url,
                filetype.extension(),
                activity_id
            ),
            FileType::Fit => format!(
                "{}/proxy/download-service/files/activity/{}",
                self.connect_url, activity_id
            ),
        }
    }
}
