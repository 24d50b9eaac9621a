use crate::endpoints::{DEFAULT_CONNECT_URL, DEFAULT_SSO_URL, Endpoints};
use crate::{FileType, GarminError};
use secrecy::SecretString;

#[derive(Clone, Debug)]
pub struct Config {
    pub username: String,
    pub password: SecretString,
    pub sso_url: String,
    pub connect_url: String,
    pub filetype: FileType,
    pub continue_on_failure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, GarminError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, GarminError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let username = get("GARMIN_CONNECT_USERNAME")
            .ok_or_else(|| GarminError::Config("GARMIN_CONNECT_USERNAME missing".into()))?;
        let password = get("GARMIN_CONNECT_PASSWORD")
            .ok_or_else(|| GarminError::Config("GARMIN_CONNECT_PASSWORD missing".into()))?;
        let sso_url = get("GARMIN_CONNECT_SSO_URL").unwrap_or_else(|| DEFAULT_SSO_URL.into());
        let connect_url =
            get("GARMIN_CONNECT_BASE_URL").unwrap_or_else(|| DEFAULT_CONNECT_URL.into());
        let filetype = match get("GARMIN_CONNECT_FILETYPE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| GarminError::Config(format!("invalid GARMIN_CONNECT_FILETYPE: {raw}")))?,
            None => FileType::Tcx,
        };
        let continue_on_failure = match get("GARMIN_CONNECT_CONTINUE_ON_FAILURE") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                GarminError::Config(format!("invalid GARMIN_CONNECT_CONTINUE_ON_FAILURE: {raw}"))
            })?,
            None => true,
        };
        Ok(Self {
            username,
            password: SecretString::new(password.into()),
            sso_url,
            connect_url,
            filetype,
            continue_on_failure,
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.sso_url, &self.connect_url)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
