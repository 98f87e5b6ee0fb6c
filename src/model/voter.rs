use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
        Cookie, CookieJar, SameSite, Status,
    },
    request::{FromParam, FromRequest, Outcome, Request},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

/// Name of the private cookie holding the verified national id.
pub const IDENTITY_COOKIE: &str = "national_id";

/// A national identity number: a non-empty run of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NationalId(#[serde(with = "digits")] String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("National id must be a non-empty run of digits, got {0:?}")]
pub struct NationalIdError(pub String);

impl NationalId {
    /// Build an id from OCR digits, folding Arabic-Indic digits to ASCII.
    pub fn from_recognized(digits: &str) -> Result<Self, NationalIdError> {
        let folded = digits
            .chars()
            .map(|c| match c {
                '\u{0660}'..='\u{0669}' => {
                    char::from_digit(c as u32 - 0x0660, 10).unwrap_or(c)
                }
                _ => c,
            })
            .collect::<String>();
        folded.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for NationalId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for NationalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NationalId {
    type Err = NationalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NationalIdError(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl<'a> FromParam<'a> for NationalId {
    type Error = NationalIdError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for NationalId {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] NationalId);

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

/// The registry stores ids either as JSON strings or as JSON numbers;
/// both deserialize to the same digit string.
mod digits {
    use serde::{de::Visitor, Deserializer, Serializer};

    pub fn serialize<S>(digits: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(digits)
    }

    struct DigitsVisitor;

    impl Visitor<'_> for DigitsVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(formatter, "a national id as a digit string or a non-negative integer")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(v)
                .map(|v| v.to_string())
                .map_err(|_| E::custom(format!("negative national id {v}")))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            s.parse::<super::NationalId>()
                .map(String::from)
                .map_err(E::custom)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DigitsVisitor)
    }
}

/// A registered voter, as held by the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub national_id: NationalId,
    pub name: String,
    pub city: String,
    pub circle: String,
}

/// The identity a voting session acts for. Only ever built from an id that
/// the registry confirmed; carried between requests in a private cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    national_id: NationalId,
}

impl IdentityContext {
    pub fn new(national_id: NationalId) -> Self {
        Self { national_id }
    }

    pub fn national_id(&self) -> &NationalId {
        &self.national_id
    }

    pub fn into_cookie(self) -> Cookie<'static> {
        Cookie::build(IDENTITY_COOKIE, String::from(self.national_id))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    pub fn from_cookie(cookie: &Cookie<'_>) -> Option<Self> {
        cookie.value().parse().ok().map(Self::new)
    }

    /// Forget any identity stored in `cookies`.
    pub fn clear(cookies: &CookieJar<'_>) {
        cookies.remove_private(Cookie::named(IDENTITY_COOKIE));
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for IdentityContext {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req
            .cookies()
            .get_private(IDENTITY_COOKIE)
            .and_then(|cookie| Self::from_cookie(&cookie))
        {
            Some(identity) => Outcome::Success(identity),
            None => Outcome::Failure((Status::Unauthorized, Error::MissingIdentity)),
        }
    }
}
