//! URI parsing for interface and buffer selection
//!
//! Accepts `scheme://[user[:pass]@]host[:port][/path][?key=value&...]`.
//! Parsing is done by [`url::Url`]; this module flattens the parts the
//! registry and the built-in backends need. Userinfo and path come back
//! percent-decoded and the query as ordered, form-decoded pairs.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::{Position, Url};

use crate::error::{Result, VttyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub raw: String,
    /// Lowercase, as URI schemes are case-insensitive
    pub scheme: String,
    pub authority: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Without IPv6 brackets
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ParsedUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| VttyError::malformed(uri, e.to_string()))?;
        if !url.has_authority() {
            return Err(VttyError::malformed(uri, "missing \"://\" after scheme"));
        }

        let username = match url.username() {
            "" => None,
            user => Some(decode(uri, user)?),
        };
        let password = url.password().map(|pass| decode(uri, pass)).transpose()?;
        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        Ok(Self {
            raw: uri.to_string(),
            scheme: url.scheme().to_string(),
            authority: url[Position::BeforeUsername..Position::AfterPort].to_string(),
            username,
            password,
            host,
            port: url.port(),
            path: decode(uri, url.path())?,
            query: url
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        })
    }

    /// First value for `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn decode(uri: &str, text: &str) -> Result<String> {
    percent_decode_str(text)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| VttyError::malformed(uri, "percent escape is not UTF-8"))
}
