//! Dispatch of request envelopes onto the calculators.
use crate::calc::cves::CvesRequest;
use crate::calc::dbchange::DbChangeRequest;
use crate::calc::errata::ErrataRequest;
use crate::calc::packages::PackagesRequest;
use crate::calc::repos::ReposRequest;
use crate::calc::updates::{Updates, UpdatesApi};
use crate::calc::vulnerabilities::VulnerabilitiesRequest;
use crate::calc::Calculate;
use crate::error::{Error, Result};
use cache::CacheHandle;
use json::Value;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_UPDATES_VERSION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Updates,
    Vulnerabilities,
    Cves,
    Errata,
    Repos,
    Packages,
    Dbchange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub endpoint: Endpoint,
    pub version: Option<u8>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Reply { status: 200, body }
    }

    fn error(err: &Error) -> Self {
        Reply {
            status: err.status(),
            body: json::json!({ "error": err.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    cache: Arc<CacheHandle>,
}

impl Service {
    pub fn new(cache: Arc<CacheHandle>) -> Self {
        Service { cache }
    }

    pub fn cache(&self) -> &Arc<CacheHandle> {
        &self.cache
    }

    /// Answers `request` from the currently published generation.
    pub fn process<R: Calculate>(&self, request: &R) -> Result<R::Response> {
        let cache = self.cache.current().ok_or(Error::CacheUnavailable)?;
        request.validate()?;
        request.calculate(&cache)
    }

    /// Handles one JSON envelope, every failure is turned into an error reply.
    pub fn handle_line(&self, line: &str) -> Reply {
        let reply = match self.dispatch(line) {
            Ok(body) => Reply::ok(body),
            Err(e) => Reply::error(&e),
        };
        debug!("Request finished with status {}", reply.status);
        reply
    }

    fn dispatch(&self, line: &str) -> Result<Value> {
        let request: Request = json::from_str(line)?;
        let body = match request.body {
            Value::Null => Value::Object(Default::default()),
            body => body,
        };

        match request.endpoint {
            Endpoint::Updates => {
                let api = UpdatesApi::from_version(request.version.unwrap_or(DEFAULT_UPDATES_VERSION))?;
                let updates = Updates {
                    api,
                    request: json::from_value(body)?,
                };
                self.answer(&updates)
            }
            Endpoint::Vulnerabilities => self.answer(&parse::<VulnerabilitiesRequest>(body)?),
            Endpoint::Cves => self.answer(&parse::<CvesRequest>(body)?),
            Endpoint::Errata => self.answer(&parse::<ErrataRequest>(body)?),
            Endpoint::Repos => self.answer(&parse::<ReposRequest>(body)?),
            Endpoint::Packages => self.answer(&parse::<PackagesRequest>(body)?),
            Endpoint::Dbchange => self.answer(&DbChangeRequest),
        }
    }

    fn answer<R: Calculate>(&self, request: &R) -> Result<Value> {
        let response = self.process(request)?;
        Ok(json::to_value(response)?)
    }
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(json::from_value(body)?)
}
