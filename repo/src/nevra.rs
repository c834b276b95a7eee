use crate::prelude::*;
use nom::{
    character::complete::{char, digit1},
    combinator::{map_res, opt},
    sequence::terminated,
    IResult,
};
use std::str::FromStr;

/// Epoch, version and release of a package.
///
/// Deliberately not `Ord`: the ordering of versions comes from the snapshot, never from
/// comparing these fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: i64,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: i64, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }
}

/// Package identifier in the `name-[epoch:]version-release.arch` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nevra {
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to parse nevra: {0:?}")]
pub struct MalformedIdentifier(pub String);

/// `<digits>:` prefix of the name or version field
fn epoch_prefix(input: &str) -> IResult<&str, Option<i64>> {
    opt(terminated(map_res(digit1, |d: &str| d.parse::<i64>()), char(':')))(input)
}

fn split_epoch(field: &str) -> Option<(&str, Option<i64>)> {
    let (rest, epoch) = epoch_prefix(field).ok()?;
    if rest.is_empty() || rest.contains(':') {
        return None;
    }
    Some((rest, epoch))
}

fn is_arch(arch: &str) -> bool {
    !arch.is_empty()
        && arch
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl Nevra {
    /// Parses `[epoch:]name-[epoch:]version-release.arch`, optionally suffixed with `.rpm`.
    ///
    /// The name may contain dashes, version and release may not. When an epoch is given on
    /// the version it wins over one given in front of the name; a missing epoch is 0.
    pub fn parse(input: &str) -> Result<Self, MalformedIdentifier> {
        let malformed = || MalformedIdentifier(input.to_string());

        let s = input.strip_suffix(".rpm").unwrap_or(input);
        let (head, arch) = s.rsplit_once('.').ok_or_else(malformed)?;
        if !is_arch(arch) {
            return Err(malformed());
        }

        let mut fields = head.rsplitn(3, '-');
        let release = fields
            .next()
            .filter(|r| !r.is_empty() && !r.contains(':'))
            .ok_or_else(malformed)?;
        let (version, version_epoch) = fields.next().and_then(split_epoch).ok_or_else(malformed)?;
        let (name, name_epoch) = fields.next().and_then(split_epoch).ok_or_else(malformed)?;

        Ok(Nevra {
            name: name.to_string(),
            epoch: version_epoch.or(name_epoch).unwrap_or(0),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }

    pub fn evr(&self) -> Evr {
        Evr::new(self.epoch, self.version.as_str(), self.release.as_str())
    }
}

impl FromStr for Nevra {
    type Err = MalformedIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nevra::parse(s)
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_nevra(&self.name, &self.evr(), &self.arch))
    }
}

/// Formats package parts the way [`Nevra`] displays, epoch omitted when it is 0.
pub fn format_nevra(name: &str, evr: &Evr, arch: &str) -> String {
    if evr.epoch > 0 {
        format!("{}-{}:{}-{}.{}", name, evr.epoch, evr.version, evr.release, arch)
    } else {
        format!("{}-{}-{}.{}", name, evr.version, evr.release, arch)
    }
}
