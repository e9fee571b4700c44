use std::{fmt, str, sync::Arc};

const REDIRECT_SUFFIX: &str = ":redirect";

/// The identifier of a network request in the captured log.
///
/// Each hop of a redirect chain gets its own identifier: the original
/// id, then the original id suffixed with `:redirect` once per hop.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The identifier of the next hop in a redirect chain.
    #[must_use = "function does not modify the current value"]
    pub fn redirected(&self) -> Self {
        Self::new(format!("{}{REDIRECT_SUFFIX}", self.0))
    }

    /// The identifier the browser used on the wire, without the redirect
    /// suffixes.
    pub fn base(&self) -> &str {
        let mut base: &str = &self.0;
        while let Some(stripped) = base.strip_suffix(REDIRECT_SUFFIX) {
            base = stripped;
        }
        base
    }

    /// Position of this hop in its redirect chain, `0` for the first request.
    pub fn redirect_index(&self) -> u32 {
        let extra = self.0.len() - self.base().len();
        (extra / REDIRECT_SUFFIX.len()) as u32
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl str::FromStr for RequestId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
