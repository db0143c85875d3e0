//! Remote host identity and fail-fast validation.
//!
//! A [`Target`] can only be built through validation: IPv4 literals are
//! accepted as-is, anything else must resolve to at least one IPv4 address.
//! Validation happens before any session is requested, so an unusable host
//! never reaches the SSH client.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use thiserror::Error;
use tracing::debug;

/// Errors raised when a host identifier or identity cannot be accepted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TargetError {
    /// The host identifier was empty after trimming.
    #[error("invalid host: the host identifier is empty")]
    Empty,
    /// The host or user contains characters the SSH client would misread.
    #[error("invalid {field} '{value}': {reason}")]
    Malformed {
        /// Which part of the target was rejected (`host` or `user`).
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: &'static str,
    },
    /// No remote user was supplied.
    #[error("invalid user: the remote user is empty")]
    MissingUser,
    /// Name resolution failed.
    #[error("invalid host '{host}': {message}")]
    Unresolvable {
        /// Host identifier that failed to resolve.
        host: String,
        /// Resolver error text.
        message: String,
    },
    /// Name resolution succeeded but produced no IPv4 address.
    #[error("invalid host '{host}': no IPv4 address found")]
    NoIpv4Address {
        /// Host identifier that resolved only to non-IPv4 addresses.
        host: String,
    },
}

/// Resolves host names to addresses.
pub trait HostResolver {
    /// Looks up every address registered for `host`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the lookup fails.
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system's name service.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addresses = (host, 0).to_socket_addrs()?;
        Ok(addresses.map(|address| address.ip()).collect())
    }
}

/// Validated host and identity a session connects to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    host: String,
    user: String,
    address: Ipv4Addr,
}

impl Target {
    /// Validates `host` and `user` using the system resolver.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when the host is neither an IPv4 literal nor
    /// a name resolving to one, or when the user is unusable.
    pub fn new(host: &str, user: &str) -> Result<Self, TargetError> {
        Self::with_resolver(host, user, &SystemResolver)
    }

    /// Validates `host` and `user`, resolving names through `resolver`.
    ///
    /// IPv4 literals never reach the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] when validation fails.
    pub fn with_resolver(
        host: &str,
        user: &str,
        resolver: &impl HostResolver,
    ) -> Result<Self, TargetError> {
        let host_name = host.trim();
        if host_name.is_empty() {
            return Err(TargetError::Empty);
        }
        check_token("host", host_name)?;

        let user_name = user.trim();
        if user_name.is_empty() {
            return Err(TargetError::MissingUser);
        }
        check_token("user", user_name)?;
        if user_name.contains('@') {
            return Err(TargetError::Malformed {
                field: "user",
                value: user_name.to_owned(),
                reason: "must not contain '@'",
            });
        }

        let address = resolve_ipv4(host_name, resolver)?;
        Ok(Self {
            host: host_name.to_owned(),
            user: user_name.to_owned(),
            address,
        })
    }

    /// Host identifier as supplied by the caller.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote user to authenticate as.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// IPv4 address the host identifier validated to.
    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// `user@host` destination understood by `ssh`.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

fn check_token(field: &'static str, value: &str) -> Result<(), TargetError> {
    let reason = if value.starts_with('-') {
        Some("must not start with '-'")
    } else if value
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control())
    {
        Some("must not contain whitespace or control characters")
    } else {
        None
    };

    reason.map_or(Ok(()), |why| {
        Err(TargetError::Malformed {
            field,
            value: value.to_owned(),
            reason: why,
        })
    })
}

fn resolve_ipv4(host: &str, resolver: &impl HostResolver) -> Result<Ipv4Addr, TargetError> {
    if let Ok(literal) = host.parse::<Ipv4Addr>() {
        return Ok(literal);
    }

    debug!(host, "resolving host name");
    let addresses = resolver
        .resolve(host)
        .map_err(|err| TargetError::Unresolvable {
            host: host.to_owned(),
            message: err.to_string(),
        })?;

    addresses
        .into_iter()
        .find_map(|address| match address {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| TargetError::NoIpv4Address {
            host: host.to_owned(),
        })
}
