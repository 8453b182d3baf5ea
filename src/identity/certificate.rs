//! Certificate identity header parsing.
//!
//! The reverse proxy terminates mTLS and forwards the verified subject as a
//! comma separated list of `CN=<name>@<domain>` fragments. Headers are trusted
//! input; the parser only decides which fragment names the caller.

use super::{normalize_serial, IdentityError, Principal, Result};
use regex::Regex;
use tracing::{debug, warn};

/// Principal and canonical serial extracted from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub principal: Principal,
    pub serial: String,
}

/// Parser for the proxy identity header, bound to one trusted domain.
#[derive(Debug, Clone)]
pub struct IdentityParser {
    domain: String,
    pattern: Regex,
}

impl IdentityParser {
    /// Compile the fragment pattern for `domain`.
    pub fn new(domain: &str) -> Result<Self> {
        if domain.trim().is_empty() {
            return Err(IdentityError::invalid_domain(domain, "domain is empty"));
        }
        let pattern = Regex::new(&format!(r"^CN=([[:alnum:]]+)@{}$", regex::escape(domain)))
            .map_err(|e| IdentityError::invalid_domain(domain, e.to_string()))?;

        Ok(Self { domain: domain.to_string(), pattern })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Return the first principal named by `header`.
    ///
    /// With a non-empty `hint`, fragments naming anyone else are skipped.
    /// No match is a normal outcome and yields `None`.
    pub fn parse(&self, header: &str, hint: &str) -> Option<Principal> {
        for fragment in header.split(',') {
            let fragment = fragment.trim();
            let Some(captures) = self.pattern.captures(fragment) else {
                debug!(fragment = %fragment, "Ignoring identity fragment outside trusted domain");
                continue;
            };
            let name = &captures[1];

            if !hint.is_empty() && name != hint {
                warn!(name = %name, hint = %hint, "Identity fragment does not match subject hint");
                continue;
            }

            match Principal::parse(name) {
                Ok(principal) => return Some(principal),
                Err(e) => debug!(error = %e, "Discarding identity fragment"),
            }
        }
        None
    }

    /// Parse the identity header and normalize the serial header together.
    ///
    /// `Ok(None)` means the header names nobody acceptable.
    pub fn identify(
        &self,
        header: &str,
        serial: &str,
        hint: &str,
    ) -> Result<Option<CertificateIdentity>> {
        let Some(principal) = self.parse(header, hint) else {
            return Ok(None);
        };
        let serial = normalize_serial(serial)?;
        Ok(Some(CertificateIdentity { principal, serial }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IdentityParser {
        IdentityParser::new("fadalax.tech").unwrap()
    }

    #[test]
    fn first_matching_fragment_wins() {
        let p = parser().parse("CN=alice@fadalax.tech,CN=bob@fadalax.tech", "").unwrap();
        assert_eq!(p.as_str(), "alice");
    }

    #[test]
    fn hint_selects_fragment() {
        let p = parser().parse("CN=alice@fadalax.tech,CN=bob@fadalax.tech", "bob").unwrap();
        assert_eq!(p.as_str(), "bob");
    }

    #[test]
    fn unknown_hint_yields_none() {
        assert!(parser().parse("CN=alice@fadalax.tech,CN=bob@fadalax.tech", "carol").is_none());
    }

    #[test]
    fn whitespace_around_fragments_is_trimmed() {
        let p = parser().parse("CN=eve@other.org, CN=alice@fadalax.tech ", "").unwrap();
        assert_eq!(p.as_str(), "alice");
    }

    #[test]
    fn fragments_must_match_fully() {
        let parser = parser();
        assert!(parser.parse("CN=alice@fadalax.tech.evil.com", "").is_none());
        assert!(parser.parse("XCN=alice@fadalax.tech", "").is_none());
        assert!(parser.parse("CN=al ice@fadalax.tech", "").is_none());
        assert!(parser.parse("CN=alice@fadalaxxtech", "").is_none());
        assert!(parser.parse("", "").is_none());
    }

    #[test]
    fn identify_normalizes_serial() {
        let id = parser().identify("CN=alice@fadalax.tech", "0a1b", "").unwrap().unwrap();
        assert_eq!(id.principal.as_str(), "alice");
        assert_eq!(id.serial, "0a:1b");
    }

    #[test]
    fn identify_rejects_bad_serial() {
        let err = parser().identify("CN=alice@fadalax.tech", "abc", "").unwrap_err();
        assert!(matches!(err, IdentityError::MalformedSerial { .. }));
    }

    #[test]
    fn identify_without_match_is_none() {
        assert!(parser().identify("CN=alice@else.org", "abc", "").unwrap().is_none());
    }

    #[test]
    fn empty_domain_is_rejected() {
        assert!(IdentityParser::new(" ").is_err());
    }
}
