//! Placeholder substitution for registered view templates.
//!
//! Templates use two kinds of tokens:
//! - `###UPN###` is replaced by the caller identity (empty when unknown).
//! - `###P1###` .. `###P<capacity>###` are replaced by positional parameters;
//!   a missing parameter becomes an empty string.
//!
//! A positional token beyond the configured capacity (or `###P0###`) can never
//! be resolved and is an error rather than being left in the query.
//!
//! [`Substitution::substitute`] splices values into the text and performs no
//! escaping of its own: callers must pass values already sanitised for the
//! query language. [`Substitution::bind`] instead rewrites tokens to `$n`
//! markers and returns the values separately so the backend can bind them.
//!
//! The identity comes from an unverified token claim. With splicing, a forged
//! `upn` reaches the query text as-is, so splice mode is only safe behind a
//! gateway that verifies tokens before they get here.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashMap;

pub const IDENTITY_TOKEN: &str = "###UPN###";
pub const DEFAULT_POSITIONAL_CAPACITY: usize = 4;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"###(?:UPN|P(\d+))###").expect("placeholder regex is valid"));

// Same tokens, optionally wrapped in single quotes as they appear inside SQL string literals.
static QUOTED_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'###(?:UPN|P(\d+))###'|###(?:UPN|P(\d+))###").expect("placeholder regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("unresolved placeholder {token} (positional capacity is {capacity})")]
    Unresolved { token: String, capacity: usize },
    #[error("placeholder {token} is part of a larger string literal and cannot be bound")]
    InsideLiteral { token: String },
}

/// A query with its placeholder values split out for parameter binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Token {
    Identity,
    Positional(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct Substitution {
    capacity: usize,
}

impl Default for Substitution {
    fn default() -> Self {
        Self::new(DEFAULT_POSITIONAL_CAPACITY)
    }
}

impl Substitution {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks that every placeholder in `template` is resolvable with this capacity.
    pub fn check_template(&self, template: &str) -> Result<(), SubstitutionError> {
        for caps in TOKEN_RE.captures_iter(template) {
            self.classify(caps.get(0).map(|m| m.as_str()).unwrap_or_default(), caps.get(1).map(|m| m.as_str()))?;
        }
        Ok(())
    }

    /// Splices identity and positional values into the template.
    pub fn substitute(
        &self,
        template: &str,
        identity: Option<&str>,
        params: &[String],
    ) -> Result<String, SubstitutionError> {
        self.check_template(template)?;

        let out = TOKEN_RE.replace_all(template, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            match self.classify(whole, caps.get(1).map(|m| m.as_str())) {
                Ok(Token::Identity) => identity.unwrap_or_default().to_string(),
                Ok(Token::Positional(n)) => params.get(n - 1).cloned().unwrap_or_default(),
                // Unreachable after check_template.
                Err(_) => String::new(),
            }
        });
        Ok(out.into_owned())
    }

    /// Rewrites placeholders to `$1..$n` markers, one per distinct token in order
    /// of first appearance, and returns the values to bind.
    ///
    /// A token must stand alone or fill a whole literal (`'###P1###'`). One
    /// embedded in a larger literal such as `'%###P1###%'` is rejected.
    pub fn bind(
        &self,
        template: &str,
        identity: Option<&str>,
        params: &[String],
    ) -> Result<BoundQuery, SubstitutionError> {
        self.check_template(template)?;
        for m in QUOTED_TOKEN_RE.find_iter(template) {
            let before = &template[..m.start()];
            if before.matches('\'').count() % 2 == 1 || (m.as_str().starts_with('\'') && before.ends_with('\'')) {
                return Err(SubstitutionError::InsideLiteral {
                    token: m.as_str().trim_matches('\'').to_string(),
                });
            }
        }

        let mut slots: HashMap<Token, usize> = HashMap::new();
        let mut values: Vec<String> = Vec::new();

        let sql = QUOTED_TOKEN_RE.replace_all(template, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let digits = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            let token = match self.classify(whole.trim_matches('\''), digits) {
                Ok(t) => t,
                Err(_) => return String::new(),
            };
            let slot = *slots.entry(token).or_insert_with(|| {
                values.push(match token {
                    Token::Identity => identity.unwrap_or_default().to_string(),
                    Token::Positional(n) => params.get(n - 1).cloned().unwrap_or_default(),
                });
                values.len()
            });
            format!("${}", slot)
        });

        Ok(BoundQuery {
            sql: sql.into_owned(),
            params: values,
        })
    }

    fn classify(&self, whole: &str, digits: Option<&str>) -> Result<Token, SubstitutionError> {
        let digits = match digits {
            None => return Ok(Token::Identity),
            Some(d) => d,
        };
        let unresolved = || SubstitutionError::Unresolved {
            token: whole.to_string(),
            capacity: self.capacity,
        };
        let n: usize = digits.parse().map_err(|_| unresolved())?;
        if n == 0 || n > self.capacity {
            return Err(unresolved());
        }
        Ok(Token::Positional(n))
    }
}

/// Splices with the default capacity of four positional slots.
pub fn substitute(template: &str, identity: Option<&str>, params: &[String]) -> Result<String, SubstitutionError> {
    Substitution::default().substitute(template, identity, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn replaces_identity_and_positionals() {
        let out = substitute("###UPN### and ###P1###", Some("alice"), &p(&["x"])).unwrap();
        assert_eq!(out, "alice and x");
    }

    #[test]
    fn missing_positional_becomes_empty() {
        assert_eq!(substitute("###P2###", Some("alice"), &p(&["only-one"])).unwrap(), "");
    }

    #[test]
    fn unknown_identity_becomes_empty() {
        assert_eq!(
            substitute("where email = '###UPN###'", None, &[]).unwrap(),
            "where email = ''"
        );
    }

    #[test]
    fn out_of_range_positional_is_fatal() {
        let err = substitute("###P9###", Some("alice"), &p(&["a"])).unwrap_err();
        assert_eq!(
            err,
            SubstitutionError::Unresolved {
                token: "###P9###".into(),
                capacity: 4
            }
        );
        assert!(substitute("###P0###", None, &[]).is_err());
    }

    #[test]
    fn fifth_parameter_is_dropped() {
        let out = substitute("###P1###-###P4###", None, &p(&["a", "b", "c", "d", "e"])).unwrap();
        assert_eq!(out, "a-d");
    }

    #[test]
    fn capacity_is_configurable() {
        let wide = Substitution::new(6);
        assert_eq!(
            wide.substitute("###P6###", None, &p(&["1", "2", "3", "4", "5", "6"])).unwrap(),
            "6"
        );
        assert!(Substitution::new(1).check_template("###P2###").is_err());
    }

    #[test]
    fn non_placeholder_markers_are_left_alone() {
        assert_eq!(substitute("###FOO### ###P1###", None, &p(&["v"])).unwrap(), "###FOO### v");
    }

    #[test]
    fn replacement_values_are_not_rescanned() {
        assert_eq!(substitute("###P1###", Some("bob"), &p(&["###UPN###"])).unwrap(), "###UPN###");
    }

    #[test]
    fn bind_numbers_distinct_tokens_and_strips_quotes() {
        let bound = Substitution::default()
            .bind(
                "select * from t where owner = '###UPN###' and a = ###P1### or b = ###P1### or c = '###UPN###'",
                Some("alice"),
                &p(&["42"]),
            )
            .unwrap();
        assert_eq!(
            bound.sql,
            "select * from t where owner = $1 and a = $2 or b = $2 or c = $1"
        );
        assert_eq!(bound.params, p(&["alice", "42"]));
    }

    #[test]
    fn bind_rejects_tokens_inside_larger_literals() {
        let sub = Substitution::default();
        for template in [
            "select * from t where name like '%###P1###%'",
            "select * from t where name = 'x ###UPN###'",
            "select * from t where name = 'it''###P1###'",
        ] {
            let err = sub.bind(template, Some("alice"), &p(&["v"])).unwrap_err();
            assert!(matches!(err, SubstitutionError::InsideLiteral { .. }), "{template}: {err}");
        }
        let bound = sub
            .bind("select '%' || ###P1### || '%', 'a' as k where b = '###P1###'", None, &p(&["v"]))
            .unwrap();
        assert_eq!(bound.sql, "select '%' || $1 || '%', 'a' as k where b = $1");
    }

    #[test]
    fn forged_identity_only_stays_out_of_the_query_when_bound() {
        let forged = "x' or '1'='1";
        let template = "select * from t where owner = '###UPN###'";
        let spliced = substitute(template, Some(forged), &[]).unwrap();
        assert_eq!(spliced, "select * from t where owner = 'x' or '1'='1'");

        let bound = Substitution::default().bind(template, Some(forged), &[]).unwrap();
        assert_eq!(bound.sql, "select * from t where owner = $1");
        assert_eq!(bound.params, p(&[forged]));
    }

    #[test]
    fn bind_rejects_unresolved_tokens() {
        assert!(Substitution::default().bind("###P5###", None, &[]).is_err());
    }
}
