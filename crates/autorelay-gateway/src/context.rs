//! Normalized request context.
//!
//! One per inbound dynamic-route call. Merges every place a caller can put
//! parameters into a single flat map, in a fixed overlay order:
//!
//! 1. parsed `Cookie` header pairs
//! 2. query parameters
//! 3. a `cookie` value embedded in the query (string or object, re-parsed)
//! 4. JSON body fields
//! 5. a `cookie` value embedded in the body
//! 6. the `Authorization` header, parsed as a cookie-pair string — last,
//!    so it wins every key collision
//!
//! Cookie-shaped sources are additionally collected into an ordered pair
//! list so handlers can reassemble a session cookie for downstream calls.

use serde_json::Value;
use std::collections::HashMap;

/// Ephemeral per-request view of all merged parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    params: HashMap<String, Value>,
    cookie_pairs: Vec<(String, String)>,
    pub no_cookie: bool,
    pub caller_ip: String,
}

impl RequestContext {
    pub fn build(
        cookie_header: Option<&str>,
        query: &HashMap<String, String>,
        body: Option<&Value>,
        authorization: Option<&str>,
        caller_ip: &str,
    ) -> Self {
        let mut ctx = Self {
            caller_ip: strip_mapped_prefix(caller_ip).to_string(),
            ..Self::default()
        };

        // 1. Cookie header
        if let Some(raw) = cookie_header {
            for (k, v) in parse_cookie_pairs(raw) {
                ctx.set_cookie_pair(k, v);
            }
        }

        // 2. Query parameters
        for (k, v) in query {
            ctx.params.insert(k.clone(), Value::String(v.clone()));
        }
        // 3. Embedded cookie in the query
        if let Some(embedded) = query.get("cookie") {
            ctx.overlay_embedded_cookie(&Value::String(embedded.clone()));
        }

        // 4. Body fields
        if let Some(Value::Object(fields)) = body {
            for (k, v) in fields {
                ctx.params.insert(k.clone(), v.clone());
            }
            // 5. Embedded cookie in the body
            if let Some(embedded) = fields.get("cookie") {
                ctx.overlay_embedded_cookie(embedded);
            }
        }

        // 6. Authorization header — overlaid last, wins collisions.
        if let Some(auth) = authorization {
            for (k, v) in parse_cookie_pairs(auth) {
                ctx.set_cookie_pair(k, v);
            }
        }

        ctx.no_cookie = ctx
            .params
            .get("noCookie")
            .map(is_truthy)
            .unwrap_or(false);
        ctx
    }

    /// Record a cookie pair in both the flat map and the ordered pair list.
    fn set_cookie_pair(&mut self, key: String, value: String) {
        if let Some(existing) = self.cookie_pairs.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value.clone();
        } else {
            self.cookie_pairs.push((key.clone(), value.clone()));
        }
        self.params.insert(key, Value::String(value));
    }

    /// Re-parse an embedded `cookie` value — either a pair string or an
    /// object of key/value pairs.
    fn overlay_embedded_cookie(&mut self, embedded: &Value) {
        match embedded {
            Value::String(s) => {
                for (k, v) in parse_cookie_pairs(s) {
                    self.set_cookie_pair(k, v);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let s = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    self.set_cookie_pair(k.clone(), s);
                }
            }
            _ => {}
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Reassembled session cookie for downstream calls, in overlay order.
    /// `None` when no cookie-shaped source was present.
    pub fn auth_cookie(&self) -> Option<String> {
        if self.cookie_pairs.is_empty() {
            return None;
        }
        Some(
            self.cookie_pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Parse a `name=value; name2=value2` string. Values may contain `=`.
pub fn parse_cookie_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Strip the IPv4-mapped-IPv6 prefix: `::ffff:1.2.3.4` -> `1.2.3.4`.
pub fn strip_mapped_prefix(ip: &str) -> &str {
    ip.strip_prefix("::ffff:").unwrap_or(ip)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cookie_pair_parsing() {
        let pairs = parse_cookie_pairs("sid=abc; uid=42; raw=a=b");
        assert_eq!(
            pairs,
            vec![
                ("sid".into(), "abc".into()),
                ("uid".into(), "42".into()),
                ("raw".into(), "a=b".into()),
            ]
        );
        assert!(parse_cookie_pairs("no-pairs-here").is_empty());
    }

    #[test]
    fn merge_order_query_over_cookie_header() {
        let ctx = RequestContext::build(
            Some("sid=from_header"),
            &query(&[("sid", "from_query")]),
            None,
            None,
            "127.0.0.1",
        );
        assert_eq!(ctx.get_str("sid"), Some("from_query"));
    }

    #[test]
    fn body_overrides_query() {
        let body = json!({ "sid": "from_body" });
        let ctx = RequestContext::build(
            None,
            &query(&[("sid", "from_query")]),
            Some(&body),
            None,
            "127.0.0.1",
        );
        assert_eq!(ctx.get_str("sid"), Some("from_body"));
    }

    #[test]
    fn embedded_cookie_string_and_object() {
        let body = json!({ "cookie": { "uid": "7", "flag": true } });
        let ctx = RequestContext::build(
            None,
            &query(&[("cookie", "sid=embedded")]),
            Some(&body),
            None,
            "127.0.0.1",
        );
        assert_eq!(ctx.get_str("sid"), Some("embedded"));
        assert_eq!(ctx.get_str("uid"), Some("7"));
        assert_eq!(ctx.get_str("flag"), Some("true"));
    }

    #[test]
    fn authorization_wins_all_collisions() {
        let body = json!({ "sid": "from_body", "cookie": "sid=from_embedded" });
        let ctx = RequestContext::build(
            Some("sid=from_header"),
            &query(&[("sid", "from_query")]),
            Some(&body),
            Some("sid=from_auth; extra=1"),
            "127.0.0.1",
        );
        assert_eq!(ctx.get_str("sid"), Some("from_auth"));
        assert_eq!(ctx.get_str("extra"), Some("1"));
    }

    #[test]
    fn auth_cookie_reassembles_in_order() {
        let ctx = RequestContext::build(
            Some("a=1; b=2"),
            &HashMap::new(),
            None,
            Some("b=3; c=4"),
            "127.0.0.1",
        );
        assert_eq!(ctx.auth_cookie().as_deref(), Some("a=1; b=3; c=4"));

        let empty = RequestContext::build(None, &HashMap::new(), None, None, "127.0.0.1");
        assert!(empty.auth_cookie().is_none());
    }

    #[test]
    fn no_cookie_flag() {
        let ctx = RequestContext::build(
            None,
            &query(&[("noCookie", "true")]),
            None,
            None,
            "127.0.0.1",
        );
        assert!(ctx.no_cookie);

        let ctx = RequestContext::build(None, &HashMap::new(), None, None, "127.0.0.1");
        assert!(!ctx.no_cookie);
    }

    #[test]
    fn mapped_ipv6_prefix_stripped() {
        let ctx = RequestContext::build(None, &HashMap::new(), None, None, "::ffff:10.0.0.9");
        assert_eq!(ctx.caller_ip, "10.0.0.9");
        assert_eq!(strip_mapped_prefix("2001:db8::1"), "2001:db8::1");
    }
}
