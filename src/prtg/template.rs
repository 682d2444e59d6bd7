//! Template variable substitution and the `kind:filter` variable query grammar.

use crate::prtg::error::{PrtgError, Result};
use crate::prtg::query::ApiRequest;
use crate::prtg::validation::Validator;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("Failed to compile template variable regex")
});

/// Dashboard variables for `$name` / `${name}` substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars(HashMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses `name=value` assignments.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (name, value) = assignment.split_once('=').ok_or_else(|| {
                PrtgError::invalid_query(
                    "Invalid template variable",
                    vec![format!("expected name=value, got {:?}", assignment)],
                )
            })?;
            vars.insert(name.trim(), value);
        }
        Ok(vars)
    }

    /// Replaces known variable references; unknown ones are left untouched.
    pub fn replace(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }

        VARIABLE_REGEX
            .replace_all(text, |captures: &Captures| {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map_or("", |m| m.as_str());
                match self.get(name) {
                    Some(value) => value.to_string(),
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateVars {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// A parsed variable query: the table request and the row field holding the text
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFindQuery {
    pub field: String,
    pub request: ApiRequest,
}

impl MetricFindQuery {
    /// Parses `kind:*`, `kind:field=value` or `kind:name`.
    ///
    /// `channel:sensor=<id>` lists the channel names of a sensor.
    pub fn parse(query: &str, vars: &TemplateVars) -> Result<Self> {
        let query = query.trim();
        Validator::validate_metric_find(query)?;

        let (kind, expr) = query.split_once(':').ok_or_else(|| {
            PrtgError::invalid_query("Missing object kind", vec![format!("Query: {}", query)])
        })?;
        let kind = kind.trim().to_ascii_lowercase();
        let expr = vars.replace(expr.trim());

        match kind.as_str() {
            "channel" => Self::channels(&expr),
            "group" | "device" | "sensor" => Ok(Self::objects(kind, &expr)),
            other => Err(PrtgError::invalid_query(
                format!("Unknown object kind: {}", other),
                vec![format!("Query: {}", query)],
            )),
        }
    }

    fn channels(expr: &str) -> Result<Self> {
        let sensor_id = match expr.split_once('=') {
            Some((field, id)) if field.trim().eq_ignore_ascii_case("sensor") && !id.trim().is_empty() => {
                id.trim().to_string()
            }
            _ => {
                return Err(PrtgError::invalid_query(
                    "Channel queries need a sensor: channel:sensor=<id>",
                    vec![format!("Filter: {}", expr)],
                ))
            }
        };

        Ok(Self {
            field: "name".to_string(),
            request: ApiRequest::Table {
                params: vec![
                    ("content".to_string(), "channels".to_string()),
                    ("columns".to_string(), "name".to_string()),
                    ("id".to_string(), sensor_id),
                ],
            },
        })
    }

    fn objects(kind: String, expr: &str) -> Self {
        let mut params = vec![
            ("content".to_string(), format!("{}s", kind)),
            ("columns".to_string(), format!("objid,{}", kind)),
        ];

        if expr != "*" {
            let (field, value) = expr
                .split_once('=')
                .map_or((kind.as_str(), expr), |(field, value)| (field.trim(), value.trim()));
            params.push((format!("filter_{}", field.to_ascii_lowercase()), value.to_string()));
        }

        Self {
            field: kind,
            request: ApiRequest::Table { params },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars() -> TemplateVars {
        [("device", "core-sw"), ("sensor", "1234")].into_iter().collect()
    }

    #[test]
    fn test_replace_both_forms() {
        let vars = vars();
        assert_eq!(vars.replace("$device"), "core-sw");
        assert_eq!(vars.replace("${device}-backup"), "core-sw-backup");
        assert_eq!(vars.replace("$unknown and $device"), "$unknown and core-sw");
        assert_eq!(TemplateVars::new().replace("$device"), "$device");
    }

    #[test]
    fn test_from_assignments() {
        let vars = TemplateVars::from_assignments(["device=core-sw", "q=a=b"]).unwrap();
        assert_eq!(vars.get("device"), Some("core-sw"));
        assert_eq!(vars.get("q"), Some("a=b"));
        assert!(TemplateVars::from_assignments(["novalue"]).is_err());
    }

    #[test]
    fn test_channel_query() {
        let query = MetricFindQuery::parse("channel:sensor=1234", &TemplateVars::new()).unwrap();
        assert_eq!(query.field, "name");
        assert_eq!(query.request.describe(), "content=channels&columns=name&id=1234");

        let templated = MetricFindQuery::parse("channel:sensor=$sensor", &vars()).unwrap();
        assert_eq!(templated.request, query.request);
    }

    #[test]
    fn test_channel_query_needs_sensor() {
        assert!(matches!(
            MetricFindQuery::parse("channel:*", &TemplateVars::new()),
            Err(PrtgError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_object_queries() {
        let all = MetricFindQuery::parse("group:*", &TemplateVars::new()).unwrap();
        assert_eq!(all.field, "group");
        assert_eq!(all.request.describe(), "content=groups&columns=objid,group");

        let filtered = MetricFindQuery::parse("sensor:device=$device", &vars()).unwrap();
        assert_eq!(filtered.field, "sensor");
        assert_eq!(
            filtered.request.describe(),
            "content=sensors&columns=objid,sensor&filter_device=core-sw"
        );

        let tagged = MetricFindQuery::parse("Device:tags=switch", &TemplateVars::new()).unwrap();
        assert_eq!(
            tagged.request.describe(),
            "content=devices&columns=objid,device&filter_tags=switch"
        );

        let literal = MetricFindQuery::parse("device:core-sw", &TemplateVars::new()).unwrap();
        assert_eq!(
            literal.request.describe(),
            "content=devices&columns=objid,device&filter_device=core-sw"
        );
    }

    #[test]
    fn test_syntax_error() {
        match MetricFindQuery::parse("devices", &TemplateVars::new()).unwrap_err() {
            PrtgError::InvalidQuery { message, .. } => assert!(message.starts_with("Syntax Error")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
