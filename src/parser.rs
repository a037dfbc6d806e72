//! The interface parser: validates an [`ApiDescription`] and compiles it into
//! [`MethodPlan`]s, once, at client construction.
//!
//! All validation happens here so invocation never re-interprets the description. On any
//! failure the whole parse fails; no partial plan map is ever published.

use http::Method;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::describe::{ApiDescription, BindingKind, BodyKind, Operation, ReturnShape, WireType};
use crate::error::{Error, Result};
use crate::plan::{placeholders, MethodPlan};

/// Parses a description into a plan per operation, keyed by operation name.
pub(crate) fn parse(description: &ApiDescription) -> Result<HashMap<String, Arc<MethodPlan>>> {
    if description.host.is_empty() {
        return Err(Error::BadDescription(format!(
            "description {:?} has no host template",
            description.name
        )));
    }

    let mut plans = HashMap::with_capacity(description.operations.len());
    for operation in &description.operations {
        let plan = parse_operation(description, operation)?;
        if plans.insert(operation.name.clone(), Arc::new(plan)).is_some() {
            return Err(Error::BadDescription(format!(
                "duplicate operation name {:?}",
                operation.name
            )));
        }
    }
    Ok(plans)
}

fn parse_operation(description: &ApiDescription, operation: &Operation) -> Result<MethodPlan> {
    let name = &operation.name;

    if operation.expected.is_empty() {
        return Err(Error::BadDescription(format!(
            "operation {name:?} declares no expected status codes"
        )));
    }

    check_placeholder_bindings(name, "path", &operation.path, &operation.bindings, |kind| {
        match kind {
            BindingKind::Path { name, .. } => Some(name.as_str()),
            _ => None,
        }
    })?;
    check_placeholder_bindings(name, "host", &description.host, &operation.bindings, |kind| {
        match kind {
            BindingKind::HostParam { name } => Some(name.as_str()),
            _ => None,
        }
    })?;

    let body_kinds: Vec<BodyKind> = operation
        .bindings
        .iter()
        .filter_map(|b| match &b.kind {
            BindingKind::Body { kind } => Some(*kind),
            _ => None,
        })
        .collect();
    if body_kinds.len() > 1 {
        return Err(Error::BadDescription(format!(
            "operation {name:?} declares more than one body parameter"
        )));
    }

    // A stream body's framing must come from the user, but an explicit Content-Length
    // header binding cannot be reconciled with a body the runtime never measures.
    if body_kinds.first() == Some(&BodyKind::Stream) {
        let has_content_length_binding = operation.bindings.iter().any(|b| {
            matches!(&b.kind, BindingKind::Header { name } if name.eq_ignore_ascii_case("content-length"))
        });
        if has_content_length_binding {
            return Err(Error::BadDescription(format!(
                "operation {name:?} combines a stream body with a Content-Length header parameter"
            )));
        }
    }

    if let Some(content_type) = &operation.content_type {
        if !is_valid_content_type(content_type) {
            return Err(Error::BadDescription(format!(
                "operation {name:?} declares malformed content type {content_type:?}"
            )));
        }
    }

    if operation.return_shape == ReturnShape::Boolean && operation.method != Method::HEAD {
        return Err(Error::BadDescription(format!(
            "operation {name:?} returns a boolean but is not a HEAD operation"
        )));
    }

    if operation.response_wire == Some(WireType::Base64Url)
        && operation.return_shape != ReturnShape::Bytes
    {
        return Err(Error::BadDescription(format!(
            "operation {name:?} declares a base64url response wire type without a bytes return shape"
        )));
    }

    Ok(MethodPlan {
        name: operation.name.clone(),
        fully_qualified_name: format!("{}.{}", description.name, operation.name),
        method: operation.method.clone(),
        host_template: description.host.clone(),
        path_template: operation.path.clone(),
        bindings: operation.bindings.clone(),
        expected: operation.expected.iter().copied().collect(),
        error_type: operation.error_type.clone(),
        error_body_type: operation.error_body_type.clone(),
        return_shape: operation.return_shape,
        content_type: operation.content_type.clone(),
        response_wire: operation.response_wire,
    })
}

/// Every template placeholder must have exactly one binding, and every binding must
/// target a template placeholder.
fn check_placeholder_bindings(
    operation: &str,
    what: &str,
    template: &str,
    bindings: &[crate::describe::Binding],
    select: impl Fn(&BindingKind) -> Option<&str>,
) -> Result<()> {
    let names = placeholders(template);
    let mut unique = HashSet::new();
    for placeholder in &names {
        if !unique.insert(placeholder.as_str()) {
            return Err(Error::BadDescription(format!(
                "operation {operation:?}: duplicate {what} placeholder {placeholder:?}"
            )));
        }
    }

    let mut bound = HashSet::new();
    for binding in bindings {
        if let Some(target) = select(&binding.kind) {
            if !unique.contains(target) {
                return Err(Error::BadDescription(format!(
                    "operation {operation:?}: {what} parameter {target:?} has no matching placeholder"
                )));
            }
            if !bound.insert(target.to_string()) {
                return Err(Error::BadDescription(format!(
                    "operation {operation:?}: {what} placeholder {target:?} is bound more than once"
                )));
            }
        }
    }

    for placeholder in &names {
        if !bound.contains(placeholder) {
            return Err(Error::BadDescription(format!(
                "operation {operation:?}: {what} placeholder {placeholder:?} has no parameter binding"
            )));
        }
    }
    Ok(())
}

/// Syntactic `type/subtype` check with optional parameters; token characters only.
fn is_valid_content_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    let Some((main, sub)) = media_type.split_once('/') else { return false };
    let is_token = |s: &str| {
        !s.is_empty()
            && s.chars().all(|c| {
                c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
            })
    };
    is_token(main) && is_token(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::Operation;

    fn description(operation: Operation) -> ApiDescription {
        ApiDescription::new("Svc").host("https://h").operation(operation)
    }

    #[test]
    fn valid_description_parses() {
        let plans = parse(&description(
            Operation::get("getItem", "/items/{id}").path_param("id").expect_status([200]),
        ))
        .unwrap();
        let plan = &plans["getItem"];
        assert_eq!(plan.fully_qualified_name(), "Svc.getItem");
        assert!(plan.is_expected(200, &[]));
    }

    #[test]
    fn missing_host_is_rejected() {
        let api = ApiDescription::new("Svc")
            .operation(Operation::get("op", "/x").expect_status([200]));
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn empty_expected_set_is_rejected() {
        let api = description(Operation::get("op", "/x"));
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn unbound_placeholder_is_rejected() {
        let api = description(Operation::get("op", "/items/{id}").expect_status([200]));
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn duplicate_placeholder_is_rejected() {
        let api = description(
            Operation::get("op", "/{id}/{id}").path_param("id").expect_status([200]),
        );
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn binding_without_placeholder_is_rejected() {
        let api = description(Operation::get("op", "/x").path_param("id").expect_status([200]));
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn double_body_is_rejected() {
        let api = description(
            Operation::post("op", "/x").body_serialized().body_text().expect_status([200]),
        );
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn duplicate_operation_names_are_rejected() {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::get("op", "/a").expect_status([200]))
            .operation(Operation::post("op", "/b").expect_status([200]));
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn malformed_content_type_is_rejected() {
        let api = description(
            Operation::post("op", "/x")
                .body_serialized()
                .content_type("not a media type")
                .expect_status([200]),
        );
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));

        let ok = description(
            Operation::post("op", "/x")
                .body_serialized()
                .content_type("application/merge-patch+json; charset=utf-8")
                .expect_status([200]),
        );
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn stream_body_with_content_length_binding_is_rejected() {
        let api = description(
            Operation::put("op", "/x")
                .body_stream()
                .header_param("Content-Length")
                .expect_status([200]),
        );
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));
    }

    #[test]
    fn boolean_shape_requires_head() {
        let api = description(
            Operation::get("op", "/x").returns(ReturnShape::Boolean).expect_status([200]),
        );
        assert!(matches!(parse(&api), Err(Error::BadDescription(_))));

        let ok = description(
            Operation::head("op", "/x").returns(ReturnShape::Boolean).expect_status([200, 404]),
        );
        assert!(parse(&ok).is_ok());
    }
}
