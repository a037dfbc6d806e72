//! Builds a concrete [`HttpRequest`] from a method plan and call-site arguments.
//!
//! Order matters and is load-bearing:
//! 1. path substitution (an argument that is itself an absolute URL wins over the host
//!    template — the paging-link case),
//! 2. query parameters in declaration order (set/override),
//! 3. body resolution with content-type inference,
//! 4. header parameters last, so caller-supplied headers override anything inferred.

use serde_json::Value;

use crate::codec::{is_json_content_type, Codec, Encoding};
use crate::describe::{Arg, BindingKind, BodyKind};
use crate::error::{Error, Result};
use crate::plan::MethodPlan;
use crate::request::HttpRequest;
use crate::url_builder::{encode_path_segment, encode_query_component, UrlBuilder};

const OCTET_STREAM: &str = "application/octet-stream";
const APPLICATION_JSON: &str = "application/json";

/// Builds the request. Consumes the body argument out of `args` (replacing it with
/// [`Arg::None`]); every other argument is read in place.
pub(crate) fn build_request(
    plan: &MethodPlan,
    args: &mut [Arg],
    codec: &dyn Codec,
) -> Result<HttpRequest> {
    let path = substituted_path(plan, args)?;

    let mut url_builder = UrlBuilder::parse(&path);
    if url_builder.scheme().is_none() {
        // Relative path: resolve scheme and host from the (substituted) host template.
        let mut host = plan.host_template().to_string();
        for binding in plan.bindings() {
            if let BindingKind::HostParam { name } = &binding.kind {
                let value = required_substitution(plan, args, binding.index, name)?;
                host = host.replace(&format!("{{{name}}}"), &value);
            }
        }
        url_builder.set_host(host);
    }

    for binding in plan.bindings() {
        if let BindingKind::Query { name, encoded } = &binding.kind {
            let Some(value) = args_substitution(args, binding.index)? else { continue };
            let value = if *encoded { encode_query_component(&value) } else { value };
            let name = if *encoded { encode_query_component(name) } else { name.clone() };
            url_builder.set_query_parameter(name, value);
        }
    }

    let url = url_builder.to_url()?;
    let mut request = HttpRequest::new(plan.method().clone(), url);

    resolve_body(plan, args, codec, &mut request)?;

    // Header parameters always take precedence over inferred headers.
    for binding in plan.bindings() {
        match &binding.kind {
            BindingKind::Header { name } => {
                if let Some(value) = args_substitution(args, binding.index)? {
                    request.headers_mut().set(name.clone(), value);
                }
            }
            BindingKind::HeaderMap { prefix } => match args.get(binding.index) {
                Some(Arg::Map(entries)) => {
                    for (key, value) in entries {
                        request.headers_mut().set(format!("{prefix}{key}"), value.clone());
                    }
                }
                Some(Arg::None) | None => {}
                Some(_) => {
                    return Err(Error::Serialization(format!(
                        "header map parameter {prefix:?} expects a mapping argument"
                    )))
                }
            },
            _ => {}
        }
    }

    if request.headers().contains("content-length") && request.headers().contains("transfer-encoding")
    {
        return Err(Error::InvalidHeader(
            "Content-Length and Transfer-Encoding are mutually exclusive".to_string(),
        ));
    }

    Ok(request)
}

/// Substitutes path bindings into the path template.
fn substituted_path(plan: &MethodPlan, args: &[Arg]) -> Result<String> {
    let mut path = plan.path_template().to_string();
    for binding in plan.bindings() {
        if let BindingKind::Path { name, encoded } = &binding.kind {
            let value = required_substitution(plan, args, binding.index, name)?;
            // An absolute URL passed for a path parameter is adopted verbatim, so it
            // must not be percent-encoded even under the encoded policy.
            let value = if *encoded && !value.contains("://") {
                encode_path_segment(&value)
            } else {
                value
            };
            path = path.replace(&format!("{{{name}}}"), &value);
        }
    }
    Ok(path)
}

fn args_substitution(args: &[Arg], index: usize) -> Result<Option<String>> {
    match args.get(index) {
        Some(arg) => arg.substitution(),
        None => Ok(None),
    }
}

fn required_substitution(
    plan: &MethodPlan,
    args: &[Arg],
    index: usize,
    name: &str,
) -> Result<String> {
    args_substitution(args, index)?.ok_or_else(|| {
        Error::Serialization(format!(
            "operation {:?}: no argument for parameter {name:?}",
            plan.name()
        ))
    })
}

/// Resolves the body binding into request body and content headers.
pub(crate) fn resolve_body(
    plan: &MethodPlan,
    args: &mut [Arg],
    codec: &dyn Codec,
    request: &mut HttpRequest,
) -> Result<()> {
    let body_binding = plan
        .bindings()
        .iter()
        .find_map(|b| match &b.kind {
            BindingKind::Body { kind } => Some((b.index, *kind)),
            _ => None,
        });

    let declared = body_binding.map(|(_, kind)| kind);
    let body_arg = match body_binding {
        Some((index, _)) if index < args.len() => std::mem::replace(&mut args[index], Arg::None),
        _ => Arg::None,
    };

    if body_arg.is_none() {
        request.headers_mut().set("Content-Length", "0");
        return Ok(());
    }

    let content_type = match plan.content_type() {
        Some(explicit) => explicit.to_string(),
        None => match &body_arg {
            Arg::Bytes(_) | Arg::Text(_) | Arg::Stream(_) => OCTET_STREAM.to_string(),
            _ => APPLICATION_JSON.to_string(),
        },
    };
    request.headers_mut().set("Content-Type", content_type.clone());

    if is_json_content_type(&content_type) {
        let value = match body_arg {
            Arg::Json(value) => value,
            Arg::Text(text) => Value::String(text),
            Arg::Bytes(_) => {
                return Err(Error::Serialization(
                    "binary body cannot be serialized as JSON; declare an octet-stream content type"
                        .to_string(),
                ))
            }
            Arg::Stream(_) => {
                return Err(Error::Serialization(
                    "stream body cannot be serialized as JSON".to_string(),
                ))
            }
            Arg::Map(_) | Arg::None => {
                return Err(Error::Serialization("body argument has no JSON form".to_string()))
            }
        };
        let bytes = codec.serialize(&value, Encoding::Json)?;
        request.set_body(bytes.into());
        return Ok(());
    }

    match (declared, body_arg) {
        // The user supplies Content-Length or Transfer-Encoding for a stream body.
        (Some(BodyKind::Stream), Arg::Stream(stream)) => {
            request.set_body(crate::Body::Stream(stream))
        }
        (Some(BodyKind::Stream), _) => {
            return Err(Error::Serialization(
                "stream body parameter requires a stream argument".to_string(),
            ))
        }
        (_, Arg::Bytes(bytes)) => request.set_body(crate::Body::Bytes(bytes)),
        (_, Arg::Text(text)) => {
            if !text.is_empty() {
                request.set_body(crate::Body::Text(text));
            }
        }
        (_, Arg::Stream(stream)) => request.set_body(crate::Body::Stream(stream)),
        (_, Arg::Json(value)) => {
            let encoding = codec.encoding_from_headers(request.headers())?;
            let bytes = codec.serialize(&value, encoding)?;
            request.set_body(bytes.into());
        }
        (_, Arg::Map(_) | Arg::None) => {
            return Err(Error::Serialization("body argument has no wire form".to_string()))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::describe::{ApiDescription, Operation};
    use crate::parser::parse;
    use serde_json::json;
    use std::sync::Arc;

    fn plan_for(operation: Operation) -> Arc<MethodPlan> {
        let api = ApiDescription::new("Svc").host("https://host").operation(operation);
        parse(&api).unwrap().remove("op").unwrap()
    }

    #[test]
    fn simple_get_with_path_parameter() {
        let plan = plan_for(Operation::get("op", "/items/{id}").path_param("id").expect_status([200]));
        let mut args = vec![Arg::text("abc")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();

        assert_eq!(request.url().as_str(), "https://host/items/abc");
        assert_eq!(request.headers().get("content-length"), Some("0"));
        assert!(request.body().is_empty());
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let plan = plan_for(Operation::get("op", "/items/{id}").path_param("id").expect_status([200]));
        let mut args = vec![Arg::text("a b/c")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().as_str(), "https://host/items/a%20b%2Fc");
    }

    #[test]
    fn raw_path_values_substitute_verbatim() {
        let plan =
            plan_for(Operation::get("op", "/v1/{rest}").path_param_raw("rest").expect_status([200]));
        let mut args = vec![Arg::text("a/b/c")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().as_str(), "https://host/v1/a/b/c");
    }

    #[test]
    fn absolute_url_path_argument_overrides_the_host() {
        let plan =
            plan_for(Operation::get("op", "{nextLink}").path_param("nextLink").expect_status([200]));
        let mut args = vec![Arg::text("https://other/host/page2?x=1")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().as_str(), "https://other/host/page2?x=1");
    }

    #[test]
    fn query_bindings_apply_in_declaration_order() {
        let plan = plan_for(
            Operation::get("op", "/search")
                .query_param("q")
                .query_param("page")
                .expect_status([200]),
        );
        let mut args = vec![Arg::text("rust lang"), Arg::text("2")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().query(), Some("q=rust%20lang&page=2"));
    }

    #[test]
    fn omitted_optional_query_parameter_is_skipped() {
        let plan = plan_for(
            Operation::get("op", "/search").query_param("filter").expect_status([200]),
        );
        let mut args = vec![Arg::None];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().query(), None);
    }

    #[test]
    fn json_body_with_header_override() {
        let plan = plan_for(
            Operation::post("op", "/x")
                .body_serialized()
                .header_param("X-Debug")
                .expect_status([200]),
        );
        let mut args = vec![Arg::json(&json!({"a": 1})).unwrap(), Arg::text("on")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();

        assert_eq!(request.headers().get("content-type"), Some("application/json"));
        assert_eq!(request.headers().get("x-debug"), Some("on"));
        match request.body() {
            crate::Body::Bytes(bytes) => assert_eq!(bytes.as_ref(), br#"{"a":1}"#),
            other => panic!("expected a bytes body, got {other:?}"),
        }
    }

    #[test]
    fn header_binding_overrides_inferred_content_type() {
        let plan = plan_for(
            Operation::post("op", "/x")
                .body_serialized()
                .header_param("Content-Type")
                .expect_status([200]),
        );
        let mut args =
            vec![Arg::json(&json!({"a": 1})).unwrap(), Arg::text("application/vnd.custom+json")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.headers().get("content-type"), Some("application/vnd.custom+json"));
    }

    #[test]
    fn text_body_infers_octet_stream() {
        let plan = plan_for(Operation::put("op", "/x").body_text().expect_status([200]));
        let mut args = vec![Arg::text("raw payload")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.headers().get("content-type"), Some(OCTET_STREAM));
        assert!(matches!(request.body(), crate::Body::Text(_)));
    }

    #[test]
    fn empty_text_body_attaches_nothing() {
        let plan = plan_for(Operation::put("op", "/x").body_text().expect_status([200]));
        let mut args = vec![Arg::text("")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert!(request.body().is_empty());
    }

    #[test]
    fn null_body_sets_content_length_zero() {
        let plan = plan_for(Operation::post("op", "/x").body_serialized().expect_status([200]));
        let mut args = vec![Arg::None];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.headers().get("content-length"), Some("0"));
        assert!(request.body().is_empty());
    }

    #[test]
    fn host_parameters_substitute_into_the_host_template() {
        let api = ApiDescription::new("Svc")
            .host("https://{account}.example.com")
            .operation(
                Operation::get("op", "/items").host_param("account").expect_status([200]),
            );
        let plan = parse(&api).unwrap().remove("op").unwrap();
        let mut args = vec![Arg::text("contoso")];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.url().as_str(), "https://contoso.example.com/items");
    }

    #[test]
    fn header_map_expansion_prefixes_each_key() {
        let plan = plan_for(
            Operation::get("op", "/x").header_map_param("x-ms-meta-").expect_status([200]),
        );
        let mut args = vec![Arg::map([("owner", "me"), ("tier", "hot")])];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.headers().get("x-ms-meta-owner"), Some("me"));
        assert_eq!(request.headers().get("x-ms-meta-tier"), Some("hot"));
    }

    #[test]
    fn stream_body_attaches_unchanged() {
        use futures::stream::{self, StreamExt};

        let plan = plan_for(Operation::put("op", "/x").body_stream().expect_status([200]));
        let mut args = vec![Arg::stream(stream::empty().boxed())];
        let request = build_request(&plan, &mut args, &JsonCodec).unwrap();
        assert_eq!(request.headers().get("content-type"), Some(OCTET_STREAM));
        assert!(matches!(request.body(), crate::Body::Stream(_)));
    }

    #[test]
    fn stream_body_parameter_rejects_non_stream_arguments() {
        let plan = plan_for(Operation::put("op", "/x").body_stream().expect_status([200]));
        let mut args = vec![Arg::text("not a stream")];
        assert!(matches!(
            build_request(&plan, &mut args, &JsonCodec),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn form_content_type_is_unsupported_by_the_default_codec() {
        let plan = plan_for(
            Operation::post("op", "/x")
                .body_serialized()
                .content_type("application/x-www-form-urlencoded")
                .expect_status([200]),
        );
        let mut args = vec![Arg::json(&json!({"a": 1})).unwrap()];
        assert!(matches!(
            build_request(&plan, &mut args, &JsonCodec),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn missing_path_argument_fails() {
        let plan = plan_for(Operation::get("op", "/items/{id}").path_param("id").expect_status([200]));
        let mut args = vec![];
        assert!(matches!(
            build_request(&plan, &mut args, &JsonCodec),
            Err(Error::Serialization(_))
        ));
    }
}
