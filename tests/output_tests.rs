mod common;

use common::{TestResult, init_logger, interpret_one, render_one, values};
use qweb::{QWebError, TemplateRef, Value, Values};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_esc_entity_escapes_and_raw_is_verbatim() -> TestResult {
    init_logger();
    for text in ["<script>", "a & b", "\"quoted\" > 'single'", "x<y>z&amp;"] {
        let vals = values(json!({ "text": text }));
        let escaped = render_one(r#"<p t-esc="text"/>"#, vals.clone())?;
        let inner = &escaped["<p>".len()..escaped.len() - "</p>".len()];
        assert!(!inner.contains('<') && !inner.contains('>'), "{}", escaped);
        assert_eq!(
            inner
                .replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&apos;", "'")
                .replace("&amp;", "&"),
            text
        );
        assert_eq!(render_one(r#"<p t-raw="text"/>"#, vals)?, format!("<p>{}</p>", text));
    }
    Ok(())
}

#[test]
fn test_fallback_only_on_none_or_false() -> TestResult {
    init_logger();
    assert_eq!(
        render_one(r#"<span t-esc="n">fallback</span>"#, values(json!({ "n": 0 })))?,
        "<span>0</span>"
    );
    assert_eq!(
        render_one(r#"<span t-esc="s">fallback</span>"#, values(json!({ "s": "" })))?,
        "<span></span>"
    );
    assert_eq!(
        render_one(r#"<span t-esc="s">fallback</span>"#, values(json!({ "s": null })))?,
        "<span>fallback</span>"
    );
    Ok(())
}

#[test]
fn test_undefined_slot_with_interpreter_and_handler() -> TestResult {
    init_logger();
    for xml in [
        r#"<span t-esc="0">fallback</span>"#,
        r#"<span t-esc="n">fallback</span>"#,
    ] {
        let err = interpret_one(xml, Values::new()).unwrap_err();
        assert!(matches!(err, QWebError::UndefinedVariable { .. }), "{}", xml);

        let engine = common::engine_with(&[("t", xml)]);
        let zero: qweb::UndefinedHandler = Arc::new(|_: &str, _: &Values| Value::Int(0));
        assert_eq!(
            engine.render_interpreted(
                &TemplateRef::from("t"),
                Values::new(),
                &qweb::RenderOptions::default(),
                Some(zero)
            )?,
            "<span>0</span>"
        );
    }
    Ok(())
}

#[test]
fn test_compiled_slot_without_caller_falls_back() -> TestResult {
    init_logger();
    assert_eq!(
        render_one(r#"<span t-esc="0">fallback</span>"#, Values::new())?,
        "<span>fallback</span>"
    );
    assert_eq!(
        render_one(r#"<span t-raw="0"/>"#, Values::new())?,
        "<span></span>"
    );
    Ok(())
}

#[test]
fn test_attribute_emission_rules() -> TestResult {
    init_logger();
    let html = render_one(
        r#"<div t-att-zero="0" t-att-empty="''" t-att-off="False" t-att-on="'a'" t-att-none="None"/>"#,
        Values::new(),
    )?;
    assert_eq!(html, r#"<div empty="" on="a"></div>"#);
    Ok(())
}

#[test]
fn test_attribute_values_are_escaped() -> TestResult {
    init_logger();
    let html = render_one(
        r#"<a t-att-href="url" t-attf-title="{{a}} &amp; {{b}}">x</a>"#,
        values(json!({ "url": "/q?a=1&b=\"2\"", "a": "<A>", "b": "B" })),
    )?;
    assert_eq!(
        html,
        r#"<a href="/q?a=1&amp;b=&quot;2&quot;" title="&lt;A&gt; &amp; B">x</a>"#
    );
    Ok(())
}

#[test]
fn test_text_nodes_keep_entities() -> TestResult {
    init_logger();
    assert_eq!(
        render_one(
            r#"<p>Tom &amp; Jerry &lt;3 <t t-esc="v"/></p>"#,
            values(json!({ "v": 1 }))
        )?,
        "<p>Tom &amp; Jerry &lt;3 1</p>"
    );
    Ok(())
}
