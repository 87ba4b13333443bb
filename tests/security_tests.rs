mod common;

use common::{TestResult, init_logger, store_with};
use qweb::{QWeb, QWebError, RenderOptions, TemplateRef, Value, Values};

const PROHIBITED: &[&str] = &[
    "__import__('os')",
    "x.__class__",
    "doc.__dict__",
    "open('/etc/passwd')",
    "f.f_globals",
];

#[test]
fn test_sandbox_rejects_prohibited_constructs() {
    init_logger();
    for expr in PROHIBITED {
        let xml = format!(r#"<p t-esc="{}"/>"#, expr);
        let engine = QWeb::builder(store_with(&[("t", xml.as_str())]))
            .with_sandbox(true)
            .build();
        let err = engine
            .render(&TemplateRef::from("t"), Values::new(), &RenderOptions::default())
            .unwrap_err();
        assert!(
            matches!(err, QWebError::Security { .. }),
            "{} gave {:?}",
            expr,
            err
        );
    }
}

#[test]
fn test_trusted_engine_does_not_security_reject() -> TestResult {
    init_logger();
    for expr in PROHIBITED {
        let xml = format!(r#"<p t-esc="{}"/>"#, expr);
        let engine = QWeb::new(store_with(&[("t", xml.as_str())]));
        let reference = TemplateRef::from("t");
        let options = RenderOptions::default();
        engine.compile(&reference, &options)?;
        if let Err(err) = engine.render_interpreted(&reference, Values::new(), &options, None) {
            assert!(!matches!(err, QWebError::Security { .. }), "{}", expr);
        }
    }
    Ok(())
}

#[test]
fn test_sandbox_allows_ordinary_expressions() -> TestResult {
    init_logger();
    let engine = QWeb::builder(store_with(&[(
        "t",
        r#"<p t-esc="', '.join(sorted(n['name'] for n in names if n['active']))"/>"#,
    )]))
    .with_sandbox(true)
    .build();
    let values = Values::from_json(serde_json::json!({
        "names": [
            {"name": "b", "active": true},
            {"name": "a", "active": true},
            {"name": "c", "active": false},
        ]
    }));
    assert_eq!(
        engine.render(&TemplateRef::from("t"), values, &RenderOptions::default())?,
        "<p>a, b</p>"
    );
    Ok(())
}

#[test]
fn test_html_widget_strips_script_payloads() -> TestResult {
    init_logger();
    let payloads = [
        "<img/onerror=alert(1) src=x>",
        "<scr<script></script>ipt>alert(1)</script>",
        r#"<a href="java&#115;cript:alert(1)">x</a>"#,
    ];
    for payload in payloads {
        let mut values = Values::new();
        values.set("body", Value::markup(payload));
        let html = common::render_one(
            r#"<div t-esc="body" t-options="{'widget': 'html'}"/>"#,
            values,
        )?;
        assert!(!html.contains("onerror"), "{} gave {}", payload, html);
        assert!(!html.contains("<script"), "{} gave {}", payload, html);
        assert!(!html.contains("javascript"), "{} gave {}", payload, html);
    }
    Ok(())
}
