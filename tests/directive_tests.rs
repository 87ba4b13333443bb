mod common;

use common::{TestResult, engine_with, init_logger, render_one, store_with, values};
use qweb::{QWeb, QWebError, RenderOptions, StaticGroups, TemplateRef, Values};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_foreach_index_and_parity_sequence() -> TestResult {
    init_logger();
    let html = render_one(
        r#"<t t-foreach="items" t-as="x">(<t t-esc="x_index"/>,<t t-esc="repr(x_first)"/>,<t t-esc="repr(x_last)"/>,<t t-esc="x_parity"/>,<t t-esc="x_size"/>)</t>"#,
        values(json!({ "items": ["a", "b", "c", "d", "e"] })),
    )?;
    assert_eq!(
        html,
        concat!(
            "(0,True,False,even,5)",
            "(1,False,False,odd,5)",
            "(2,False,False,even,5)",
            "(3,False,False,odd,5)",
            "(4,False,True,even,5)",
        )
    );
    Ok(())
}

#[test]
fn test_else_pairs_with_preceding_if() -> TestResult {
    init_logger();
    assert_eq!(
        render_one(
            r#"<div><a t-if="False">A</a><b t-else="1">B</b></div>"#,
            Values::new()
        )?,
        "<div><b>B</b></div>"
    );
    Ok(())
}

#[test]
fn test_text_between_if_and_else_breaks_pairing() {
    init_logger();
    let err = render_one(
        r#"<div><a t-if="False">A</a>text<b t-else="1">B</b></div>"#,
        Values::new(),
    )
    .unwrap_err();
    assert!(matches!(err, QWebError::Compile { .. }));
    assert!(err.to_string().contains("t-else without matching t-if"));
}

#[test]
fn test_unknown_directive_is_rejected() {
    init_logger();
    let err = render_one(r#"<div t-bogus="x"/>"#, Values::new()).unwrap_err();
    assert!(matches!(err, QWebError::Compile { .. }));
    assert!(err.to_string().contains("bogus"));
}

#[test]
fn test_call_body_fills_slot_zero() -> TestResult {
    init_logger();
    let engine = engine_with(&[
        ("sub", r#"<section><t t-esc="0"/></section>"#),
        ("main", r#"<t t-call="sub">INNER</t>"#),
    ]);
    assert_eq!(
        engine.render(
            &TemplateRef::from("main"),
            Values::new(),
            &RenderOptions::default()
        )?,
        "<section>INNER</section>"
    );
    Ok(())
}

#[test]
fn test_set_value_forms() -> TestResult {
    init_logger();
    let html = render_one(
        r##"<t><t t-set="body"><i>captured</i></t><t t-set="label" t-valuef="#{name}-{{n}}"/><t t-set="sum" t-value="n + 1"/><t t-raw="body"/>|<t t-esc="label"/>|<t t-esc="sum"/></t>"##,
        values(json!({ "name": "row", "n": 4 })),
    )?;
    assert_eq!(html, "<i>captured</i>|row-4|5");
    Ok(())
}

#[test]
fn test_elif_chain_picks_first_truthy_branch() -> TestResult {
    init_logger();
    let xml = r#"<t><t t-if="n &lt; 0">negative</t><t t-elif="n == 0">zero</t><t t-elif="n &lt; 10">small</t><t t-elif="n &lt; 100">medium</t><t t-else="">large</t></t>"#;
    for (n, expected) in [(-3, "negative"), (0, "zero"), (5, "small"), (42, "medium"), (500, "large")] {
        assert_eq!(render_one(xml, values(json!({ "n": n })))?, expected);
    }
    Ok(())
}

#[test]
fn test_groups_with_negation() -> TestResult {
    init_logger();
    let xml = r#"<ul><li groups="base.group_user">user</li><li groups="!base.group_portal">not portal</li><li groups="base.group_system">system</li><li groups="base.group_user,!base.group_portal">user not portal</li></ul>"#;

    let internal = QWeb::builder(store_with(&[("t", xml)]))
        .with_groups(Arc::new(StaticGroups::new(["base.group_user"])))
        .build();
    assert_eq!(
        internal.render(&TemplateRef::from("t"), Values::new(), &RenderOptions::default())?,
        "<ul><li>user</li><li>not portal</li><li>user not portal</li></ul>"
    );

    let portal = QWeb::builder(store_with(&[("t", xml)]))
        .with_groups(Arc::new(StaticGroups::new([
            "base.group_user",
            "base.group_portal",
        ])))
        .build();
    assert_eq!(
        portal.render(&TemplateRef::from("t"), Values::new(), &RenderOptions::default())?,
        "<ul><li>user</li></ul>"
    );
    Ok(())
}

#[test]
fn test_self_calling_template_hits_recursion_limit() {
    init_logger();
    let engine = engine_with(&[("rec", r#"<div><t t-call="rec"/></div>"#)]);
    let err = engine
        .render(&TemplateRef::from("rec"), Values::new(), &RenderOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        QWebError::RecursionLimit { ref template, depth: 64 } if template == "rec"
    ));
}

#[test]
fn test_bounded_recursion_renders() -> TestResult {
    init_logger();
    let engine = engine_with(&[(
        "countdown",
        r#"<t><t t-esc="n"/><t t-if="n &gt; 0"><t t-set="n" t-value="n - 1"/><t t-call="countdown"/></t></t>"#,
    )]);
    assert_eq!(
        engine.render(
            &TemplateRef::from("countdown"),
            values(json!({ "n": 3 })),
            &RenderOptions::default()
        )?,
        "3210"
    );
    Ok(())
}
