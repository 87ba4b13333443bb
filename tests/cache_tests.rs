mod common;

use common::{CountingLoader, TestResult, init_logger, store_with};
use qweb::{QWeb, RenderOptions, TemplateRef, Value, Values};
use rayon::prelude::*;
use std::sync::Arc;

#[test]
fn test_options_outside_cache_key_reuse_compiled_template() -> TestResult {
    init_logger();
    let loader = Arc::new(CountingLoader::new(store_with(&[(
        "t",
        r#"<p t-esc="v"/>"#,
    )])));
    let engine = QWeb::new(loader.clone());
    let reference = TemplateRef::from("t");

    let plain = RenderOptions::default();
    let mut extra = RenderOptions {
        dev_mode: true,
        ..RenderOptions::default()
    };
    extra.extra.insert("company_id".into(), Value::Int(3));

    let first = engine.compile(&reference, &plain)?;
    let second = engine.compile(&reference, &extra)?;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads(), 1);

    let french = engine.compile(&reference, &plain.clone().with_lang("fr_FR"))?;
    assert!(!Arc::ptr_eq(&first, &french));
    assert_eq!(loader.loads(), 2);
    assert_eq!(engine.cache_size(), 2);
    Ok(())
}

#[test]
fn test_store_write_invalidates_compiled_templates() -> TestResult {
    init_logger();
    let store = store_with(&[("t", "<p>v1</p>")]);
    let engine = QWeb::new(store.clone());
    let reference = TemplateRef::from("t");
    let options = RenderOptions::default();

    assert_eq!(engine.render(&reference, Values::new(), &options)?, "<p>v1</p>");
    assert_eq!(engine.cache_size(), 1);

    store.add("t", "<p>v2</p>")?;
    assert_eq!(engine.render(&reference, Values::new(), &options)?, "<p>v2</p>");
    assert_eq!(engine.cache_size(), 1);

    engine.clear_cache();
    assert_eq!(engine.cache_size(), 0);
    Ok(())
}

#[test]
fn test_failed_compile_is_not_cached() -> TestResult {
    init_logger();
    let store = store_with(&[("t", r#"<p t-esc="("/>"#)]);
    let engine = QWeb::new(store.clone());
    let reference = TemplateRef::from("t");
    let options = RenderOptions::default();

    assert!(engine.render(&reference, Values::new(), &options).is_err());
    assert_eq!(engine.cache_size(), 0);
    store.add("t", r#"<p t-esc="1 + 1"/>"#)?;
    assert_eq!(engine.render(&reference, Values::new(), &options)?, "<p>2</p>");
    Ok(())
}

#[test]
fn test_concurrent_renders_share_one_engine() -> TestResult {
    init_logger();
    let engine = QWeb::new(store_with(&[
        ("row", r#"<li t-esc="item"/>"#),
        (
            "list",
            r#"<ul><t t-foreach="range(n)" t-as="item"><t t-call="row"/></t></ul>"#,
        ),
    ]));
    let reference = TemplateRef::from("list");
    let langs = [None, Some("fr_FR"), Some("de_DE")];

    let outputs: Vec<(usize, String)> = (0..48usize)
        .into_par_iter()
        .map(|i| {
            let options = RenderOptions {
                lang: langs[i % langs.len()].map(str::to_string),
                ..RenderOptions::default()
            };
            let mut values = Values::new();
            values.set("n", i % 5);
            let html = engine.render(&reference, values, &options)?;
            Ok((i, html))
        })
        .collect::<Result<_, qweb::QWebError>>()?;

    for (i, html) in outputs {
        let items: String = (0..i % 5).map(|k| format!("<li>{}</li>", k)).collect();
        assert_eq!(html, format!("<ul>{}</ul>", items));
    }
    // one entry per (template, lang)
    assert_eq!(engine.cache_size(), 6);
    Ok(())
}
