use qweb_engine::{QWeb, QWebError, RenderOptions};
use qweb_expr::{Value, Values};
use qweb_traits::{FilesystemTemplateStore, InMemoryTemplateStore, TemplateRef};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const LAYOUT: &str = r#"<html><body><t t-raw="0"/></body></html>"#;

const INVOICE: &str = r#"<t t-call="layout">
    <h1 t-attf-class="title {{'paid' if paid else 'open'}}">Invoice <t t-esc="number"/></h1>
    <table>
        <tr t-foreach="lines" t-as="line" t-att-class="'odd' if line_odd else None">
            <td t-esc="line['name']"/>
            <td t-esc="line['qty'] * line['price']" t-options="{'widget': 'float', 'precision': 2}"/>
        </tr>
    </table>
    <p t-if="not lines">No lines</p>
    <p t-else="">Total: <t t-esc="sum(l['qty'] * l['price'] for l in lines)"/></p>
</t>"#;

fn invoice_values() -> Values {
    Values::from_json(serde_json::json!({
        "number": "INV/001",
        "paid": false,
        "lines": [
            {"name": "Desk & chair", "qty": 2, "price": 150.0},
            {"name": "Lamp", "qty": 1, "price": 25.5},
        ],
    }))
}

#[test]
fn test_filesystem_store_renders_and_reloads() -> TestResult {
    init_logger();
    let dir = TempDir::new()?;
    fs::write(dir.path().join("layout.xml"), LAYOUT)?;
    fs::write(dir.path().join("page.xml"), r#"<t t-call="layout"><p t-esc="msg"/></t>"#)?;

    let store = Arc::new(FilesystemTemplateStore::new(dir.path()));
    let engine = QWeb::new(store.clone());
    let options = RenderOptions::default();
    let page = TemplateRef::from("page");
    let mut values = Values::new();
    values.set("msg", "a < b");

    assert_eq!(
        engine.render(&page, values.clone(), &options)?,
        "<html><body><p>a &lt; b</p></body></html>"
    );

    fs::write(dir.path().join("page.xml"), r#"<t t-call="layout"><b t-esc="msg"/></t>"#)?;
    assert_eq!(
        engine.render(&page, values.clone(), &options)?,
        "<html><body><p>a &lt; b</p></body></html>",
        "compiled template stays cached until the store is invalidated"
    );
    store.invalidate();
    assert_eq!(
        engine.render(&page, values, &options)?,
        "<html><body><b>a &lt; b</b></body></html>"
    );
    Ok(())
}

#[test]
fn test_filesystem_store_refuses_traversal() -> TestResult {
    init_logger();
    let dir = TempDir::new()?;
    let engine = QWeb::new(Arc::new(FilesystemTemplateStore::new(dir.path())));
    let err = engine
        .render(
            &TemplateRef::from("../secret"),
            Values::new(),
            &RenderOptions::default(),
        )
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn test_sandbox_rejects_dunder_access_at_compile_time() -> TestResult {
    init_logger();
    let store = Arc::new(InMemoryTemplateStore::new());
    store.add("t", r#"<p t-esc="x.__class__"/>"#)?;

    let open = QWeb::new(store.clone());
    let sandboxed = QWeb::builder(store).with_sandbox(true).build();
    let reference = TemplateRef::from("t");
    let options = RenderOptions::default();

    assert!(matches!(
        sandboxed.compile(&reference, &options),
        Err(QWebError::Security { .. })
    ));
    assert_eq!(sandboxed.cache_size(), 0);
    assert!(open.compile(&reference, &options).is_ok());
    Ok(())
}

#[test]
fn test_compiled_and_interpreted_renderers_agree() -> TestResult {
    init_logger();
    let store = Arc::new(InMemoryTemplateStore::new());
    store.add("layout", LAYOUT)?;
    store.add("invoice", INVOICE)?;
    let engine = QWeb::new(store);
    let reference = TemplateRef::from("invoice");
    let options = RenderOptions::default();

    let compiled = engine.render(&reference, invoice_values(), &options)?;
    let interpreted = engine.render_interpreted(&reference, invoice_values(), &options, None)?;
    assert_eq!(compiled, interpreted);
    assert!(compiled.starts_with("<html><body>"));
    assert!(compiled.contains(r#"<h1 class="title open">Invoice INV/001</h1>"#));
    assert!(compiled.contains("<td>Desk &amp; chair</td>"));
    assert!(compiled.contains("<td>300.00</td>"));
    assert!(compiled.contains(r#"<tr class="odd">"#));
    assert!(compiled.contains("<p>Total: 325.5</p>"));
    assert!(!compiled.contains("No lines"));
    Ok(())
}

#[test]
fn test_empty_collection_takes_else_branch_in_both_renderers() -> TestResult {
    init_logger();
    let store = Arc::new(InMemoryTemplateStore::new());
    store.add("layout", LAYOUT)?;
    store.add("invoice", INVOICE)?;
    let engine = QWeb::new(store);
    let reference = TemplateRef::from("invoice");
    let options = RenderOptions::default();

    let mut values = invoice_values();
    values.set("lines", Value::list(Vec::new()));
    values.set("paid", true);
    let compiled = engine.render(&reference, values.clone(), &options)?;
    let interpreted = engine.render_interpreted(&reference, values, &options, None)?;
    assert_eq!(compiled, interpreted);
    assert!(compiled.contains(r#"class="title paid""#));
    assert!(compiled.contains("<p>No lines</p>"));
    assert!(!compiled.contains("Total"));
    Ok(())
}

#[test]
fn test_document_with_several_templates() -> TestResult {
    init_logger();
    let store = Arc::new(InMemoryTemplateStore::new());
    let names = store.add_document(
        r#"<templates>
            <t t-name="greeting"><span>Hello <t t-esc="who"/></span></t>
            <t t-name="page"><div><t t-call="greeting"/></div></t>
        </templates>"#,
    )?;
    assert_eq!(names, vec!["greeting".to_string(), "page".to_string()]);

    let engine = QWeb::new(store);
    let mut values = Values::new();
    values.set("who", "world");
    assert_eq!(
        engine.render(&TemplateRef::from("page"), values, &RenderOptions::default())?,
        "<div><span>Hello world</span></div>"
    );
    Ok(())
}
