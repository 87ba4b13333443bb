mod common;

use common::{TestResult, init_logger, store_with};
use qweb::cli::{self, CliError, RenderArgs};
use qweb::{MapRecord, QWeb, RenderOptions, StaticGroups, TemplateRef, Value, Values};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const LAYOUT: &str = r#"<html>
    <head><title t-esc="title or 'Untitled'"/></head>
    <body t-att-class="'dark' if dark else None"><t t-raw="0"/></body>
</html>"#;

const ORDERS: &str = r#"<t t-call="web.layout">
    <t t-set="title" t-valuef="Orders of {{customer.name}}"/>
    <h1 t-esc="title"/>
    <ul class="orders">
        <li t-foreach="orders" t-as="order" t-attf-class="order {{order_parity}}" t-att-data-id="order.id">
            <span t-field="order.name"/>
            <t t-if="order.state == 'done'"><em>done</em></t>
            <t t-elif="order.state == 'cancel'"><del>cancelled</del></t>
            <t t-else=""><b t-esc="order.state.upper()"/></t>
            <span class="total" t-esc="order.total" t-options="{'widget': 'float', 'precision': 2}"/>
            <a t-if="order_last" groups="sales.manager" href="/orders/all">all</a>
        </li>
    </ul>
    <p t-if="not orders">No orders yet.</p>
    <footer t-call="web.footer"><i>thanks</i></footer>
</t>"#;

const FOOTER: &str = r#"<div class="footer"><t t-raw="0"/> &amp; <t t-esc="len(orders)"/> orders</div>"#;

fn order(id: i64, name: &str, state: &str, total: f64) -> Value {
    MapRecord::new("sale.order", Some(id))
        .with_field("name", "char", name)
        .with_field("state", "selection", state)
        .with_field("total", "monetary", total)
        .into_value()
}

fn orders_values() -> Values {
    let mut values = Values::new();
    values.set(
        "customer",
        MapRecord::new("res.partner", Some(3))
            .with_field("name", "char", "Ann <Admin>")
            .into_value(),
    );
    values.set(
        "orders",
        Value::list(vec![
            order(10, "S00010", "done", 120.0),
            order(11, "S00011", "draft", 99.5),
            order(12, "S00012", "cancel", 5.0),
        ]),
    );
    values.set("dark", true);
    values
}

fn orders_engine() -> QWeb {
    QWeb::builder(store_with(&[
        ("web.layout", LAYOUT),
        ("web.footer", FOOTER),
        ("sale.orders", ORDERS),
    ]))
    .with_groups(Arc::new(StaticGroups::new(["sales.manager"])))
    .build()
}

#[test]
fn test_compiled_and_interpreted_renders_agree() -> TestResult {
    init_logger();
    let engine = orders_engine();
    let reference = TemplateRef::from("sale.orders");
    for options in [
        RenderOptions::default(),
        RenderOptions {
            inherit_branding: true,
            ..RenderOptions::default()
        },
    ] {
        let compiled = engine.render(&reference, orders_values(), &options)?;
        let interpreted =
            engine.render_interpreted(&reference, orders_values(), &options, None)?;
        assert_eq!(compiled, interpreted);
    }
    Ok(())
}

#[test]
fn test_representative_template_output() -> TestResult {
    init_logger();
    let html = orders_engine().render(
        &TemplateRef::from("sale.orders"),
        orders_values(),
        &RenderOptions::default(),
    )?;
    assert!(html.starts_with("<html>"));
    assert!(html.contains("<title>Orders of Ann &lt;Admin&gt;</title>"));
    assert!(html.contains(r#"<body class="dark">"#));
    assert!(html.contains(r#"<li class="order even" data-id="10">"#));
    assert!(html.contains(r#"<li class="order odd" data-id="11">"#));
    assert!(html.contains("<span>S00011</span>"));
    assert!(html.contains("<em>done</em>"));
    assert!(html.contains("<b>DRAFT</b>"));
    assert!(html.contains("<del>cancelled</del>"));
    assert!(html.contains(r#"<span class="total">99.50</span>"#));
    assert_eq!(html.matches(r#"href="/orders/all""#).count(), 1);
    assert!(html.contains(r#"<div class="footer"><i>thanks</i> &amp; 3 orders</div>"#));
    assert!(!html.contains("No orders yet."));
    assert!(!html.contains("t-"));
    Ok(())
}

fn write(dir: &TempDir, name: &str, content: &str) -> Result<PathBuf, std::io::Error> {
    let path = dir.path().join(name);
    fs::write(&path, content)?;
    Ok(path)
}

fn cli_args(templates: PathBuf, name: &str) -> RenderArgs {
    RenderArgs {
        templates,
        name: name.to_string(),
        values: None,
        lang: None,
        config: None,
        sandboxed: false,
        interpret: false,
        dev: false,
    }
}

const DOCUMENT: &str = r#"<templates>
    <t t-name="greet"><p>Hello <t t-esc="who"/>, you owe <t t-esc="amount" t-options="{'widget': 'float', 'precision': 2}"/></p></t>
    <t t-name="danger"><p t-esc="x.__class__"/></t>
</templates>"#;

#[test]
fn test_cli_renders_with_values_and_lang() -> TestResult {
    init_logger();
    let dir = TempDir::new()?;
    let templates = write(&dir, "templates.xml", DOCUMENT)?;
    let values = write(&dir, "values.json", r#"{"who": "Bob & Al", "amount": 1234.5}"#)?;
    let config = write(
        &dir,
        "config.json",
        r#"{"languages": [{"code": "nl_NL", "decimal_point": ",", "thousands_sep": "."}]}"#,
    )?;

    let mut args = cli_args(templates, "greet");
    args.values = Some(values);
    assert_eq!(
        cli::render(&args)?,
        "<p>Hello Bob &amp; Al, you owe 1,234.50</p>"
    );

    args.lang = Some("nl_NL".into());
    args.config = Some(config);
    args.interpret = true;
    assert_eq!(
        cli::render(&args)?,
        "<p>Hello Bob &amp; Al, you owe 1.234,50</p>"
    );
    Ok(())
}

#[test]
fn test_cli_errors() -> TestResult {
    init_logger();
    let dir = TempDir::new()?;
    let templates = write(&dir, "templates.xml", DOCUMENT)?;

    let missing = cli::render(&cli_args(templates.clone(), "nope")).unwrap_err();
    assert!(matches!(missing, CliError::UnknownTemplate(ref name) if name == "nope"));

    let mut sandboxed = cli_args(templates, "danger");
    sandboxed.sandboxed = true;
    assert!(matches!(
        cli::render(&sandboxed).unwrap_err(),
        CliError::Render(qweb::QWebError::Security { .. })
    ));

    let unreadable = cli::render(&cli_args(dir.path().join("absent.xml"), "greet")).unwrap_err();
    assert!(matches!(unreadable, CliError::Io { .. }));
    Ok(())
}
